//! Benchmarks for the in-flight fetch path
//!
//! This benchmark measures:
//! - A single uncontended fetch through registry, chain and classifier
//! - Fan-in of many identical concurrent fetches onto one call

use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use futures::future::join_all;
use network_client::interceptors::PassthroughInterceptor;
use network_client::logging::NoopLogger;
use network_client::{NetworkClient, RawResponse, Request, Transport, TransportError};
use reqwest::Method;
use std::sync::Arc;

struct InstantTransport;

#[async_trait]
impl Transport for InstantTransport {
    async fn perform(&self, request: &Request) -> Result<RawResponse, TransportError> {
        Ok(RawResponse::new(
            request.url().clone(),
            200,
            &br#"{"id":1,"name":"bench"}"#[..],
        ))
    }
}

fn client() -> NetworkClient {
    NetworkClient::builder()
        .transport(Arc::new(InstantTransport))
        .logger(Arc::new(NoopLogger))
        .interceptor(PassthroughInterceptor)
        .build()
        .unwrap()
}

fn bench_single_fetch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let client = rt.block_on(async { client() });
    let request = Request::parse(Method::GET, "https://api.example.com/items/1").unwrap();

    c.bench_function("dedup/single_fetch", |b| {
        b.to_async(&rt)
            .iter(|| client.fetch_as::<serde_json::Value>(request.clone()))
    });
}

fn bench_fan_in(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let client = rt.block_on(async { client() });
    let request = Request::parse(Method::GET, "https://api.example.com/items/1").unwrap();
    let mut group = c.benchmark_group("dedup/fan_in");

    for callers in [2usize, 16, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(callers), &callers, |b, &n| {
            b.to_async(&rt).iter(|| {
                join_all((0..n).map(|_| client.fetch_as::<serde_json::Value>(request.clone())))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_fetch, bench_fan_in);
criterion_main!(benches);
