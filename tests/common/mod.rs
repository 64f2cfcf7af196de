//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use network_client::logging::{InMemoryLogger, NoopLogger};
use network_client::{NetworkClient, RawResponse, Request, Transport, TransportError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub const URL: &str = "https://example.com/";

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, &'static str),
    Fail(&'static str),
}

/// Transport double: counts invocations, records requests, replays a script.
///
/// The last scripted reply repeats once the script runs out. An optional gate
/// holds every call until the test adds a permit.
pub struct StubTransport {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Reply>,
    requests: Mutex<Vec<Request>>,
    gate: Option<Arc<Semaphore>>,
}

impl StubTransport {
    pub fn always(status: u16, body: &'static str) -> Self {
        Self::scripted(vec![Reply::Status(status, body)])
    }

    pub fn scripted(replies: Vec<Reply>) -> Self {
        let last = replies
            .last()
            .cloned()
            .unwrap_or(Reply::Status(200, ""));
        Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(replies.into()),
            last: Mutex::new(last),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Hold calls until a permit is added to `gate`.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Reply {
        let mut script = self.script.lock().unwrap();
        match script.pop_front() {
            Some(reply) => {
                *self.last.lock().unwrap() = reply.clone();
                reply
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn perform(&self, request: &Request) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }

        match self.next_reply() {
            Reply::Status(status, body) => Ok(RawResponse::new(
                request.url().clone(),
                status,
                body.as_bytes().to_vec(),
            )),
            Reply::Fail(message) => Err(TransportError::Other(message.to_string())),
        }
    }
}

/// Route `tracing` output to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn client(transport: Arc<StubTransport>) -> NetworkClient {
    init_tracing();
    NetworkClient::builder()
        .transport(transport)
        .logger(Arc::new(NoopLogger))
        .build()
        .unwrap()
}

pub fn client_with_logger(
    transport: Arc<StubTransport>,
    logger: Arc<InMemoryLogger>,
) -> NetworkClient {
    init_tracing();
    NetworkClient::builder()
        .transport(transport)
        .logger(logger)
        .build()
        .unwrap()
}

/// Yield until `stub` has been entered `n` times.
pub async fn wait_for_calls(stub: &StubTransport, n: usize) {
    while stub.calls() < n {
        tokio::task::yield_now().await;
    }
}

pub fn get(url: &str) -> Request {
    Request::parse(reqwest::Method::GET, url).unwrap()
}
