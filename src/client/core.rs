use super::builder::NetworkClientBuilder;
use super::dispatch::Pipeline;
use crate::decoding::{Decoder, JsonDecoder};
use crate::dedup::{Admission, InFlightRegistry, RequestKey, RequestKeyGenerator};
use crate::logging::{emit, Direction, LogEvent, NetworkLogger, Severity};
use crate::request::Request;
use crate::response::{ChainResult, Response};
use crate::{Error, ErrorKind, Result};
use futures::FutureExt;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

/// Request-execution entry point.
///
/// Concurrent fetches that produce the same [`RequestKey`] share one pass
/// through the interceptor chain and transport; each caller then decodes the
/// shared bytes into its own `T`.
///
/// Share one client (behind an `Arc`) across tasks; deduplication only spans
/// callers of the same instance.
pub struct NetworkClient<D: Decoder = JsonDecoder> {
    pub(crate) pipeline: Arc<Pipeline>,
    pub(crate) registry: InFlightRegistry,
    pub(crate) keys: RequestKeyGenerator,
    pub(crate) decoder: D,
    pub(crate) logger: Arc<dyn NetworkLogger>,
    pub(crate) maintenance: Option<JoinHandle<()>>,
}

impl NetworkClient<JsonDecoder> {
    /// Client with default collaborators (reqwest transport, JSON decoder, tracing logger).
    pub fn new() -> Result<Self> {
        NetworkClientBuilder::new().build()
    }

    pub fn builder() -> NetworkClientBuilder {
        NetworkClientBuilder::new()
    }
}

impl<D: Decoder> NetworkClient<D> {
    /// `GET` an absolute URL and decode the body as `T`.
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<Response<T>> {
        let request = Request::parse(Method::GET, url)?;
        self.fetch_as(request).await
    }

    /// Run `request`, discarding the body.
    pub async fn fetch(&self, request: Request) -> Result<Response<()>> {
        let key = self.keys.generate(&request);
        let result = self.shared_fetch(request, key).await?;
        Ok(Response::from_chain((), result))
    }

    /// Run `request` and decode the body as `T`.
    pub async fn fetch_as<T: DeserializeOwned>(&self, request: Request) -> Result<Response<T>> {
        let key = self.keys.generate(&request);
        self.fetch_with_key(request, key).await
    }

    /// Like [`fetch_as`](Self::fetch_as) but deduplicated under `key` instead of
    /// the computed one.
    pub async fn fetch_with_key<T: DeserializeOwned>(
        &self,
        request: Request,
        key: RequestKey,
    ) -> Result<Response<T>> {
        let result = self.shared_fetch(request, key).await?;
        self.decode(result)
    }

    /// The key `request` is deduplicated under.
    pub fn request_key(&self, request: &Request) -> RequestKey {
        self.keys.generate(request)
    }

    /// Abort the in-flight call for `key`; every joined caller gets `Cancelled`.
    pub fn cancel(&self, key: &RequestKey) -> bool {
        let removed = self.registry.remove(key);
        if removed {
            emit(self.logger.as_ref(), deleted_key(key));
        }
        removed
    }

    /// Number of outstanding calls.
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    pub fn prune_cancelled(&self) -> usize {
        self.registry.remove_cancelled()
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    async fn shared_fetch(&self, request: Request, key: RequestKey) -> Result<ChainResult> {
        let pruned = self.registry.remove_cancelled();
        if pruned > 0 {
            debug!(pruned, "pruned stale in-flight entries");
        }

        let pipeline = self.pipeline.clone();
        let logger = self.logger.clone();
        let span_key = key.to_string();
        let task_key = key.clone();
        let admitted = self.registry.get_or_insert(&key, move || {
            let span = info_span!(
                "network_call",
                request_key = %span_key,
                call_id = %Uuid::new_v4()
            );
            async move {
                emit(
                    logger.as_ref(),
                    LogEvent::message(
                        Direction::Request,
                        Severity::Info,
                        format!("New Request: RequestKey: {}", task_key),
                    ),
                );
                let result = pipeline.run(request).await;
                emit(logger.as_ref(), deleted_key(&task_key));
                result
            }
            .instrument(span)
            .boxed()
        });

        let result = match admitted {
            Ok((call, admission)) => {
                if admission == Admission::Joined {
                    debug!(request_key = %key, "joined in-flight call");
                }
                call.await
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            if err.kind() == ErrorKind::Unknown {
                emit(
                    self.logger.as_ref(),
                    LogEvent::message(Direction::Response, Severity::Critical, err.to_string()),
                );
            }
        }
        result
    }

    fn decode<T: DeserializeOwned>(&self, result: ChainResult) -> Result<Response<T>> {
        match self.decoder.decode::<T>(&result.body) {
            Ok(item) => Ok(Response::from_chain(item, result)),
            Err(err) => {
                warn!(
                    url = %result.url,
                    target_type = err.target,
                    error = %err.message,
                    "response decoding failed"
                );
                emit(
                    self.logger.as_ref(),
                    LogEvent::message(Direction::Response, Severity::Warning, err.to_string()),
                );
                Err(Error::Decoding(err))
            }
        }
    }
}

fn deleted_key(key: &RequestKey) -> LogEvent<'static> {
    LogEvent::message(
        Direction::Request,
        Severity::Info,
        format!("Request: Deleted Key: {}", key),
    )
}

impl<D: Decoder> Drop for NetworkClient<D> {
    fn drop(&mut self) {
        if let Some(handle) = self.maintenance.take() {
            handle.abort();
        }
    }
}

impl<D: Decoder> std::fmt::Debug for NetworkClient<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkClient")
            .field("interceptors", &self.pipeline.chain)
            .field("in_flight", &self.registry.len())
            .field("maintenance", &self.maintenance.is_some())
            .finish()
    }
}
