//! Terminal step of the pipeline and the pipeline itself.
//!
//! Single attempt: perform the request, log both directions, classify. Retry
//! policy belongs to interceptors.

use super::classification::ResponseClassifier;
use crate::interceptors::{InterceptorChain, Terminal};
use crate::logging::{emit, Direction, LogEvent, NetworkLogger, Severity};
use crate::request::Request;
use crate::response::ChainResult;
use crate::transport::Transport;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub(crate) struct TransportTerminal {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) classifier: ResponseClassifier,
    pub(crate) logger: Arc<dyn NetworkLogger>,
}

#[async_trait]
impl Terminal for TransportTerminal {
    async fn call(&self, request: Request) -> Result<ChainResult> {
        emit(self.logger.as_ref(), LogEvent::Request { request: &request });

        let start = Instant::now();
        let raw = match self.transport.perform(&request).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    url = %request.url(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %err,
                    "transport failed"
                );
                emit(
                    self.logger.as_ref(),
                    LogEvent::message(
                        Direction::Response,
                        Severity::Warning,
                        format!("{} {}: {}", request.method(), request.url(), err),
                    ),
                );
                return Err(Error::Transport(err));
            }
        };

        debug!(
            url = %raw.url,
            status = raw.status,
            duration_ms = start.elapsed().as_millis() as u64,
            "transport completed"
        );
        if let Ok(status) = reqwest::StatusCode::from_u16(raw.status) {
            emit(
                self.logger.as_ref(),
                LogEvent::Response {
                    url: &raw.url,
                    status,
                    headers: &raw.headers,
                    body: &raw.body,
                },
            );
        }

        self.classifier.classify(raw).await
    }
}

/// Interceptor chain plus terminal: the part of a fetch that runs once per
/// in-flight call.
pub(crate) struct Pipeline {
    pub(crate) chain: InterceptorChain,
    pub(crate) terminal: TransportTerminal,
}

impl Pipeline {
    pub(crate) async fn run(&self, request: Request) -> Result<ChainResult> {
        self.chain.execute(request, &self.terminal).await
    }
}
