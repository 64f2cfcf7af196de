use super::{Interceptor, Next};
use crate::logging::{emit, Direction, LogEvent, NetworkLogger, Severity};
use crate::request::Request;
use crate::response::ChainResult;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Reports what passes through its position in the chain.
///
/// Logs the request as this interceptor sees it, then either the response or a
/// warning for the failure. Failures are returned unchanged.
#[derive(Clone)]
pub struct LoggingInterceptor {
    logger: Arc<dyn NetworkLogger>,
}

impl LoggingInterceptor {
    pub fn new(logger: Arc<dyn NetworkLogger>) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn process(&self, request: Request, next: Next<'_>) -> Result<ChainResult> {
        emit(self.logger.as_ref(), LogEvent::Request { request: &request });
        let url = request.url().clone();

        match next.run(request).await {
            Ok(result) => {
                emit(
                    self.logger.as_ref(),
                    LogEvent::Response {
                        url: &result.url,
                        status: result.status,
                        headers: &result.headers,
                        body: &result.body,
                    },
                );
                Ok(result)
            }
            Err(err) => {
                emit(
                    self.logger.as_ref(),
                    LogEvent::message(
                        Direction::Response,
                        Severity::Warning,
                        format!("{} failed: {}", url, err),
                    ),
                );
                Err(err)
            }
        }
    }

    fn name(&self) -> &str {
        "logging"
    }
}
