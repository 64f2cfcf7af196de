//! Response classification: turning a raw transport outcome into success or a typed error.

use crate::response::ChainResult;
use crate::transport::RawResponse;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::sync::Arc;
use url::Url;

/// Everything known about a non-2xx response.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub status: StatusCode,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ErrorInfo {
    /// The default mapping: an `Api` error carrying status, headers and body.
    pub fn into_error(self) -> Error {
        Error::Api {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

/// Maps a non-2xx response to the error surfaced to callers.
///
/// Must be safe to call concurrently.
#[async_trait]
pub trait ErrorMapper: Send + Sync {
    async fn map(&self, info: ErrorInfo) -> Error;
}

/// Default mapper: [`ErrorInfo::into_error`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiErrorMapper;

#[async_trait]
impl ErrorMapper for ApiErrorMapper {
    async fn map(&self, info: ErrorInfo) -> Error {
        info.into_error()
    }
}

#[async_trait]
impl<F> ErrorMapper for F
where
    F: Fn(ErrorInfo) -> Error + Send + Sync,
{
    async fn map(&self, info: ErrorInfo) -> Error {
        self(info)
    }
}

/// Applies the success rule (`200..=299`) and the configured [`ErrorMapper`].
#[derive(Clone)]
pub struct ResponseClassifier {
    mapper: Arc<dyn ErrorMapper>,
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new(Arc::new(ApiErrorMapper))
    }
}

impl ResponseClassifier {
    pub fn new(mapper: Arc<dyn ErrorMapper>) -> Self {
        Self { mapper }
    }

    pub fn is_success(status: StatusCode) -> bool {
        (200..=299).contains(&status.as_u16())
    }

    /// Pass 2xx through with the body untouched; map everything else to an error.
    ///
    /// A status outside the valid HTTP range yields `InvalidResponse`.
    pub async fn classify(&self, raw: RawResponse) -> Result<ChainResult> {
        let status = StatusCode::from_u16(raw.status).map_err(|_| {
            Error::invalid_response(
                "response carries no valid HTTP status",
                ErrorContext::new()
                    .with_details(format!("status {} from {}", raw.status, raw.url))
                    .with_source("classifier"),
            )
        })?;

        if Self::is_success(status) {
            return Ok(ChainResult {
                url: raw.url,
                status,
                headers: raw.headers,
                body: raw.body,
            });
        }

        Err(self
            .mapper
            .map(ErrorInfo {
                status,
                url: raw.url,
                headers: raw.headers,
                body: raw.body,
            })
            .await)
    }
}

impl std::fmt::Debug for ResponseClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseClassifier").finish_non_exhaustive()
    }
}
