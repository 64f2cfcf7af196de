//! Transport collaborator: the component that actually performs network I/O.
//!
//! The core only needs "perform a request, get bytes + metadata or fail".
//! [`HttpTransport`] is the default implementation on top of `reqwest`; tests and
//! embedders can plug in anything implementing [`Transport`].

mod http;

pub use http::{HttpTransport, HttpTransportConfig};

use crate::request::Request;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use url::Url;

/// Raw outcome of one transport call, before classification.
///
/// `status` is kept as the raw number so malformed results can be rejected by
/// the classifier instead of the transport.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(url: Url, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url,
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Performs requests. Must be safe for concurrent invocation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, request: &Request) -> std::result::Result<RawResponse, TransportError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    #[error("request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Http(Arc::new(err))
        }
    }
}
