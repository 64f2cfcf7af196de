use crate::decoding::Decoder;
use crate::transport::TransportError;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Structured error context for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Deduplication key of the call that failed, when known.
    pub request_key: Option<String>,
    /// Additional context about the error (e.g. the offending value)
    pub details: Option<String>,
    /// Component that raised the error (e.g. "registry", "classifier")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_key(mut self, key: impl Into<String>) -> Self {
        self.request_key = Some(key.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Payload encoding that failed while building a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingKind {
    Form,
    Json,
}

/// Failures while assembling a [`Request`](crate::Request).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestBuildingError {
    #[error("invalid header name `{0}`")]
    InvalidHeaderName(String),

    #[error("invalid value for header `{0}`")]
    InvalidHeaderValue(String),

    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(String),
}

/// A payload could not be decoded into the type the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot decode `{target}`: {message}")]
pub struct DecodingError {
    /// Rust type name of the decode target.
    pub target: &'static str,
    pub message: String,
}

impl DecodingError {
    pub fn new<T: ?Sized>(message: impl Into<String>) -> Self {
        Self {
            target: std::any::type_name::<T>(),
            message: message.into(),
        }
    }
}

/// Unified error type of the client.
///
/// Every variant is `Clone`: a single failure of an in-flight call is handed to
/// each caller that joined it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid response: {message}{}", format_context(.context))]
    InvalidResponse {
        message: String,
        context: ErrorContext,
    },

    #[error("API error: HTTP {status}")]
    Api {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },

    #[error("Decoding error: {0}")]
    Decoding(#[from] DecodingError),

    #[error("Encoding error ({kind:?}): {message}")]
    Encoding { kind: EncodingKind, message: String },

    #[error("Request building error: {0}")]
    RequestBuilding(#[from] RequestBuildingError),

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Request cancelled{}", format_context(.context))]
    Cancelled { context: ErrorContext },

    #[error("Unknown error: {message}{}", format_context(.context))]
    Unknown {
        message: String,
        context: ErrorContext,
    },
}

/// Discriminant of [`Error`], handy for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidUrl,
    InvalidResponse,
    Api,
    Decoding,
    Encoding,
    RequestBuilding,
    Transport,
    Cancelled,
    Unknown,
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref key) = ctx.request_key {
        parts.push(format!("key: {}", key));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn invalid_url(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_response(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidResponse {
            message: msg.into(),
            context,
        }
    }

    pub fn encoding(kind: EncodingKind, msg: impl std::fmt::Display) -> Self {
        Error::Encoding {
            kind,
            message: msg.to_string(),
        }
    }

    pub fn cancelled(context: ErrorContext) -> Self {
        Error::Cancelled { context }
    }

    pub fn unknown_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Unknown {
            message: msg.into(),
            context,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            Error::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Error::Api { .. } => ErrorKind::Api,
            Error::Decoding(_) => ErrorKind::Decoding,
            Error::Encoding { .. } => ErrorKind::Encoding,
            Error::RequestBuilding(_) => ErrorKind::RequestBuilding,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// HTTP status of an `Api` error.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw body of an `Api` error.
    pub fn api_body(&self) -> Option<&Bytes> {
        match self {
            Error::Api { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Decode the body of an `Api` error into a typed error payload.
    ///
    /// Returns `None` for any other kind, or when the body does not decode as `T`.
    pub fn decode_api_error<T, D>(&self, decoder: &D) -> Option<T>
    where
        T: DeserializeOwned,
        D: Decoder,
    {
        let body = self.api_body()?;
        decoder.decode(body).ok()
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::InvalidResponse { context, .. }
            | Error::Cancelled { context }
            | Error::Unknown { context, .. } => Some(context),
            _ => None,
        }
    }
}
