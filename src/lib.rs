//! # network-client
//!
//! Request-execution core of an async HTTP client.
//!
//! ## Overview
//!
//! A single entry point turns a [`Request`] into a decoded [`Response<T>`].
//! On the way it guarantees three things:
//!
//! - **In-flight deduplication**: concurrent identical requests share one network call
//! - **Interceptor chain**: ordered layers may observe, rewrite, retry or short-circuit a call
//! - **Uniform errors**: every failure surfaces as one [`Error`] variant
//!
//! ```text
//! fetch(request)
//!   → key(request)
//!   → registry.get_or_insert(key, pipeline)   ── joined callers wait here
//!        → interceptor 0 → … → interceptor n → transport → classifier
//!   → shared ChainResult
//!   → per-caller decode → Response<T>
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use network_client::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> network_client::Result<()> {
//!     let tokens = TokenStore::new("secret");
//!     let client = NetworkClient::builder()
//!         .interceptor(BearerAuthInterceptor::new(tokens))
//!         .build()?;
//!
//!     let user: Response<User> = client.get("https://api.example.com/me").await?;
//!     println!("user {} ({})", user.item().id, user.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Deduplication key
//!
//! Keys are a SHA-256 digest of method, URL and body. Headers are **not**
//! part of the key: two concurrent calls differing only in, say, their
//! `Authorization` header collapse into one call, and both callers receive
//! its result. Use [`RequestKeyGenerator::include_header`] or
//! [`NetworkClient::fetch_with_key`] where that is not acceptable.
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`NetworkClient`] facade, builder and response classification |
//! | [`dedup`] | Request keys and the in-flight registry |
//! | [`interceptors`] | Interceptor chain and shipped interceptors |
//! | [`transport`] | Transport trait and the reqwest implementation |
//! | [`decoding`] | Decoder trait and [`JsonDecoder`] |
//! | [`logging`] | Lifecycle logging collaborators |
//! | [`error`] | Error taxonomy |

pub mod client;
pub mod decoding;
pub mod dedup;
pub mod error;
pub mod interceptors;
pub mod logging;
pub mod request;
pub mod response;
pub mod transport;

pub use client::{
    ApiErrorMapper, ErrorInfo, ErrorMapper, NetworkClient, NetworkClientBuilder,
    ResponseClassifier,
};
pub use decoding::{Decoder, JsonDecoder};
pub use dedup::{InFlightRegistry, RequestKey, RequestKeyGenerator};
pub use error::{
    DecodingError, EncodingKind, Error, ErrorContext, ErrorKind, RequestBuildingError,
};
pub use interceptors::{Interceptor, InterceptorChain, Next, Terminal};
pub use logging::{NetworkLogger, TracingLogger};
pub use request::Request;
pub use response::{ChainResult, Response};
pub use transport::{HttpTransport, HttpTransportConfig, RawResponse, Transport, TransportError};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Common imports for applications.
pub mod prelude {
    pub use crate::client::{NetworkClient, NetworkClientBuilder};
    pub use crate::decoding::{Decoder, JsonDecoder};
    pub use crate::dedup::RequestKey;
    pub use crate::error::{Error, ErrorKind};
    pub use crate::interceptors::{
        AuthRetryInterceptor, BearerAuthInterceptor, Interceptor, LoggingInterceptor, Next,
        TokenStore,
    };
    pub use crate::logging::{LogDetail, NetworkLogger, TracingLogger};
    pub use crate::request::Request;
    pub use crate::response::{ChainResult, Response};
    pub use crate::Result;
}
