//! Client facade and the steps it wires together.
//!
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod classification;
pub mod core;
mod dispatch;

pub use builder::NetworkClientBuilder;
pub use classification::{ApiErrorMapper, ErrorInfo, ErrorMapper, ResponseClassifier};
pub use core::NetworkClient;
