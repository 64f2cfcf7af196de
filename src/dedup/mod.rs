//! In-flight request deduplication.
//!
//! Concurrent fetches of "the same request" share one network call. Sameness
//! is decided by a [`RequestKey`]; outstanding calls live in an
//! [`InFlightRegistry`] until they finish, are cancelled, or are swept.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RequestKeyGenerator`] | SHA-256 fingerprint of method, URL and body |
//! | [`InFlightRegistry`] | Key → shared call map with single-flight admission |
//! | [`SharedCall`] | Cloneable handle every joined caller awaits |

pub mod key;
pub mod registry;

pub use key::{RequestKey, RequestKeyGenerator};
pub use registry::{Admission, InFlightRegistry, SharedCall};
