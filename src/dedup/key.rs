//! Request key generation.

use crate::request::Request;
use reqwest::header::HeaderName;
use sha2::{Digest, Sha256};

/// Fingerprint identifying "the same request" for in-flight deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
    hash: String,
}

impl RequestKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for RequestKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RequestKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<u64> for RequestKey {
    fn from(n: u64) -> Self {
        Self::new(format!("{:016x}", n))
    }
}

/// Computes [`RequestKey`]s as SHA-256 over the canonical `(method, url, body)` tuple.
///
/// Headers are excluded by default: two concurrent calls that differ only in
/// headers (an `Authorization` token, a trace id) coalesce into one network call
/// and both callers receive whichever result that call produced. Opt specific
/// headers back in with [`include_header`](Self::include_header) when that is
/// not acceptable.
///
/// Keys only live in-process while a call is outstanding, so the 256-bit digest
/// is far beyond the collision resistance that use needs.
#[derive(Debug, Clone, Default)]
pub struct RequestKeyGenerator {
    headers: Vec<HeaderName>,
    salt: Option<String>,
}

impl RequestKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Make the values of `name` part of the key.
    pub fn include_header(mut self, name: HeaderName) -> Self {
        if !self.headers.contains(&name) {
            self.headers.push(name);
        }
        self
    }

    pub fn generate(&self, request: &Request) -> RequestKey {
        let mut hasher = Sha256::new();
        update_field(&mut hasher, request.method().as_str().as_bytes());
        update_field(&mut hasher, request.url().as_str().as_bytes());
        update_field(&mut hasher, request.body().map(|b| &b[..]).unwrap_or(&[]));

        for name in &self.headers {
            update_field(&mut hasher, name.as_str().as_bytes());
            let values: Vec<_> = request.headers().get_all(name).iter().collect();
            hasher.update((values.len() as u64).to_be_bytes());
            for value in values {
                update_field(&mut hasher, value.as_bytes());
            }
        }
        if let Some(ref salt) = self.salt {
            update_field(&mut hasher, salt.as_bytes());
        }

        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        RequestKey::new(hash)
    }
}

// Length-prefixed so that field boundaries cannot shift between requests.
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
