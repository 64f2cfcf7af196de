//! Bearer-token stamping and one-shot replay on authentication failures.

use super::{Interceptor, Next};
use crate::request::Request;
use crate::response::ChainResult;
use crate::{Error, Result};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared, lock-free slot for the current access token.
///
/// Clones share the slot, so a refresher holding one clone updates what every
/// [`BearerAuthInterceptor`] stamps next.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    token: Arc<ArcSwapOption<String>>,
}

impl TokenStore {
    pub fn new(token: impl Into<String>) -> Self {
        let store = Self::empty();
        store.set(token);
        store
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.token.load_full().map(|t| t.as_ref().clone())
    }

    pub fn set(&self, token: impl Into<String>) {
        self.token.store(Some(Arc::new(token.into())));
    }

    pub fn clear(&self) {
        self.token.store(None);
    }
}

/// Sets `Authorization: Bearer <token>` from a [`TokenStore`]; no-op while empty.
#[derive(Debug, Clone)]
pub struct BearerAuthInterceptor {
    tokens: TokenStore,
}

impl BearerAuthInterceptor {
    pub fn new(tokens: TokenStore) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl Interceptor for BearerAuthInterceptor {
    async fn process(&self, request: Request, next: Next<'_>) -> Result<ChainResult> {
        let request = match self.tokens.get() {
            Some(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                    crate::error::RequestBuildingError::InvalidHeaderValue(
                        AUTHORIZATION.to_string(),
                    )
                })?;
                request.with_header_value(AUTHORIZATION, value)
            }
            None => request,
        };
        next.run(request).await
    }

    fn name(&self) -> &str {
        "bearer_auth"
    }
}

/// Decides whether a failed call should be replayed, typically after
/// refreshing credentials.
#[async_trait]
pub trait Retrier: Send + Sync {
    async fn should_retry(&self, request: &Request, error: &Error) -> bool;
}

#[async_trait]
impl<F> Retrier for F
where
    F: Fn(&Request, &Error) -> bool + Send + Sync,
{
    async fn should_retry(&self, request: &Request, error: &Error) -> bool {
        self(request, error)
    }
}

/// Replays the rest of the chain once when it fails with an auth status.
///
/// Only `Api` errors whose status is in the trigger list are considered
/// (default `401 Unauthorized`). A replayed call that fails again is returned
/// as is. Cancellation and transport failures pass through untouched.
pub struct AuthRetryInterceptor<R> {
    retrier: R,
    statuses: Vec<StatusCode>,
}

impl<R: Retrier> AuthRetryInterceptor<R> {
    pub fn new(retrier: R) -> Self {
        Self {
            retrier,
            statuses: vec![StatusCode::UNAUTHORIZED],
        }
    }

    /// Replace the trigger statuses.
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    fn triggers(&self, error: &Error) -> bool {
        error
            .status_code()
            .map(|status| self.statuses.contains(&status))
            .unwrap_or(false)
    }
}

#[async_trait]
impl<R: Retrier> Interceptor for AuthRetryInterceptor<R> {
    async fn process(&self, request: Request, next: Next<'_>) -> Result<ChainResult> {
        let error = match next.run(request.clone()).await {
            Ok(result) => return Ok(result),
            Err(error) => error,
        };
        if !self.triggers(&error) {
            return Err(error);
        }
        if !self.retrier.should_retry(&request, &error).await {
            debug!(url = %request.url(), "auth failure not retried");
            return Err(error);
        }

        debug!(url = %request.url(), status = ?error.status_code(), "replaying after auth failure");
        let replay = next.run(request).await;
        if let Err(ref err) = replay {
            if self.triggers(err) {
                warn!(status = ?err.status_code(), "auth failure persisted after replay");
            }
        }
        replay
    }

    fn name(&self) -> &str {
        "auth_retry"
    }
}

impl<R> std::fmt::Debug for AuthRetryInterceptor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRetryInterceptor")
            .field("statuses", &self.statuses)
            .finish()
    }
}
