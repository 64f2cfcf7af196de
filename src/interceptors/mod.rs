//! Interceptor chain: ordered request/response transformers around the transport.
//!
//! Each interceptor receives the request and a [`Next`] continuation. It may
//! rewrite the request before calling `next.run`, inspect or replace the
//! outcome afterwards, call `next.run` again (a retry), or never call it at all
//! (a short-circuit). Interceptors registered as `[A, B]` wrap as
//! `B(A(request))` on the way in and unwind in reverse on the way out.
//!
//! Interceptors live inside the deduplicated section of the pipeline: for one
//! in-flight call they run once, no matter how many callers joined it.
//!
//! | Interceptor | Description |
//! |-------------|-------------|
//! | [`PassthroughInterceptor`] | Forwards unchanged |
//! | [`LoggingInterceptor`] | Reports request and outcome to a [`NetworkLogger`](crate::logging::NetworkLogger) |
//! | [`BearerAuthInterceptor`] | Stamps `Authorization: Bearer` from a [`TokenStore`] |
//! | [`AuthRetryInterceptor`] | Replays once on an auth failure when a [`Retrier`] agrees |

pub mod auth;
pub mod logging;

pub use auth::{AuthRetryInterceptor, BearerAuthInterceptor, Retrier, TokenStore};
pub use logging::LoggingInterceptor;

use crate::request::Request;
use crate::response::ChainResult;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn process(&self, request: Request, next: Next<'_>) -> Result<ChainResult>;

    fn name(&self) -> &str {
        "unnamed"
    }
}

/// The final step of a chain, reached once every interceptor has delegated.
#[async_trait]
pub trait Terminal: Send + Sync {
    async fn call(&self, request: Request) -> Result<ChainResult>;
}

/// Continuation handed to an interceptor: the rest of the chain plus the terminal.
///
/// `run` borrows, so an interceptor can invoke it more than once.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Interceptor>],
    terminal: &'a dyn Terminal,
}

impl<'a> Next<'a> {
    pub(crate) fn new(remaining: &'a [Arc<dyn Interceptor>], terminal: &'a dyn Terminal) -> Self {
        Self {
            remaining,
            terminal,
        }
    }

    pub async fn run(&self, request: Request) -> Result<ChainResult> {
        match self.remaining.split_first() {
            Some((head, rest)) => head.process(request, Next::new(rest, self.terminal)).await,
            None => self.terminal.call(request).await,
        }
    }
}

/// Ordered list of interceptors; registration order is application order.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn push_arc(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Run `request` through every interceptor and finally `terminal`.
    pub async fn execute(&self, request: Request, terminal: &dyn Terminal) -> Result<ChainResult> {
        Next::new(&self.interceptors, terminal).run(request).await
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.names())
            .finish()
    }
}

/// Forwards the request unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughInterceptor;

#[async_trait]
impl Interceptor for PassthroughInterceptor {
    async fn process(&self, request: Request, next: Next<'_>) -> Result<ChainResult> {
        next.run(request).await
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}
