//! In-flight call registry.
//!
//! Maps a [`RequestKey`] to the shared, spawned call serving it. All mutation
//! goes through one mutex; the map itself never leaves this module.

use super::key::RequestKey;
use crate::response::ChainResult;
use crate::{Error, ErrorContext, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, trace};

/// Handle to an in-flight call. Cloning it joins the call.
pub type SharedCall = Shared<BoxFuture<'static, Result<ChainResult>>>;

/// How a caller was admitted by [`InFlightRegistry::get_or_insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No call was outstanding; the factory ran and a new call was spawned.
    Started,
    /// An outstanding call for the key was joined.
    Joined,
}

struct InFlightEntry {
    id: u64,
    call: SharedCall,
    handle: AbortHandle,
    started_at: Instant,
}

#[derive(Default)]
struct RegistryInner {
    entries: Mutex<HashMap<RequestKey, InFlightEntry>>,
    next_id: AtomicU64,
}

impl RegistryInner {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<RequestKey, InFlightEntry>>> {
        self.entries.lock().map_err(|_| {
            Error::unknown_with_context(
                "in-flight registry poisoned",
                ErrorContext::new().with_source("registry"),
            )
        })
    }

    /// Remove `key` only if it still belongs to call `id`.
    fn finish(&self, key: &RequestKey, id: u64) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.get(key).map(|e| e.id) == Some(id) {
                if let Some(entry) = entries.remove(key) {
                    trace!(
                        request_key = %key,
                        elapsed_ms = entry.started_at.elapsed().as_millis() as u64,
                        "in-flight entry removed"
                    );
                }
            }
        }
    }

    fn prune_finished(&self) -> usize {
        match self.entries.lock() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|_, entry| !entry.handle.is_finished());
                before - entries.len()
            }
            Err(_) => 0,
        }
    }
}

/// Concurrency-safe registry of outstanding calls, at most one per key.
///
/// Cheap to clone; clones share the same map. Each call runs as its own tokio
/// task, so a caller that stops waiting (its future is dropped) never cancels
/// the call for the others. The task removes its own entry on completion;
/// [`remove`](Self::remove) aborts the task along with its entry, and entries
/// whose task died some other way (panicked) are swept by
/// [`remove_cancelled`](Self::remove_cancelled).
#[derive(Clone, Default)]
pub struct InFlightRegistry {
    inner: Arc<RegistryInner>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the outstanding call for `key`, or spawn `factory()` as a new one.
    ///
    /// Lookup and insertion happen under one lock, so concurrent callers for the
    /// same key run `factory` exactly once. Must be called inside a tokio runtime.
    pub fn get_or_insert<F>(&self, key: &RequestKey, factory: F) -> Result<(SharedCall, Admission)>
    where
        F: FnOnce() -> BoxFuture<'static, Result<ChainResult>>,
    {
        // Spawning needs a runtime; bail out before touching the lock.
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::unknown_with_context(
                "no tokio runtime to run the in-flight call on",
                ErrorContext::new()
                    .with_request_key(key.to_string())
                    .with_source("registry"),
            ));
        }
        let mut entries = self.inner.lock()?;

        if let Some(entry) = entries.get(key) {
            if !entry.handle.is_finished() {
                return Ok((entry.call.clone(), Admission::Joined));
            }
            // Task ended without cleaning up after itself.
            entries.remove(key);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let future = factory();
        let registry = Arc::downgrade(&self.inner);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let result = future.await;
            if let Some(inner) = registry.upgrade() {
                inner.finish(&task_key, id);
            }
            result
        });
        let handle = task.abort_handle();

        let context_key = key.to_string();
        let call = task
            .map(move |joined| match joined {
                Ok(result) => result,
                Err(err) if err.is_cancelled() => Err(Error::cancelled(
                    ErrorContext::new()
                        .with_request_key(context_key)
                        .with_source("registry"),
                )),
                Err(err) => Err(Error::unknown_with_context(
                    "in-flight task failed",
                    ErrorContext::new()
                        .with_request_key(context_key)
                        .with_details(err.to_string())
                        .with_source("registry"),
                )),
            })
            .boxed()
            .shared();

        entries.insert(
            key.clone(),
            InFlightEntry {
                id,
                call: call.clone(),
                handle,
                started_at: Instant::now(),
            },
        );
        Ok((call, Admission::Started))
    }

    /// Abort the call for `key` and drop its entry. Joined callers see `Cancelled`.
    ///
    /// The task is stopped before the key is free again, so a later
    /// [`get_or_insert`](Self::get_or_insert) never runs next to it.
    pub fn remove(&self, key: &RequestKey) -> bool {
        let entry = match self.inner.entries.lock() {
            Ok(mut entries) => entries.remove(key),
            Err(_) => None,
        };
        match entry {
            Some(entry) => {
                entry.handle.abort();
                debug!(request_key = %key, "in-flight call removed");
                true
            }
            None => false,
        }
    }

    /// Sweep entries whose task is already gone. Returns how many were removed.
    pub fn remove_cancelled(&self) -> usize {
        self.inner.prune_finished()
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.inner
            .entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run [`remove_cancelled`](Self::remove_cancelled) every `interval`.
    ///
    /// The task holds only a weak reference and ends once every registry handle
    /// is dropped.
    pub fn spawn_maintenance(&self, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let removed = inner.prune_finished();
                if removed > 0 {
                    debug!(removed, "maintenance removed stale in-flight entries");
                }
            }
        })
    }
}

impl std::fmt::Debug for InFlightRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("in_flight", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;
    use url::Url;

    fn ok(body: &'static str) -> ChainResult {
        ChainResult {
            url: Url::parse("https://example.com/").unwrap(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn gated(gate: Arc<Notify>, body: &'static str) -> BoxFuture<'static, Result<ChainResult>> {
        async move {
            gate.notified().await;
            Ok(ok(body))
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_factory_call() {
        let registry = InFlightRegistry::new();
        let key = RequestKey::from("k");
        let gate = Arc::new(Notify::new());
        let factory_calls = Arc::new(AtomicUsize::new(0));

        let mut calls = Vec::new();
        for _ in 0..3 {
            let counter = factory_calls.clone();
            let gate = gate.clone();
            let (call, admission) = registry
                .get_or_insert(&key, move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    gated(gate, "shared")
                })
                .unwrap();
            calls.push((call, admission));
        }

        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
        assert_eq!(calls[0].1, Admission::Started);
        assert!(calls[1..].iter().all(|(_, a)| *a == Admission::Joined));
        assert!(registry.contains(&key));

        gate.notify_one();
        for (call, _) in calls {
            assert_eq!(call.await.unwrap().body, Bytes::from_static(b"shared"));
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_completed_entry_allows_fresh_call() {
        let registry = InFlightRegistry::new();
        let key = RequestKey::from("k");

        let (first, _) = registry
            .get_or_insert(&key, || async { Ok(ok("one")) }.boxed())
            .unwrap();
        first.await.unwrap();
        assert!(!registry.contains(&key));

        let (second, admission) = registry
            .get_or_insert(&key, || async { Ok(ok("two")) }.boxed())
            .unwrap();
        assert_eq!(admission, Admission::Started);
        assert_eq!(second.await.unwrap().body, Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_remove_aborts_task_for_joined_callers() {
        let registry = InFlightRegistry::new();
        let key = RequestKey::from("k");
        let gate = Arc::new(Notify::new());

        let (call, _) = registry
            .get_or_insert(&key, || gated(gate.clone(), "never"))
            .unwrap();
        let joined = call.clone();

        assert!(registry.remove(&key));
        assert!(!registry.contains(&key));
        assert!(call.await.unwrap_err().is_cancelled());
        assert!(joined.await.unwrap_err().is_cancelled());
        assert!(!registry.remove(&key));
    }

    #[tokio::test]
    async fn test_stale_entry_is_swept() {
        let registry = InFlightRegistry::new();
        let key = RequestKey::from("k");

        let (call, _) = registry
            .get_or_insert(&key, || async { panic!("transport blew up") }.boxed())
            .unwrap();
        let err = call.await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Unknown);

        // The task died before it could remove its own entry.
        assert!(registry.contains(&key));
        assert_eq!(registry.remove_cancelled(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_stale_entry_is_replaced_on_lookup() {
        let registry = InFlightRegistry::new();
        let key = RequestKey::from("k");

        let (call, _) = registry
            .get_or_insert(&key, || async { panic!("boom") }.boxed())
            .unwrap();
        let _ = call.await;

        let (fresh, admission) = registry
            .get_or_insert(&key, || async { Ok(ok("fresh")) }.boxed())
            .unwrap();
        assert_eq!(admission, Admission::Started);
        assert_eq!(fresh.await.unwrap().body, Bytes::from_static(b"fresh"));
    }

    struct ActiveGuard(Arc<AtomicUsize>);

    impl Drop for ActiveGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn tracked(
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        gate: Arc<Notify>,
        body: &'static str,
    ) -> BoxFuture<'static, Result<ChainResult>> {
        async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            let _guard = ActiveGuard(active);
            gate.notified().await;
            Ok(ok(body))
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_successor_starts_only_after_removed_call_is_gone() {
        let registry = InFlightRegistry::new();
        let key = RequestKey::from("k");
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let (first, _) = registry
            .get_or_insert(&key, || {
                tracked(active.clone(), peak.clone(), gate.clone(), "first")
            })
            .unwrap();
        while active.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        assert!(registry.remove(&key));
        assert!(first.await.unwrap_err().is_cancelled());
        assert_eq!(active.load(Ordering::SeqCst), 0);

        let (second, admission) = registry
            .get_or_insert(&key, || {
                tracked(active.clone(), peak.clone(), gate.clone(), "second")
            })
            .unwrap();
        assert_eq!(admission, Admission::Started);
        while active.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        gate.notify_one();
        assert_eq!(second.await.unwrap().body, Bytes::from_static(b"second"));
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_outside_runtime_fails_without_poisoning() {
        let registry = InFlightRegistry::new();
        let key = RequestKey::from("k");

        let err = registry
            .get_or_insert(&key, || async { Ok(ok("never")) }.boxed())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Unknown);
        assert!(registry.is_empty());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let body = runtime.block_on(async {
            let (call, admission) = registry
                .get_or_insert(&key, || async { Ok(ok("after")) }.boxed())
                .unwrap();
            assert_eq!(admission, Admission::Started);
            call.await.unwrap().body
        });
        assert_eq!(body, Bytes::from_static(b"after"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_maintenance_sweeps_periodically() {
        let registry = InFlightRegistry::new();
        let key = RequestKey::from("k");
        let (call, _) = registry
            .get_or_insert(&key, || async { panic!("boom") }.boxed())
            .unwrap();
        let _ = call.await;

        let sweeper = registry.spawn_maintenance(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(registry.is_empty());
        sweeper.abort();
    }
}
