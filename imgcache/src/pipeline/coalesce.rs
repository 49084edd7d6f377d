//! Fetch deduplication for concurrent requests.
//!
//! When several requests miss both cache tiers for the same key, only one
//! fetch runs. Every other request attaches to it as a waiter and receives a
//! clone of the same result, success or failure.
//!
//! ```text
//! Request A ─┐
//!            │                                  spawned
//! Request B ─┼──► FetchCoordinator ──────────►  fetch task
//!            │        │                            │
//! Request C ─┘        │                            │
//!                     ▼                            ▼
//!               [A, B, C receive  ◄──────────  [one result]
//!                the same result]
//! ```
//!
//! # Atomicity
//!
//! Check-or-create and waiter registration happen under the `DashMap` shard
//! lock for the key (entry API). Completion removes the entry under the same
//! lock before draining the waiter list, so a registration either lands in
//! the list that is drained or sees no entry and starts a fresh fetch.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::ImageError;
use crate::key::CacheKey;

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoalescerStats {
    /// Total requests received
    pub total_requests: u64,
    /// Requests that attached to an existing fetch
    pub coalesced_requests: u64,
    /// Requests that started a new fetch
    pub new_requests: u64,
    /// Fetches currently running
    pub in_flight: usize,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

struct Waiter<T> {
    id: u64,
    tx: oneshot::Sender<Result<T, ImageError>>,
}

/// A running fetch and the requests waiting on it, in registration order.
struct InFlightFetch<T> {
    waiters: Mutex<Vec<Waiter<T>>>,
}

/// Per-key registry of in-flight fetches.
pub struct FetchCoordinator<T> {
    in_flight: DashMap<CacheKey, Arc<InFlightFetch<T>>>,
    next_waiter_id: AtomicU64,
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_requests: AtomicU64,
}

impl<T> Default for FetchCoordinator<T> {
    fn default() -> Self {
        Self {
            in_flight: DashMap::new(),
            next_waiter_id: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            new_requests: AtomicU64::new(0),
        }
    }
}

impl<T> FetchCoordinator<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the in-flight fetch for `key`, or start one.
    ///
    /// `fetch` is only invoked when no fetch for `key` is running; its future
    /// is spawned as an independent task so it completes even if every
    /// waiter goes away. Must be called from within a Tokio runtime.
    pub fn acquire_or_join<F, Fut>(self: &Arc<Self>, key: CacheKey, fetch: F) -> FetchHandle<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ImageError>> + Send + 'static,
    {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let waiter = Waiter { id, tx };

        let is_new = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let mut waiters = entry.get().waiters.lock();
                waiters.push(waiter);
                self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
                debug!(
                    key = %key,
                    waiters = waiters.len(),
                    "Joining in-flight fetch"
                );
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(InFlightFetch {
                    waiters: Mutex::new(vec![waiter]),
                }));
                self.new_requests.fetch_add(1, Ordering::Relaxed);
                true
            }
        };

        if is_new {
            debug!(
                key = %key,
                in_flight = self.in_flight.len(),
                "Starting new fetch"
            );
            self.spawn_fetch(key.clone(), fetch());
        }

        FetchHandle {
            coordinator: Arc::clone(self),
            key,
            id,
            rx,
            is_new,
            done: false,
        }
    }

    fn spawn_fetch<Fut>(self: &Arc<Self>, key: CacheKey, fut: Fut)
    where
        Fut: Future<Output = Result<T, ImageError>> + Send + 'static,
    {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            // Inner task so a panicking fetch still completes its waiters
            let result = match tokio::spawn(fut).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(key = %key, error = %e, "Fetch task aborted");
                    Err(ImageError::Internal(format!("fetch task failed: {}", e)))
                }
            };
            coordinator.complete(&key, result);
        });
    }

    /// Remove the entry for `key` and deliver `result` to its waiters.
    fn complete(&self, key: &CacheKey, result: Result<T, ImageError>) {
        let Some((_, flight)) = self.in_flight.remove(key) else {
            return;
        };

        let waiters = std::mem::take(&mut *flight.waiters.lock());
        let count = waiters.len();

        for waiter in waiters {
            // Receiver may already be gone
            let _ = waiter.tx.send(result.clone());
        }

        match &result {
            Ok(_) => debug!(key = %key, waiters = count, "Fetch complete"),
            Err(e) => debug!(
                key = %key,
                waiters = count,
                error = %e,
                "Fetch failed"
            ),
        }
    }

    /// Detach waiter `id` from the fetch for `key`, if still running.
    fn detach(&self, key: &CacheKey, id: u64) {
        if let Some(flight) = self.in_flight.get(key) {
            let mut waiters = flight.waiters.lock();
            let before = waiters.len();
            waiters.retain(|w| w.id != id);
            if waiters.len() < before {
                debug!(
                    key = %key,
                    remaining = waiters.len(),
                    "Waiter detached from in-flight fetch"
                );
            }
        }
    }

    /// Number of fetches currently running.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether a fetch for `key` is running.
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Number of requests attached to the fetch for `key`.
    pub fn waiter_count(&self, key: &CacheKey) -> usize {
        self.in_flight
            .get(key)
            .map(|flight| flight.waiters.lock().len())
            .unwrap_or(0)
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            new_requests: self.new_requests.load(Ordering::Relaxed),
            in_flight: self.in_flight.len(),
        }
    }
}

/// One request's attachment to a fetch.
///
/// Resolves to the fetch result. Dropping the handle (or calling
/// [`cancel`](Self::cancel)) detaches this request only; the fetch keeps
/// running for the remaining waiters and to warm the caches.
pub struct FetchHandle<T>
where
    T: Clone + Send + 'static,
{
    coordinator: Arc<FetchCoordinator<T>>,
    key: CacheKey,
    id: u64,
    rx: oneshot::Receiver<Result<T, ImageError>>,
    is_new: bool,
    done: bool,
}

impl<T> FetchHandle<T>
where
    T: Clone + Send + 'static,
{
    /// Whether this request started the fetch.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Stop waiting for the result.
    pub fn cancel(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if !self.done {
            self.done = true;
            self.coordinator.detach(&self.key, self.id);
        }
    }
}

impl<T> Future for FetchHandle<T>
where
    T: Clone + Send + 'static,
{
    type Output = Result<T, ImageError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(result) => {
                this.done = true;
                Poll::Ready(result.unwrap_or_else(|_| {
                    Err(ImageError::Internal(
                        "fetch ended without delivering a result".to_string(),
                    ))
                }))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for FetchHandle<T>
where
    T: Clone + Send + 'static,
{
    fn drop(&mut self) {
        self.detach();
    }
}
