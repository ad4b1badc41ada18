//! # In-flight Coalescing
//!
//! At most one discovery per key runs at a time. A caller that arrives while a
//! discovery for the same key is running waits for it and receives a clone of
//! its result instead of issuing its own admin API requests.
//!
//! The computation removes its own entry when it completes, so a later call
//! starts a fresh discovery. A leading caller dropped mid-run removes the
//! entry only when no follower still waits on it; otherwise the followers keep
//! driving the run and new callers join it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

type SharedResult<T> = Shared<BoxFuture<'static, T>>;

/// Coalesces concurrent computations that share a key
pub struct InFlight<T: Clone + Send + Sync + 'static> {
    in_flight: Arc<DashMap<String, (u64, SharedResult<T>)>>,
    next_id: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> Default for InFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The leader's handle on its computation; releases the key if abandoned
struct LeaderGuard<T: Clone + Send + Sync + 'static> {
    in_flight: Arc<DashMap<String, (u64, SharedResult<T>)>>,
    key: String,
    id: u64,
    shared: SharedResult<T>,
}

impl<T: Clone + Send + Sync + 'static> Drop for LeaderGuard<T> {
    fn drop(&mut self) {
        // One handle in the map, one here; more means a follower is waiting.
        let followers_waiting = self.shared.strong_count().map_or(false, |count| count > 2);
        if !followers_waiting {
            self.in_flight.remove_if(&self.key, |_, (id, _)| *id == self.id);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> InFlight<T> {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of keys with a computation currently running
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Run `make()` for `key`, or join the computation already running for it
    ///
    /// ```
    /// use emqx_topology::topology::InFlight;
    ///
    /// # tokio_test::block_on(async {
    /// let inflight: InFlight<u32> = InFlight::new();
    /// assert_eq!(inflight.run("default/emqx", || async { 7 }).await, 7);
    /// assert!(inflight.is_empty());
    /// # });
    /// ```
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let claimed = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => Err(entry.get().1.clone()),
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let in_flight = Arc::clone(&self.in_flight);
                let owned_key = key.to_string();
                let work = make();
                let shared = async move {
                    let result = work.await;
                    in_flight.remove_if(&owned_key, |_, (entry_id, _)| *entry_id == id);
                    result
                }
                .boxed()
                .shared();
                entry.insert((id, shared.clone()));
                Ok(LeaderGuard {
                    in_flight: Arc::clone(&self.in_flight),
                    key: key.to_string(),
                    id,
                    shared,
                })
            }
        };

        match claimed {
            Ok(mut guard) => (&mut guard.shared).await,
            Err(shared) => {
                debug!(key = %key, "Joining in-flight discovery");
                shared.await
            }
        }
    }
}
