//! Single-flight memoizing cache for async lookups.
//!
//! A key is either resolved or has exactly one fetch in flight. Callers that
//! arrive while a fetch is in flight join it through a [`Shared`] future
//! instead of starting another one. Resolved keys are served without
//! suspending: [`FetchCache::get_or_fetch`] hands back a [`Lookup`] that is
//! already complete.
//!
//! Failed fetches are not cached, and a fetch that panics counts as failed.
//! There is no automatic eviction.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared};
use opentelemetry::KeyValue;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::telemetry::metrics;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V>>>;

/// `InFlight` until the fetch settles, then `Ready` on success. The
/// generation ties a settling fetch to the slot it was started for.
enum Slot<V> {
    InFlight { generation: u64, fetch: SharedFetch<V> },
    Ready(V),
}

struct Inner<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    next_generation: AtomicU64,
}

impl<K: Eq + Hash, V> Inner<K, V> {
    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Promote or clear the slot for `key`, but only if it still belongs to
    /// this fetch.
    fn settle(&self, key: &K, generation: u64, result: &Result<V>)
    where
        K: Clone,
        V: Clone,
    {
        let mut slots = self.slots();
        let owned = matches!(
            slots.get(key),
            Some(Slot::InFlight { generation: g, .. }) if *g == generation
        );
        if !owned {
            return;
        }
        match result {
            Ok(value) => {
                slots.insert(key.clone(), Slot::Ready(value.clone()));
            }
            Err(_) => {
                slots.remove(key);
            }
        }
    }
}

/// Memoizing cache. Cheap to clone; clones share storage.
pub struct FetchCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for FetchCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for FetchCache<K, V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }
}

impl<K, V> FetchCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, running `fetch` only if nothing is cached or in flight.
    ///
    /// The returned [`Lookup`] is already complete when the key was resolved.
    /// Otherwise it is pending on the single in-flight fetch for `key`, which
    /// every concurrent caller shares. The fetch is driven by whichever
    /// caller polls it; dropping every [`Lookup`] leaves it parked in the
    /// slot for the next caller to drive.
    ///
    /// `fetch` is called with the cache locked and must not use this cache
    /// itself. The future it returns may.
    pub fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Lookup<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let mut slots = self.inner.slots();
        match slots.entry(key) {
            Entry::Occupied(occupied) => match occupied.get() {
                Slot::Ready(value) => {
                    debug!(key = ?occupied.key(), "cache hit");
                    record_lookup("hit");
                    Lookup::ready(value.clone())
                }
                Slot::InFlight { fetch, .. } => {
                    debug!(key = ?occupied.key(), "joining in-flight fetch");
                    record_lookup("joined");
                    Lookup::pending(fetch.clone())
                }
            },
            Entry::Vacant(vacant) => {
                debug!(key = ?vacant.key(), "cache miss, fetching");
                record_lookup("miss");
                let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                let shared = Self::make_shared(
                    Arc::downgrade(&self.inner),
                    vacant.key().clone(),
                    generation,
                    fetch(),
                );
                vacant.insert(Slot::InFlight {
                    generation,
                    fetch: shared.clone(),
                });
                Lookup::pending(shared)
            }
        }
    }

    fn make_shared<Fut>(
        inner: Weak<Inner<K, V>>,
        key: K,
        generation: u64,
        fetch: Fut,
    ) -> SharedFetch<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        async move {
            // Panics settle the slot like any other failure.
            let result = match AssertUnwindSafe(fetch).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    warn!(?key, "fetch panicked");
                    Err(Error::failed(format!("fetch for {key:?} panicked")))
                }
            };
            let label = if result.is_ok() { "ok" } else { "error" };
            metrics::cache_fetches().add(1, &[KeyValue::new("result", label)]);
            if let Err(ref e) = result {
                debug!(?key, error = %e, "fetch failed, slot cleared");
            }
            if let Some(inner) = inner.upgrade() {
                inner.settle(&key, generation, &result);
            }
            result
        }
        .boxed()
        .shared()
    }

    /// The resolved value for `key`, if any. Never waits on in-flight fetches.
    pub fn get(&self, key: &K) -> Option<V> {
        match self.inner.slots().get(key) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// True if `key` has a fetch in flight.
    pub fn is_fetching(&self, key: &K) -> bool {
        matches!(self.inner.slots().get(key), Some(Slot::InFlight { .. }))
    }

    /// Drop whatever is stored for `key`. An in-flight fetch still completes
    /// for the callers already waiting on it, but its value is not stored.
    pub fn invalidate(&self, key: &K) -> bool {
        self.inner.slots().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.inner.slots().clear();
    }

    /// Number of keys that are resolved or in flight.
    pub fn len(&self) -> usize {
        self.inner.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn record_lookup(outcome: &'static str) {
    metrics::cache_lookups().add(1, &[KeyValue::new("outcome", outcome)]);
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Result of [`FetchCache::get_or_fetch`]: either already resolved or
/// waiting on the shared fetch.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Lookup<V> {
    state: LookupState<V>,
}

enum LookupState<V> {
    Ready(std::future::Ready<Result<V>>),
    Pending(SharedFetch<V>),
}

impl<V> Lookup<V> {
    fn ready(value: V) -> Self {
        Self {
            state: LookupState::Ready(std::future::ready(Ok(value))),
        }
    }

    fn pending(fetch: SharedFetch<V>) -> Self {
        Self {
            state: LookupState::Pending(fetch),
        }
    }

    /// True when the value was served from the cache and awaiting will not
    /// suspend.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, LookupState::Ready(_))
    }
}

impl<V: Clone> Future for Lookup<V> {
    type Output = Result<V>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            LookupState::Ready(ready) => Pin::new(ready).poll(cx),
            LookupState::Pending(shared) => Pin::new(shared).poll(cx),
        }
    }
}

impl<V> Debug for Lookup<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.is_ready() { "ready" } else { "pending" };
        f.debug_struct("Lookup").field("state", &state).finish()
    }
}
