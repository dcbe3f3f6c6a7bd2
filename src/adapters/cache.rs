//! Memoizing response cache with at-most-one in-flight fetch per key.
//!
//! Each URL owns a slot guarded by an async mutex. The first caller fetches
//! while holding the slot; callers that queued behind it receive the outcome
//! of that flight, success or failure, instead of fetching again. Failures
//! are not stored past the flight, so the next caller retries.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, TierwatchError};

/// Default maximum number of cached URLs before stale entries are purged
const MAX_CACHE_SIZE: usize = 4096;

/// Performs the actual upstream request for a URL
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value>;
}

/// Keyed payload cache the tracker fetches through
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Arc<Value>>;
}

#[derive(Debug, Clone)]
struct CachedPayload {
    value: Arc<Value>,
    fetched_at: Instant,
}

#[derive(Debug, Default)]
struct SlotState {
    payload: Option<CachedPayload>,
    /// Error of the most recent flight; cleared by the next success.
    failure: Option<Arc<TierwatchError>>,
}

#[derive(Debug, Default)]
struct Slot {
    /// Completed flights, bumped under the state lock.
    flights: AtomicU64,
    state: Mutex<SlotState>,
}

/// A slot only the map references has no caller queued on it.
fn is_idle(slot: &Arc<Slot>) -> bool {
    Arc::strong_count(slot) == 1
}

pub struct SingleFlightCache<F> {
    fetcher: F,
    slots: DashMap<String, Arc<Slot>>,
    ttl: Duration,
    max_size: usize,
}

impl<F: JsonFetcher> SingleFlightCache<F> {
    pub fn new(fetcher: F, ttl: Duration) -> Self {
        Self::with_max_size(fetcher, ttl, MAX_CACHE_SIZE)
    }

    /// Create a cache with custom maximum size
    pub fn with_max_size(fetcher: F, ttl: Duration, max_size: usize) -> Self {
        Self {
            fetcher,
            slots: DashMap::new(),
            ttl,
            max_size: max_size.max(1),
        }
    }

    fn is_fresh(&self, payload: &CachedPayload) -> bool {
        payload.fetched_at.elapsed() < self.ttl
    }

    /// Drop idle entries without a fresh payload. Slots a caller holds are kept.
    pub fn cleanup_stale(&self) {
        let before = self.slots.len();
        self.slots.retain(|_, slot| {
            if !is_idle(slot) {
                return true;
            }
            match slot.state.try_lock() {
                Ok(state) => state.payload.as_ref().is_some_and(|p| self.is_fresh(p)),
                Err(_) => true,
            }
        });
        let removed = before.saturating_sub(self.slots.len());
        if removed > 0 {
            debug!("Response cache purged {} stale entries", removed);
        }
    }

    /// Evict the oldest idle payloads until there is room for one more key.
    fn evict_oldest(&self) {
        let excess = (self.slots.len() + 1).saturating_sub(self.max_size);
        if excess == 0 {
            return;
        }

        let mut idle: Vec<(String, Instant)> = self
            .slots
            .iter()
            .filter(|entry| is_idle(entry.value()))
            .filter_map(|entry| {
                let state = entry.value().state.try_lock().ok()?;
                let fetched_at = state.payload.as_ref()?.fetched_at;
                Some((entry.key().clone(), fetched_at))
            })
            .collect();
        idle.sort_by_key(|(_, fetched_at)| *fetched_at);

        let mut evicted = 0;
        for (url, _) in idle.into_iter().take(excess) {
            if self.slots.remove_if(&url, |_, slot| is_idle(slot)).is_some() {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!("Response cache evicted {} oldest entries", evicted);
        }
    }

    /// Forget a cached payload so the next fetch goes upstream.
    ///
    /// A slot with callers queued on it stays in place so they keep sharing
    /// one flight; only its stored payload is dropped when it can be.
    pub fn invalidate(&self, url: &str) {
        if self.slots.remove_if(url, |_, slot| is_idle(slot)).is_some() {
            return;
        }
        if let Some(slot) = self.slots.get(url) {
            if let Ok(mut state) = slot.state.try_lock() {
                state.payload = None;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait]
impl<F: JsonFetcher> ResponseCache for SingleFlightCache<F> {
    async fn fetch(&self, url: &str) -> Result<Arc<Value>> {
        if !self.slots.contains_key(url) && self.slots.len() >= self.max_size {
            self.cleanup_stale();
            self.evict_oldest();
        }

        let slot = self.slots.entry(url.to_string()).or_default().clone();
        let queued_at = slot.flights.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        // A flight finished while we waited: take its outcome.
        if slot.flights.load(Ordering::Acquire) != queued_at {
            if let Some(err) = &state.failure {
                debug!("Response cache shared failure: {}", url);
                return Err(TierwatchError::Shared(err.clone()));
            }
            if let Some(payload) = &state.payload {
                debug!("Response cache shared flight: {}", url);
                return Ok(payload.value.clone());
            }
        }

        if let Some(payload) = state.payload.as_ref() {
            if self.is_fresh(payload) {
                debug!("Response cache hit: {}", url);
                return Ok(payload.value.clone());
            }
        }

        debug!("Response cache miss: {}", url);
        let outcome = self.fetcher.fetch_json(url).await;
        slot.flights.fetch_add(1, Ordering::AcqRel);
        match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                state.payload = Some(CachedPayload {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                });
                state.failure = None;
                Ok(value)
            }
            Err(e) => {
                let err = Arc::new(e);
                state.failure = Some(err.clone());
                Err(TierwatchError::Shared(err))
            }
        }
    }
}
