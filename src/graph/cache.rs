//! Value Cache
//!
//! Process-wide memoization store for computed plug values, keyed by
//! (plug identity, narrowed context hash).
//!
//! # Concurrency
//!
//! The cache serializes access per key: the first caller for a key
//! computes and publishes, concurrent callers for the *same* key block on
//! the in-flight marker and reuse the result, and callers for *different*
//! keys proceed independently. Dirty propagation is an exclusive phase:
//! the invalidation pass holds the cache-wide write gate while every
//! compute holds a (recursive) read gate, so no compute can observe a
//! stale entry concurrently with its invalidation.
//!
//! Compute errors and cancellations unpublish the in-flight marker — a
//! transient failure is never cached.
//!
//! # Eviction
//!
//! Entries carry an approximate byte cost and a last-used tick. When the
//! total cost exceeds the configured capacity, least-recently-used entries
//! are dropped until it fits. In-flight entries are never evicted.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::Result;
use crate::graph::PlugKey;
use crate::graph::value::Value;
use crate::settings::CacheSettings;

/// Cache key: plug identity plus the hash of the context entries the
/// plug's node declared relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub plug: PlugKey,
    pub context_hash: u64,
}

struct ReadyEntry {
    value: Value,
    cost: usize,
    last_used: u64,
}

enum Slot {
    /// A compute for this key is running; waiters block on the condvar.
    InFlight,
    Ready(ReadyEntry),
}

#[derive(Default)]
struct CacheState {
    slots: FxHashMap<CacheKey, Slot>,
    /// Context hashes cached per plug, for O(entries-of-plug) invalidation.
    by_plug: FxHashMap<PlugKey, SmallVec<[u64; 4]>>,
    total_cost: usize,
    tick: u64,
}

/// Hash-keyed memoization store with per-key compute serialization.
pub struct ValueCache {
    gate: RwLock<()>,
    state: Mutex<CacheState>,
    ready: Condvar,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ValueCache {
    #[must_use]
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            gate: RwLock::new(()),
            state: Mutex::new(CacheState::default()),
            ready: Condvar::new(),
            capacity: settings.capacity_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the cached value for `key`, or runs `compute` to produce,
    /// publish and return it. At most one compute runs per key at a time.
    pub fn get_or_compute(
        &self,
        key: CacheKey,
        compute: impl FnOnce() -> Result<Value>,
    ) -> Result<Value> {
        // Recursive read: computes pull upstream computes on the same
        // thread while the invalidation pass waits for the write gate.
        let _gate = self.gate.read_recursive();

        {
            let mut state = self.state.lock();
            loop {
                if matches!(state.slots.get(&key), Some(Slot::Ready(_))) {
                    state.tick += 1;
                    let tick = state.tick;
                    let Some(Slot::Ready(entry)) = state.slots.get_mut(&key) else {
                        continue;
                    };
                    entry.last_used = tick;
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.value.clone());
                }
                if matches!(state.slots.get(&key), Some(Slot::InFlight)) {
                    // Another caller is computing this key; wait for it to
                    // publish or unpublish, then re-examine.
                    self.ready.wait(&mut state);
                    continue;
                }
                state.slots.insert(key, Slot::InFlight);
                self.misses.fetch_add(1, Ordering::Relaxed);
                break;
            }
        }

        let result = compute();

        let mut state = self.state.lock();
        match &result {
            Ok(value) => {
                let cost = value.heap_cost();
                state.tick += 1;
                let tick = state.tick;
                state.slots.insert(
                    key,
                    Slot::Ready(ReadyEntry {
                        value: value.clone(),
                        cost,
                        last_used: tick,
                    }),
                );
                state.total_cost += cost;
                state
                    .by_plug
                    .entry(key.plug)
                    .or_default()
                    .push(key.context_hash);
                if state.total_cost > self.capacity {
                    self.evict_locked(&mut state);
                }
            }
            Err(_) => {
                // Never cache failures; let a later caller retry.
                state.slots.remove(&key);
            }
        }
        drop(state);
        self.ready.notify_all();
        result
    }

    /// Drops every entry belonging to the given plugs.
    ///
    /// Called by the dirty-propagation pass under the write gate, so no
    /// compute is in flight against a stale entry while it is removed.
    pub fn invalidate_plugs<'a>(&self, plugs: impl IntoIterator<Item = &'a PlugKey>) {
        let _gate = self.gate.write();
        let mut state = self.state.lock();
        for plug in plugs {
            let Some(hashes) = state.by_plug.remove(plug) else {
                continue;
            };
            for context_hash in hashes {
                let key = CacheKey {
                    plug: *plug,
                    context_hash,
                };
                if let Some(Slot::Ready(entry)) = state.slots.remove(&key) {
                    state.total_cost -= entry.cost;
                }
            }
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let _gate = self.gate.write();
        let mut state = self.state.lock();
        state.slots.retain(|_, slot| matches!(slot, Slot::InFlight));
        state.by_plug.clear();
        state.total_cost = 0;
    }

    fn evict_locked(&self, state: &mut CacheState) {
        let before = state.total_cost;
        while state.total_cost > self.capacity {
            let oldest = state
                .slots
                .iter()
                .filter_map(|(key, slot)| match slot {
                    Slot::Ready(entry) => Some((*key, entry.last_used)),
                    Slot::InFlight => None,
                })
                .min_by_key(|(_, last_used)| *last_used);
            let Some((key, _)) = oldest else { break };
            if let Some(Slot::Ready(entry)) = state.slots.remove(&key) {
                state.total_cost -= entry.cost;
            }
            if let Some(hashes) = state.by_plug.get_mut(&key.plug) {
                hashes.retain(|h| *h != key.context_hash);
            }
        }
        log::debug!(
            "value cache evicted {} bytes (capacity {})",
            before - state.total_cost,
            self.capacity
        );
    }

    // ── Stats ────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.state.lock().slots.len()
    }

    #[must_use]
    pub fn total_cost(&self) -> usize {
        self.state.lock().total_cost
    }
}
