//! Process-wide kernel cache.
//!
//! Compiled kernels are keyed by `(operation, shape signature, element
//! type)`. Concurrent requests for the same key block on a single build;
//! build failures are cached negatively so a broken instantiation is not
//! retried until it is explicitly invalidated.

use crate::error::CompileError;
use crate::kernel::{CompiledKernel, KernelKey};
use log::debug;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

type BuildResult = Result<Arc<CompiledKernel>, Arc<CompileError>>;

struct Slot {
    cell: Arc<OnceLock<BuildResult>>,
    last_used: Instant,
}

/// Counters for cache behavior, readable at any time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub builds: u64,
    pub evictions: u64,
}

pub struct KernelCache {
    slots: Mutex<FxHashMap<KernelKey, Slot>>,
    stats: Mutex<CacheStats>,
    capacity: usize,
}

impl KernelCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(FxHashMap::default()),
            stats: Mutex::new(CacheStats::default()),
            capacity: capacity.max(1),
        }
    }

    /// Return the cached kernel for `key`, building it with `build` on a
    /// miss. At most one caller runs `build` per key; the rest block on
    /// the same slot and share the outcome, success or failure.
    pub fn get_or_compile<F>(&self, key: &KernelKey, build: F) -> BuildResult
    where
        F: FnOnce() -> Result<CompiledKernel, CompileError>,
    {
        let (cell, fresh) = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            match slots.get_mut(key) {
                Some(slot) => {
                    slot.last_used = Instant::now();
                    (Arc::clone(&slot.cell), false)
                }
                None => {
                    if slots.len() >= self.capacity {
                        self.evict_lru(&mut slots);
                    }
                    let cell = Arc::new(OnceLock::new());
                    slots.insert(
                        key.clone(),
                        Slot {
                            cell: Arc::clone(&cell),
                            last_used: Instant::now(),
                        },
                    );
                    (cell, true)
                }
            }
        };

        {
            let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            if fresh {
                stats.misses += 1;
            } else {
                stats.hits += 1;
            }
        }

        let result = cell
            .get_or_init(|| {
                {
                    let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
                    stats.builds += 1;
                }
                debug!("building kernel for {key:?}");
                build().map(Arc::new).map_err(Arc::new)
            })
            .clone();

        if let Err(e) = &result {
            debug!("cached build failure for {key:?}: {e}");
        }
        result
    }

    /// Drop the entry for `key` if its build has completed. An in-flight
    /// build keeps its slot so concurrent waiters still share one build.
    pub fn invalidate(&self, key: &KernelKey) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.get(key) {
            if slot.cell.get().is_some() {
                slots.remove(key);
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Evict the least recently used completed entry whose kernel is not
    /// currently borrowed by an invocation. Failure entries are preferred
    /// eviction victims over live kernels.
    fn evict_lru(&self, slots: &mut FxHashMap<KernelKey, Slot>) {
        let mut victim: Option<(KernelKey, Instant, bool)> = None;
        for (key, slot) in slots.iter() {
            let evictable = match slot.cell.get() {
                Some(Ok(kernel)) => Arc::strong_count(kernel) == 1,
                Some(Err(_)) => true,
                // build in flight
                None => false,
            };
            if !evictable {
                continue;
            }
            let is_failure = matches!(slot.cell.get(), Some(Err(_)));
            let better = match &victim {
                None => true,
                Some((_, when, victim_is_failure)) => {
                    if is_failure != *victim_is_failure {
                        is_failure
                    } else {
                        slot.last_used < *when
                    }
                }
            };
            if better {
                victim = Some((key.clone(), slot.last_used, is_failure));
            }
        }
        if let Some((key, _, _)) = victim {
            debug!("evicting kernel cache entry {key:?}");
            slots.remove(&key);
            let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            stats.evictions += 1;
        }
    }
}
