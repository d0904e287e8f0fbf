use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{Decision, DecisionKey};

struct CacheEntry {
    decision: Decision,
    inserted_at: Instant,
}

/// Short-TTL memoization of decisions, keyed by
/// (symbol, action, strategy, position state).
///
/// Collapses bursts of duplicate candidate evaluations: within the TTL a
/// second `evaluate` call returns the stored decision unchanged. Expired
/// entries are swept opportunistically on writes, so no background task is
/// needed.
pub struct DecisionCache {
    entries: Mutex<HashMap<DecisionKey, CacheEntry>>,
    ttl: Duration,
}

impl DecisionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached decision when it is younger than the TTL.
    pub fn get(&self, key: &DecisionKey) -> Option<Decision> {
        let guard = self.entries.lock().ok()?;
        let entry = guard.get(key)?;
        if entry.inserted_at.elapsed() < self.ttl {
            Some(entry.decision.clone())
        } else {
            None
        }
    }

    /// Store a decision and sweep any entries past the TTL.
    pub fn put(&self, key: DecisionKey, decision: Decision) {
        let Ok(mut guard) = self.entries.lock() else {
            return;
        };
        let ttl = self.ttl;
        guard.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        guard.insert(
            key,
            CacheEntry {
                decision,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every expired entry. `put` already does this lazily; this is for
    /// callers that want an explicit purge.
    pub fn purge_expired(&self) {
        let Ok(mut guard) = self.entries.lock() else {
            return;
        };
        let ttl = self.ttl;
        guard.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
