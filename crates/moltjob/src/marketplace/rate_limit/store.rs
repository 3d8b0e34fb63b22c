use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;

/// Counter for one identity inside its current fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateWindow {
    pub fn open(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// The window stays current up to and including `reset_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_at
    }

    pub fn admit(&mut self, limit: u32) -> RateDecision {
        if self.count >= limit {
            return RateDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at: self.reset_at,
            };
        }
        self.count += 1;
        RateDecision {
            allowed: true,
            limit,
            remaining: limit - self.count,
            reset_at: self.reset_at,
        }
    }
}

/// Outcome of one counted request. Returned whether or not it was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateDecision {
    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0);
        (millis + 999) / 1000
    }
}

/// Backing store for rate windows. `hit` must count-and-compare atomically
/// per key.
pub trait RateLimitStore: Send + Sync {
    fn hit(&self, key: &str, limit: u32, window: Duration, now: DateTime<Utc>) -> RateDecision;
    /// Drop windows whose reset time has passed; returns how many went.
    fn evict_expired(&self, now: DateTime<Utc>) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store with a hard cap on tracked identities.
///
/// At capacity, expired windows go first. If that is not enough, the live
/// window closest to its reset is dropped, which restarts that identity's
/// count; every such eviction is logged at `warn` and counted.
pub struct InMemoryRateStore {
    windows: Mutex<HashMap<String, RateWindow>>,
    max_entries: usize,
    live_evictions: AtomicU64,
}

impl InMemoryRateStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            live_evictions: AtomicU64::new(0),
        }
    }

    /// Live windows dropped to stay under capacity since creation.
    pub fn live_evictions(&self) -> u64 {
        self.live_evictions.load(Ordering::Relaxed)
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, RateWindow>> {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn make_room(
        &self,
        windows: &mut HashMap<String, RateWindow>,
        limit: u32,
        now: DateTime<Utc>,
    ) {
        windows.retain(|_, window| !window.is_expired(now));
        while windows.len() >= self.max_entries {
            let earliest = windows
                .iter()
                .min_by_key(|(_, window)| window.reset_at)
                .map(|(key, window)| (key.clone(), *window));
            let Some((key, window)) = earliest else {
                break;
            };
            windows.remove(&key);
            self.live_evictions.fetch_add(1, Ordering::Relaxed);
            warn!(
                %key,
                count = window.count,
                throttled = window.count >= limit,
                reset_at = %window.reset_at,
                capacity = self.max_entries,
                "rate store full; evicting a live window resets its count"
            );
        }
    }
}

impl Default for InMemoryRateStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl RateLimitStore for InMemoryRateStore {
    fn hit(&self, key: &str, limit: u32, window: Duration, now: DateTime<Utc>) -> RateDecision {
        let mut windows = self.windows();
        if !windows.contains_key(key) && windows.len() >= self.max_entries {
            self.make_room(&mut windows, limit, now);
        }

        let entry = windows
            .entry(key.to_string())
            .and_modify(|current| {
                if current.is_expired(now) {
                    *current = RateWindow::open(now, window);
                }
            })
            .or_insert_with(|| RateWindow::open(now, window));
        entry.admit(limit)
    }

    fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut windows = self.windows();
        let before = windows.len();
        windows.retain(|_, window| !window.is_expired(now));
        before - windows.len()
    }

    fn len(&self) -> usize {
        self.windows().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn capacity_evicts_the_earliest_window() {
        let store = InMemoryRateStore::new(2);
        let window = Duration::seconds(60);
        store.hit("a", 5, window, start());
        store.hit("b", 5, window, start() + Duration::seconds(1));
        store.hit("c", 5, window, start() + Duration::seconds(2));

        assert_eq!(store.len(), 2);
        let decision = store.hit("a", 5, window, start() + Duration::seconds(3));
        assert_eq!(decision.remaining, 4, "a started over after eviction");
        assert_eq!(store.live_evictions(), 2);
    }

    #[test]
    fn expired_windows_make_room_before_live_ones() {
        let store = InMemoryRateStore::new(2);
        let window = Duration::seconds(10);
        store.hit("a", 1, window, start());
        store.hit("b", 1, window, start() + Duration::seconds(5));

        store.hit("c", 1, window, start() + Duration::seconds(11));
        assert_eq!(store.live_evictions(), 0);
        let decision = store.hit("b", 1, window, start() + Duration::seconds(12));
        assert!(!decision.allowed, "b keeps its throttled window");
    }

    #[test]
    fn expired_windows_are_swept() {
        let store = InMemoryRateStore::default();
        let window = Duration::seconds(10);
        store.hit("a", 5, window, start());
        store.hit("b", 5, window, start() + Duration::seconds(8));

        assert_eq!(store.evict_expired(start() + Duration::seconds(11)), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn retry_after_rounds_up() {
        let decision = RateDecision {
            allowed: false,
            limit: 1,
            remaining: 0,
            reset_at: start() + Duration::milliseconds(1500),
        };
        assert_eq!(decision.retry_after_secs(start()), 2);
        assert_eq!(decision.retry_after_secs(start() + Duration::seconds(5)), 0);
    }
}
