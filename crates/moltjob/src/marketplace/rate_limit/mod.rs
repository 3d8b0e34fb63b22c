//! Fixed-window request budgets per identity.
//!
//! A request after the window's `reset_at` opens a fresh window with a count
//! of one; requests inside a window are counted until the limit, after which
//! they are denied with `remaining = 0` and the same `reset_at`.

mod store;

pub use store::{InMemoryRateStore, RateDecision, RateLimitStore, RateWindow};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::clock::Clock;

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn check(&self, identity: &str, limit: u32, window: Duration) -> RateDecision {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let decision = self.store.hit(identity, limit, window, self.clock.now());
        if !decision.allowed {
            warn!(identity, limit, reset_at = %decision.reset_at, "rate limit exceeded");
        }
        decision
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub fn sweep(&self) -> usize {
        let evicted = self.store.evict_expired(self.clock.now());
        if evicted > 0 {
            debug!(evicted, remaining = self.store.len(), "swept expired rate windows");
        }
        evicted
    }
}

/// Periodically evict expired windows so idle identities do not accumulate.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(10)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            limiter.sweep();
        }
    })
}
