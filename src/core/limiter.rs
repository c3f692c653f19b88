use crate::services::store::{StateStore, StoreError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Counter names reported by the metrics snapshot
pub const COUNTERS: &[&str] = &[
    "searches_started",
    "matches_created",
    "proposals_created",
    "proposals_declined",
    "proposals_expired",
    "heartbeats",
];

fn metric_key(name: &str) -> String {
    format!("mm:metrics:{}", name)
}

fn rate_key(user_id: &str) -> String {
    format!("mm:ratelimit:search:{}", user_id)
}

/// Fixed-window throttle on search initiation
pub struct RateLimiter {
    store: Arc<dyn StateStore>,
    max_per_window: i64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn StateStore>, max_per_window: i64, window: Duration) -> Self {
        Self {
            store,
            max_per_window,
            window,
        }
    }

    /// True if the user is still under the limit for the current window
    ///
    /// A store failure allows the request: throttling is protection, not a
    /// correctness gate.
    pub async fn check(&self, user_id: &str) -> bool {
        match self
            .store
            .counter_incr_window(&rate_key(user_id), self.window)
            .await
        {
            Ok(count) => count <= self.max_per_window,
            Err(e) => {
                tracing::warn!("Rate limit check failed for {}: {}", user_id, e);
                true
            }
        }
    }
}

/// Operational counters shared across instances
///
/// Counters are monotonic and live in the shared store so any instance can
/// report the aggregate. Increment failures are logged and dropped; metrics
/// never interfere with matching.
pub struct Metrics {
    store: Arc<dyn StateStore>,
}

impl Metrics {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn incr(&self, name: &str) {
        if let Err(e) = self.store.counter_incr(&metric_key(name), 1).await {
            tracing::warn!("Failed to increment metric {}: {}", name, e);
        }
    }

    /// All known counters; missing ones read as zero
    pub async fn snapshot(&self) -> Result<BTreeMap<String, i64>, StoreError> {
        let mut counters = BTreeMap::new();
        for name in COUNTERS {
            let value = self.store.counter_get(&metric_key(name)).await?;
            counters.insert(name.to_string(), value);
        }
        Ok(counters)
    }
}
