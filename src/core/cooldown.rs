use crate::services::store::{StateStore, StoreError};
use std::sync::Arc;
use std::time::Duration;

/// Canonical key for an unordered user pair
fn pair_key(user_a: &str, user_b: &str) -> String {
    if user_a <= user_b {
        format!("mm:cooldown:{}:{}", user_a, user_b)
    } else {
        format!("mm:cooldown:{}:{}", user_b, user_a)
    }
}

/// Time-boxed "do not re-pair" records per user pair
///
/// One record at most per unordered pair; expiry is handled entirely by the
/// store's TTL, so there is no clear operation.
pub struct CooldownLedger {
    store: Arc<dyn StateStore>,
}

impl CooldownLedger {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Record a cooldown for the pair, replacing any existing one
    pub async fn set(
        &self,
        user_a: &str,
        user_b: &str,
        duration: Duration,
    ) -> Result<(), StoreError> {
        let until = chrono::Utc::now().timestamp_millis() + duration.as_millis() as i64;
        self.store
            .kv_set_ex(&pair_key(user_a, user_b), &until.to_string(), duration)
            .await
    }

    /// True iff an unexpired cooldown exists for the pair
    pub async fn is_active(&self, user_a: &str, user_b: &str) -> Result<bool, StoreError> {
        self.store.kv_exists(&pair_key(user_a, user_b)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MemoryStore;

    #[tokio::test]
    async fn test_cooldown_is_order_independent() {
        let ledger = CooldownLedger::new(Arc::new(MemoryStore::new()));
        ledger.set("bob", "alice", Duration::from_secs(60)).await.unwrap();

        assert!(ledger.is_active("alice", "bob").await.unwrap());
        assert!(ledger.is_active("bob", "alice").await.unwrap());
        assert!(!ledger.is_active("alice", "carol").await.unwrap());
    }

    #[tokio::test]
    async fn test_cooldown_self_expires() {
        let ledger = CooldownLedger::new(Arc::new(MemoryStore::new()));
        ledger
            .set("alice", "bob", Duration::from_millis(20))
            .await
            .unwrap();
        assert!(ledger.is_active("alice", "bob").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!ledger.is_active("alice", "bob").await.unwrap());
    }
}
