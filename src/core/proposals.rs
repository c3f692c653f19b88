use crate::models::{Proposal, ProposalKind};
use crate::services::store::{StateStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const INDEX_KEY: &str = "mm:proposal:index";

/// Extra store TTL past the logical deadline, so an overdue record is still
/// readable when the sweep needs its party list. Reads treat overdue records
/// as absent regardless.
const RECORD_GRACE: Duration = Duration::from_secs(60);

fn record_key(id: &str) -> String {
    format!("mm:proposal:{}", id)
}

fn user_key(user_id: &str) -> String {
    format!("mm:proposal:user:{}", user_id)
}

/// Store and state machine for two-party proposals
///
/// A proposal is pending from creation until both parties accept (matched),
/// either declines (declined), or its deadline passes (expired). The store
/// holds the record under its id, a pointer per participant for
/// `find_by_user`, and an index sorted by deadline that the heartbeat sweeps.
///
/// Expiry is cooperative: every read treats an overdue record as absent and
/// cleans it up, whether or not a sweep has run yet.
pub struct ProposalStore {
    store: Arc<dyn StateStore>,
}

impl ProposalStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Create a pending proposal between two users
    pub async fn create(
        &self,
        user_a: &str,
        user_b: &str,
        ttl: Duration,
        kind: Option<ProposalKind>,
    ) -> Result<Proposal, StoreError> {
        let now = chrono::Utc::now().timestamp_millis();
        let proposal = Proposal {
            id: Uuid::new_v4().to_string(),
            user_a: user_a.to_string(),
            user_b: user_b.to_string(),
            created_at: now,
            expires_at: now + ttl.as_millis() as i64,
            accepted_a: false,
            accepted_b: false,
            cancelled: false,
            kind,
        };

        self.persist(&proposal, ttl).await?;
        self.store
            .zset_add(INDEX_KEY, &proposal.id, proposal.expires_at as f64)
            .await?;

        Ok(proposal)
    }

    /// Fetch a proposal by id, treating overdue or cancelled records as absent
    pub async fn get(&self, id: &str) -> Result<Option<Proposal>, StoreError> {
        let Some(json) = self.store.kv_get(&record_key(id)).await? else {
            return Ok(None);
        };
        let Ok(proposal) = serde_json::from_str::<Proposal>(&json) else {
            tracing::warn!("Dropping unparseable proposal record {}", id);
            self.store.kv_del(&record_key(id)).await?;
            return Ok(None);
        };

        let now = chrono::Utc::now().timestamp_millis();
        if proposal.cancelled || proposal.is_expired(now) {
            self.remove(&proposal).await?;
            return Ok(None);
        }

        Ok(Some(proposal))
    }

    /// Fetch the active proposal a user is party to, if any
    pub async fn find_by_user(&self, user_id: &str) -> Result<Option<Proposal>, StoreError> {
        let Some(id) = self.store.kv_get(&user_key(user_id)).await? else {
            return Ok(None);
        };
        match self.get(&id).await? {
            // Guard against a stale pointer left by an interleaved create
            Some(proposal) if proposal.involves(user_id) => Ok(Some(proposal)),
            _ => {
                self.store.kv_del(&user_key(user_id)).await?;
                Ok(None)
            }
        }
    }

    /// Record a party's acceptance and return the updated proposal
    ///
    /// The caller owns terminal handling: when the returned record has both
    /// flags set it must run the match side effects exactly once and then
    /// `remove` the proposal.
    pub async fn accept(&self, id: &str, user_id: &str) -> Result<Option<Proposal>, StoreError> {
        let Some(mut proposal) = self.get(id).await? else {
            return Ok(None);
        };
        if !proposal.involves(user_id) {
            return Ok(None);
        }

        if proposal.user_a == user_id {
            proposal.accepted_a = true;
        } else {
            proposal.accepted_b = true;
        }

        self.persist(&proposal, self.remaining_ttl(&proposal)).await?;
        Ok(Some(proposal))
    }

    /// Decline: mark the record inert and delete it
    pub async fn decline(&self, proposal: &Proposal) -> Result<(), StoreError> {
        let mut cancelled = proposal.clone();
        cancelled.cancelled = true;
        // Persisting the cancelled flag first keeps a concurrent reader from
        // resurrecting the record between the mark and the delete
        self.persist(&cancelled, Duration::from_secs(5)).await?;
        self.remove(&cancelled).await
    }

    /// Delete a proposal and its pointers
    pub async fn remove(&self, proposal: &Proposal) -> Result<(), StoreError> {
        self.store.kv_del(&record_key(&proposal.id)).await?;
        self.store.kv_del(&user_key(&proposal.user_a)).await?;
        self.store.kv_del(&user_key(&proposal.user_b)).await?;
        self.store.zset_remove(INDEX_KEY, &proposal.id).await?;
        Ok(())
    }

    /// Collect and delete proposals past their deadline with no resolution
    ///
    /// Returns the expired records so the caller can re-enqueue both
    /// parties. Index entries whose record already aged out via TTL are
    /// dropped silently.
    pub async fn sweep_expired(&self, scan_limit: usize) -> Result<Vec<Proposal>, StoreError> {
        let now = chrono::Utc::now().timestamp_millis();
        let indexed = self.store.zset_range(INDEX_KEY, scan_limit).await?;

        let mut expired = Vec::new();
        for (id, deadline) in indexed {
            if deadline as i64 > now {
                // Index is deadline-ordered; everything after this is live
                break;
            }

            match self.store.kv_get(&record_key(&id)).await? {
                Some(json) => {
                    if let Ok(proposal) = serde_json::from_str::<Proposal>(&json) {
                        self.remove(&proposal).await?;
                        if !proposal.cancelled && !proposal.is_complete() {
                            expired.push(proposal);
                        }
                    } else {
                        self.store.kv_del(&record_key(&id)).await?;
                        self.store.zset_remove(INDEX_KEY, &id).await?;
                    }
                }
                None => {
                    self.store.zset_remove(INDEX_KEY, &id).await?;
                }
            }
        }

        Ok(expired)
    }

    /// Number of proposals currently indexed (active gauge)
    pub async fn active_count(&self) -> Result<u64, StoreError> {
        self.store.zset_len(INDEX_KEY).await
    }

    async fn persist(&self, proposal: &Proposal, ttl: Duration) -> Result<(), StoreError> {
        let json = serde_json::to_string(proposal)?;
        let store_ttl = ttl + RECORD_GRACE;
        self.store
            .kv_set_ex(&record_key(&proposal.id), &json, store_ttl)
            .await?;
        self.store
            .kv_set_ex(&user_key(&proposal.user_a), &proposal.id, store_ttl)
            .await?;
        self.store
            .kv_set_ex(&user_key(&proposal.user_b), &proposal.id, store_ttl)
            .await?;
        Ok(())
    }

    fn remaining_ttl(&self, proposal: &Proposal) -> Duration {
        let now = chrono::Utc::now().timestamp_millis();
        let remaining_ms = (proposal.expires_at - now).max(1_000);
        Duration::from_millis(remaining_ms as u64)
    }
}
