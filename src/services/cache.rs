use crate::models::{CachedProfile, Profile};
use crate::services::profiles::ProfileRepository;
use crate::services::store::StateStore;
use std::sync::Arc;
use std::time::Duration;

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a user profile snapshot
    pub fn profile(user_id: &str) -> String {
        format!("mm:profile:{}", user_id)
    }
}

/// Read-through profile cache
///
/// Two tiers in front of the profile repository: L1 in-process (moka) and
/// L2 in the shared store so snapshots are reused across instances. Cache
/// failures are never fatal; a lookup always falls through to the
/// repository.
pub struct ProfileCache {
    repository: Arc<dyn ProfileRepository>,
    store: Arc<dyn StateStore>,
    l1: moka::future::Cache<String, Profile>,
    ttl: Duration,
}

impl ProfileCache {
    pub fn new(
        repository: Arc<dyn ProfileRepository>,
        store: Arc<dyn StateStore>,
        l1_size: u64,
        ttl: Duration,
    ) -> Self {
        let l1 = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(ttl)
            .build();

        Self {
            repository,
            store,
            l1,
            ttl,
        }
    }

    /// Fetch a profile, refreshing any tier that misses
    ///
    /// Returns `None` when the user has no durable profile or the
    /// repository is unreachable; the caller treats both as "skip this
    /// user", never as a hard failure.
    pub async fn get(&self, user_id: &str) -> Option<Profile> {
        if let Some(profile) = self.l1.get(user_id).await {
            tracing::trace!("L1 cache hit: {}", user_id);
            return Some(profile);
        }

        let key = CacheKey::profile(user_id);
        match self.store.kv_get(&key).await {
            Ok(Some(json)) => {
                if let Some(profile) = self.parse_fresh(&json) {
                    tracing::trace!("L2 cache hit: {}", user_id);
                    self.l1.insert(user_id.to_string(), profile.clone()).await;
                    return Some(profile);
                }
            }
            Ok(None) => {}
            Err(e) => {
                // Cache unavailability must not block the lookup
                tracing::warn!("Cache store read failed for {}: {}", user_id, e);
            }
        }

        match self.repository.find_by_id(user_id).await {
            Ok(Some(profile)) => {
                self.l1.insert(user_id.to_string(), profile.clone()).await;

                let snapshot = CachedProfile {
                    profile: profile.clone(),
                    cached_at: chrono::Utc::now().timestamp_millis(),
                };
                match serde_json::to_string(&snapshot) {
                    Ok(json) => {
                        if let Err(e) = self.store.kv_set_ex(&key, &json, self.ttl).await {
                            tracing::warn!("Cache store write failed for {}: {}", user_id, e);
                        }
                    }
                    Err(e) => tracing::warn!("Failed to serialize profile {}: {}", user_id, e),
                }

                Some(profile)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Profile lookup failed for {}: {}", user_id, e);
                None
            }
        }
    }

    /// Parse an L2 snapshot, discarding entries past the staleness bound
    fn parse_fresh(&self, json: &str) -> Option<Profile> {
        let snapshot: CachedProfile = serde_json::from_str(json).ok()?;
        let age_ms = chrono::Utc::now().timestamp_millis() - snapshot.cached_at;
        if age_ms < self.ttl.as_millis() as i64 {
            Some(snapshot.profile)
        } else {
            None
        }
    }
}
