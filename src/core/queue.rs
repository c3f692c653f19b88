use crate::models::SearchEntry;
use crate::services::store::{StateStore, StoreError};
use std::sync::Arc;
use std::time::Duration;

const QUEUE_KEY: &str = "mm:searching";
const GEO_KEY: &str = "mm:geo";

fn entry_key(user_id: &str) -> String {
    format!("mm:searching:entry:{}", user_id)
}

/// The distributed search queue and its geospatial mirror
///
/// Membership lives in a sorted set scored by enqueue time so every
/// instance sees the same FIFO ordering; entries with coordinates are
/// mirrored into a geo index for radius queries. The entry JSON carries a
/// TTL so abandoned searches age out even if no instance cleans them up.
pub struct SearchQueue {
    store: Arc<dyn StateStore>,
    entry_ttl: Duration,
}

impl SearchQueue {
    pub fn new(store: Arc<dyn StateStore>, entry_ttl: Duration) -> Self {
        Self { store, entry_ttl }
    }

    /// Upsert a user into the queue (and the geo index when located)
    pub async fn enqueue(&self, entry: &SearchEntry) -> Result<(), StoreError> {
        let json = serde_json::to_string(entry)?;
        self.store
            .kv_set_ex(&entry_key(&entry.user_id), &json, self.entry_ttl)
            .await?;
        self.store
            .zset_add(QUEUE_KEY, &entry.user_id, entry.enqueued_at as f64)
            .await?;

        if let (Some(lat), Some(lon)) = (entry.latitude, entry.longitude) {
            self.store.geo_add(GEO_KEY, &entry.user_id, lon, lat).await?;
        }

        Ok(())
    }

    /// Remove a user from the queue; idempotent if absent
    pub async fn dequeue(&self, user_id: &str) -> Result<(), StoreError> {
        self.store.zset_remove(QUEUE_KEY, user_id).await?;
        self.store.geo_remove(GEO_KEY, user_id).await?;
        self.store.kv_del(&entry_key(user_id)).await?;
        Ok(())
    }

    /// Fetch a single entry, if the user is still searching
    pub async fn get_entry(&self, user_id: &str) -> Result<Option<SearchEntry>, StoreError> {
        match self.store.kv_get(&entry_key(user_id)).await? {
            Some(json) => Ok(serde_json::from_str(&json).ok()),
            None => Ok(None),
        }
    }

    pub async fn contains(&self, user_id: &str) -> Result<bool, StoreError> {
        self.store.kv_exists(&entry_key(user_id)).await
    }

    /// Entries in enqueue order, skipping and reaping ids whose JSON aged out
    pub async fn list_searching(&self, limit: usize) -> Result<Vec<SearchEntry>, StoreError> {
        let members = self.store.zset_range(QUEUE_KEY, limit).await?;
        let mut entries = Vec::with_capacity(members.len());

        for (user_id, _) in members {
            match self.get_entry(&user_id).await? {
                Some(entry) => entries.push(entry),
                None => {
                    // Entry TTL fired; drop the stale queue membership too
                    self.store.zset_remove(QUEUE_KEY, &user_id).await?;
                    self.store.geo_remove(GEO_KEY, &user_id).await?;
                }
            }
        }

        Ok(entries)
    }

    /// Other searching users within `radius_km`, nearest first
    pub async fn nearby(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        max_results: usize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        // Over-fetch by one so excluding self still fills the cap
        let hits = self
            .store
            .geo_search(GEO_KEY, longitude, latitude, radius_km, max_results + 1)
            .await?;

        Ok(hits
            .into_iter()
            .filter(|(member, _)| member != user_id)
            .take(max_results)
            .collect())
    }

    /// Number of users currently searching
    pub async fn len(&self) -> Result<u64, StoreError> {
        self.store.zset_len(QUEUE_KEY).await
    }
}
