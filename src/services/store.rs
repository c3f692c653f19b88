use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur against the shared state store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Thin interface over the shared key/value + sorted-set + geospatial store
///
/// Every other matchmaking component coordinates cross-instance state through
/// these primitives. The production implementation is Redis; an in-memory
/// implementation backs tests and single-node deployments. Implementations
/// are injected, never reached through globals.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn kv_set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
    async fn kv_del(&self, key: &str) -> Result<(), StoreError>;
    async fn kv_exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError>;
    async fn zset_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;
    /// Members ordered by ascending score, capped at `limit`
    async fn zset_range(&self, key: &str, limit: usize)
        -> Result<Vec<(String, f64)>, StoreError>;
    async fn zset_len(&self, key: &str) -> Result<u64, StoreError>;

    async fn geo_add(
        &self,
        key: &str,
        member: &str,
        longitude: f64,
        latitude: f64,
    ) -> Result<(), StoreError>;
    async fn geo_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;
    /// Members within `radius_km` of the given point, nearest first,
    /// capped at `count`; each paired with its distance in km
    async fn geo_search(
        &self,
        key: &str,
        longitude: f64,
        latitude: f64,
        radius_km: f64,
        count: usize,
    ) -> Result<Vec<(String, f64)>, StoreError>;

    async fn counter_incr(&self, key: &str, delta: i64) -> Result<i64, StoreError>;
    async fn counter_get(&self, key: &str) -> Result<i64, StoreError>;
    /// Fixed-window counter: increments and returns the count within the
    /// current window; the window TTL is set when the counter is created
    async fn counter_incr_window(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<i64, StoreError>;
}

/// Redis-backed production store
///
/// Holds a multiplexed connection manager behind a mutex for interior
/// mutability; every call is a single round trip except the windowed
/// counter, which pairs INCR with a conditional EXPIRE.
pub struct RedisStore {
    redis: Arc<tokio::sync::Mutex<ConnectionManager>>,
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let redis = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(redis)),
        })
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        Ok(value)
    }

    async fn kv_set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.redis.lock().await;
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(value)
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn kv_del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.lock().await;
        redis::cmd("DEL").arg(key).query_async::<()>(&mut *conn).await?;
        Ok(())
    }

    async fn kv_exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.redis.lock().await;
        let exists: i64 = redis::cmd("EXISTS").arg(key).query_async(&mut *conn).await?;
        Ok(exists > 0)
    }

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut conn = self.redis.lock().await;
        redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn zset_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.lock().await;
        redis::cmd("ZREM")
            .arg(key)
            .arg(member)
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn zset_range(
        &self,
        key: &str,
        limit: usize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let mut conn = self.redis.lock().await;
        let members: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(limit as i64 - 1)
            .arg("WITHSCORES")
            .query_async(&mut *conn)
            .await?;
        Ok(members)
    }

    async fn zset_len(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.redis.lock().await;
        let len: u64 = redis::cmd("ZCARD").arg(key).query_async(&mut *conn).await?;
        Ok(len)
    }

    async fn geo_add(
        &self,
        key: &str,
        member: &str,
        longitude: f64,
        latitude: f64,
    ) -> Result<(), StoreError> {
        let mut conn = self.redis.lock().await;
        redis::cmd("GEOADD")
            .arg(key)
            .arg(longitude)
            .arg(latitude)
            .arg(member)
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn geo_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        // A geo set is a sorted set underneath; ZREM drops the member
        let mut conn = self.redis.lock().await;
        redis::cmd("ZREM")
            .arg(key)
            .arg(member)
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn geo_search(
        &self,
        key: &str,
        longitude: f64,
        latitude: f64,
        radius_km: f64,
        count: usize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let mut conn = self.redis.lock().await;
        let members: Vec<(String, f64)> = redis::cmd("GEOSEARCH")
            .arg(key)
            .arg("FROMLONLAT")
            .arg(longitude)
            .arg(latitude)
            .arg("BYRADIUS")
            .arg(radius_km)
            .arg("km")
            .arg("ASC")
            .arg("COUNT")
            .arg(count)
            .arg("WITHDIST")
            .query_async(&mut *conn)
            .await?;
        Ok(members)
    }

    async fn counter_incr(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = self.redis.lock().await;
        let value: i64 = redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut *conn)
            .await?;
        Ok(value)
    }

    async fn counter_get(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.redis.lock().await;
        let value: Option<i64> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        Ok(value.unwrap_or(0))
    }

    async fn counter_incr_window(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<i64, StoreError> {
        let mut conn = self.redis.lock().await;
        let value: i64 = redis::cmd("INCR").arg(key).query_async(&mut *conn).await?;
        if value == 1 {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(window.as_secs().max(1))
                .query_async::<()>(&mut *conn)
                .await?;
        }
        Ok(value)
    }
}

/// In-memory store used by tests and single-node deployments
///
/// Mirrors Redis semantics including TTL expiry, which is applied lazily on
/// read. Geospatial search falls back to a haversine scan.
#[derive(Default)]
pub struct MemoryStore {
    kv: RwLock<HashMap<String, (String, Instant)>>,
    zsets: RwLock<HashMap<String, HashMap<String, f64>>>,
    geo: RwLock<HashMap<String, HashMap<String, (f64, f64)>>>,
    counters: RwLock<HashMap<String, (i64, Option<Instant>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut kv = self.kv.write().await;
        match kv.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                kv.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn kv_set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut kv = self.kv.write().await;
        kv.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn kv_del(&self, key: &str) -> Result<(), StoreError> {
        self.kv.write().await.remove(key);
        Ok(())
    }

    async fn kv_exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.kv_get(key).await?.is_some())
    }

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut zsets = self.zsets.write().await;
        zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zset_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut zsets = self.zsets.write().await;
        if let Some(set) = zsets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn zset_range(
        &self,
        key: &str,
        limit: usize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let zsets = self.zsets.read().await;
        let mut members: Vec<(String, f64)> = zsets
            .get(key)
            .map(|set| set.iter().map(|(m, s)| (m.clone(), *s)).collect())
            .unwrap_or_default();
        members.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        members.truncate(limit);
        Ok(members)
    }

    async fn zset_len(&self, key: &str) -> Result<u64, StoreError> {
        let zsets = self.zsets.read().await;
        Ok(zsets.get(key).map(|set| set.len() as u64).unwrap_or(0))
    }

    async fn geo_add(
        &self,
        key: &str,
        member: &str,
        longitude: f64,
        latitude: f64,
    ) -> Result<(), StoreError> {
        let mut geo = self.geo.write().await;
        geo.entry(key.to_string())
            .or_default()
            .insert(member.to_string(), (longitude, latitude));
        Ok(())
    }

    async fn geo_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut geo = self.geo.write().await;
        if let Some(set) = geo.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn geo_search(
        &self,
        key: &str,
        longitude: f64,
        latitude: f64,
        radius_km: f64,
        count: usize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let geo = self.geo.read().await;
        let mut hits: Vec<(String, f64)> = geo
            .get(key)
            .map(|set| {
                set.iter()
                    .map(|(member, (lon, lat))| {
                        let distance = crate::core::distance::haversine_distance(
                            latitude, longitude, *lat, *lon,
                        );
                        (member.clone(), distance)
                    })
                    .filter(|(_, distance)| *distance <= radius_km)
                    .collect()
            })
            .unwrap_or_default();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(count);
        Ok(hits)
    }

    async fn counter_incr(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut counters = self.counters.write().await;
        let entry = counters.entry(key.to_string()).or_insert((0, None));
        entry.0 += delta;
        Ok(entry.0)
    }

    async fn counter_get(&self, key: &str) -> Result<i64, StoreError> {
        let mut counters = self.counters.write().await;
        match counters.get(key) {
            Some((_, Some(expires))) if *expires <= Instant::now() => {
                counters.remove(key);
                Ok(0)
            }
            Some((value, _)) => Ok(*value),
            None => Ok(0),
        }
    }

    async fn counter_incr_window(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<i64, StoreError> {
        let mut counters = self.counters.write().await;
        let now = Instant::now();
        let entry = counters.entry(key.to_string()).or_insert((0, None));
        match entry.1 {
            Some(expires) if expires <= now => {
                *entry = (1, Some(now + window));
            }
            Some(_) => {
                entry.0 += 1;
            }
            None => {
                *entry = (1, Some(now + window));
            }
        }
        Ok(entry.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_kv_ttl() {
        let store = MemoryStore::new();
        store
            .kv_set_ex("k", "v", Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(store.kv_get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.kv_get("k").await.unwrap(), None);
        assert!(!store.kv_exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_zset_ordering() {
        let store = MemoryStore::new();
        store.zset_add("q", "b", 2.0).await.unwrap();
        store.zset_add("q", "a", 1.0).await.unwrap();
        store.zset_add("q", "c", 3.0).await.unwrap();

        let range = store.zset_range("q", 10).await.unwrap();
        let members: Vec<&str> = range.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(members, vec!["a", "b", "c"]);

        store.zset_remove("q", "b").await.unwrap();
        assert_eq!(store.zset_len("q").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_memory_geo_search_nearest_first() {
        let store = MemoryStore::new();
        // New York area
        store.geo_add("geo", "near", -74.0060, 40.7128).await.unwrap();
        store.geo_add("geo", "mid", -74.05, 40.75).await.unwrap();
        store.geo_add("geo", "far", -73.5, 41.2).await.unwrap();

        let hits = store
            .geo_search("geo", -74.0060, 40.7128, 20.0, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "near");
        assert!(hits[0].1 < hits[1].1);
    }

    #[tokio::test]
    async fn test_memory_counter_window_resets() {
        let store = MemoryStore::new();
        assert_eq!(
            store
                .counter_incr_window("w", Duration::from_millis(30))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .counter_incr_window("w", Duration::from_millis(30))
                .await
                .unwrap(),
            2
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            store
                .counter_incr_window("w", Duration::from_millis(30))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_memory_counters_monotonic() {
        let store = MemoryStore::new();
        store.counter_incr("m", 1).await.unwrap();
        store.counter_incr("m", 2).await.unwrap();
        assert_eq!(store.counter_get("m").await.unwrap(), 3);
        assert_eq!(store.counter_get("absent").await.unwrap(), 0);
    }
}
