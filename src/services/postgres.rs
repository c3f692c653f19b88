use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when persisting match history
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
}

/// Write-only persistence for match outcomes and reputation events
///
/// Every call is append-only bookkeeping: the engine logs failures and
/// carries on, because losing an audit row must never break matching.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a match record; also resolves the chat both parties share
    async fn record_match(
        &self,
        user_a: &str,
        user_b: &str,
        chat_id: &str,
    ) -> Result<(), HistoryError>;

    /// Append a "friendship created" record for a friendship-kind match
    async fn record_friendship(&self, user_a: &str, user_b: &str) -> Result<(), HistoryError>;

    /// Append a reputation/points event
    async fn record_activity(
        &self,
        user_id: &str,
        activity_type: &str,
        points_change: i64,
        related_user_id: Option<&str>,
    ) -> Result<(), HistoryError>;
}

/// PostgreSQL-backed history store
pub struct HistoryClient {
    pool: PgPool,
}

impl HistoryClient {
    /// Create a new history client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, HistoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self, HistoryError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
        )
        .await
    }

    /// Check database connectivity
    pub async fn health_check(&self) -> Result<bool, HistoryError> {
        let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }
}

#[async_trait]
impl HistoryStore for HistoryClient {
    async fn record_match(
        &self,
        user_a: &str,
        user_b: &str,
        chat_id: &str,
    ) -> Result<(), HistoryError> {
        let query = r#"
            INSERT INTO match_history (user_a, user_b, chat_id, matched_at)
            VALUES ($1, $2, $3, NOW())
        "#;

        sqlx::query(query)
            .bind(user_a)
            .bind(user_b)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Recorded match: {} <-> {}", user_a, user_b);
        Ok(())
    }

    async fn record_friendship(&self, user_a: &str, user_b: &str) -> Result<(), HistoryError> {
        // Canonical pair ordering keeps the unique constraint direction-free
        let (first, second) = if user_a <= user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        };

        let query = r#"
            INSERT INTO friendships (user_a, user_b, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_a, user_b) DO NOTHING
        "#;

        sqlx::query(query)
            .bind(first)
            .bind(second)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Recorded friendship: {} <-> {}", first, second);
        Ok(())
    }

    async fn record_activity(
        &self,
        user_id: &str,
        activity_type: &str,
        points_change: i64,
        related_user_id: Option<&str>,
    ) -> Result<(), HistoryError> {
        let query = r#"
            INSERT INTO reputation_events (user_id, activity_type, points_change, related_user_id, created_at)
            VALUES ($1, $2, $3, $4, NOW())
        "#;

        sqlx::query(query)
            .bind(user_id)
            .bind(activity_type)
            .bind(points_change)
            .bind(related_user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// No-op history store for tests
#[derive(Default)]
pub struct NullHistory;

#[async_trait]
impl HistoryStore for NullHistory {
    async fn record_match(
        &self,
        user_a: &str,
        user_b: &str,
        _chat_id: &str,
    ) -> Result<(), HistoryError> {
        tracing::trace!("Dropping match record {} <-> {}", user_a, user_b);
        Ok(())
    }

    async fn record_friendship(&self, _user_a: &str, _user_b: &str) -> Result<(), HistoryError> {
        Ok(())
    }

    async fn record_activity(
        &self,
        _user_id: &str,
        _activity_type: &str,
        _points_change: i64,
        _related_user_id: Option<&str>,
    ) -> Result<(), HistoryError> {
        Ok(())
    }
}
