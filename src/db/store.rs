use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use super::whale_repo;
use crate::models::{NewWhale, TrackedWhale, WhaleRecord, WhaleStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid status transition to {0}")]
    InvalidTransition(WhaleStatus),
}

/// Durable set of whale positions keyed by `(address, pair)`.
///
/// All operations are safe under concurrent callers.
#[async_trait]
pub trait WhaleStore: Send + Sync {
    /// Insert a new tracked position. Atomic.
    async fn insert(&self, whale: &NewWhale) -> Result<WhaleRecord, StoreError>;

    /// Move `(address, pair)` to `status`. Only `Closed` is accepted; closing an
    /// already-closed or unknown key is a no-op that returns `Ok(false)`.
    async fn update_status(
        &self,
        address: &str,
        pair: &str,
        status: WhaleStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Latest alert time for the key, across all rows.
    async fn last_notified(&self, address: &str, pair: &str)
        -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Currently tracked positions, one per key.
    async fn scan_tracked(&self) -> Result<Vec<TrackedWhale>, StoreError>;

    /// Every record ever written, ordered by id.
    async fn export_all(&self) -> Result<Vec<WhaleRecord>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct SqliteWhaleStore {
    pool: SqlitePool,
}

impl SqliteWhaleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl WhaleStore for SqliteWhaleStore {
    async fn insert(&self, whale: &NewWhale) -> Result<WhaleRecord, StoreError> {
        whale_repo::insert_whale(&self.pool, whale).await
    }

    async fn update_status(
        &self,
        address: &str,
        pair: &str,
        status: WhaleStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        match status {
            WhaleStatus::Closed => whale_repo::close_whale(&self.pool, address, pair, at).await,
            WhaleStatus::Tracked => Err(StoreError::InvalidTransition(status)),
        }
    }

    async fn last_notified(
        &self,
        address: &str,
        pair: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        whale_repo::last_notified(&self.pool, address, pair).await
    }

    async fn scan_tracked(&self) -> Result<Vec<TrackedWhale>, StoreError> {
        let records = whale_repo::get_tracked_whales(&self.pool).await?;
        Ok(records.iter().map(TrackedWhale::from).collect())
    }

    async fn export_all(&self) -> Result<Vec<WhaleRecord>, StoreError> {
        whale_repo::get_all_whales(&self.pool).await
    }
}
