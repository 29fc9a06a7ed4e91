//! Persistence contract. The service never talks to a database directly;
//! it is handed `Arc<dyn BinStore>` / `Arc<dyn NotificationStore>` at startup.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{
    Bin, BinStatus, BinUpdate, FieldOfficer, NewBin, NewNotification, Notification,
    NotificationWithBin, TelemetryWrite,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store returned a malformed record: {0}")]
    Decode(String),
    #[error("record '{0}' already exists")]
    Conflict(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        match &value {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Decode(value.to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            _ => StoreError::Backend(value.to_string()),
        }
    }
}

/// Status filter plus window, ordered by `last_updated` descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinWindow {
    pub status: Option<BinStatus>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinPage {
    pub bins: Vec<Bin>,
    /// Count of every bin matching the status filter, ignoring the window.
    pub total: u64,
}

#[async_trait]
pub trait BinStore: Send + Sync {
    /// Atomic insert-or-update keyed by bin id. On conflict only the fields
    /// in [`TelemetryWrite`] change.
    async fn upsert_telemetry(&self, write: &TelemetryWrite) -> StoreResult<Bin>;
    async fn insert_bin(&self, bin: &NewBin) -> StoreResult<Bin>;
    /// `Ok(None)` when no bin has this id.
    async fn update_bin(&self, id: &str, update: &BinUpdate) -> StoreResult<Option<Bin>>;
    async fn fetch_bin(&self, id: &str) -> StoreResult<Option<Bin>>;
    async fn list_bins(&self, window: &BinWindow) -> StoreResult<BinPage>;
    /// Every bin with both coordinates, most recent telemetry first.
    async fn bins_with_coordinates(&self) -> StoreResult<Vec<Bin>>;
    /// Whole inventory, most recent telemetry first.
    async fn all_bins(&self) -> StoreResult<Vec<Bin>>;
    async fn fetch_officer(&self, id: &str) -> StoreResult<Option<FieldOfficer>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: &NewNotification) -> StoreResult<Notification>;
    /// Newest first.
    async fn recent_for_bin(&self, bin_id: &str, limit: u32) -> StoreResult<Vec<Notification>>;
    /// Newest first, optionally restricted to read or unread.
    async fn list_notifications(
        &self,
        read: Option<bool>,
        limit: u32,
    ) -> StoreResult<Vec<NotificationWithBin>>;
    async fn unread_count(&self) -> StoreResult<u64>;
    async fn mark_read(&self, id: Uuid) -> StoreResult<Option<Notification>>;
    /// Returns how many notifications flipped from unread to read.
    async fn mark_all_read(&self) -> StoreResult<u64>;
    /// Returns whether a notification was removed.
    async fn delete_notification(&self, id: Uuid) -> StoreResult<bool>;
}
