//! Notification feed operations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::model::{Notification, NotificationWithBin};
use crate::store::NotificationStore;

pub const DEFAULT_NOTIFICATION_LIMIT: u32 = 50;
pub const MAX_NOTIFICATION_LIMIT: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationListParams {
    pub limit: Option<u32>,
    pub read: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationQuery {
    pub read: Option<bool>,
    pub limit: u32,
}

impl NotificationListParams {
    /// A zero or missing limit falls back to the default; larger values are capped.
    pub fn validate(&self) -> CoreResult<NotificationQuery> {
        let limit = match self.limit {
            None | Some(0) => DEFAULT_NOTIFICATION_LIMIT,
            Some(n) => n.min(MAX_NOTIFICATION_LIMIT),
        };
        let read = match self.read.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) if raw.eq_ignore_ascii_case("true") => Some(true),
            Some(raw) if raw.eq_ignore_ascii_case("false") => Some(false),
            Some(_) => {
                return Err(CoreError::validation("read", "read must be true or false"));
            }
        };
        Ok(NotificationQuery { read, limit })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub success: bool,
    pub unread_count: u64,
}

/// Ids that are not UUIDs cannot name a stored notification.
pub fn parse_notification_id(raw: &str) -> CoreResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| CoreError::notification_not_found())
}

pub async fn list_notifications(
    store: &dyn NotificationStore,
    query: &NotificationQuery,
) -> CoreResult<Vec<NotificationWithBin>> {
    Ok(store.list_notifications(query.read, query.limit).await?)
}

pub async fn unread_count(store: &dyn NotificationStore) -> CoreResult<UnreadCount> {
    Ok(UnreadCount {
        success: true,
        unread_count: store.unread_count().await?,
    })
}

pub async fn mark_read(store: &dyn NotificationStore, id: Uuid) -> CoreResult<Notification> {
    store
        .mark_read(id)
        .await?
        .ok_or_else(CoreError::notification_not_found)
}

pub async fn mark_all_read(store: &dyn NotificationStore) -> CoreResult<u64> {
    Ok(store.mark_all_read().await?)
}

pub async fn delete_notification(store: &dyn NotificationStore, id: Uuid) -> CoreResult<()> {
    if store.delete_notification(id).await? {
        Ok(())
    } else {
        Err(CoreError::notification_not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewNotification;
    use crate::store::MemoryStore;

    fn params(limit: Option<u32>, read: Option<&str>) -> NotificationListParams {
        NotificationListParams {
            limit,
            read: read.map(str::to_string),
        }
    }

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(params(None, None).validate().unwrap().limit, 50);
        assert_eq!(params(Some(0), None).validate().unwrap().limit, 50);
        assert_eq!(params(Some(7), None).validate().unwrap().limit, 7);
        assert_eq!(params(Some(500), None).validate().unwrap().limit, 100);
    }

    #[test]
    fn read_filter_parses_booleans_only() {
        assert_eq!(params(None, Some("true")).validate().unwrap().read, Some(true));
        assert_eq!(params(None, Some("FALSE")).validate().unwrap().read, Some(false));
        assert_eq!(params(None, Some("")).validate().unwrap().read, None);
        assert!(params(None, Some("maybe")).validate().is_err());
    }

    #[test]
    fn non_uuid_ids_are_not_found() {
        let err = parse_notification_id("abc").unwrap_err();
        assert!(matches!(err, CoreError::NotFound { code: "notification_not_found", .. }));
    }

    #[tokio::test]
    async fn missing_notifications_are_not_found() {
        let store = MemoryStore::new();
        assert!(mark_read(&store, Uuid::new_v4()).await.is_err());
        assert!(delete_notification(&store, Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn unread_count_tracks_mark_all() {
        let store = MemoryStore::new();
        for bin in ["a", "b", "c"] {
            store
                .insert_notification(&NewNotification::bin_full(bin, bin, 90.0))
                .await
                .unwrap();
        }
        assert_eq!(unread_count(&store).await.unwrap().unread_count, 3);
        assert_eq!(mark_all_read(&store).await.unwrap(), 3);
        assert_eq!(unread_count(&store).await.unwrap().unread_count, 0);
        let unread = list_notifications(&store, &params(None, Some("false")).validate().unwrap())
            .await
            .unwrap();
        assert!(unread.is_empty());
    }
}
