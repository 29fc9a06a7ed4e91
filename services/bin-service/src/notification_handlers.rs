use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use common_http_errors::ApiResult;
use serde::Serialize;
use tracing::info;

use crate::app::AppState;
use crate::bin_handlers::invalid_query;
use crate::model::{Notification, NotificationWithBin};
use crate::notifications::{self, parse_notification_id, NotificationListParams, UnreadCount};

#[derive(Debug, Serialize)]
pub struct FeedResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    params: Result<Query<NotificationListParams>, QueryRejection>,
) -> ApiResult<Json<FeedResponse<Vec<NotificationWithBin>>>> {
    let Query(params) = params.map_err(invalid_query)?;
    let query = params.validate()?;
    let data = notifications::list_notifications(state.notifications.as_ref(), &query).await?;
    Ok(Json(FeedResponse {
        success: true,
        message: None,
        data: Some(data),
    }))
}

pub async fn unread_count(State(state): State<AppState>) -> ApiResult<Json<UnreadCount>> {
    Ok(Json(notifications::unread_count(state.notifications.as_ref()).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FeedResponse<Notification>>> {
    let id = parse_notification_id(&id)?;
    let notification = notifications::mark_read(state.notifications.as_ref(), id).await?;
    Ok(Json(FeedResponse {
        success: true,
        message: Some("Notification marked as read"),
        data: Some(notification),
    }))
}

pub async fn mark_all_read(State(state): State<AppState>) -> ApiResult<Json<FeedResponse<()>>> {
    let flipped = notifications::mark_all_read(state.notifications.as_ref()).await?;
    info!(flipped, "notifications marked read");
    Ok(Json(FeedResponse {
        success: true,
        message: Some("All notifications marked as read"),
        data: None,
    }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FeedResponse<()>>> {
    let id = parse_notification_id(&id)?;
    notifications::delete_notification(state.notifications.as_ref(), id).await?;
    Ok(Json(FeedResponse {
        success: true,
        message: Some("Notification deleted"),
        data: None,
    }))
}
