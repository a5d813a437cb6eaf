use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use fyp_shared::types::NotificationId;
use fyp_store::Notification;

use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::error::ServerError;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    unread: bool,
    limit: Option<u32>,
}

/// The caller's inbox, newest first.
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let notifications = state
        .db
        .lock()
        .await
        .list_notifications(caller.id, query.unread, limit)?;
    Ok(Json(notifications))
}

#[derive(Serialize)]
pub struct CountResponse {
    count: u32,
}

pub async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<CountResponse>, ServerError> {
    let count = state.db.lock().await.unread_count(caller.id)?;
    Ok(Json(CountResponse { count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode, ServerError> {
    state
        .db
        .lock()
        .await
        .mark_notification_read(id, caller.id)
        .map_err(|e| ServerError::from(e).or_not_found("Notification"))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct UpdatedResponse {
    updated: usize,
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<UpdatedResponse>, ServerError> {
    let updated = state.db.lock().await.mark_all_notifications_read(caller.id)?;
    Ok(Json(UpdatedResponse { updated }))
}
