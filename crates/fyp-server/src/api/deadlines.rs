use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use fyp_shared::types::DeadlineId;
use fyp_store::{Deadline, NewDeadline};

use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::deadlines;
use crate::error::ServerError;

/// Deadlines that apply to the caller.
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<Vec<Deadline>>, ServerError> {
    let deadlines = state.db.lock().await.list_visible_deadlines(&caller)?;
    Ok(Json(deadlines))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(new): Json<NewDeadline>,
) -> Result<(StatusCode, Json<Deadline>), ServerError> {
    let mut db = state.db.lock().await;
    let deadline = deadlines::create(&mut db, &caller, new)?;
    Ok((StatusCode::CREATED, Json(deadline)))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<DeadlineId>,
) -> Result<StatusCode, ServerError> {
    deadlines::delete(&*state.db.lock().await, &caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}
