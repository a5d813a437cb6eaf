use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use fyp_store::User;

use crate::api::AppState;
use crate::auth::{verify_password, CurrentUser};
use crate::error::ServerError;

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
    user: User,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let found = state.db.lock().await.find_credentials(&req.email)?;
    let Some((user, hash)) = found else {
        return Err(ServerError::Unauthenticated);
    };

    // Argon2 is CPU-bound; run it off the async workers.
    let password = req.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ServerError::Internal(format!("password check panicked: {e}")))?;
    if !matches {
        return Err(ServerError::Unauthenticated);
    }

    let token = state.auth.issue(&user)?;
    info!(user = %user.id, role = %user.role, "login");
    Ok(Json(LoginResponse { token, user }))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
