use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use fyp_shared::capacity::CapacityStatus;
use fyp_shared::types::{Role, UserId};
use fyp_store::{NewUser, PortfolioUpdate, ProfileUpdate, User};

use crate::api::AppState;
use crate::auth::{hash_password, CurrentUser};
use crate::error::ServerError;
use crate::workflow;

const MIN_PASSWORD_LEN: usize = 8;

fn require_admin(user: &User) -> Result<(), ServerError> {
    if user.role != Role::Admin {
        return Err(ServerError::Forbidden("admin access required".into()));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct ListQuery {
    role: Option<Role>,
}

/// Admins list anyone. Everyone else may list supervisors, to pick one
/// for a supervision request.
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<User>>, ServerError> {
    if caller.role != Role::Admin && query.role != Some(Role::Supervisor) {
        return Err(ServerError::Forbidden(
            "only admins may list users other than supervisors".into(),
        ));
    }
    let users = state.db.lock().await.list_users(query.role)?;
    Ok(Json(users))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    name: String,
    email: String,
    password: String,
    role: Role,
    department: Option<String>,
    batch: Option<String>,
    roll_no: Option<String>,
    #[serde(default)]
    expertise: Vec<String>,
    max_projects: Option<u32>,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ServerError> {
    require_admin(&caller)?;

    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();
    if name.is_empty() || !email.contains('@') {
        return Err(ServerError::BadRequest("a name and a valid email are required".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ServerError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServerError::Internal(format!("password hashing panicked: {e}")))??;

    let user = state.db.lock().await.create_user(&NewUser {
        name,
        email,
        password_hash,
        role: req.role,
        department: req.department,
        batch: req.batch,
        roll_no: req.roll_no,
        expertise: req.expertise,
        max_projects: req.max_projects,
    })?;

    info!(user = %user.id, role = %user.role, by = %caller.id, "account created");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_one(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
    Path(id): Path<UserId>,
) -> Result<Json<User>, ServerError> {
    let user = state
        .db
        .lock()
        .await
        .get_user(id)
        .map_err(|e| ServerError::from(e).or_not_found("User"))?;
    Ok(Json(user))
}

pub async fn update_portfolio(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(update): Json<PortfolioUpdate>,
) -> Result<Json<User>, ServerError> {
    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            return Err(ServerError::BadRequest("name cannot be empty".into()));
        }
    }
    let user = state.db.lock().await.update_portfolio(caller.id, &update)?;
    Ok(Json(user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<UserId>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, ServerError> {
    require_admin(&caller)?;
    if update.max_projects == Some(0) {
        return Err(ServerError::BadRequest("maxProjects must be at least 1".into()));
    }
    let user = state
        .db
        .lock()
        .await
        .update_profile(id, &update)
        .map_err(|e| ServerError::from(e).or_not_found("User"))?;
    Ok(Json(user))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<UserId>,
) -> Result<StatusCode, ServerError> {
    require_admin(&caller)?;
    if id == caller.id {
        return Err(ServerError::BadRequest("you cannot delete your own account".into()));
    }
    workflow::delete_user(&mut *state.db.lock().await, &caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn capacity(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
    Path(id): Path<UserId>,
) -> Result<Json<CapacityStatus>, ServerError> {
    let status = state
        .db
        .lock()
        .await
        .supervisor_capacity(id)
        .map_err(|e| ServerError::from(e).or_not_found("Supervisor"))?;
    Ok(Json(status))
}
