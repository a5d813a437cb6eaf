//! HTTP API.
//!
//! Handlers are thin: they extract the caller and the request, take the
//! database lock, call into [`crate::workflow`], [`crate::work`] or
//! [`crate::deadlines`], and serialize the result as camelCase JSON.

mod deadlines;
mod files;
mod notifications;
mod projects;
mod session;
mod users;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use fyp_store::Database;

use crate::auth::Authority;
use crate::config::ServerConfig;
use crate::file_store::FileStore;

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub files: Arc<FileStore>,
    pub auth: Arc<Authority>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.cors_allow_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        // Session
        .route("/auth/login", post(session::login))
        .route("/auth/me", get(session::me))
        // Users
        .route("/users", get(users::list).post(users::create))
        .route("/users/me", patch(users::update_portfolio))
        .route(
            "/users/:id",
            get(users::get_one)
                .patch(users::update_profile)
                .delete(users::delete),
        )
        .route("/users/:id/capacity", get(users::capacity))
        // Projects and lifecycle
        .route("/projects", get(projects::list).post(projects::create))
        .route("/projects/:id", get(projects::get_one))
        .route("/projects/:id/approve", post(projects::approve))
        .route("/projects/:id/reject", post(projects::reject))
        .route("/projects/:id/requests", post(projects::request_supervisor))
        .route("/projects/:id/requests/respond", post(projects::respond))
        .route("/projects/:id/assign", post(projects::assign))
        .route("/projects/:id/submit-evaluation", post(projects::submit_for_evaluation))
        .route("/projects/:id/revision", post(projects::request_revision))
        .route("/projects/:id/grade", post(projects::grade))
        .route("/projects/:id/feedback", post(projects::admin_feedback))
        // Project work
        .route(
            "/projects/:id/roadmap",
            get(projects::roadmap).post(projects::add_phase),
        )
        .route("/projects/:id/roadmap/:phase_id", patch(projects::update_phase))
        .route("/projects/:id/tasks", post(projects::add_task))
        .route("/projects/:id/tasks/:task_id", patch(projects::update_task))
        .route("/projects/:id/submissions", post(files::upload_submission))
        .route(
            "/projects/:id/submissions/:submission_id",
            patch(projects::review_submission),
        )
        // Deadlines
        .route("/deadlines", get(deadlines::list).post(deadlines::create))
        .route("/deadlines/:id", axum::routing::delete(deadlines::delete))
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/:id/read", post(notifications::mark_read))
        // Files
        .route("/files", post(files::upload))
        .route("/files/:id", get(files::download))
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_size + MULTIPART_OVERHEAD,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests;
