//! # fyp-server
//!
//! HTTP backend for the final year project portal.
//!
//! This binary provides:
//! - **Project lifecycle engine**: proposal review, supervision requests,
//!   capacity-guarded supervisor assignment, evaluation and grading
//! - **Project work**: tasks, roadmap phases and deliverable submissions
//! - **Deadlines** scoped globally, per cohort or per project group
//! - **Notification inbox** fed by every committed transition
//! - **REST API** (axum) with signed bearer-token sessions

mod api;
mod auth;
mod config;
mod deadlines;
mod error;
mod fanout;
mod file_store;
mod work;
mod workflow;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fyp_shared::constants::APP_NAME;
use fyp_shared::types::Role;
use fyp_store::{Database, NewUser};

use crate::api::AppState;
use crate::auth::Authority;
use crate::config::ServerConfig;
use crate::file_store::FileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fyp_server=debug,fyp_store=info")),
        )
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the database and seed the first admin
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    info!(path = ?db.path(), "Database ready");

    if let Some((email, password)) = &config.bootstrap_admin {
        bootstrap_admin(&db, email, password)?;
    }

    // -----------------------------------------------------------------------
    // 4. Initialize subsystems
    // -----------------------------------------------------------------------
    let files = FileStore::new(config.upload_storage_path.clone(), config.max_upload_size).await?;

    let authority = Authority::new(config.signing_key.clone(), config.session_ttl_hours);
    info!(key = %authority.fingerprint(), "Session signing key loaded");

    let http_addr = config.http_addr;
    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        files: Arc::new(files),
        auth: Arc::new(authority),
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

/// Create the configured admin account when no admin exists yet.
fn bootstrap_admin(db: &Database, email: &str, password: &str) -> anyhow::Result<()> {
    if db.count_users_with_role(Role::Admin)? > 0 {
        return Ok(());
    }
    let password_hash = auth::hash_password(password)?;
    let admin = db.create_user(&NewUser {
        name: "Administrator".to_string(),
        email: email.trim().to_lowercase(),
        password_hash,
        role: Role::Admin,
        department: None,
        batch: None,
        roll_no: None,
        expertise: Vec::new(),
        max_projects: None,
    })?;
    info!(user = %admin.id, email = %admin.email, "Bootstrapped admin account");
    Ok(())
}
