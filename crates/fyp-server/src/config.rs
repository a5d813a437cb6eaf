//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

use fyp_shared::constants::{DEFAULT_HTTP_PORT, MAX_UPLOAD_SIZE, SESSION_TTL_HOURS};
use fyp_shared::session::signing_key_from_hex;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `None`, meaning the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Directory where uploaded proposal and deliverable files are kept.
    /// Env: `UPLOAD_STORAGE_PATH`
    /// Default: `./uploads`
    pub upload_storage_path: PathBuf,

    /// Base URL prepended to `/files/{id}` when handing out file links.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,

    /// Maximum upload size in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 25 MiB
    pub max_upload_size: usize,

    /// Key used to sign session tokens.
    /// Env: `AUTH_SIGNING_KEY` (64 hex chars)
    /// Default: a fresh random key, so sessions do not survive a restart.
    pub signing_key: SigningKey,

    /// Session lifetime in hours.
    /// Env: `SESSION_TTL_HOURS`
    /// Default: 24
    pub session_ttl_hours: i64,

    /// Admin account created at startup when no admin exists yet.
    /// Env: `BOOTSTRAP_ADMIN_EMAIL` and `BOOTSTRAP_ADMIN_PASSWORD`
    pub bootstrap_admin: Option<(String, String)>,

    /// Whether any origin may call the API.
    /// Env: `CORS_ALLOW_ANY` (true/false)
    /// Default: `true`
    pub cors_allow_any: bool,
}

// The signing key must never end up in logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("upload_storage_path", &self.upload_storage_path)
            .field("public_base_url", &self.public_base_url)
            .field("max_upload_size", &self.max_upload_size)
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field(
                "bootstrap_admin",
                &self.bootstrap_admin.as_ref().map(|(email, _)| email),
            )
            .field("cors_allow_any", &self.cors_allow_any)
            .finish_non_exhaustive()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            upload_storage_path: PathBuf::from("./uploads"),
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            max_upload_size: MAX_UPLOAD_SIZE,
            signing_key: SigningKey::generate(&mut OsRng),
            session_ttl_hours: SESSION_TTL_HOURS,
            bootstrap_admin: None,
            cors_allow_any: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable source.
    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = var("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(path) = var("UPLOAD_STORAGE_PATH") {
            config.upload_storage_path = PathBuf::from(path);
        }

        if let Some(url) = var("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(val) = var("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        match var("AUTH_SIGNING_KEY") {
            Some(hex_seed) => match signing_key_from_hex(&hex_seed) {
                Ok(key) => config.signing_key = key,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid AUTH_SIGNING_KEY, using a random key");
                }
            },
            None => {
                tracing::warn!("AUTH_SIGNING_KEY not set, sessions will not survive a restart");
            }
        }

        if let Some(val) = var("SESSION_TTL_HOURS") {
            match val.parse::<i64>() {
                Ok(n) if n > 0 => config.session_ttl_hours = n,
                _ => tracing::warn!(value = %val, "Invalid SESSION_TTL_HOURS, using default"),
            }
        }

        if let (Some(email), Some(password)) =
            (var("BOOTSTRAP_ADMIN_EMAIL"), var("BOOTSTRAP_ADMIN_PASSWORD"))
        {
            if !email.is_empty() && !password.is_empty() {
                config.bootstrap_admin = Some((email, password));
            }
        }

        if let Some(val) = var("CORS_ALLOW_ANY") {
            config.cors_allow_any = val != "false" && val != "0";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Public URL of a stored file.
    pub fn file_url(&self, id: uuid::Uuid) -> String {
        format!("{}/files/{id}", self.public_base_url)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.max_upload_size, 25 * 1024 * 1024);
        assert_eq!(config.session_ttl_hours, 24);
        assert!(config.cors_allow_any);
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let seed = "ab".repeat(32);
        let config = config_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/tmp/portal.db"),
            ("PUBLIC_BASE_URL", "https://fyp.example.edu/"),
            ("MAX_UPLOAD_SIZE", "1024"),
            ("AUTH_SIGNING_KEY", &seed),
            ("SESSION_TTL_HOURS", "2"),
            ("BOOTSTRAP_ADMIN_EMAIL", "root@uni.test"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "changeme"),
            ("CORS_ALLOW_ANY", "false"),
        ]);

        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/portal.db")));
        assert_eq!(config.public_base_url, "https://fyp.example.edu");
        assert_eq!(config.max_upload_size, 1024);
        assert_eq!(config.signing_key.to_bytes(), [0xab; 32]);
        assert_eq!(config.session_ttl_hours, 2);
        assert_eq!(
            config.bootstrap_admin,
            Some(("root@uni.test".to_string(), "changeme".to_string()))
        );
        assert!(!config.cors_allow_any);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("MAX_UPLOAD_SIZE", "-5"),
            ("SESSION_TTL_HOURS", "0"),
            ("AUTH_SIGNING_KEY", "abcd"),
        ]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.max_upload_size, MAX_UPLOAD_SIZE);
        assert_eq!(config.session_ttl_hours, SESSION_TTL_HOURS);
    }

    #[test]
    fn test_file_url() {
        let config = config_from(&[("PUBLIC_BASE_URL", "https://fyp.example.edu")]);
        let id = uuid::Uuid::nil();
        assert_eq!(
            config.file_url(id),
            "https://fyp.example.edu/files/00000000-0000-0000-0000-000000000000"
        );
    }
}
