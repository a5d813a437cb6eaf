//! Password hashing, session tokens, and the `CurrentUser` extractor.
//!
//! Tokens are [`SessionToken`]s signed with the server's Ed25519 key. Every
//! request re-resolves the token's user against the database, so a deleted
//! account loses access immediately even if its token has not expired.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};

use fyp_shared::session::{SessionClaims, SessionToken};
use fyp_store::{StoreError, User};

use crate::api::AppState;
use crate::error::ServerError;

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

/// Hash a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, ServerError> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| ServerError::Internal(format!("Failed to encode salt: {e}")))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServerError::Internal(format!("Failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. Unparseable hashes never
/// match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Session tokens
// ---------------------------------------------------------------------------

/// Issues and checks session tokens.
pub struct Authority {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    ttl: Duration,
}

impl Authority {
    pub fn new(signing_key: SigningKey, ttl_hours: i64) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Hex fingerprint of the verifying key, for the startup log.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.verifying_key.to_bytes()[..8])
    }

    pub fn issue(&self, user: &User) -> Result<String, ServerError> {
        let claims = SessionClaims {
            user_id: user.id,
            role: user.role,
            valid_until: Utc::now() + self.ttl,
        };
        let token = SessionToken::issue(claims, &self.signing_key)?;
        Ok(token.encode()?)
    }

    pub fn verify(&self, encoded: &str) -> Result<SessionClaims, ServerError> {
        let token = SessionToken::decode(encoded)?;
        let claims = token.verify(&self.verifying_key)?;
        Ok(claims.clone())
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// The authenticated caller, freshly loaded from the database.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ServerError::Unauthenticated)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ServerError::Unauthenticated)?;

        let claims = state.auth.verify(token)?;

        let db = state.db.lock().await;
        match db.get_user(claims.user_id) {
            Ok(user) => Ok(CurrentUser(user)),
            Err(StoreError::NotFound) => Err(ServerError::Unauthenticated),
            Err(e) => Err(e.into()),
        }
    }
}
