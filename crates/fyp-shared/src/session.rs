//! Signed bearer session tokens.
//!
//! The server signs `{user_id, role, valid_until}` with its Ed25519 key and
//! hands the result to the client as a base64url string. Verification only
//! needs the public half, so the token carries no server-side state.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;
use crate::types::{Role, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: UserId,
    pub role: Role,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub claims: SessionClaims,
    pub signature: Vec<u8>,
}

impl SessionToken {
    /// Sign a new token.
    pub fn issue(claims: SessionClaims, key: &SigningKey) -> Result<Self, TokenError> {
        let payload = bincode::serialize(&claims)?;
        let signature = key.sign(&payload);
        Ok(Self {
            claims,
            signature: signature.to_bytes().to_vec(),
        })
    }

    /// Encode as a copiable base64url string.
    pub fn encode(&self) -> Result<String, TokenError> {
        let bytes = bincode::serialize(self)?;
        Ok(base64_url_encode(&bytes))
    }

    pub fn decode(code: &str) -> Result<Self, TokenError> {
        let bytes = base64_url_decode(code)?;
        bincode::deserialize(&bytes).map_err(|_| TokenError::Malformed)
    }

    /// Check signature and expiry; returns the claims on success.
    pub fn verify(&self, key: &VerifyingKey) -> Result<&SessionClaims, TokenError> {
        let payload = bincode::serialize(&self.claims)?;
        let signature =
            Signature::from_slice(&self.signature).map_err(|_| TokenError::BadSignature)?;
        key.verify(&payload, &signature)
            .map_err(|_| TokenError::BadSignature)?;

        if Utc::now() > self.claims.valid_until {
            return Err(TokenError::Expired);
        }
        Ok(&self.claims)
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD.encode(data)
}

fn base64_url_decode(s: &str) -> Result<Vec<u8>, TokenError> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD
        .decode(s.trim())
        .map_err(|_| TokenError::Malformed)
}

/// Parse a 64-character hex Ed25519 seed.
pub fn signing_key_from_hex(hex_seed: &str) -> Result<SigningKey, String> {
    let bytes = hex::decode(hex_seed.trim()).map_err(|e| format!("invalid hex: {e}"))?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| format!("expected 32 bytes, got {}", v.len()))?;
    Ok(SigningKey::from_bytes(&seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::rngs::OsRng;

    fn claims(valid_for: Duration) -> SessionClaims {
        SessionClaims {
            user_id: UserId::new(),
            role: Role::Supervisor,
            valid_until: Utc::now() + valid_for,
        }
    }

    #[test]
    fn test_token_roundtrip() {
        let key = SigningKey::generate(&mut OsRng);
        let issued = SessionToken::issue(claims(Duration::hours(1)), &key).unwrap();

        let code = issued.encode().unwrap();
        let decoded = SessionToken::decode(&code).unwrap();
        let verified = decoded.verify(&key.verifying_key()).unwrap();
        assert_eq!(verified, &issued.claims);
    }

    #[test]
    fn test_expired_token_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let token = SessionToken::issue(claims(Duration::hours(-1)), &key).unwrap();
        assert!(matches!(
            token.verify(&key.verifying_key()),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_tampered_role_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let mut token = SessionToken::issue(claims(Duration::hours(1)), &key).unwrap();
        token.claims.role = Role::Admin;
        assert!(matches!(
            token.verify(&key.verifying_key()),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng);
        let token = SessionToken::issue(claims(Duration::hours(1)), &key).unwrap();
        assert!(token.verify(&other.verifying_key()).is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            SessionToken::decode("not a token!"),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_signing_key_from_hex() {
        let key = signing_key_from_hex(&"ab".repeat(32)).unwrap();
        assert_eq!(key.to_bytes(), [0xab; 32]);
        assert!(signing_key_from_hex("abcd").is_err());
    }
}
