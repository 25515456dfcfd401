//! User authentication for Sentra.
//!
//! Exchanges a username and password for identity tokens.

mod cognito;
mod mock;

pub use cognito::CognitoIdentityProvider;
pub use mock::MockIdentityProvider;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Result, SentraError};

/// Tokens issued after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i32,
}

/// Trait defining the interface for identity providers.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticates a user. Rejections are `SentraError::Auth` with the
    /// matching [`crate::error::AuthFailure`] kind.
    async fn login(&self, username: &str, password: &str) -> Result<Tokens>;
}

/// Computes the client secret hash sent alongside user credentials:
/// base64 of HMAC-SHA256 keyed by the client secret over `username + client_id`.
pub fn secret_hash(username: &str, client_id: &str, client_secret: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(client_secret.as_bytes())
        .map_err(|e| SentraError::internal(format!("Invalid HMAC key: {e}")))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_hash_matches_reference_hmac() {
        // HMAC-SHA256(key="key", "The quick brown fox jumps over the lazy dog")
        let hash = secret_hash("The quick brown fox ", "jumps over the lazy dog", "key").unwrap();
        assert_eq!(hash, "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg=");
    }

    #[test]
    fn test_secret_hash_depends_on_username() {
        let a = secret_hash("vishal.saxena", "client", "secret").unwrap();
        let b = secret_hash("harsh.kumar", "client", "secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tokens_serialize_with_snake_case_fields() {
        let tokens = Tokens {
            id_token: "id".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
        };
        let json = serde_json::to_value(&tokens).unwrap();
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 3600);
    }
}
