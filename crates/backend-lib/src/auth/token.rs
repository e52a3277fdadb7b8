// ============================
// backend-lib/src/auth/token.rs
// ============================
//! Signed token issuance.
use crate::config::AuthSettings;
use crate::error::AppError;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Claims carried by an issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub exp: i64,
}

/// Issues HS256 tokens for authenticated users.
pub struct TokenIssuer {
    key: EncodingKey,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            key: EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
            ttl_secs: settings.token_ttl_secs as i64,
        }
    }

    /// Sign a token for the given user.
    pub fn issue(&self, user_id: &str, email: &str) -> Result<String, AppError> {
        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            exp: Utc::now().timestamp() + self.ttl_secs,
        };
        encode(&Header::default(), &claims, &self.key)
            .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthSettings;

    #[test]
    fn issued_tokens_are_distinct_per_user() {
        let issuer = TokenIssuer::new(&AuthSettings::default());
        let a = issuer.issue("user-a", "a@example.com").unwrap();
        let b = issuer.issue("user-b", "b@example.com").unwrap();
        assert_ne!(a, b);
        // three dot-separated JWT segments
        assert_eq!(a.split('.').count(), 3);
    }
}
