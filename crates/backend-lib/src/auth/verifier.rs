// ============================
// backend-lib/src/auth/verifier.rs
// ============================
//! Bearer credential verification.
//!
//! One verifier contract with two backing strategies: a fixed demo-token
//! table and HS256 signature verification. Verification fails soft:
//! `None` means "no identity", which read paths treat as anonymous and
//! the realtime handshake treats as a rejection. No strategy ever raises
//! for the common not-logged-in case.

use crate::auth::token::Claims;
use crate::config::AuthSettings;
use checkin_common::Identity;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::collections::HashMap;

/// Contract for turning a bearer credential into an identity claim.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, credential: &str) -> Option<Identity>;
}

/// Fixed demo-identity lookup. A demo feature, not a security feature.
pub struct StaticTokenTable {
    tokens: HashMap<&'static str, Identity>,
}

impl StaticTokenTable {
    pub fn demo() -> Self {
        let entries = [
            ("demo-token-123", "demo-user-id", "demo@example.com"),
            ("john-token-456", "john-user-id", "john@example.com"),
            ("jane-token-789", "jane-user-id", "jane@example.com"),
            ("alice-token-101", "alice-user-id", "alice@example.com"),
            ("bob-token-202", "bob-user-id", "bob@example.com"),
        ];
        let tokens = entries
            .into_iter()
            .map(|(token, user_id, email)| {
                (
                    token,
                    Identity {
                        user_id: user_id.to_string(),
                        email: email.to_string(),
                    },
                )
            })
            .collect();
        Self { tokens }
    }
}

impl TokenVerifier for StaticTokenTable {
    fn verify(&self, credential: &str) -> Option<Identity> {
        self.tokens.get(credential).cloned()
    }
}

/// HS256 signature verification with an expiry claim.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, credential: &str) -> Option<Identity> {
        let data = decode::<Claims>(credential, &self.key, &self.validation).ok()?;
        Some(Identity {
            user_id: data.claims.user_id,
            email: data.claims.email,
        })
    }
}

/// Static table lookup first, signature verification second.
pub struct LayeredVerifier {
    static_table: Option<StaticTokenTable>,
    jwt: JwtVerifier,
}

impl LayeredVerifier {
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            static_table: settings.demo_tokens.then(StaticTokenTable::demo),
            jwt: JwtVerifier::new(&settings.jwt_secret),
        }
    }
}

impl TokenVerifier for LayeredVerifier {
    fn verify(&self, credential: &str) -> Option<Identity> {
        if let Some(identity) = self
            .static_table
            .as_ref()
            .and_then(|table| table.verify(credential))
        {
            return Some(identity);
        }
        self.jwt.verify(credential)
    }
}
