// ============================
// backend-lib/src/config.rs
// ============================
//! Configuration management.
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level filter, e.g. "info" or "backend_lib=debug"
    pub log_level: String,
    /// Token verification and issuance
    pub auth: AuthSettings,
    /// Realtime channel tuning
    pub realtime: RealtimeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HS256 signing secret for issued tokens
    pub jwt_secret: String,
    /// Lifetime of issued tokens in seconds
    pub token_ttl_secs: u64,
    /// Accept the fixed demo-token table in addition to signed tokens.
    /// A demo feature, not a security feature.
    pub demo_tokens: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    /// Budget for credential verification and the user lookup during the
    /// connection handshake. Connections stuck here are dropped.
    pub handshake_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:4000".parse().unwrap(),
            log_level: "info".to_string(),
            auth: AuthSettings::default(),
            realtime: RealtimeSettings::default(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: "fallback-secret-change-in-production".to_string(),
            token_ttl_secs: 60 * 60 * 24 * 7, // 7 days
            demo_tokens: true,
        }
    }
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Load settings from `checkin.toml` and `CHECKIN_`-prefixed
    /// environment variables, over built-in defaults.
    pub fn load() -> Result<Self> {
        Self::load_from("checkin.toml")
    }

    /// Load settings from an explicit config file path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CHECKIN_").split("__"))
            .extract()?;
        Ok(settings)
    }
}
