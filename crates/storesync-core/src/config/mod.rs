//! Runtime configuration for sync jobs.
//!
//! `SyncSettings` carries process-wide knobs (database path, timeouts), while
//! `StoreConnection` describes one remote store. Both are built from a lookup
//! closure so tests never touch the real environment.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::is_http_url;

const DEFAULT_DB_PATH: &str = "storesync.db";
const DEFAULT_JOB_TIMEOUT_SECS: &str = "1800";
const DEFAULT_HTTP_TIMEOUT_SECS: &str = "30";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Whether TLS certificates presented by the remote store are verified.
///
/// `AcceptInvalidCertificates` exists for non-production diagnostics only and
/// must be chosen explicitly per store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsPolicy {
    #[default]
    Verify,
    AcceptInvalidCertificates,
}

impl TlsPolicy {
    pub const fn from_insecure_flag(insecure: bool) -> Self {
        if insecure {
            Self::AcceptInvalidCertificates
        } else {
            Self::Verify
        }
    }

    pub const fn accepts_invalid_certificates(self) -> bool {
        matches!(self, Self::AcceptInvalidCertificates)
    }
}

/// Credentials and connection policy for one remote store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConnection {
    pub store_id: String,
    pub base_url: String,
    pub api_key: String,
    pub secret_key: String,
    pub active: bool,
    pub tls: TlsPolicy,
}

impl fmt::Debug for StoreConnection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StoreConnection")
            .field("store_id", &self.store_id)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("secret_key", &"[REDACTED]")
            .field("active", &self.active)
            .field("tls", &self.tls)
            .finish()
    }
}

impl StoreConnection {
    /// Build a validated connection. The base URL is stored without a trailing slash.
    pub fn new(
        store_id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let store_id = store_id.into().trim().to_string();
        if store_id.is_empty() {
            return Err(ConfigError::Invalid("store id must not be empty".to_string()));
        }

        let base_url = base_url.into();
        let base_url = trim_trailing(base_url.trim()).to_string();
        if !is_http_url(&base_url) {
            return Err(ConfigError::Invalid(
                "store url must start with http:// or https://".to_string(),
            ));
        }

        let api_key = api_key.into().trim().to_string();
        let secret_key = secret_key.into().trim().to_string();
        if api_key.is_empty() || secret_key.is_empty() {
            return Err(ConfigError::Invalid(
                "store api key and secret key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            store_id,
            base_url,
            api_key,
            secret_key,
            active: true,
            tls: TlsPolicy::Verify,
        })
    }

    #[must_use]
    pub const fn with_tls(mut self, tls: TlsPolicy) -> Self {
        self.tls = tls;
        self
    }

    #[must_use]
    pub const fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store_id = required_trimmed(&lookup, "STORESYNC_STORE_ID")?;
        let base_url = required_trimmed(&lookup, "STORESYNC_STORE_URL")?;
        let api_key = required_trimmed(&lookup, "STORESYNC_API_KEY")?;
        let secret_key = required_trimmed(&lookup, "STORESYNC_SECRET_KEY")?;
        let insecure = parse_bool(&lookup, "STORESYNC_INSECURE_TLS", false)?;
        let active = parse_bool(&lookup, "STORESYNC_STORE_ACTIVE", true)?;

        Ok(Self::new(store_id, base_url, api_key, secret_key)?
            .with_tls(TlsPolicy::from_insecure_flag(insecure))
            .with_active(active))
    }
}

/// Process-wide settings shared by every job the orchestrator starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub db_path: PathBuf,
    pub job_timeout: Duration,
    pub http_timeout: Duration,
    pub user_agent: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            job_timeout: Duration::from_secs(1_800),
            http_timeout: Duration::from_secs(30),
            user_agent: default_user_agent(),
        }
    }
}

impl SyncSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path = PathBuf::from(value_or_default(
            &lookup,
            "STORESYNC_DB_PATH",
            DEFAULT_DB_PATH,
        ));

        let job_timeout_secs =
            value_or_default(&lookup, "STORESYNC_JOB_TIMEOUT_SECS", DEFAULT_JOB_TIMEOUT_SECS)
                .parse::<u64>()
                .map_err(|_| {
                    ConfigError::Invalid(
                        "STORESYNC_JOB_TIMEOUT_SECS must be an integer in [10, 86400]".to_string(),
                    )
                })?;
        if !(10..=86_400).contains(&job_timeout_secs) {
            return Err(ConfigError::Invalid(
                "STORESYNC_JOB_TIMEOUT_SECS must be in [10, 86400]".to_string(),
            ));
        }

        let http_timeout_secs = value_or_default(
            &lookup,
            "STORESYNC_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )
        .parse::<u64>()
        .map_err(|_| {
            ConfigError::Invalid(
                "STORESYNC_HTTP_TIMEOUT_SECS must be an integer in [1, 600]".to_string(),
            )
        })?;
        if !(1..=600).contains(&http_timeout_secs) {
            return Err(ConfigError::Invalid(
                "STORESYNC_HTTP_TIMEOUT_SECS must be in [1, 600]".to_string(),
            ));
        }

        let user_agent = optional_trimmed(&lookup, "STORESYNC_USER_AGENT")
            .unwrap_or_else(default_user_agent);

        Ok(Self {
            db_path,
            job_timeout: Duration::from_secs(job_timeout_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            user_agent,
        })
    }
}

fn default_user_agent() -> String {
    format!("storesync/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_bool(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = optional_trimmed(lookup, name) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!("{name} must be a boolean"))),
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn trim_trailing(value: &str) -> &str {
    value.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(map: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| map.get(key).map(|value| (*value).to_string())
    }

    #[test]
    fn settings_use_defaults_when_unset() {
        let settings = SyncSettings::from_lookup(lookup_from(HashMap::new())).unwrap();
        assert_eq!(settings.db_path, PathBuf::from("storesync.db"));
        assert_eq!(settings.job_timeout, Duration::from_secs(1_800));
        assert_eq!(settings.http_timeout, Duration::from_secs(30));
        assert!(settings.user_agent.starts_with("storesync/"));
    }

    #[test]
    fn settings_reject_out_of_range_timeouts() {
        let mut map = HashMap::new();
        map.insert("STORESYNC_JOB_TIMEOUT_SECS", "5");
        let err = SyncSettings::from_lookup(lookup_from(map)).unwrap_err();
        assert!(err.to_string().contains("STORESYNC_JOB_TIMEOUT_SECS"));

        let mut map = HashMap::new();
        map.insert("STORESYNC_HTTP_TIMEOUT_SECS", "soon");
        let err = SyncSettings::from_lookup(lookup_from(map)).unwrap_err();
        assert!(err.to_string().contains("STORESYNC_HTTP_TIMEOUT_SECS"));
    }

    #[test]
    fn store_connection_requires_credentials() {
        let mut map = HashMap::new();
        map.insert("STORESYNC_STORE_ID", "store-1");
        map.insert("STORESYNC_STORE_URL", "https://shop.example.com");
        let err = StoreConnection::from_lookup(lookup_from(map)).unwrap_err();
        assert!(err.to_string().contains("STORESYNC_API_KEY"));
    }

    #[test]
    fn store_connection_parses_tls_policy_and_trims_url() {
        let mut map = HashMap::new();
        map.insert("STORESYNC_STORE_ID", "store-1");
        map.insert("STORESYNC_STORE_URL", "https://shop.example.com/");
        map.insert("STORESYNC_API_KEY", "ck_live");
        map.insert("STORESYNC_SECRET_KEY", "cs_live");
        map.insert("STORESYNC_INSECURE_TLS", "true");

        let store = StoreConnection::from_lookup(lookup_from(map)).unwrap();
        assert_eq!(store.base_url, "https://shop.example.com");
        assert_eq!(store.tls, TlsPolicy::AcceptInvalidCertificates);
        assert!(store.active);
    }

    #[test]
    fn store_connection_rejects_non_http_url() {
        let err = StoreConnection::new("s", "shop.example.com", "ck", "cs").unwrap_err();
        assert!(err.to_string().contains("http:// or https://"));
    }

    #[test]
    fn store_connection_debug_redacts_secret() {
        let store =
            StoreConnection::new("s", "https://shop.example.com", "ck_1", "cs_sensitive").unwrap();
        let debug = format!("{store:?}");
        assert!(!debug.contains("cs_sensitive"));
        assert!(debug.contains("[REDACTED]"));
    }
}
