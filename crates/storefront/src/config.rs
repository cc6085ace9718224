//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `PETHUB_API_URL` - Base URL of the PetHub REST API
//!   (default: <https://petshop-api-6gix.onrender.com>)
//! - `PETHUB_AUTH_TOKEN` - Bearer token of a logged-in shopper
//! - `PETHUB_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `PETHUB_CACHE_DIR` - Directory holding the local cart cache (default: .pethub)
//! - `PETHUB_SHIPPING_FEE` - Flat shipping fee per order (default: 20)
//! - `PETHUB_RETAIN_FAILED_SYNC` - Keep un-syncable cart items in the local
//!   cache instead of dropping them (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use pethub_core::{DEFAULT_SHIPPING_FEE, Price};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "https://petshop-api-6gix.onrender.com";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_DIR: &str = ".pethub";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront client configuration.
///
/// Implements `Debug` manually to redact the auth token.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// Base URL of the REST API
    pub api_url: Url,
    /// Bearer token of the logged-in shopper, if any
    pub auth_token: Option<SecretString>,
    /// Transport-level timeout applied to every request
    pub request_timeout: Duration,
    /// Directory holding the durable local cart cache
    pub cache_dir: PathBuf,
    /// Flat shipping fee charged per order
    pub shipping_fee: Price,
    /// Keep items that failed to reconcile instead of dropping them
    pub retain_failed_sync: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("api_url", &self.api_url.as_str())
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .field("cache_dir", &self.cache_dir)
            .field("shipping_fee", &self.shipping_fee)
            .field("retain_failed_sync", &self.retain_failed_sync)
            .field("sentry_dsn", &self.sentry_dsn)
            .finish()
    }
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            auth_token: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            shipping_fee: Price::from_whole(DEFAULT_SHIPPING_FEE),
            retain_failed_sync: false,
            sentry_dsn: None,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid, or if the
    /// auth token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_env_or_default("PETHUB_API_URL", DEFAULT_API_URL))?;
        let auth_token = get_optional_env("PETHUB_AUTH_TOKEN")
            .map(|token| {
                validate_secret_strength(&token, "PETHUB_AUTH_TOKEN")?;
                Ok::<_, ConfigError>(SecretString::from(token))
            })
            .transpose()?;
        let timeout_secs = parse_env::<u64>(
            "PETHUB_REQUEST_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PETHUB_REQUEST_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let cache_dir = PathBuf::from(get_env_or_default("PETHUB_CACHE_DIR", DEFAULT_CACHE_DIR));
        let shipping_fee = parse_shipping_fee(&get_env_or_default(
            "PETHUB_SHIPPING_FEE",
            &DEFAULT_SHIPPING_FEE.to_string(),
        ))?;
        let retain_failed_sync = parse_env::<bool>("PETHUB_RETAIN_FAILED_SYNC", "false")?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api_url,
            auth_token,
            request_timeout: Duration::from_secs(timeout_secs),
            cache_dir,
            shipping_fee,
            retain_failed_sync,
            sentry_dsn,
        })
    }

    /// Builder-style override of the auth token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(SecretString::from(token.into()));
        self
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("PETHUB_API_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "PETHUB_API_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_shipping_fee(raw: &str) -> Result<Price, ConfigError> {
    let amount = Decimal::from_str(raw.trim()).map_err(|e| {
        ConfigError::InvalidEnvVar("PETHUB_SHIPPING_FEE".to_string(), e.to_string())
    })?;
    if amount.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            "PETHUB_SHIPPING_FEE".to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(Price::new(amount))
}

/// Parse an environment variable with a default value.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Issued tokens (JWTs) are base64 and comfortably above this threshold
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Expose a token for an `Authorization` header.
pub(crate) fn bearer(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}
