//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ERP_URL` - Base URL of the ERPNext instance (e.g. `https://erp.example.de`)
//! - `ERP_API_KEY` - API key of the ERP integration user
//! - `ERP_API_SECRET` - API secret of the ERP integration user (high entropy)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_TRUST_USER_HEADER` - Accept the `x-user` header from a
//!   fronting proxy as identity (default: false)
//! - `ERP_TIMEOUT_SECS` - Outbound request timeout (default: 15)
//! - `ERP_CACHE_TTL_SECS` - Catalogue / price / customer cache TTL (default: 300)
//! - `ERP_PRICE_METHOD` - Whitelisted method returning a user's price list
//! - `ERP_REGISTER_METHOD` - Guest method creating a customer registration
//! - `ERP_NEW_ARRIVALS_METHOD` - Method listing new arrivals (default: `nuovi_arrivi`)
//! - `ERP_PRINT_LANGUAGE` - Language of print view links (default: de)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_PRICE_METHOD: &str = "nexterp_customizations.api.shop.get_prezzi_per_listino";
const DEFAULT_REGISTER_METHOD: &str = "nexterp_customizations.api.register_customer";
const DEFAULT_NEW_ARRIVALS_METHOD: &str = "nuovi_arrivi";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Whether an `x-user` request header may identify the caller
    pub trust_user_header: bool,
    /// ERPNext connection
    pub erp: ErpConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate
    pub sentry_traces_sample_rate: f32,
}

/// ERPNext connection configuration.
///
/// Implements `Debug` manually to redact the API secret.
#[derive(Clone)]
pub struct ErpConfig {
    /// Base URL, without trailing path
    pub url: Url,
    /// API key of the integration user
    pub api_key: String,
    /// API secret of the integration user
    pub api_secret: SecretString,
    /// Outbound request timeout
    pub timeout: Duration,
    /// TTL of cached ERP reads
    pub cache_ttl: Duration,
    /// Dotted path of the personalized price method
    pub price_method: String,
    /// Dotted path of the registration method
    pub register_method: String,
    /// Dotted path of the new arrivals method
    pub new_arrivals_method: String,
    /// `_lang` of print view links
    pub print_language: String,
}

impl std::fmt::Debug for ErpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErpConfig")
            .field("url", &self.url.as_str())
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("cache_ttl", &self.cache_ttl)
            .field("price_method", &self.price_method)
            .field("register_method", &self.register_method)
            .field("new_arrivals_method", &self.new_arrivals_method)
            .field("print_language", &self.print_language)
            .finish()
    }
}

impl ErpConfig {
    /// Configuration pointing at `url` with default timeouts and methods.
    ///
    /// Used by tests that run against a mock ERP.
    #[must_use]
    pub fn new(url: Url, api_key: impl Into<String>, api_secret: SecretString) -> Self {
        Self {
            url,
            api_key: api_key.into(),
            api_secret,
            timeout: Duration::from_secs(15),
            cache_ttl: Duration::from_secs(300),
            price_method: DEFAULT_PRICE_METHOD.to_string(),
            register_method: DEFAULT_REGISTER_METHOD.to_string(),
            new_arrivals_method: DEFAULT_NEW_ARRIVALS_METHOD.to_string(),
            print_language: "de".to_string(),
        }
    }

    /// `Authorization` header value for server-to-server calls.
    #[must_use]
    pub fn token_header(&self) -> SecretString {
        SecretString::from(format!(
            "token {}:{}",
            self.api_key,
            self.api_secret.expose_secret()
        ))
    }

    fn from_env() -> Result<Self, ConfigError> {
        let url = get_required_env("ERP_URL")?;
        let url = Url::parse(url.trim_end_matches('/'))
            .map_err(|e| ConfigError::InvalidEnvVar("ERP_URL".to_string(), e.to_string()))?;

        Ok(Self {
            url,
            api_key: get_required_env("ERP_API_KEY")?,
            api_secret: get_validated_secret("ERP_API_SECRET")?,
            timeout: Duration::from_secs(get_parsed_or_default("ERP_TIMEOUT_SECS", 15)?),
            cache_ttl: Duration::from_secs(get_parsed_or_default("ERP_CACHE_TTL_SECS", 300)?),
            price_method: get_env_or_default("ERP_PRICE_METHOD", DEFAULT_PRICE_METHOD),
            register_method: get_env_or_default("ERP_REGISTER_METHOD", DEFAULT_REGISTER_METHOD),
            new_arrivals_method: get_env_or_default(
                "ERP_NEW_ARRIVALS_METHOD",
                DEFAULT_NEW_ARRIVALS_METHOD,
            ),
            print_language: get_env_or_default("ERP_PRINT_LANGUAGE", "de"),
        })
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_parsed_or_default("STOREFRONT_PORT", 3000)?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let trust_user_header = get_parsed_or_default("STOREFRONT_TRUST_USER_HEADER", false)?;

        let erp = ErpConfig::from_env()?;

        Ok(Self {
            host,
            port,
            base_url,
            trust_user_header,
            erp,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_or_default("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: get_parsed_or_default("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    /// Configuration for tests: localhost, no Sentry, untrusted `x-user`.
    #[must_use]
    pub fn for_erp(erp: ErpConfig) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            trust_user_header: false,
            erp,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
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
    let len = s.len() as f64;
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

    // ERPNext generates 15-char hex secrets; require them to look random
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Regenerate the API secret in ERPNext."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn erp_config() -> ErpConfig {
        ErpConfig::new(
            Url::parse("https://erp.test").unwrap(),
            "key123",
            SecretString::from("7d1f0e9c2b4a8e3"),
        )
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-secret", "ERP_API_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaa", "ERP_API_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_erp_style_secret() {
        assert!(validate_secret_strength("7d1f0e9c2b4a8e3", "ERP_API_SECRET").is_ok());
    }

    #[test]
    fn test_token_header() {
        let header = erp_config().token_header();
        assert_eq!(header.expose_secret(), "token key123:7d1f0e9c2b4a8e3");
    }

    #[test]
    fn test_socket_addr_and_secure_flag() {
        let mut config = StorefrontConfig::for_erp(erp_config());
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert!(!config.is_secure());
        config.base_url = "https://shop.sudimport.de".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_erp_config_debug_redacts_secret() {
        let debug_output = format!("{:?}", erp_config());
        assert!(debug_output.contains("key123"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("7d1f0e9c2b4a8e3"));
    }
}
