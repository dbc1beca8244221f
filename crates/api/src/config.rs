//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ATTENDANCE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `JWT_SECRET` - HS256 key used to verify user bearer tokens (min 32 chars, high entropy)
//! - `AI_API_URL` - Base URL of the biometric matching service
//!
//! ## Optional
//! - `ATTENDANCE_HOST` - Bind address (default: 127.0.0.1)
//! - `ATTENDANCE_PORT` - Listen port (default: 8000)
//! - `AI_TIMEOUT_SECS` - Timeout for each biometric call (default: 30)
//! - `UPLOAD_DIR` - Directory for check-in images (default: uploads)
//! - `UPLOAD_URL_PREFIX` - Path prefix images are served under (default: /uploads)
//! - `MAX_UPLOAD_BYTES` - Multipart body limit (default: 10 MiB)
//! - `RECORD_REJECTED_ATTEMPTS` - Also log out-of-area and face-mismatch attempts (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default timeout for calls to the biometric service.
///
/// The biometric contract fixes this at 30 s per call; `AI_TIMEOUT_SECS`
/// only exists to override it in tests and local setups.
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;

/// Default multipart body limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "change-this",
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

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// HS256 key for user bearer tokens
    pub jwt_secret: SecretString,
    /// Biometric service configuration
    pub biometric: BiometricConfig,
    /// Check-in image storage configuration
    pub uploads: UploadConfig,
    /// Persist rejected check-in attempts as audit rows
    pub record_rejected_attempts: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions sent to Sentry
    pub sentry_traces_sample_rate: f32,
}

/// Biometric matching service configuration.
#[derive(Debug, Clone)]
pub struct BiometricConfig {
    /// Base URL; `register-face` and `verify-face` are resolved against it
    pub base_url: Url,
    /// Timeout applied to each call (30 s unless `AI_TIMEOUT_SECS` overrides it)
    pub timeout: Duration,
}

/// Where check-in images are written and how they are addressed.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory images are written to
    pub dir: PathBuf,
    /// URL path prefix the directory is served under
    pub url_prefix: String,
    /// Maximum accepted multipart body size
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            url_prefix: "/uploads".to_string(),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ApiConfig {
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

        let database_url = get_database_url("ATTENDANCE_DATABASE_URL")?;
        let host = parse_env("ATTENDANCE_HOST", "127.0.0.1")?;
        let port = parse_env("ATTENDANCE_PORT", "8000")?;

        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "JWT_SECRET")?;

        let biometric = BiometricConfig::from_env()?;
        let uploads = UploadConfig::from_env()?;
        let record_rejected_attempts = parse_bool_env("RECORD_REJECTED_ATTEMPTS")?;

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            biometric,
            uploads,
            record_rejected_attempts,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl BiometricConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = get_required_env("AI_API_URL")?;
        let base_url = parse_base_url(&raw)
            .map_err(|e| ConfigError::InvalidEnvVar("AI_API_URL".to_string(), e))?;
        // Per-call timeout; the biometric contract value is 30 s.
        let timeout_secs: u64 =
            parse_env("AI_TIMEOUT_SECS", &DEFAULT_AI_TIMEOUT_SECS.to_string())?;

        Ok(Self {
            base_url,
            timeout: biometric_timeout(timeout_secs)?,
        })
    }
}

fn biometric_timeout(secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "AI_TIMEOUT_SECS".to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

impl UploadConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_prefix = get_env_or_default("UPLOAD_URL_PREFIX", "/uploads");
        let url_prefix = raw_prefix.trim_end_matches('/');
        if !url_prefix.starts_with('/') {
            return Err(ConfigError::InvalidEnvVar(
                "UPLOAD_URL_PREFIX".to_string(),
                "must be an absolute path such as /uploads".to_string(),
            ));
        }

        Ok(Self {
            dir: PathBuf::from(get_env_or_default("UPLOAD_DIR", "uploads")),
            url_prefix: url_prefix.to_string(),
            max_bytes: parse_env("MAX_UPLOAD_BYTES", &DEFAULT_MAX_UPLOAD_BYTES.to_string())?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a base URL, ensuring it ends with `/` so relative joins keep its path.
///
/// # Errors
///
/// Returns a description of the problem if the URL is invalid or not HTTP(S).
pub fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a boolean flag; unset means `false`.
fn parse_bool_env(key: &str) -> Result<bool, ConfigError> {
    match get_optional_env(key) {
        None => Ok(false),
        Some(value) => parse_bool(&value)
            .ok_or_else(|| ConfigError::InvalidEnvVar(key.to_string(), format!("not a boolean: {value}"))),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
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
    fn test_default_jwt_secret_from_legacy_deployments_is_rejected() {
        let result =
            validate_secret_strength("your-very-secret-key-change-this-in-prod", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "JWT_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_secret_length(&secret, "JWT_SECRET").is_err());
    }

    #[test]
    fn test_parse_base_url_appends_slash() {
        let url = parse_base_url("http://ai:5001/v1").unwrap();
        assert_eq!(url.as_str(), "http://ai:5001/v1/");
        assert_eq!(
            url.join("verify-face").unwrap().as_str(),
            "http://ai:5001/v1/verify-face"
        );
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(parse_base_url("ftp://ai/").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_biometric_timeout_defaults_to_thirty_seconds() {
        assert_eq!(
            biometric_timeout(DEFAULT_AI_TIMEOUT_SECS).unwrap(),
            Duration::from_secs(30)
        );
        assert!(biometric_timeout(0).is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_socket_addr() {
        let config = ApiConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8000,
            jwt_secret: SecretString::from("x".repeat(32)),
            biometric: BiometricConfig {
                base_url: parse_base_url("http://localhost:5001").unwrap(),
                timeout: Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS),
            },
            uploads: UploadConfig::default(),
            record_rejected_attempts: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8000);
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let secret = SecretString::from("super_secret_signing_key_value_123");
        let debug_output = format!("{secret:?}");
        assert!(!debug_output.contains("super_secret_signing_key_value_123"));
    }
}
