use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Visual Crossing timeline endpoint; the location is appended as a path segment.
pub const DEFAULT_UPSTREAM_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";
pub const DEFAULT_CACHE_ADDR: &str = "localhost:6379";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 2;
pub const DEFAULT_CACHE_RETRIES: usize = 1;

/// Environment variables consulted after the config file.
pub const ENV_API_KEY: &str = "KEY";
pub const ENV_REDIS_ADDR: &str = "REDIS_ADDR";
pub const ENV_REDIS_PASSWORD: &str = "REDIS_PASSWORD";
pub const ENV_REDIS_DB: &str = "REDIS_DB";
pub const ENV_UPSTREAM_URL: &str = "SKYCACHE_UPSTREAM_URL";
pub const ENV_UPSTREAM_TIMEOUT: &str = "SKYCACHE_UPSTREAM_TIMEOUT_SECS";
pub const ENV_UNIT_GROUP: &str = "SKYCACHE_UNIT_GROUP";
pub const ENV_CACHE_TIMEOUT: &str = "SKYCACHE_CACHE_TIMEOUT_SECS";

/// Timeouts above this are accepted but flagged.
const LONG_TIMEOUT_SECS: u64 = 120;
const LONG_CACHE_TIMEOUT_SECS: u64 = 30;
const MANY_CACHE_RETRIES: usize = 5;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream weather provider settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Cache backend settings
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Unit system requested from the provider (`unitGroup` query parameter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitGroup {
    #[default]
    Us,
    Uk,
    Metric,
    Base,
}

impl UnitGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Us => "us",
            Self::Uk => "uk",
            Self::Metric => "metric",
            Self::Base => "base",
        }
    }
}

impl FromStr for UnitGroup {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" => Ok(Self::Us),
            "uk" => Ok(Self::Uk),
            "metric" => Ok(Self::Metric),
            "base" => Ok(Self::Base),
            other => Err(ConfigError::Invalid(format!(
                "unknown unit group '{}', expected us, uk, metric or base",
                other
            ))),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Provider API key (usually supplied via the `KEY` environment variable)
    #[serde(default)]
    pub api_key: String,

    /// Timeline endpoint base URL
    #[serde(default = "default_upstream_url")]
    pub base_url: String,

    /// Unit system for returned values
    #[serde(default)]
    pub unit_group: UnitGroup,

    /// Upper bound for a single upstream request, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check if an API key is present (not a placeholder)
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_key.starts_with("YOUR_")
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_upstream_url(),
            unit_group: UnitGroup::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// Hand-written so the key never reaches logs.
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &redacted(&self.api_key))
            .field("base_url", &self.base_url)
            .field("unit_group", &self.unit_group)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis address as `host:port`
    #[serde(default = "default_cache_addr")]
    pub addr: String,

    /// Redis password, empty for none
    #[serde(default)]
    pub password: String,

    /// Redis logical database index
    #[serde(default)]
    pub db: i64,

    /// Bound on establishing a connection, per attempt, in seconds
    #[serde(default = "default_cache_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Bound on a single command round trip, in seconds
    #[serde(default = "default_cache_timeout_secs")]
    pub response_timeout_secs: u64,

    /// Reconnect attempts after the first failed connection
    #[serde(default = "default_cache_retries")]
    pub retries: usize,
}

fn default_cache_timeout_secs() -> u64 {
    DEFAULT_CACHE_TIMEOUT_SECS
}

fn default_cache_retries() -> usize {
    DEFAULT_CACHE_RETRIES
}

fn default_cache_addr() -> String {
    DEFAULT_CACHE_ADDR.to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            addr: default_cache_addr(),
            password: String::new(),
            db: 0,
            connect_timeout_secs: default_cache_timeout_secs(),
            response_timeout_secs: default_cache_timeout_secs(),
            retries: default_cache_retries(),
        }
    }
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("addr", &self.addr)
            .field("password", &redacted(&self.password))
            .field("db", &self.db)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("response_timeout_secs", &self.response_timeout_secs)
            .field("retries", &self.retries)
            .finish()
    }
}

impl CacheConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// Upper bound on `connect`: every attempt may use the full connect timeout.
    pub fn connect_deadline(&self) -> Duration {
        let attempts = u32::try_from(self.retries.saturating_add(1)).unwrap_or(u32::MAX);
        self.connect_timeout().saturating_mul(attempts)
    }

    /// Build the `redis://` connection URL, including credentials and database.
    pub fn redis_url(&self) -> Result<String, ConfigError> {
        let mut url = Url::parse(&format!("redis://{}/{}", self.addr, self.db))
            .map_err(|e| ConfigError::Invalid(format!("cache.addr: {}", e)))?;

        if !self.password.is_empty() {
            url.set_password(Some(&self.password)).map_err(|_| {
                ConfigError::Invalid("cache.password: cannot be applied to cache address".into())
            })?;
        }

        Ok(url.to_string())
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file, `.env` and the
    /// process environment, in that order.
    ///
    /// An explicit `path` must exist. Without one, the per-user config file is
    /// used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        load_dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = Self::load(path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()))
                .context("Configuration validation failed");
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Read a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    ///
    /// Unparseable numeric or enum values are ignored with a warning and the
    /// previous value is kept.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY) {
            self.upstream.api_key = key;
        }
        if let Some(url) = lookup(ENV_UPSTREAM_URL) {
            self.upstream.base_url = url;
        }
        if let Some(raw) = lookup(ENV_UPSTREAM_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.upstream.timeout_secs = secs,
                Err(_) => tracing::warn!("Ignoring {}={:?}: not a number", ENV_UPSTREAM_TIMEOUT, raw),
            }
        }
        if let Some(raw) = lookup(ENV_UNIT_GROUP) {
            match raw.parse::<UnitGroup>() {
                Ok(unit) => self.upstream.unit_group = unit,
                Err(e) => tracing::warn!("Ignoring {}: {}", ENV_UNIT_GROUP, e),
            }
        }
        if let Some(addr) = lookup(ENV_REDIS_ADDR) {
            self.cache.addr = addr;
        }
        if let Some(password) = lookup(ENV_REDIS_PASSWORD) {
            self.cache.password = password;
        }
        if let Some(raw) = lookup(ENV_CACHE_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => {
                    self.cache.connect_timeout_secs = secs;
                    self.cache.response_timeout_secs = secs;
                }
                Err(_) => tracing::warn!("Ignoring {}={:?}: not a number", ENV_CACHE_TIMEOUT, raw),
            }
        }
        if let Some(raw) = lookup(ENV_REDIS_DB) {
            match raw.trim().parse::<i64>() {
                Ok(db) => self.cache.db = db,
                Err(_) => tracing::warn!("Ignoring {}={:?}: not a number", ENV_REDIS_DB, raw),
            }
        }
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if !self.upstream.has_api_key() {
            result.add_error(
                "upstream.api_key",
                format!("API key is not set (export {})", ENV_API_KEY),
            );
        }

        self.validate_url(&self.upstream.base_url, "upstream.base_url", &mut result);

        if self.upstream.timeout_secs == 0 {
            result.add_error(
                "upstream.timeout_secs",
                "Timeout must be greater than 0",
            );
        } else if self.upstream.timeout_secs > LONG_TIMEOUT_SECS {
            result.add_warning(
                "upstream.timeout_secs",
                format!("Timeout is unusually long (>{}s)", LONG_TIMEOUT_SECS),
            );
        }

        if self.cache.addr.trim().is_empty() {
            result.add_error("cache.addr", "Cache address must not be empty");
        } else if let Err(e) = self.cache.redis_url() {
            result.add_error("cache.addr", e.to_string());
        }

        if self.cache.db < 0 {
            result.add_error("cache.db", "Database index must not be negative");
        }

        for (field, secs) in [
            ("cache.connect_timeout_secs", self.cache.connect_timeout_secs),
            ("cache.response_timeout_secs", self.cache.response_timeout_secs),
        ] {
            if secs == 0 {
                result.add_error(field, "Timeout must be greater than 0");
            } else if secs > LONG_CACHE_TIMEOUT_SECS {
                result.add_warning(
                    field,
                    format!("Timeout is unusually long (>{}s)", LONG_CACHE_TIMEOUT_SECS),
                );
            }
        }

        if self.cache.retries > MANY_CACHE_RETRIES {
            result.add_warning(
                "cache.retries",
                format!(
                    "More than {} retries can stall requests during an outage",
                    MANY_CACHE_RETRIES
                ),
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if let Some(port) = url.port() {
                    if port == 0 {
                        result.add_error(field_name, "Port cannot be 0");
                    }
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Per-user config file location (`<config_dir>/skycache/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("skycache").join("config.toml"))
    }
}

/// Load a `.env` file from the working directory, if any.
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {
            tracing::warn!(".env file not found - using process environment only")
        }
        Err(e) => tracing::warn!("Failed to load .env file: {}", e),
    }
}
