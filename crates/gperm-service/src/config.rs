//! Configuration management for the group permissions service.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use gperm_service::config::ServiceConfig;
//!
//! // Load from file with env overrides
//! let config = ServiceConfig::load("gperm.yaml")?;
//!
//! // Or load from environment only
//! let config = ServiceConfig::from_env()?;
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use gperm_domain::{AccessConfig, CacheConfig, ResolverConfig};

const ENV_PREFIX: &str = "GPERM";

/// Service configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServiceConfig {
    /// Persistent cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// ACL realm settings
    #[serde(default)]
    pub access: AccessSettings,

    /// Permission check settings
    #[serde(default)]
    pub permissions: PermissionSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Persistent cache tier settings.
///
/// Environment variables: `GPERM_CACHE__ENABLED`, `GPERM_CACHE__MAX_CAPACITY`,
/// `GPERM_CACHE__TTL_SECS`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheSettings {
    /// When disabled every lookup recalculates.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum entries per cache bin
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,

    /// Entry lifetime in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: default_max_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_capacity() -> u64 {
    100_000
}

fn default_ttl_secs() -> u64 {
    3600
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        CacheConfig::default()
            .with_enabled(settings.enabled)
            .with_max_capacity(settings.max_capacity)
            .with_ttl(Duration::from_secs(settings.ttl_secs))
    }
}

/// ACL realm settings.
///
/// # Example YAML Configuration
///
/// ```yaml
/// access:
///   published_realm_prefix: group_permissions
///   unpublished_realm_prefix: group_permissions_unpublished
///   shared_grant_id: 1
///   author_records: true
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AccessSettings {
    #[serde(default = "default_published_prefix")]
    pub published_realm_prefix: String,

    #[serde(default = "default_unpublished_prefix")]
    pub unpublished_realm_prefix: String,

    /// Grant id of the catch-all outsider and anonymous realms
    #[serde(default = "default_shared_grant_id")]
    pub shared_grant_id: u64,

    /// Emit per-owner author rows
    #[serde(default = "default_true")]
    pub author_records: bool,
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            published_realm_prefix: default_published_prefix(),
            unpublished_realm_prefix: default_unpublished_prefix(),
            shared_grant_id: default_shared_grant_id(),
            author_records: true,
        }
    }
}

fn default_published_prefix() -> String {
    "group_permissions".to_string()
}

fn default_unpublished_prefix() -> String {
    "group_permissions_unpublished".to_string()
}

fn default_shared_grant_id() -> u64 {
    1
}

impl From<&AccessSettings> for AccessConfig {
    fn from(settings: &AccessSettings) -> Self {
        AccessConfig::default()
            .with_realm_prefixes(
                settings.published_realm_prefix.clone(),
                settings.unpublished_realm_prefix.clone(),
            )
            .with_shared_grant_id(settings.shared_grant_id)
            .with_author_records(settings.author_records)
    }
}

/// Permission check settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PermissionSettings {
    /// Global permission that skips group checks entirely
    #[serde(default = "default_bypass_permission")]
    pub bypass_permission: String,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            bypass_permission: default_bypass_permission(),
        }
    }
}

fn default_bypass_permission() -> String {
    gperm_domain::resolver::DEFAULT_BYPASS_PERMISSION.to_string()
}

impl From<&PermissionSettings> for ResolverConfig {
    fn from(settings: &PermissionSettings) -> Self {
        ResolverConfig::default().with_bypass_permission(settings.bypass_permission.clone())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,

    /// Emit span enter/exit events, e.g. around each calculation
    #[serde(default)]
    pub spans: bool,

    /// Per-target levels layered over `level`, e.g. `gperm_domain: debug`
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            spans: false,
            targets: BTreeMap::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ServiceConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `GPERM_` and use `__` as separator.
    /// For example:
    /// - `GPERM_CACHE__TTL_SECS=30` overrides `cache.ttl_secs`
    /// - `GPERM_PERMISSIONS__BYPASS_PERMISSION=...` overrides `permissions.bypass_permission`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServiceConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(env_source())
            .build()?;

        let service_config: ServiceConfig = config.try_deserialize()?;
        service_config.validate()?;

        Ok(service_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServiceConfig::default())?)
            .add_source(env_source())
            .build()?;

        let service_config: ServiceConfig = config.try_deserialize()?;
        service_config.validate()?;

        Ok(service_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.cache.enabled && self.cache.max_capacity == 0 {
            return Err(invalid("cache.max_capacity must be greater than 0 when the cache is enabled"));
        }

        for (key, prefix) in [
            ("access.published_realm_prefix", &self.access.published_realm_prefix),
            ("access.unpublished_realm_prefix", &self.access.unpublished_realm_prefix),
        ] {
            if prefix.trim().is_empty() {
                return Err(invalid(&format!("{key} cannot be empty")));
            }
            if prefix.contains(':') {
                return Err(invalid(&format!("{key} cannot contain ':', got: {prefix}")));
            }
        }
        if self.access.published_realm_prefix == self.access.unpublished_realm_prefix {
            return Err(invalid(
                "access.published_realm_prefix and access.unpublished_realm_prefix must differ",
            ));
        }

        if self.permissions.bypass_permission.trim().is_empty() {
            return Err(invalid("permissions.bypass_permission cannot be empty"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(invalid(&format!(
                "logging.level must be one of: {:?}, got: {}",
                valid_levels, self.logging.level
            )));
        }
        for (target, level) in &self.logging.targets {
            if target.trim().is_empty() || target.contains([',', '=']) {
                return Err(invalid(&format!(
                    "logging.targets has an invalid target name: {target:?}"
                )));
            }
            if !valid_levels.contains(&level.to_lowercase().as_str()) {
                return Err(invalid(&format!(
                    "logging.targets.{target} must be one of: {valid_levels:?}, got: {level}"
                )));
            }
        }

        Ok(())
    }
}

/// `GPERM_CACHE__TTL_SECS` -> `cache.ttl_secs`.
fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

fn invalid(message: &str) -> ConfigLoadError {
    ConfigLoadError::Invalid {
        message: message.to_string(),
    }
}
