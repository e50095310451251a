//! Configuration management infrastructure.
//!
//! Signing preferences, timestamp servers and trust roots persisted as TOML,
//! with JSON and YAML export/import.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::timestamp_http_client::TimestampHttpConfig;
use crate::domain::crypto::HashAlgorithm;
use crate::domain::style::resolve_style;
use crate::domain::types::TimestampUrl;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::timestamp_applier::{TimestampFlavor, TimestampPolicy};

/// Application configuration with all signing preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfiguration {
    /// Default hash algorithm
    pub default_hash_algorithm: String,

    /// Style used when none can be resolved from the file name
    pub default_style: Option<String>,

    /// Primary timestamp server; `None` disables timestamping
    pub primary_timestamp_server: Option<String>,

    /// Fallback timestamp servers
    pub fallback_timestamp_servers: Vec<String>,

    /// Network timeout settings
    pub network_timeout_seconds: u64,

    /// Number of retry attempts per timestamp server
    pub retry_attempts: usize,

    pub retry_delay_millis: u64,

    /// Fail signing when no timestamp can be obtained
    pub timestamp_required: bool,

    /// Attribute the timestamp token is stored under
    pub timestamp_flavor: TimestampFlavorSetting,

    /// PEM bundle of trusted roots used by `verify`
    pub trust_roots: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampFlavorSetting {
    Rfc3161,
    #[default]
    Authenticode,
}

impl From<TimestampFlavorSetting> for TimestampFlavor {
    fn from(setting: TimestampFlavorSetting) -> Self {
        match setting {
            TimestampFlavorSetting::Rfc3161 => TimestampFlavor::Rfc3161,
            TimestampFlavorSetting::Authenticode => TimestampFlavor::Authenticode,
        }
    }
}

impl Default for SigningConfiguration {
    fn default() -> Self {
        Self {
            default_hash_algorithm: "sha256".to_string(),
            default_style: None,
            primary_timestamp_server: Some("http://timestamp.digicert.com".to_string()),
            fallback_timestamp_servers: vec![
                "http://timestamp.sectigo.com".to_string(),
                "http://ts.ssl.com".to_string(),
            ],
            network_timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_millis: 500,
            timestamp_required: false,
            timestamp_flavor: TimestampFlavorSetting::default(),
            trust_roots: None,
        }
    }
}

impl SigningConfiguration {
    pub fn hash_algorithm(&self) -> SigningResult<HashAlgorithm> {
        self.default_hash_algorithm.parse::<HashAlgorithm>().map_err(|_| {
            SigningError::ConfigurationError(format!(
                "Invalid hash algorithm: {}",
                self.default_hash_algorithm
            ))
        })
    }

    pub fn timestamp_policy(&self) -> TimestampPolicy {
        TimestampPolicy {
            required: self.timestamp_required,
            flavor: self.timestamp_flavor.into(),
            timeout: Duration::from_secs(self.network_timeout_seconds),
        }
    }

    /// HTTP settings for the configured servers, or `None` when timestamping
    /// is disabled.
    pub fn timestamp_http_config(&self) -> SigningResult<Option<TimestampHttpConfig>> {
        let Some(primary) = &self.primary_timestamp_server else {
            return Ok(None);
        };
        let fallbacks = self
            .fallback_timestamp_servers
            .iter()
            .map(TimestampUrl::new)
            .collect::<SigningResult<Vec<_>>>()?;
        Ok(Some(TimestampHttpConfig {
            primary: TimestampUrl::new(primary)?,
            fallbacks,
            timeout: Duration::from_secs(self.network_timeout_seconds),
            retries_per_server: self.retry_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_millis),
        }))
    }

    /// Validate configuration values
    pub fn validate(&self) -> SigningResult<()> {
        self.hash_algorithm()?;

        if let Some(style) = &self.default_style {
            if resolve_style(style).is_none() {
                return Err(SigningError::ConfigurationError(format!(
                    "Invalid default style: {style}"
                )));
            }
        }

        self.timestamp_http_config()?;

        if self.network_timeout_seconds == 0 {
            return Err(SigningError::ConfigurationError(
                "Network timeout must be greater than 0".to_string(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(SigningError::ConfigurationError(
                "Retry attempts must be greater than 0".to_string(),
            ));
        }
        if self.timestamp_required && self.primary_timestamp_server.is_none() {
            return Err(SigningError::ConfigurationError(
                "A timestamp is required but no timestamp server is configured".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> SigningResult<Self> {
        Ok(Self {
            config_path: Self::default_config_path(),
        })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(config_dir) => config_dir.join("script-signer").join("config.toml"),
            None => PathBuf::from("script-signer-config.toml"),
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> SigningResult<SigningConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = SigningConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> SigningResult<SigningConfiguration> {
        log::debug!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: SigningConfiguration = toml::from_str(&content).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &SigningConfiguration) -> SigningResult<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SigningError::ConfigurationError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> SigningResult<()> {
        let mut config = self.load_or_create_default()?;

        match key {
            "default_hash_algorithm" => config.default_hash_algorithm = value.to_string(),
            "default_style" => config.default_style = Some(value.to_string()),
            "primary_timestamp_server" => {
                config.primary_timestamp_server = match value {
                    "" | "none" => None,
                    url => Some(url.to_string()),
                }
            }
            "timestamp_required" => config.timestamp_required = parse_bool(value)?,
            "timestamp_flavor" => {
                config.timestamp_flavor = match value.to_ascii_lowercase().as_str() {
                    "rfc3161" => TimestampFlavorSetting::Rfc3161,
                    "authenticode" => TimestampFlavorSetting::Authenticode,
                    _ => {
                        return Err(SigningError::ConfigurationError(format!(
                            "Invalid timestamp flavor: {value}"
                        )))
                    }
                }
            }
            "network_timeout_seconds" => {
                config.network_timeout_seconds = value.parse().map_err(|_| {
                    SigningError::ConfigurationError(format!("Invalid number: {value}"))
                })?;
            }
            "retry_attempts" => {
                config.retry_attempts = value.parse().map_err(|_| {
                    SigningError::ConfigurationError(format!("Invalid number: {value}"))
                })?;
            }
            "trust_roots" => config.trust_roots = Some(PathBuf::from(value)),
            _ => {
                return Err(SigningError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        config.validate()?;
        self.save(&config)
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Export configuration as a portable format
    pub fn export_config(&self, format: ExportFormat) -> SigningResult<String> {
        let config = self.load()?;

        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("TOML export failed: {e}"))),
            ExportFormat::Json => serde_json::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("JSON export failed: {e}"))),
            ExportFormat::Yaml => serde_yaml::to_string(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("YAML export failed: {e}"))),
        }
    }

    /// Import configuration from a string
    pub fn import_config(&self, content: &str, format: ExportFormat) -> SigningResult<()> {
        let config: SigningConfiguration = match format {
            ExportFormat::Toml => toml::from_str(content).map_err(|e| {
                SigningError::ConfigurationError(format!("TOML import failed: {e}"))
            })?,
            ExportFormat::Json => serde_json::from_str(content).map_err(|e| {
                SigningError::ConfigurationError(format!("JSON import failed: {e}"))
            })?,
            ExportFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                SigningError::ConfigurationError(format!("YAML import failed: {e}"))
            })?,
        };

        config.validate()?;
        self.save(&config)
    }
}

fn parse_bool(value: &str) -> SigningResult<bool> {
    value
        .parse()
        .map_err(|_| SigningError::ConfigurationError(format!("Invalid boolean value: {value}")))
}

/// Configuration export/import formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Toml,
    Json,
    Yaml,
}

impl std::str::FromStr for ExportFormat {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "toml" => Ok(ExportFormat::Toml),
            "json" => Ok(ExportFormat::Json),
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            _ => Err(SigningError::ConfigurationError(format!(
                "Unknown export format: {s}"
            ))),
        }
    }
}
