//! Export configuration
//!
//! Settings are layered, lowest precedence first: built-in defaults, an
//! optional TOML file, `KVEXPORT_*` environment variables, then command-line
//! flags. Environment and flags both arrive through [`Cli`](crate::cli::Cli);
//! clap already lets a flag win over its variable.

use crate::cli::Cli;
use kvexport_azure::AzureClientConfig;
use kvexport_secrets::DEFAULT_CONCURRENCY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "kvexport.toml";
/// Default name source.
pub const DEFAULT_INPUT_PATH: &str = "secrets_list.txt";
/// Default CSV destination.
pub const DEFAULT_OUTPUT_PATH: &str = "secrets.csv";
/// Default per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How raw secret values become CSV rows.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    /// `name,value`: the value unchanged
    #[default]
    Plain,
    /// `name,<keys…>`: whitespace-separated `key=value` tokens
    FlatKv,
    /// `tenant_code,name,value`: one row per `key=value` line
    TenantKv,
}

impl std::fmt::Display for ExportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::FlatKv => "flat-kv",
            Self::TenantKv => "tenant-kv",
        })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Invalid config file {}: {message}", path.display())]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// A required setting has no value in any layer
    #[error("Missing required setting '{setting}'")]
    Missing {
        /// Setting name as written in the config file
        setting: &'static str,
    },

    /// A setting has a value outside its allowed range
    #[error("Invalid value for '{setting}': {message}")]
    Invalid {
        /// Setting name as written in the config file
        setting: &'static str,
        /// Why it was rejected
        message: String,
    },
}

/// One configuration layer; every field optional.
///
/// This is also the schema of the TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    /// Subscription to select before reading secrets
    pub subscription_id: Option<String>,
    /// Key Vault name
    pub vault_name: Option<String>,
    /// Newline-delimited secret names
    pub input_path: Option<PathBuf>,
    /// CSV destination
    pub output_path: Option<PathBuf>,
    /// Record builder mode
    pub mode: Option<ExportMode>,
    /// Maximum in-flight fetches
    pub concurrency: Option<usize>,
    /// Per-call timeout in seconds
    pub timeout_secs: Option<u64>,
    /// `az` executable
    pub az_path: Option<String>,
    /// Vault base URL override for HTTP mode
    pub vault_url: Option<String>,
}

impl PartialConfig {
    /// Parse a TOML config file body.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for syntax errors or unknown keys.
    pub fn from_toml(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }

    /// Load a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &contents)
    }

    /// Overlay `higher` on top of `self`; set fields in `higher` win.
    #[must_use]
    pub fn merge(self, higher: Self) -> Self {
        Self {
            subscription_id: higher.subscription_id.or(self.subscription_id),
            vault_name: higher.vault_name.or(self.vault_name),
            input_path: higher.input_path.or(self.input_path),
            output_path: higher.output_path.or(self.output_path),
            mode: higher.mode.or(self.mode),
            concurrency: higher.concurrency.or(self.concurrency),
            timeout_secs: higher.timeout_secs.or(self.timeout_secs),
            az_path: higher.az_path.or(self.az_path),
            vault_url: higher.vault_url.or(self.vault_url),
        }
    }
}

impl From<&Cli> for PartialConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            subscription_id: cli.subscription_id.clone(),
            vault_name: cli.vault_name.clone(),
            input_path: cli.input_path.clone(),
            output_path: cli.output_path.clone(),
            mode: cli.mode,
            concurrency: cli.concurrency,
            timeout_secs: cli.timeout_secs,
            az_path: cli.az_path.clone(),
            vault_url: cli.vault_url.clone(),
        }
    }
}

/// Fully resolved export configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Subscription to select first; `None` keeps the CLI's current context
    pub subscription_id: Option<String>,
    /// Key Vault name
    pub vault_name: String,
    /// Newline-delimited secret names
    pub input_path: PathBuf,
    /// CSV destination
    pub output_path: PathBuf,
    /// Record builder mode
    pub mode: ExportMode,
    /// Maximum in-flight fetches (at least 1)
    pub concurrency: usize,
    /// Per-call timeout
    pub timeout: Duration,
    /// `az` executable
    pub az_path: String,
    /// Vault base URL override for HTTP mode
    pub vault_url: Option<String>,
}

impl Config {
    /// Resolve a merged layer, applying defaults and validation.
    ///
    /// # Errors
    ///
    /// Returns an error if `vault_name` is missing or a numeric setting is zero.
    pub fn resolve(layer: PartialConfig) -> Result<Self, ConfigError> {
        let vault_name = layer
            .vault_name
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing {
                setting: "vault_name",
            })?;

        let concurrency = layer.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                setting: "concurrency",
                message: "must be at least 1".to_string(),
            });
        }

        let timeout_secs = layer.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                setting: "timeout_secs",
                message: "must be at least 1 second".to_string(),
            });
        }

        Ok(Self {
            subscription_id: layer
                .subscription_id
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            vault_name,
            input_path: layer
                .input_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_PATH)),
            output_path: layer
                .output_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            mode: layer.mode.unwrap_or_default(),
            concurrency,
            timeout: Duration::from_secs(timeout_secs),
            az_path: layer.az_path.unwrap_or_else(|| "az".to_string()),
            vault_url: layer.vault_url,
        })
    }

    /// Load configuration from all layers for a parsed command line.
    ///
    /// An explicit `--config` file must exist; the default
    /// [`DEFAULT_CONFIG_FILE`] is only read when present.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is unreadable or invalid, or the
    /// resolved configuration fails validation.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file_layer = match &cli.config {
            Some(path) => PartialConfig::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    tracing::debug!(path = %default_path.display(), "Using default config file");
                    PartialConfig::from_file(default_path)?
                } else {
                    PartialConfig::default()
                }
            }
        };

        Self::resolve(file_layer.merge(PartialConfig::from(cli)))
    }

    /// Client settings for the Azure Key Vault provider.
    #[must_use]
    pub fn azure_client_config(&self) -> AzureClientConfig {
        AzureClientConfig {
            az_path: self.az_path.clone(),
            timeout: self.timeout,
            vault_url: self.vault_url.clone(),
            access_token: None,
        }
    }
}
