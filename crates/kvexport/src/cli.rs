use crate::config::{ConfigError, ExportMode};
use crate::logging::{LogLevel, TracingConfig, TracingFormat};
use crate::names::NamesError;
use crate::pipeline::ExportError;
use clap::Parser;
use miette::{Diagnostic, Report};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// Subscription context could not be selected
pub const EXIT_CONTEXT: i32 = 1;
/// Configuration or input-file error exit code
pub const EXIT_CLI: i32 = 2;
/// Output file could not be written
pub const EXIT_OUTPUT: i32 = 3;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// Subscription context error (exit code 1)
    #[error("Context error: {message}")]
    #[diagnostic(code(kvexport::cli::context))]
    Context {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Configuration or input error (exit code 2)
    #[error("Configuration error: {message}")]
    #[diagnostic(code(kvexport::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Output write error (exit code 3)
    #[error("Output error: {message}")]
    #[diagnostic(code(kvexport::cli::output))]
    Output {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let help = match &err {
            ConfigError::Missing { setting: "vault_name" } => {
                Some("Pass --vault, set KVEXPORT_VAULT, or add vault_name to kvexport.toml")
            }
            ConfigError::Parse { .. } => {
                Some("Valid keys: subscription_id, vault_name, input_path, output_path, mode, concurrency, timeout_secs, az_path, vault_url")
            }
            _ => None,
        };
        let message = err.to_string();
        match help {
            Some(help) => Self::config_with_help(message, help),
            None => Self::config(message),
        }
    }
}

impl From<ExportError> for CliError {
    fn from(err: ExportError) -> Self {
        let message = err.to_string();
        match err {
            ExportError::Context(_) => Self::Context {
                message,
                help: Some("Check `az login` and that the subscription ID is correct".to_string()),
            },
            ExportError::Names(NamesError::Io { .. }) => Self::config_with_help(
                message,
                "Provide a newline-delimited list of secret names with --input",
            ),
            ExportError::Write(_) => Self::Output {
                message,
                help: None,
            },
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Context { .. } => EXIT_CONTEXT,
        CliError::Config { .. } => EXIT_CLI,
        CliError::Output { .. } => EXIT_OUTPUT,
    }
}

/// Render error appropriately based on JSON flag
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let error_envelope = ErrorEnvelope::new(serde_json::json!({
            "code": match err {
                CliError::Context { .. } => "context",
                CliError::Config { .. } => "config",
                CliError::Output { .. } => "output",
            },
            "message": err.to_string()
        }));

        match serde_json::to_string(&error_envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Export Azure Key Vault secrets to CSV.
///
/// Every setting except the logging flags can also come from a `KVEXPORT_*`
/// environment variable or from a TOML config file.
#[derive(Parser, Debug)]
#[command(name = "kvexport", version)]
#[command(about = "Bulk-export Azure Key Vault secrets to CSV")]
#[command(long_about = None)]
pub struct Cli {
    /// TOML config file (defaults to ./kvexport.toml when present).
    #[arg(long, env = "KVEXPORT_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Azure subscription to select before reading secrets.
    #[arg(long = "subscription", env = "KVEXPORT_SUBSCRIPTION", value_name = "ID")]
    pub subscription_id: Option<String>,

    /// Key Vault to read from.
    #[arg(long = "vault", env = "KVEXPORT_VAULT", value_name = "NAME")]
    pub vault_name: Option<String>,

    /// Newline-delimited list of secret names.
    #[arg(long = "input", env = "KVEXPORT_INPUT", value_name = "PATH")]
    pub input_path: Option<PathBuf>,

    /// CSV file to write.
    #[arg(long = "output", env = "KVEXPORT_OUTPUT", value_name = "PATH")]
    pub output_path: Option<PathBuf>,

    /// How secret values become CSV rows.
    #[arg(long, env = "KVEXPORT_MODE", value_enum)]
    pub mode: Option<ExportMode>,

    /// Maximum number of secrets fetched at once.
    #[arg(long, env = "KVEXPORT_CONCURRENCY", value_name = "N")]
    pub concurrency: Option<usize>,

    /// Timeout for each Azure call, in seconds.
    #[arg(long = "timeout", env = "KVEXPORT_TIMEOUT", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Azure CLI executable.
    #[arg(long, env = "KVEXPORT_AZ_PATH", value_name = "PATH")]
    pub az_path: Option<String>,

    /// Vault base URL for REST access (used with AZURE_KEYVAULT_TOKEN).
    #[arg(long, env = "KVEXPORT_VAULT_URL", value_name = "URL")]
    pub vault_url: Option<String>,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        help = "Set logging level",
        default_value = "info",
        value_enum
    )]
    pub level: LogLevel,

    /// Log output format.
    #[arg(long, default_value = "compact", value_enum)]
    pub log_format: TracingFormat,

    /// Tracing filter directive; overrides `-L` and `RUST_LOG`.
    #[arg(long, value_name = "DIRECTIVE")]
    pub log_filter: Option<String>,

    /// Emit JSON envelope on stdout.
    #[arg(long, help = "Emit JSON envelope on stdout")]
    pub json: bool,
}

impl From<&Cli> for TracingConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            format: cli.log_format,
            level: cli.level.into(),
            filter: cli.log_filter.clone(),
        }
    }
}

/// Parse command line arguments into a CLI structure.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::WriteError;
    use kvexport_secrets::SecretError;

    const ENV_VARS: [&str; 10] = [
        "KVEXPORT_CONFIG",
        "KVEXPORT_SUBSCRIPTION",
        "KVEXPORT_VAULT",
        "KVEXPORT_INPUT",
        "KVEXPORT_OUTPUT",
        "KVEXPORT_MODE",
        "KVEXPORT_CONCURRENCY",
        "KVEXPORT_TIMEOUT",
        "KVEXPORT_AZ_PATH",
        "KVEXPORT_VAULT_URL",
    ];

    fn parse_clean(args: &[&str]) -> Cli {
        temp_env::with_vars_unset(ENV_VARS, || Cli::try_parse_from(args).unwrap())
    }

    #[test]
    fn test_cli_default_values() {
        let cli = parse_clean(&["kvexport"]);

        assert!(matches!(cli.level, LogLevel::Info));
        assert_eq!(cli.log_format, TracingFormat::Compact);
        assert!(!cli.json);
        assert!(cli.vault_name.is_none());
        assert!(cli.mode.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = parse_clean(&[
            "kvexport",
            "--subscription",
            "0000-aaaa",
            "--vault",
            "prod-kv",
            "--input",
            "names.txt",
            "--output",
            "out.csv",
            "--mode",
            "tenant-kv",
            "--concurrency",
            "8",
            "--timeout",
            "5",
            "-L",
            "debug",
            "--log-format",
            "json",
            "--json",
        ]);

        assert_eq!(cli.subscription_id.as_deref(), Some("0000-aaaa"));
        assert_eq!(cli.vault_name.as_deref(), Some("prod-kv"));
        assert_eq!(cli.input_path, Some(PathBuf::from("names.txt")));
        assert_eq!(cli.output_path, Some(PathBuf::from("out.csv")));
        assert_eq!(cli.mode, Some(ExportMode::TenantKv));
        assert_eq!(cli.concurrency, Some(8));
        assert_eq!(cli.timeout_secs, Some(5));
        assert!(matches!(cli.level, LogLevel::Debug));
        assert_eq!(cli.log_format, TracingFormat::Json);
        assert!(cli.json);
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        let result = temp_env::with_vars_unset(ENV_VARS, || {
            Cli::try_parse_from(["kvexport", "--mode", "yaml"])
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_env_fills_unset_flags() {
        let cli = temp_env::with_vars(
            [
                ("KVEXPORT_VAULT", Some("env-kv")),
                ("KVEXPORT_MODE", Some("flat-kv")),
                ("KVEXPORT_SUBSCRIPTION", None),
            ],
            || Cli::try_parse_from(["kvexport", "--vault", "flag-kv"]).unwrap(),
        );

        assert_eq!(cli.vault_name.as_deref(), Some("flag-kv"));
        assert_eq!(cli.mode, Some(ExportMode::FlatKv));
        assert!(cli.subscription_id.is_none());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(EXIT_OK, 0);
        assert_eq!(exit_code_for(&CliError::config("x")), EXIT_CLI);

        let context: CliError = ExportError::Context(SecretError::ContextFailed {
            subscription: "s".to_string(),
            message: "m".to_string(),
        })
        .into();
        assert_eq!(exit_code_for(&context), EXIT_CONTEXT);

        let names: CliError = ExportError::Names(NamesError::Io {
            path: PathBuf::from("secrets_list.txt"),
            source: io::Error::from(io::ErrorKind::NotFound),
        })
        .into();
        assert_eq!(exit_code_for(&names), EXIT_CLI);

        let output: CliError = ExportError::Write(WriteError::Io {
            path: PathBuf::from("secrets.csv"),
            operation: "replace",
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        })
        .into();
        assert_eq!(exit_code_for(&output), EXIT_OUTPUT);
    }

    #[test]
    fn test_missing_vault_has_help() {
        let err: CliError = ConfigError::Missing {
            setting: "vault_name",
        }
        .into();

        match err {
            CliError::Config { message, help } => {
                assert!(message.contains("vault_name"));
                assert!(help.unwrap().contains("--vault"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_tracing_config_from_flags() {
        let cli = parse_clean(&[
            "kvexport",
            "-L",
            "warn",
            "--log-format",
            "pretty",
            "--log-filter",
            "kvexport_azure=trace",
        ]);
        let config = TracingConfig::from(&cli);

        assert_eq!(config.format, TracingFormat::Pretty);
        assert_eq!(config.level, crate::logging::Level::WARN);
        assert_eq!(config.filter.as_deref(), Some("kvexport_azure=trace"));

        let defaults = TracingConfig::from(&parse_clean(&["kvexport"]));
        assert_eq!(defaults.level, crate::logging::Level::INFO);
        assert!(defaults.filter.is_none());
    }

    #[test]
    fn test_envelopes_serialize() {
        let ok = serde_json::to_value(OkEnvelope::new(serde_json::json!({"rows": 2}))).unwrap();
        assert_eq!(ok["status"], "ok");
        assert_eq!(ok["data"]["rows"], 2);

        let err = serde_json::to_value(ErrorEnvelope::new("boom")).unwrap();
        assert_eq!(err["status"], "error");
        assert_eq!(err["error"], "boom");
    }
}
