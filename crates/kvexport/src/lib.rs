//! kvexport - bulk export of Azure Key Vault secrets to CSV
//!
//! A run is a fixed pipeline: select the subscription context, read secret
//! names, fetch their values with bounded concurrency, turn them into rows
//! according to the [`ExportMode`](config::ExportMode), and write one CSV
//! file atomically.
//!
//! ```ignore
//! use kvexport::config::Config;
//! use kvexport::pipeline::run_export;
//! use kvexport_azure::AzureKeyVaultClient;
//!
//! let config = Config::load(&cli)?;
//! let client = AzureKeyVaultClient::new(config.azure_client_config())?;
//! let summary = run_export(&config, &client).await?;
//! println!("{} rows", summary.rows);
//! ```

// CLI rendering writes envelopes and diagnostics directly
#![allow(clippy::print_stdout, clippy::print_stderr)]

/// CLI argument parsing and exit codes.
pub mod cli;
/// Layered export configuration.
pub mod config;
/// Tracing setup.
pub mod logging;
pub mod names;
pub mod output;
/// Stage orchestration.
pub mod pipeline;
pub mod records;

pub use config::{Config, ExportMode};
pub use pipeline::{ExportError, ExportSummary, run_export};
