//! Export pipeline
//!
//! context → names → fetch → records → CSV. Stages run strictly in that
//! order; only the fetch stage is concurrent.

use crate::config::{Config, ExportMode};
use crate::logging::correlation_id;
use crate::names::{NamesError, read_secret_names};
use crate::output::{WriteError, write_csv};
use crate::records::{ParseFailure, build_records};
use kvexport_secrets::{SecretError, VaultClient, fetch_all};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::Instrument;

/// Fatal pipeline errors. Per-secret problems never surface here.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Subscription context could not be selected
    #[error(transparent)]
    Context(SecretError),

    /// Name source missing or unreadable
    #[error(transparent)]
    Names(#[from] NamesError),

    /// CSV could not be written
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// A secret skipped during fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSecret {
    /// Requested name
    pub name: String,
    /// Reason, without secret content
    pub reason: String,
}

/// Outcome of a completed export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    /// Output mode
    pub mode: ExportMode,
    /// Where the CSV was written
    pub output_path: PathBuf,
    /// Names read from the input file
    pub names: usize,
    /// Secrets fetched successfully
    pub fetched: usize,
    /// Data rows written
    pub rows: usize,
    /// Secrets skipped because their fetch failed
    pub fetch_failures: Vec<SkippedSecret>,
    /// Fetched secrets whose value could not be parsed
    pub parse_failures: Vec<ParseFailure>,
}

impl ExportSummary {
    /// True when every name produced output.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.fetch_failures.is_empty() && self.parse_failures.is_empty()
    }
}

/// Run one export with `client` according to `config`.
///
/// Fetch and parse failures are logged, counted and reported in the summary
/// without aborting. Nothing is written unless every fatal stage succeeds.
///
/// # Errors
///
/// Returns [`ExportError`] if the subscription context cannot be selected,
/// the name source cannot be read, or the CSV cannot be written.
pub async fn run_export<C>(config: &Config, client: &C) -> Result<ExportSummary, ExportError>
where
    C: VaultClient + ?Sized,
{
    let span = tracing::info_span!(
        "export",
        correlation_id = %correlation_id(),
        provider = client.provider_name(),
        vault = %config.vault_name,
        mode = %config.mode,
    );
    run_stages(config, client).instrument(span).await
}

async fn run_stages<C>(config: &Config, client: &C) -> Result<ExportSummary, ExportError>
where
    C: VaultClient + ?Sized,
{
    match &config.subscription_id {
        Some(subscription) => {
            tracing::info!(subscription = %subscription, "Setting subscription context");
            client
                .set_context(subscription)
                .await
                .map_err(ExportError::Context)?;
        }
        None => tracing::info!("No subscription configured, keeping current context"),
    }

    let names = read_secret_names(&config.input_path)?;

    let batch = fetch_all(client, &names, &config.vault_name, config.concurrency).await;
    let built = build_records(config.mode, &batch.records);

    write_csv(&config.output_path, &built.table)?;

    let summary = ExportSummary {
        mode: config.mode,
        output_path: config.output_path.clone(),
        names: names.len(),
        fetched: batch.records.len(),
        rows: built.table.rows.len(),
        fetch_failures: batch
            .failures
            .iter()
            .map(|f| SkippedSecret {
                name: f.name.to_string(),
                reason: f.error.to_string(),
            })
            .collect(),
        parse_failures: built.failures,
    };

    if summary.is_clean() {
        tracing::info!(
            rows = summary.rows,
            path = %summary.output_path.display(),
            "Export complete"
        );
    } else {
        tracing::warn!(
            rows = summary.rows,
            path = %summary.output_path.display(),
            fetch_failures = summary.fetch_failures.len(),
            parse_failures = summary.parse_failures.len(),
            "Export complete with failures"
        );
    }

    Ok(summary)
}
