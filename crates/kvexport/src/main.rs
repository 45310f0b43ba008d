//! kvexport CLI Application
//!
//! Reads a list of secret names, fetches them from Azure Key Vault and writes
//! them to a CSV file in one of three layouts.

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use kvexport::cli::{self, Cli, CliError, EXIT_OK, OkEnvelope, exit_code_for, render_error};
use kvexport::config::Config;
use kvexport::logging::{self, TracingConfig};
use kvexport::pipeline::{ExportSummary, run_export};
use kvexport_azure::AzureKeyVaultClient;

fn main() {
    // NOTE: Using eprintln! in panic hook is intentional - tracing may be
    // unusable during a panic.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();
    let json_mode = cli.json;

    let exit_code = match run(&cli) {
        Ok(summary) => {
            report(&summary, json_mode);
            EXIT_OK
        }
        Err(err) => {
            render_error(&err, json_mode);
            exit_code_for(&err)
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<ExportSummary, CliError> {
    logging::init_tracing(TracingConfig::from(cli))
        .map_err(|e| CliError::config(e.to_string()))?;

    let config = Config::load(cli)?;
    let client = AzureKeyVaultClient::new(config.azure_client_config())
        .map_err(|e| CliError::config(e.to_string()))?;
    tracing::debug!(mode = client.mode(), "Azure client ready");

    run_with_tokio(&config, &client)
}

/// Create tokio runtime and run the export
fn run_with_tokio(
    config: &Config,
    client: &AzureKeyVaultClient,
) -> Result<ExportSummary, CliError> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::config(format!("Failed to create tokio runtime: {e}")))?;

    rt.block_on(run_export(config, client)).map_err(CliError::from)
}

fn report(summary: &ExportSummary, json_mode: bool) {
    if json_mode {
        match serde_json::to_string(&OkEnvelope::new(summary)) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing summary: {e}"),
        }
        return;
    }

    println!(
        "Wrote {} rows ({}) to {}",
        summary.rows,
        summary.mode,
        summary.output_path.display()
    );
    println!("Fetched {} of {} secrets", summary.fetched, summary.names);
    for skipped in &summary.fetch_failures {
        println!("  skipped {}: {}", skipped.name, skipped.reason);
    }
    if !summary.parse_failures.is_empty() {
        println!("{} secrets could not be parsed:", summary.parse_failures.len());
        for failure in &summary.parse_failures {
            println!("  {}: {}", failure.name, failure.error);
        }
    }
}
