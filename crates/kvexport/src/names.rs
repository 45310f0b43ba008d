//! Secret name source
//!
//! One name per line; surrounding whitespace is trimmed and blank lines are
//! dropped. Order is preserved and duplicates are kept.

use kvexport_secrets::SecretName;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading the name source
#[derive(Debug, Error)]
pub enum NamesError {
    /// File missing or unreadable
    #[error("Failed to read secret names from {}: {source}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Parse secret names from any buffered reader.
///
/// # Errors
///
/// Returns an I/O error if a line cannot be read (including invalid UTF-8).
pub fn parse_secret_names(reader: impl BufRead) -> std::io::Result<Vec<SecretName>> {
    let mut names = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = if index == 0 {
            line.strip_prefix('\u{feff}').unwrap_or(&line).to_string()
        } else {
            line
        };
        // Blank lines are the only names SecretName rejects
        if let Ok(name) = SecretName::new(&line) {
            names.push(name);
        }
    }
    Ok(names)
}

/// Read secret names from a newline-delimited file.
///
/// # Errors
///
/// Returns [`NamesError::Io`] if the file is missing or unreadable.
pub fn read_secret_names(path: &Path) -> Result<Vec<SecretName>, NamesError> {
    let io_err = |source| NamesError::Io {
        path: path.to_path_buf(),
        source,
    };

    tracing::info!(path = %path.display(), "Reading secret names");
    let file = File::open(path).map_err(io_err)?;
    let names = parse_secret_names(BufReader::new(file)).map_err(io_err)?;
    tracing::info!(count = names.len(), "Found secret names");

    Ok(names)
}
