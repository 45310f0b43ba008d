//! CSV writer
//!
//! Output is all-or-nothing: rows go to a temporary file next to the target,
//! which is synced and then renamed over it. A failed run leaves any previous
//! output untouched.

use crate::records::RecordTable;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors writing the output file
#[derive(Debug, Error)]
pub enum WriteError {
    /// Filesystem operation failed
    #[error("Failed to {operation} {}: {source}", path.display())]
    Io {
        /// Path involved in the failed operation
        path: PathBuf,
        /// Operation that failed
        operation: &'static str,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding failed
    #[error("Failed to encode CSV for {}: {source}", path.display())]
    Csv {
        /// Target path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: csv::Error,
    },
}

impl WriteError {
    fn io(path: &Path, operation: &'static str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            operation,
            source,
        }
    }
}

/// Write `table` to `path` as UTF-8 CSV, replacing the file atomically.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created, written or
/// synced, or if it cannot be renamed over `path`.
pub fn write_csv(path: &Path, table: &RecordTable) -> Result<(), WriteError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let temp = tempfile::Builder::new()
        .prefix(".kvexport-")
        .suffix(".csv.tmp")
        .tempfile_in(parent)
        .map_err(|e| WriteError::io(parent, "create temporary file in", e))?;

    let mut writer = csv::Writer::from_writer(temp.as_file());
    let csv_err = |source| WriteError::Csv {
        path: path.to_path_buf(),
        source,
    };
    writer.write_record(&table.header).map_err(csv_err)?;
    for row in &table.rows {
        writer.write_record(row).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| WriteError::io(temp.path(), "flush", e))?;
    drop(writer);

    temp.as_file()
        .sync_all()
        .map_err(|e| WriteError::io(temp.path(), "sync", e))?;

    // Dropping the guard on error removes the temporary file
    temp.persist(path)
        .map_err(|e| WriteError::io(path, "replace", e.error))?;

    tracing::debug!(path = %path.display(), rows = table.rows.len(), "Wrote CSV");
    Ok(())
}
