//! Record builder
//!
//! Turns fetched secrets into CSV-ready rows according to the active
//! [`ExportMode`]. Each mode has its own small parser that returns a tagged
//! result, so one malformed secret fails only its own record.

use crate::config::ExportMode;
use indexmap::{IndexMap, IndexSet};
use kvexport_secrets::SecretRecord;
use serde::Serialize;
use thiserror::Error;

/// Header for [`ExportMode::Plain`].
pub const PLAIN_HEADER: [&str; 2] = ["name", "value"];
/// Header for [`ExportMode::TenantKv`].
pub const TENANT_HEADER: [&str; 3] = ["tenant_code", "name", "value"];

/// Why a secret value could not be parsed.
///
/// Errors carry positions only, never secret content.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseError {
    /// A whitespace-separated token has no `=`
    #[error("token {token} has no '=' separator")]
    TokenMissingSeparator {
        /// 1-based token index
        token: usize,
    },

    /// A token has nothing before its `=`
    #[error("token {token} has an empty key")]
    TokenEmptyKey {
        /// 1-based token index
        token: usize,
    },

    /// A token uses the key reserved for the leading `name` column
    #[error("token {token} uses the reserved key 'name'")]
    TokenReservedKey {
        /// 1-based token index
        token: usize,
    },

    /// A line has no `=`
    #[error("line {line} has no '=' separator")]
    LineMissingSeparator {
        /// 1-based line number
        line: usize,
    },

    /// A line has nothing before its `=`
    #[error("line {line} has an empty key")]
    LineEmptyKey {
        /// 1-based line number
        line: usize,
    },
}

/// A record that could not be parsed, kept for the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    /// Secret name
    pub name: String,
    /// First problem found in its value
    pub error: ParseError,
}

/// One row of tenant-scoped output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRow {
    /// Prefix of the secret name before its first hyphen
    pub tenant_code: String,
    /// Key from the `key=value` line
    pub field_name: String,
    /// Value with surrounding double quotes removed
    pub field_value: String,
}

/// Split a name on its first hyphen; a name without one is its own tenant code.
#[must_use]
pub fn tenant_code(name: &str) -> &str {
    name.split_once('-').map_or(name, |(prefix, _)| prefix)
}

/// Parse whitespace-separated `key=value` tokens.
///
/// Each token splits on its first `=`. A repeated key keeps the position of
/// its first occurrence and the value of its last.
///
/// # Errors
///
/// Fails on the first token without `=`, with an empty key or with the key
/// `name`, which would collide with the leading column.
pub fn parse_flat_kv(value: &str) -> Result<IndexMap<String, String>, ParseError> {
    let mut fields = IndexMap::new();
    for (index, token) in value.split_whitespace().enumerate() {
        let token_no = index + 1;
        let (key, val) = token
            .split_once('=')
            .ok_or(ParseError::TokenMissingSeparator { token: token_no })?;
        if key.is_empty() {
            return Err(ParseError::TokenEmptyKey { token: token_no });
        }
        if key == PLAIN_HEADER[0] {
            return Err(ParseError::TokenReservedKey { token: token_no });
        }
        fields.insert(key.to_string(), val.to_string());
    }
    Ok(fields)
}

/// Lines that carry no field: blanks, `#` comments and `[section]` headers.
fn is_structural(line: &str) -> bool {
    line.is_empty() || line.starts_with('#') || (line.starts_with('[') && line.ends_with(']'))
}

/// Parse newline-delimited `key=value` lines into tenant rows.
///
/// # Errors
///
/// Fails on the first non-structural line without `=` or with an empty key.
pub fn parse_tenant_kv(name: &str, value: &str) -> Result<Vec<TenantRow>, ParseError> {
    let tenant = tenant_code(name);
    let mut rows = Vec::new();

    for (index, raw) in value.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if is_structural(line) {
            continue;
        }

        let (key, val) = line
            .split_once('=')
            .ok_or(ParseError::LineMissingSeparator { line: line_no })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::LineEmptyKey { line: line_no });
        }

        rows.push(TenantRow {
            tenant_code: tenant.to_string(),
            field_name: key.to_string(),
            field_value: val.trim().trim_matches('"').to_string(),
        });
    }

    Ok(rows)
}

/// Header plus rows, every row exactly as wide as the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordTable {
    /// Column names
    pub header: Vec<String>,
    /// Data rows
    pub rows: Vec<Vec<String>>,
}

/// Rows built from a batch, plus the records that failed to parse.
#[derive(Debug, Default)]
pub struct BuiltRecords {
    /// Serializable output
    pub table: RecordTable,
    /// Records excluded because their value was malformed
    pub failures: Vec<ParseFailure>,
}

/// Build the output table for `records` under `mode`.
///
/// Row order follows record order. Records that fail to parse emit no rows
/// and are reported in [`BuiltRecords::failures`].
#[must_use]
pub fn build_records(mode: ExportMode, records: &[SecretRecord]) -> BuiltRecords {
    match mode {
        ExportMode::Plain => build_plain(records),
        ExportMode::FlatKv => build_flat_kv(records),
        ExportMode::TenantKv => build_tenant_kv(records),
    }
}

fn build_plain(records: &[SecretRecord]) -> BuiltRecords {
    let rows = records
        .iter()
        .map(|r| vec![r.name.clone(), r.value.expose().to_string()])
        .collect();

    BuiltRecords {
        table: RecordTable {
            header: PLAIN_HEADER.iter().map(ToString::to_string).collect(),
            rows,
        },
        failures: Vec::new(),
    }
}

fn build_flat_kv(records: &[SecretRecord]) -> BuiltRecords {
    let mut failures = Vec::new();
    let mut parsed = Vec::with_capacity(records.len());

    for record in records {
        match parse_flat_kv(record.value.expose()) {
            Ok(fields) => parsed.push((record.name.clone(), fields)),
            Err(error) => {
                tracing::warn!(secret = %record.name, %error, "Failed to parse secret value");
                failures.push(ParseFailure {
                    name: record.name.clone(),
                    error,
                });
            }
        }
    }

    // Union of keys in first-appearance order
    let keys: IndexSet<&str> = parsed
        .iter()
        .flat_map(|(_, fields)| fields.keys().map(String::as_str))
        .collect();

    let mut header = vec!["name".to_string()];
    header.extend(keys.iter().map(|k| (*k).to_string()));

    let rows = parsed
        .iter()
        .map(|(name, fields)| {
            let mut row = Vec::with_capacity(header.len());
            row.push(name.clone());
            row.extend(keys.iter().map(|k| fields.get(*k).cloned().unwrap_or_default()));
            row
        })
        .collect();

    BuiltRecords {
        table: RecordTable { header, rows },
        failures,
    }
}

fn build_tenant_kv(records: &[SecretRecord]) -> BuiltRecords {
    let mut failures = Vec::new();
    let mut rows = Vec::new();

    for record in records {
        match parse_tenant_kv(&record.name, record.value.expose()) {
            Ok(parsed) => rows.extend(
                parsed
                    .into_iter()
                    .map(|r| vec![r.tenant_code, r.field_name, r.field_value]),
            ),
            Err(error) => {
                tracing::warn!(secret = %record.name, %error, "Failed to parse secret value");
                failures.push(ParseFailure {
                    name: record.name.clone(),
                    error,
                });
            }
        }
    }

    BuiltRecords {
        table: RecordTable {
            header: TENANT_HEADER.iter().map(ToString::to_string).collect(),
            rows,
        },
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, value: &str) -> SecretRecord {
        SecretRecord::new(name, value)
    }

    #[test]
    fn test_tenant_code() {
        assert_eq!(tenant_code("acme-secret1"), "acme");
        assert_eq!(tenant_code("acme-db-primary"), "acme");
        assert_eq!(tenant_code("standalone"), "standalone");
        assert_eq!(tenant_code("-leading"), "");
    }

    #[test]
    fn test_parse_flat_kv() {
        let fields = parse_flat_kv("a=1 b=2").unwrap();
        assert_eq!(fields.get("a").map(String::as_str), Some("1"));
        assert_eq!(fields.get("b").map(String::as_str), Some("2"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_parse_flat_kv_splits_on_first_equals() {
        let fields = parse_flat_kv("conn=Server=db;Port=5432 empty=").unwrap();
        assert_eq!(fields["conn"], "Server=db;Port=5432");
        assert_eq!(fields["empty"], "");
    }

    #[test]
    fn test_parse_flat_kv_duplicate_key_overwrites_in_place() {
        let fields = parse_flat_kv("a=1 b=2 a=3").unwrap();
        let keys: Vec<_> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(fields["a"], "3");
    }

    #[test]
    fn test_parse_flat_kv_errors() {
        assert_eq!(
            parse_flat_kv("a=1 oops b=2"),
            Err(ParseError::TokenMissingSeparator { token: 2 })
        );
        assert_eq!(
            parse_flat_kv("=x"),
            Err(ParseError::TokenEmptyKey { token: 1 })
        );
        assert!(parse_flat_kv("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_tenant_kv() {
        let rows = parse_tenant_kv("acme-secret1", "KEY1=\"v1\"\nKEY2=\"v2\"\n").unwrap();
        assert_eq!(
            rows,
            vec![
                TenantRow {
                    tenant_code: "acme".to_string(),
                    field_name: "KEY1".to_string(),
                    field_value: "v1".to_string(),
                },
                TenantRow {
                    tenant_code: "acme".to_string(),
                    field_name: "KEY2".to_string(),
                    field_value: "v2".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_tenant_kv_skips_structural_lines() {
        let value = "# generated\n[database]\n\nHOST = \"db.internal\"\r\nURL=\"a=b\"\n";
        let rows = parse_tenant_kv("globex", value).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tenant_code, "globex");
        assert_eq!(rows[0].field_name, "HOST");
        assert_eq!(rows[0].field_value, "db.internal");
        assert_eq!(rows[1].field_value, "a=b");
    }

    #[test]
    fn test_parse_tenant_kv_errors_report_line() {
        assert_eq!(
            parse_tenant_kv("acme-x", "A=1\n\nnot a pair\n"),
            Err(ParseError::LineMissingSeparator { line: 3 })
        );
        assert_eq!(
            parse_tenant_kv("acme-x", " = value"),
            Err(ParseError::LineEmptyKey { line: 1 })
        );
    }

    #[test]
    fn test_parse_error_does_not_leak_content() {
        let err = parse_flat_kv("hunter2").unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_build_plain() {
        let built = build_records(
            ExportMode::Plain,
            &[record("acme-db", "p@ss word"), record("globex", "x")],
        );
        assert_eq!(built.table.header, vec!["name", "value"]);
        assert_eq!(
            built.table.rows,
            vec![vec!["acme-db", "p@ss word"], vec!["globex", "x"]]
        );
        assert!(built.failures.is_empty());
    }

    #[test]
    fn test_build_flat_kv_aligns_columns() {
        let built = build_records(
            ExportMode::FlatKv,
            &[
                record("acme", "a=1 b=2"),
                record("globex", "c=3 a=4"),
                record("initech", "b=5"),
            ],
        );

        assert_eq!(built.table.header, vec!["name", "a", "b", "c"]);
        assert_eq!(
            built.table.rows,
            vec![
                vec!["acme", "1", "2", ""],
                vec!["globex", "4", "", "3"],
                vec!["initech", "", "5", ""],
            ]
        );
    }

    #[test]
    fn test_build_flat_kv_collects_failures_and_continues() {
        let built = build_records(
            ExportMode::FlatKv,
            &[record("bad", "novalue"), record("good", "k=v")],
        );

        assert_eq!(built.table.header, vec!["name", "k"]);
        assert_eq!(built.table.rows, vec![vec!["good", "v"]]);
        assert_eq!(
            built.failures,
            vec![ParseFailure {
                name: "bad".to_string(),
                error: ParseError::TokenMissingSeparator { token: 1 },
            }]
        );
    }

    #[test]
    fn test_build_flat_kv_rejects_name_key() {
        let built = build_records(
            ExportMode::FlatKv,
            &[record("acme", "name=x a=1"), record("globex", "a=2")],
        );

        assert_eq!(built.table.header, vec!["name", "a"]);
        assert_eq!(built.table.rows, vec![vec!["globex", "2"]]);
        assert_eq!(
            built.failures,
            vec![ParseFailure {
                name: "acme".to_string(),
                error: ParseError::TokenReservedKey { token: 1 },
            }]
        );
    }

    #[test]
    fn test_build_tenant_kv() {
        let built = build_records(
            ExportMode::TenantKv,
            &[
                record("acme-secret1", "KEY1=\"v1\"\nKEY2=\"v2\"\n"),
                record("broken-1", "KEY=ok\nnope\n"),
                record("solo", "K=\"x\""),
            ],
        );

        assert_eq!(built.table.header, vec!["tenant_code", "name", "value"]);
        assert_eq!(
            built.table.rows,
            vec![
                vec!["acme", "KEY1", "v1"],
                vec!["acme", "KEY2", "v2"],
                vec!["solo", "K", "x"],
            ]
        );
        assert_eq!(built.failures.len(), 1);
        assert_eq!(built.failures[0].name, "broken-1");
    }

    #[test]
    fn test_every_row_matches_header_width() {
        for mode in [ExportMode::Plain, ExportMode::FlatKv, ExportMode::TenantKv] {
            let built = build_records(
                mode,
                &[record("acme-1", "A=1 B=2"), record("globex-2", "C=3")],
            );
            for row in &built.table.rows {
                assert_eq!(row.len(), built.table.header.len(), "mode {mode}");
            }
        }
    }
}
