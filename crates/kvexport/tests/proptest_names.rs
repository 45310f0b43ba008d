//! Property-based tests for the secret name reader.
//!
//! - Round trip: names written one per line read back unchanged and in order
//! - Noise: blank lines and surrounding whitespace never change the result

#![allow(clippy::unwrap_used)]

use kvexport::names::{parse_secret_names, read_secret_names};
use proptest::prelude::*;
use std::io::Cursor;

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Key Vault style names: alphanumerics and hyphens
fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9-]{0,30}".prop_map(String::from)
}

/// Leading or trailing padding made of spaces and tabs
fn padding_strategy() -> impl Strategy<Value = String> {
    "[ \t]{0,3}".prop_map(String::from)
}

fn read_back(contents: &str) -> Vec<String> {
    parse_secret_names(Cursor::new(contents))
        .unwrap()
        .into_iter()
        .map(String::from)
        .collect()
}

proptest! {
    #[test]
    fn prop_round_trip_through_file(names in prop::collection::vec(name_strategy(), 0..20)) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets_list.txt");
        let mut contents = names.join("\n");
        contents.push('\n');
        std::fs::write(&path, contents).unwrap();

        let read: Vec<String> = read_secret_names(&path)
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        prop_assert_eq!(read, names);
    }

    #[test]
    fn prop_padding_and_blank_lines_are_ignored(
        entries in prop::collection::vec(
            (name_strategy(), padding_strategy(), padding_strategy(), any::<bool>()),
            0..20,
        ),
        crlf in any::<bool>(),
    ) {
        let newline = if crlf { "\r\n" } else { "\n" };
        let mut contents = String::new();
        for (name, before, after, blank_after) in &entries {
            contents.push_str(&format!("{before}{name}{after}{newline}"));
            if *blank_after {
                contents.push_str(&format!("{before}{newline}"));
            }
        }

        let expected: Vec<String> = entries.iter().map(|(name, ..)| name.clone()).collect();
        prop_assert_eq!(read_back(&contents), expected);
    }
}
