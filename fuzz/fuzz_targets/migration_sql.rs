//! Fuzz target for migration script parsing.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_migration_sql
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use rudder_migrate::{parse_annotated, split_statements};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(sql) = parse_annotated(input) {
            // Parsed statements are never blank.
            for stmt in sql.up.iter().chain(sql.down.iter()) {
                assert!(!stmt.trim().is_empty());
            }
        }
        let _ = split_statements(input);
    }
});
