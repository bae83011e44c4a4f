//! Fuzz target for migration file name parsing and catalog assembly.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_migration_filenames
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use rudder_migrate::{collect_migrations, parse_migration_filename};

fuzz_target!(|names: Vec<String>| {
    for name in &names {
        if let Some(parsed) = parse_migration_filename(name) {
            assert!(parsed.version > 0);
        }
    }

    if let Ok(migrations) = collect_migrations(names.iter().map(String::as_str)) {
        // Catalogs are strictly ascending by version.
        assert!(migrations.windows(2).all(|w| w[0].version < w[1].version));
    }
});
