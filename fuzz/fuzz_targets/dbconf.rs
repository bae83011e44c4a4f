//! Fuzz target for `dbconf.yml` resolution.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_dbconf
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rudder_migrate::{ConfOptions, DbConf};

#[derive(Debug, Arbitrary)]
struct FuzzConf {
    yaml: String,
    env: String,
    track: String,
    pg_schema: Option<String>,
}

fuzz_target!(|input: FuzzConf| {
    let mut options = ConfOptions::new().env(input.env).track(input.track);
    if let Some(schema) = input.pg_schema {
        options = options.pg_schema(schema);
    }

    // Resolution never panics, and a resolved config never leaves the
    // migrations root.
    if let Ok(conf) = DbConf::from_yaml_with(&input.yaml, &options, |_| None) {
        assert!(conf.migrations_dir().starts_with(&conf.migrations_root));
    }
});
