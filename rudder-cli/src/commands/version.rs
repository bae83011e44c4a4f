//! `rudder version` command - Display version information.

use crate::error::CliResult;
use crate::output::{self, kv};

/// Package version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
const NAME: &str = env!("CARGO_PKG_NAME");

/// Drivers compiled into this binary.
pub fn enabled_drivers() -> Vec<&'static str> {
    let mut drivers = Vec::new();

    #[cfg(feature = "postgres")]
    drivers.push("postgres");

    #[cfg(feature = "mysql")]
    drivers.push("mysql");

    #[cfg(feature = "sqlite")]
    drivers.push("sqlite3");

    drivers
}

/// Run the version command
pub async fn run() -> CliResult<()> {
    output::logo();

    kv("Version", VERSION);
    kv("Binary", NAME);

    #[cfg(debug_assertions)]
    let build_mode = "debug";
    #[cfg(not(debug_assertions))]
    let build_mode = "release";

    kv("Build", build_mode);

    let drivers = enabled_drivers();
    if drivers.is_empty() {
        kv("Drivers", "none");
    } else {
        kv("Drivers", &drivers.join(", "));
    }

    Ok(())
}
