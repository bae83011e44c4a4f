//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over the defaults. `RUDDER_LOG_FORMAT` selects
//! `compact` (default), `pretty`, or `json`. Logs go to stderr so that
//! `--json` output on stdout stays parseable.

use tracing_subscriber::EnvFilter;

/// Format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event.
    Compact,
    /// Multi-line, human oriented.
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to compact.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Default filter directive for the given verbosity.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "info" } else { "warn" }
}

/// Install the global subscriber.
pub fn init(verbose: bool) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !verbose => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(default_directive(false)))
        }
        _ => EnvFilter::new(default_directive(verbose)),
    };

    let format = std::env::var("RUDDER_LOG_FORMAT")
        .map(|f| LogFormat::from_name(&f))
        .unwrap_or(LogFormat::Compact);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when embedded in tests.
    let _ = match format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}
