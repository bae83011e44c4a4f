//! CLI command implementations.

pub mod create;
pub mod migrate;
pub mod status;
pub mod track;
pub mod version;

use rudder_migrate::DbConf;
use tracing::debug;

use crate::cli::GlobalArgs;
use crate::error::CliResult;

/// Load `dbconf.yml` for the global options.
pub fn load_conf(global: &GlobalArgs) -> CliResult<DbConf> {
    let conf = DbConf::load(&global.conf_options())?;
    debug!(
        root = %conf.migrations_root.display(),
        driver = %conf.driver,
        track = %conf.track,
        "Loaded configuration"
    );
    Ok(conf)
}
