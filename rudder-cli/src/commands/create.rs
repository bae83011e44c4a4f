//! `rudder create` - scaffold a new migration file.

use chrono::Utc;
use rudder_migrate::create_migration;

use crate::cli::{CreateArgs, GlobalArgs};
use crate::commands::load_conf;
use crate::error::CliResult;
use crate::output::success;

/// Run `rudder create`
///
/// Does not contact the database.
pub async fn run(global: &GlobalArgs, args: CreateArgs) -> CliResult<()> {
    let conf = load_conf(global)?;
    let path = create_migration(conf.migrations_dir(), &args.name, Utc::now()).await?;
    success(&format!("Created migration {}", path.display()));
    Ok(())
}
