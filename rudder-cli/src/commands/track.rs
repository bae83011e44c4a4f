//! `rudder updatetable` and `rudder mv` - track maintenance.

use rudder_migrate::UpgradeOutcome;

use crate::cli::{GlobalArgs, MvArgs};
use crate::commands::load_conf;
use crate::connect::open_engine;
use crate::error::{CliError, CliResult};
use crate::output::{info, kv, success};

/// Run `rudder updatetable`
pub async fn update_table(global: &GlobalArgs) -> CliResult<()> {
    let conf = load_conf(global)?;
    let mut engine = open_engine(&conf).await?;

    match engine.upgrade_bookkeeping_schema().await? {
        UpgradeOutcome::Upgraded { track } => {
            success(&format!("Added the track column; existing rows belong to track {}", track));
        }
        UpgradeOutcome::AlreadyUpgraded => info("Bookkeeping table already has a track column"),
        UpgradeOutcome::MissingTable => {
            info("No bookkeeping table yet; it will be created on the next migration")
        }
    }
    Ok(())
}

/// Run `rudder mv`
pub async fn mv(global: &GlobalArgs, args: MvArgs) -> CliResult<()> {
    let conf = load_conf(global)?;
    if conf.track.is_default() {
        return Err(CliError::Command("mv requires --track".to_string()));
    }

    let mut engine = open_engine(&conf).await?;
    let moved = engine.move_migration(&args.file).await?;

    success(&format!("Moved version {} to track {}", moved.version, conf.track));
    kv("From", &moved.from.display().to_string());
    kv("To", &moved.to.display().to_string());
    Ok(())
}
