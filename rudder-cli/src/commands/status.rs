//! `rudder status` and `rudder dbversion`.

use rudder_migrate::MigrationStatus;
use serde_json::json;

use crate::cli::{DbVersionArgs, GlobalArgs, StatusArgs};
use crate::commands::load_conf;
use crate::connect::open_engine;
use crate::error::CliResult;
use crate::output::{self, kv};

const APPLIED_AT_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Run `rudder status`
pub async fn status(global: &GlobalArgs, args: StatusArgs) -> CliResult<()> {
    let conf = load_conf(global)?;
    let mut engine = open_engine(&conf).await?;
    let status = engine.status().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    output::header(&format!("Migration status for track {}", status.track));
    kv("Environment", &conf.env);
    kv("Directory", &engine.migrations_dir().display().to_string());
    kv("Current version", &status.current_version.to_string());
    output::newline();

    println!("    {:<24}    {}", "Applied At", "Migration");
    println!("    {}", "=".repeat(56));
    for migration in &status.migrations {
        println!("    {}", status_line(migration));
    }

    let pending = status.pending().count();
    output::newline();
    if pending == 0 {
        output::dim("All migrations applied");
    } else {
        output::dim(&format!("{} pending", pending));
    }
    Ok(())
}

fn status_line(migration: &MigrationStatus) -> String {
    let applied_at = match (migration.applied, migration.recorded_at) {
        (true, Some(at)) => output::style_success(&format!("{:<24}", at.format(APPLIED_AT_FORMAT))),
        (true, None) => output::style_success(&format!("{:<24}", "Applied")),
        (false, _) => output::style_pending(&format!("{:<24}", "Pending")),
    };
    let file = match &migration.file {
        Some(file) => file.clone(),
        None => output::style_error(&format!("{} (file missing)", migration.version)),
    };
    format!("{} -- {}", applied_at, file)
}

/// Run `rudder dbversion`
pub async fn db_version(global: &GlobalArgs, args: DbVersionArgs) -> CliResult<()> {
    let conf = load_conf(global)?;
    let mut engine = open_engine(&conf).await?;
    let version = engine.current_version().await?;

    if args.json {
        let body = json!({ "track": engine.track(), "version": version });
        println!("{}", serde_json::to_string(&body)?);
    } else {
        println!("rudder: dbversion {}", version);
    }
    Ok(())
}
