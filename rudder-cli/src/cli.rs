//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use rudder_migrate::{ConfOptions, DEFAULT_DB, DEFAULT_ENV, DEFAULT_PATH};

/// Rudder - linear, track-aware SQL migrations
#[derive(Parser, Debug)]
#[command(name = "rudder")]
#[command(version)]
#[command(about = "Rudder - linear, track-aware SQL migrations", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Folder containing dbconf.yml
    #[arg(long, global = true, env = "RUDDER_PATH", default_value = DEFAULT_PATH)]
    pub path: PathBuf,

    /// Database folder under the config path
    #[arg(long, global = true, env = "RUDDER_DB", default_value = DEFAULT_DB)]
    pub db: String,

    /// Environment section of dbconf.yml
    #[arg(long, global = true, env = "RUDDER_ENV", default_value = DEFAULT_ENV)]
    pub env: String,

    /// Schema to use as search_path (postgres only)
    #[arg(long = "pgschema", global = true, env = "RUDDER_PGSCHEMA")]
    pub pg_schema: Option<String>,

    /// Migration track; empty for the default track
    #[arg(short, long, global = true, env = "RUDDER_TRACK", default_value = "")]
    pub track: String,

    /// Log progress at info level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Options for loading `dbconf.yml`.
    pub fn conf_options(&self) -> ConfOptions {
        let mut options = ConfOptions::new()
            .path(&self.path)
            .db(&self.db)
            .env(&self.env)
            .track(&self.track);
        if let Some(schema) = &self.pg_schema {
            options = options.pg_schema(schema);
        }
        options
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Migrate the track to the most recent version available
    Up,

    /// Roll back the track by one version
    Down,

    /// Roll back every applied migration in the track
    #[command(name = "downall")]
    DownAll,

    /// Re-run the latest migration
    Redo,

    /// Dump the migration status of the track
    Status(StatusArgs),

    /// Create the scaffolding for a new migration
    Create(CreateArgs),

    /// Print the current version of the track
    #[command(name = "dbversion")]
    DbVersion(DbVersionArgs),

    /// Add the track column to a bookkeeping table created by older versions
    #[command(name = "updatetable")]
    UpdateTable,

    /// Move a migration from the default track into --track
    Mv(MvArgs),

    /// Display version information
    Version,
}

/// Arguments for the `status` command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print status as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `dbversion` command
#[derive(Args, Debug)]
pub struct DbVersionArgs {
    /// Print the version as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `create` command
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Name of the migration
    pub name: String,
}

/// Arguments for the `mv` command
#[derive(Args, Debug)]
pub struct MvArgs {
    /// Migration file name in the migrations root
    pub file: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rudder", "status", "--json", "--path", "conf", "-t", "billing", "--env", "production",
        ])
        .unwrap();

        assert!(matches!(cli.command, Command::Status(StatusArgs { json: true })));
        assert_eq!(cli.global.path, PathBuf::from("conf"));
        assert_eq!(cli.global.track, "billing");
        assert_eq!(cli.global.env, "production");
        assert_eq!(cli.global.db, DEFAULT_DB);
    }

    #[test]
    fn test_conf_options() {
        let cli = Cli::try_parse_from(["rudder", "--pgschema", "tenant_1", "up"]).unwrap();
        let options = cli.global.conf_options();
        assert_eq!(options.pg_schema.as_deref(), Some("tenant_1"));
        assert_eq!(options.track, "");
        assert!(matches!(cli.command, Command::Up));
    }

    #[test]
    fn test_command_names() {
        for name in ["downall", "dbversion", "updatetable"] {
            assert!(Cli::try_parse_from(["rudder", name]).is_ok(), "{name}");
        }
        assert!(Cli::try_parse_from(["rudder", "mv"]).is_err());
    }
}
