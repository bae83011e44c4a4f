//! Rudder CLI - linear, track-aware SQL migrations.

use clap::Parser;

use rudder_cli::cli::{Cli, Command};
use rudder_cli::commands;
use rudder_cli::error::CliResult;
use rudder_cli::logging;
use rudder_cli::output;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.verbose);

    if let Err(e) = run(cli).await {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let global = &cli.global;

    match cli.command {
        Command::Up => commands::migrate::up(global).await,
        Command::Down => commands::migrate::down(global).await,
        Command::DownAll => commands::migrate::down_all(global).await,
        Command::Redo => commands::migrate::redo(global).await,
        Command::Status(args) => commands::status::status(global, args).await,
        Command::DbVersion(args) => commands::status::db_version(global, args).await,
        Command::Create(args) => commands::create::run(global, args).await,
        Command::UpdateTable => commands::track::update_table(global).await,
        Command::Mv(args) => commands::track::mv(global, args).await,
        Command::Version => commands::version::run().await,
    }
}
