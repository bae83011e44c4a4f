//! `rudder up|down|downall|redo` - move the track between versions.

use rudder_migrate::{Direction, MigrationReport};

use crate::cli::GlobalArgs;
use crate::commands::load_conf;
use crate::connect::open_engine;
use crate::error::CliResult;
use crate::output::{self, info, success};

#[derive(Debug, Clone, Copy)]
enum Batch {
    Up,
    Down,
    DownAll,
    Redo,
}

/// Run `rudder up`
pub async fn up(global: &GlobalArgs) -> CliResult<()> {
    run_batch(global, Batch::Up).await
}

/// Run `rudder down`
pub async fn down(global: &GlobalArgs) -> CliResult<()> {
    run_batch(global, Batch::Down).await
}

/// Run `rudder downall`
pub async fn down_all(global: &GlobalArgs) -> CliResult<()> {
    run_batch(global, Batch::DownAll).await
}

/// Run `rudder redo`
pub async fn redo(global: &GlobalArgs) -> CliResult<()> {
    run_batch(global, Batch::Redo).await
}

async fn run_batch(global: &GlobalArgs, batch: Batch) -> CliResult<()> {
    let conf = load_conf(global)?;
    let mut engine = open_engine(&conf).await?;

    let report = match batch {
        Batch::Up => engine.up().await?,
        Batch::Down => engine.down().await?,
        Batch::DownAll => engine.down_all().await?,
        Batch::Redo => engine.redo().await?,
    };

    print_report(&report);
    Ok(())
}

/// One line per executed step, then the summary.
pub fn print_report(report: &MigrationReport) {
    if report.is_noop() {
        info(&report.summary());
        return;
    }

    for step in &report.steps {
        let label = match step.direction {
            Direction::Up => output::style_success("UP  "),
            Direction::Down => output::style_pending("DOWN"),
        };
        println!(
            "  {} {} {} ({}ms)",
            label,
            step.version,
            step.name,
            step.duration.as_millis()
        );
    }
    output::newline();
    success(&report.summary());
}
