//! Opening a database connection for the configured driver.

use rudder_migrate::{DbConf, DriverKind, MigrationDatabase, MigrationEngine};
use tracing::info;

use crate::error::{CliError, CliResult};

/// A connection to whichever driver the configuration selects.
pub type Connection = Box<dyn MigrationDatabase>;

/// Open one connection for the configured driver.
///
/// Drivers left out of the build are reported as configuration errors.
pub async fn connect(conf: &DbConf) -> CliResult<Connection> {
    info!(
        driver = %conf.driver,
        env = %conf.env,
        open = %conf.redacted_open(),
        "Connecting"
    );

    match conf.driver {
        #[cfg(feature = "postgres")]
        DriverKind::Postgres => {
            let conn = rudder_postgres::PgConnection::connect(&conf.open, conf.pg_schema.as_deref())
                .await
                .map_err(|e| CliError::Database(e.to_string()))?;
            Ok(Box::new(conn))
        }
        #[cfg(feature = "mysql")]
        DriverKind::Mysql => {
            let conn = rudder_mysql::MysqlConnection::connect(&conf.open)
                .await
                .map_err(|e| CliError::Database(e.to_string()))?;
            Ok(Box::new(conn))
        }
        #[cfg(feature = "sqlite")]
        DriverKind::Sqlite3 => {
            let conn = rudder_sqlite::SqliteConnection::connect(&conf.open)
                .await
                .map_err(|e| CliError::Database(e.to_string()))?;
            Ok(Box::new(conn))
        }
        #[allow(unreachable_patterns)]
        other => Err(CliError::Config(format!(
            "driver '{}' is not enabled in this build",
            other
        ))),
    }
}

/// Connect and build an engine for the configured track.
pub async fn open_engine(conf: &DbConf) -> CliResult<MigrationEngine<Connection>> {
    let db = connect(conf).await?;
    Ok(MigrationEngine::from_conf(db, conf))
}
