//! MySQL connection implementing the migration database seam.

use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, Params, TxOpts, Value};
use rudder_migrate::{DriverError, MigrationDatabase, SqlValue, Statement, VersionRow};
use tracing::{debug, trace};

use crate::config::MysqlConfig;
use crate::error::{driver_error, MysqlResult};

fn to_mysql_params(params: &[SqlValue]) -> Params {
    if params.is_empty() {
        return Params::Empty;
    }
    Params::Positional(
        params
            .iter()
            .map(|p| match p {
                SqlValue::Int(v) => Value::Int(*v),
                SqlValue::Bool(v) => Value::Int(i64::from(*v)),
                SqlValue::Text(v) => Value::Bytes(v.clone().into_bytes()),
            })
            .collect(),
    )
}

/// A single MySQL connection.
pub struct MysqlConnection {
    conn: Conn,
}

impl MysqlConnection {
    /// Open a connection with the given configuration.
    pub async fn open(config: &MysqlConfig) -> MysqlResult<Self> {
        let opts = Opts::from(config.to_opts_builder());
        let conn = Conn::new(opts).await?;
        debug!(host = %config.host, database = %config.database, "Opened MySQL connection");
        Ok(Self { conn })
    }

    /// Connect from any supported connection string.
    pub async fn connect(open: &str) -> MysqlResult<Self> {
        Self::open(&MysqlConfig::from_open(open)?).await
    }

    /// Close the connection, notifying the server.
    pub async fn close(self) -> MysqlResult<()> {
        self.conn.disconnect().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MigrationDatabase for MysqlConnection {
    async fn query_versions(&mut self, stmt: &Statement) -> Result<Vec<VersionRow>, DriverError> {
        trace!(sql = %stmt, "Querying versions");
        self.conn
            .exec_map(
                stmt.sql.as_str(),
                to_mysql_params(&stmt.params),
                |(version, applied, tstamp): (i64, bool, Option<String>)| VersionRow {
                    version,
                    applied,
                    tstamp,
                },
            )
            .await
            .map_err(|e| driver_error(&e))
    }

    async fn query_count(&mut self, stmt: &Statement) -> Result<i64, DriverError> {
        let count: Option<i64> = self
            .conn
            .exec_first(stmt.sql.as_str(), to_mysql_params(&stmt.params))
            .await
            .map_err(|e| driver_error(&e))?;
        Ok(count.unwrap_or(0))
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, DriverError> {
        debug!(sql = %stmt, "Executing");
        let result = if stmt.has_params() {
            self.conn
                .exec_drop(stmt.sql.as_str(), to_mysql_params(&stmt.params))
                .await
        } else {
            self.conn.query_drop(stmt.sql.as_str()).await
        };
        result.map_err(|e| driver_error(&e))?;
        Ok(self.conn.affected_rows())
    }

    async fn transaction(&mut self, stmts: &[Statement]) -> Result<(), (usize, DriverError)> {
        let mut tx = self
            .conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(|e| (0, driver_error(&e)))?;

        for (idx, stmt) in stmts.iter().enumerate() {
            let result = if stmt.has_params() {
                tx.exec_drop(stmt.sql.as_str(), to_mysql_params(&stmt.params))
                    .await
            } else {
                tx.query_drop(stmt.sql.as_str()).await
            };
            if let Err(e) = result {
                let err = driver_error(&e);
                if let Err(rollback) = tx.rollback().await {
                    debug!(error = %rollback, "Rollback failed");
                }
                return Err((idx, err));
            }
        }

        tx.commit()
            .await
            .map_err(|e| (stmts.len().saturating_sub(1), driver_error(&e)))
    }
}
