//! SQLite connection implementing the migration database seam.

use rudder_migrate::{DriverError, MigrationDatabase, SqlValue, Statement, VersionRow};
use tokio_rusqlite::Connection;
use tracing::{debug, trace};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{driver_error, SqliteResult};

fn to_sqlite_values(params: &[SqlValue]) -> Vec<rusqlite::types::Value> {
    params
        .iter()
        .map(|p| match p {
            SqlValue::Int(v) => rusqlite::types::Value::Integer(*v),
            SqlValue::Bool(v) => rusqlite::types::Value::Integer(i64::from(*v)),
            SqlValue::Text(v) => rusqlite::types::Value::Text(v.clone()),
        })
        .collect()
}

/// A single SQLite connection, closed when dropped.
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    /// Open a connection and apply the configured pragmas.
    pub async fn open(config: &SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await?,
            DatabasePath::File(path) => Connection::open(path).await?,
        };

        let init_sql = config.init_sql();
        conn.call(move |conn| {
            conn.execute_batch(&init_sql)?;
            Ok(())
        })
        .await?;

        debug!(path = ?config.path, "Opened SQLite connection");
        Ok(Self { conn })
    }

    /// Open a connection from a connection string.
    pub async fn connect(open: &str) -> SqliteResult<Self> {
        Self::open(&SqliteConfig::from_open(open)?).await
    }

    /// Run a raw batch of SQL outside the migration seam.
    pub async fn execute_batch(&self, sql: &str) -> SqliteResult<()> {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Close the connection, waiting for the background thread.
    pub async fn close(self) -> SqliteResult<()> {
        self.conn.close().await?;
        Ok(())
    }

    /// Run `f` on the connection, converting rusqlite errors.
    async fn call<R, F>(&self, f: F) -> Result<R, DriverError>
    where
        R: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
    {
        let result = self
            .conn
            .call(move |conn| Ok(f(conn)))
            .await
            .map_err(|e| DriverError::new(e.to_string()))?;
        result.map_err(|e| driver_error(&e))
    }
}

#[async_trait::async_trait]
impl MigrationDatabase for SqliteConnection {
    async fn query_versions(&mut self, stmt: &Statement) -> Result<Vec<VersionRow>, DriverError> {
        let sql = stmt.sql.clone();
        let params = to_sqlite_values(&stmt.params);
        trace!(sql = %sql, "Querying versions");

        self.call(move |conn| {
            let mut prepared = conn.prepare(&sql)?;
            let rows = prepared.query_map(rusqlite::params_from_iter(params.iter()), |row| {
                Ok(VersionRow {
                    version: row.get(0)?,
                    applied: row.get(1)?,
                    tstamp: row.get(2)?,
                })
            })?;
            rows.collect()
        })
        .await
    }

    async fn query_count(&mut self, stmt: &Statement) -> Result<i64, DriverError> {
        let sql = stmt.sql.clone();
        let params = to_sqlite_values(&stmt.params);

        self.call(move |conn| {
            conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| row.get(0))
        })
        .await
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, DriverError> {
        let sql = stmt.sql.clone();
        let params = to_sqlite_values(&stmt.params);
        debug!(sql = %stmt, "Executing");

        self.call(move |conn| {
            let affected = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
            Ok(affected as u64)
        })
        .await
    }

    async fn transaction(&mut self, stmts: &[Statement]) -> Result<(), (usize, DriverError)> {
        let stmts: Vec<(String, Vec<rusqlite::types::Value>)> = stmts
            .iter()
            .map(|s| (s.sql.clone(), to_sqlite_values(&s.params)))
            .collect();

        let outcome = self
            .conn
            .call(move |conn| {
                let tx = match conn.transaction() {
                    Ok(tx) => tx,
                    Err(e) => return Ok(Err((0, e))),
                };
                for (idx, (sql, params)) in stmts.iter().enumerate() {
                    // Scripts without parameters may hold several statements.
                    let result = if params.is_empty() {
                        tx.execute_batch(sql)
                    } else {
                        tx.execute(sql, rusqlite::params_from_iter(params.iter())).map(|_| ())
                    };
                    if let Err(e) = result {
                        // Dropping `tx` rolls back.
                        return Ok(Err((idx, e)));
                    }
                }
                Ok(tx.commit().map_err(|e| (stmts.len().saturating_sub(1), e)))
            })
            .await
            .map_err(|e| (0, DriverError::new(e.to_string())))?;

        outcome.map_err(|(idx, e)| (idx, driver_error(&e)))
    }
}
