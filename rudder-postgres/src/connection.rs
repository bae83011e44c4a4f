//! PostgreSQL connection implementing the migration database seam.

use rudder_migrate::{DriverError, MigrationDatabase, SqlValue, Statement, VersionRow};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, trace, warn};

use crate::config::PgConfig;
use crate::error::{driver_error, PgResult};

type BoxedParam = Box<dyn ToSql + Sync + Send>;

fn to_pg_params(params: &[SqlValue]) -> Vec<BoxedParam> {
    params
        .iter()
        .map(|p| -> BoxedParam {
            match p {
                SqlValue::Int(v) => Box::new(*v),
                SqlValue::Bool(v) => Box::new(*v),
                SqlValue::Text(v) => Box::new(v.clone()),
            }
        })
        .collect()
}

fn as_refs(params: &[BoxedParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect()
}

/// A single PostgreSQL connection.
///
/// Dropping the client ends the background connection task.
pub struct PgConnection {
    client: Client,
}

impl PgConnection {
    /// Connect and apply the configured search path.
    pub async fn open(config: &PgConfig) -> PgResult<Self> {
        let (client, connection) = config.pg.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "PostgreSQL connection closed with error");
            }
        });

        if let Some(sql) = config.init_sql() {
            debug!(sql = %sql, "Setting search path");
            client.batch_execute(&sql).await?;
        }

        debug!(
            dbname = config.pg.get_dbname().unwrap_or_default(),
            "Opened PostgreSQL connection"
        );
        Ok(Self { client })
    }

    /// Connect from a connection string, optionally with a schema override.
    pub async fn connect(open: &str, schema: Option<&str>) -> PgResult<Self> {
        let mut config = PgConfig::from_open(open)?;
        if let Some(schema) = schema {
            config = config.search_path(schema);
        }
        Self::open(&config).await
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait::async_trait]
impl MigrationDatabase for PgConnection {
    async fn query_versions(&mut self, stmt: &Statement) -> Result<Vec<VersionRow>, DriverError> {
        trace!(sql = %stmt, "Querying versions");
        let params = to_pg_params(&stmt.params);
        let rows = self
            .client
            .query(stmt.sql.as_str(), &as_refs(&params))
            .await
            .map_err(|e| driver_error(&e))?;

        rows.iter()
            .map(|row| {
                Ok(VersionRow {
                    version: row.try_get(0)?,
                    applied: row.try_get(1)?,
                    tstamp: row.try_get(2)?,
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(|e| driver_error(&e))
    }

    async fn query_count(&mut self, stmt: &Statement) -> Result<i64, DriverError> {
        let params = to_pg_params(&stmt.params);
        let row = self
            .client
            .query_one(stmt.sql.as_str(), &as_refs(&params))
            .await
            .map_err(|e| driver_error(&e))?;
        row.try_get(0).map_err(|e| driver_error(&e))
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, DriverError> {
        debug!(sql = %stmt, "Executing");
        if !stmt.has_params() {
            self.client
                .batch_execute(&stmt.sql)
                .await
                .map_err(|e| driver_error(&e))?;
            return Ok(0);
        }
        let params = to_pg_params(&stmt.params);
        self.client
            .execute(stmt.sql.as_str(), &as_refs(&params))
            .await
            .map_err(|e| driver_error(&e))
    }

    async fn transaction(&mut self, stmts: &[Statement]) -> Result<(), (usize, DriverError)> {
        let tx = self
            .client
            .transaction()
            .await
            .map_err(|e| (0, driver_error(&e)))?;

        for (idx, stmt) in stmts.iter().enumerate() {
            let result = if stmt.has_params() {
                let params = to_pg_params(&stmt.params);
                tx.execute(stmt.sql.as_str(), &as_refs(&params)).await.map(|_| ())
            } else {
                tx.batch_execute(&stmt.sql).await
            };
            // Dropping `tx` on the early return rolls back.
            result.map_err(|e| (idx, driver_error(&e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| (stmts.len().saturating_sub(1), driver_error(&e)))
    }
}
