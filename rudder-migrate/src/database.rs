//! Database access seam used by the version store and the engine.

use std::fmt;

use crate::error::DriverError;

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// 64-bit integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
    /// Text.
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A single SQL statement with its positional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// SQL text, using the dialect's placeholder syntax.
    pub sql: String,
    /// Positional parameters.
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// A statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// A statement with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Whether the statement carries parameters.
    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql.trim())
    }
}

/// One row returned by the applied-versions query, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRow {
    /// Version identifier.
    pub version: i64,
    /// Whether this transition applied (true) or reverted (false) the version.
    pub applied: bool,
    /// Transition timestamp rendered as `YYYY-MM-DD HH:MM:SS`.
    pub tstamp: Option<String>,
}

/// Minimal database surface needed to run migrations.
///
/// Implementations live in the driver crates. A connection is held for the
/// duration of one command and released when dropped.
#[async_trait::async_trait]
pub trait MigrationDatabase: Send {
    /// Run a query returning `(version_id, is_applied, tstamp)` rows.
    async fn query_versions(&mut self, stmt: &Statement) -> Result<Vec<VersionRow>, DriverError>;

    /// Run a query returning a single integer.
    async fn query_count(&mut self, stmt: &Statement) -> Result<i64, DriverError>;

    /// Execute one statement outside of an explicit transaction.
    async fn execute(&mut self, stmt: &Statement) -> Result<u64, DriverError>;

    /// Execute all statements inside one transaction.
    ///
    /// Commits when every statement succeeds. On the first failure the
    /// transaction is rolled back and the error returned together with the
    /// index of the failing statement.
    async fn transaction(&mut self, stmts: &[Statement]) -> Result<(), (usize, DriverError)>;
}

#[async_trait::async_trait]
impl<D: MigrationDatabase + ?Sized> MigrationDatabase for Box<D> {
    async fn query_versions(&mut self, stmt: &Statement) -> Result<Vec<VersionRow>, DriverError> {
        (**self).query_versions(stmt).await
    }

    async fn query_count(&mut self, stmt: &Statement) -> Result<i64, DriverError> {
        (**self).query_count(stmt).await
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, DriverError> {
        (**self).execute(stmt).await
    }

    async fn transaction(&mut self, stmts: &[Statement]) -> Result<(), (usize, DriverError)> {
        (**self).transaction(stmts).await
    }
}
