//! The database handle passed to every engine operation.

use std::fmt;

use crate::config::DatabaseConfig;
use crate::connection::{Connection, ExecuteResult, Row};
use crate::error::Result;
use crate::field::ColumnDescriptor;
use crate::dialect::SqlDialect;
use crate::value::Value;

/// A connection paired with the dialect that formats statements for it.
///
/// ```
/// use rowmodel_core::{Database, GenericDialect, MemoryConnection};
///
/// let db = Database::new(MemoryConnection::new(), GenericDialect);
/// assert!(!db.config().log_statements);
/// ```
pub struct Database {
    connection: Box<dyn Connection>,
    dialect: Box<dyn SqlDialect>,
    config: DatabaseConfig,
}

impl Database {
    /// Pair a connection with a dialect, using the default configuration.
    pub fn new(
        connection: impl Connection + 'static,
        dialect: impl SqlDialect + 'static,
    ) -> Self {
        Self {
            connection: Box::new(connection),
            dialect: Box::new(dialect),
            config: DatabaseConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: DatabaseConfig) -> Self {
        self.config = config;
        self
    }

    /// The dialect.
    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    /// The configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Execute a data-modifying statement.
    pub fn execute(
        &self,
        sql: &str,
        params: &[Value],
        generated_key: Option<&ColumnDescriptor>,
    ) -> Result<ExecuteResult> {
        if self.config.log_statements {
            tracing::debug!(sql, params = params.len(), "Executing statement");
        }
        let result = self.connection.execute(sql, params, generated_key)?;
        tracing::trace!(affected = result.affected_rows, "Statement executed");
        Ok(result)
    }

    /// Run a query.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        if self.config.log_statements {
            tracing::debug!(sql, params = params.len(), "Executing query");
        }
        self.connection.query(sql, params)
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok` and rolls back when it returns `Err`
    /// or when the commit itself fails.
    /// Rolling back restores rows, not instances: `persisted` flags and
    /// dirty state changed inside `f` stay as they are.
    #[tracing::instrument(level = "debug", skip(self, f))]
    pub fn transaction<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        tracing::info!("Beginning transaction");
        self.execute(&self.dialect.begin(), &[], None)?;

        match f(self) {
            Ok(value) => {
                tracing::info!("Committing transaction");
                if let Err(error) = self.execute(&self.dialect.commit(), &[], None) {
                    tracing::warn!(%error, "Commit failed; rolling back");
                    self.rollback();
                    return Err(error);
                }
                Ok(value)
            }
            Err(error) => {
                tracing::info!(%error, "Rolling back transaction");
                self.rollback();
                Err(error)
            }
        }
    }

    fn rollback(&self) {
        if let Err(error) = self.execute(&self.dialect.rollback(), &[], None) {
            tracing::warn!(%error, "Rollback failed");
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
