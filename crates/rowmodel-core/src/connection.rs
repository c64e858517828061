//! The database connection contract consumed by the persistence engine.
//!
//! A [`Connection`] runs already-formatted, parameterized SQL. It knows
//! nothing about entities; the engine and the dialect do all the mapping.

use crate::error::Result;
use crate::field::ColumnDescriptor;
use crate::value::Value;

/// Outcome of a data-modifying statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteResult {
    /// Rows inserted, updated or deleted.
    pub affected_rows: u64,
    /// Key generated by the database for an INSERT, when one was requested
    /// and the backend produced it.
    pub generated_key: Option<Value>,
}

impl ExecuteResult {
    /// Result reporting `affected_rows` and no generated key.
    pub const fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            generated_key: None,
        }
    }

    /// Attach a generated key.
    #[must_use]
    pub fn with_generated_key(mut self, key: Value) -> Self {
        self.generated_key = Some(key);
        self
    }
}

/// One result row, columns in projection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from parallel column and value lists.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Value of the named column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A database connection.
///
/// Implementations report constraint failures as
/// [`Error::ConstraintViolation`](crate::Error::ConstraintViolation) and
/// transport failures as [`Error::Connection`](crate::Error::Connection).
pub trait Connection: Send + Sync {
    /// Execute a data-modifying statement.
    ///
    /// `generated_key` names the primary-key column whose generated value the
    /// caller wants back; it is `Some` only for INSERT statements.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
        generated_key: Option<&ColumnDescriptor>,
    ) -> Result<ExecuteResult>;

    /// Run a SELECT and return every row.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
        generated_key: Option<&ColumnDescriptor>,
    ) -> Result<ExecuteResult> {
        (**self).execute(sql, params, generated_key)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }
}

impl<C: Connection + ?Sized> Connection for std::sync::Arc<C> {
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
        generated_key: Option<&ColumnDescriptor>,
    ) -> Result<ExecuteResult> {
        (**self).execute(sql, params, generated_key)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_get_by_name() {
        let row = Row::new(
            vec!["id".into(), "name".into()],
            vec![Value::BigInt(1), Value::Text("a".into())],
        );
        assert_eq!(row.get("name"), Some(&Value::Text("a".into())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_execute_result_builder() {
        let result = ExecuteResult::affected(1).with_generated_key(Value::BigInt(7));
        assert_eq!(result.affected_rows, 1);
        assert_eq!(result.generated_key, Some(Value::BigInt(7)));
    }
}
