//! SQL dialects.
//!
//! A dialect turns table and column names into statement text. It never
//! sees values: every value is a positional placeholder, and the caller
//! binds parameters in the order `set values ++ where values`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison operator used in WHERE clauses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    #[default]
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `LIKE`
    Like,
}

impl Operator {
    /// SQL spelling.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
        }
    }

    /// Parse an SQL spelling. `!=` is accepted for `<>`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "=" => Some(Operator::Eq),
            "<>" | "!=" => Some(Operator::NotEq),
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Le),
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Ge),
            "LIKE" => Some(Operator::Like),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Direction {
    /// SQL spelling.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One WHERE condition; the value is bound separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Column name.
    pub column: String,
    /// Comparison.
    pub op: Operator,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column name.
    pub column: String,
    /// Direction.
    pub direction: Direction,
}

/// A SELECT over a single table. Conditions are joined with `AND`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectStatement {
    /// Table name.
    pub table: String,
    /// Projected columns; empty means `*`.
    pub projection: Vec<String>,
    /// WHERE conditions.
    pub conditions: Vec<Condition>,
    /// ORDER BY terms.
    pub order_by: Vec<OrderBy>,
    /// LIMIT.
    pub limit: Option<u64>,
    /// OFFSET.
    pub offset: Option<u64>,
}

impl SelectStatement {
    /// Select `projection` from `table`.
    pub fn new(table: impl Into<String>, projection: Vec<String>) -> Self {
        Self {
            table: table.into(),
            projection,
            ..Self::default()
        }
    }
}

/// Formats statements for one SQL flavor.
///
/// Only [`placeholder`](SqlDialect::placeholder) is required; the statement
/// builders are written against it and [`quote_identifier`](SqlDialect::quote_identifier).
pub trait SqlDialect: Send + Sync {
    /// Placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Render an identifier. The default leaves it bare.
    fn quote_identifier(&self, ident: &str) -> String {
        ident.to_string()
    }

    /// `INSERT INTO t (a, b) VALUES (?, ?)`, or `INSERT INTO t DEFAULT VALUES`
    /// when no column is given.
    fn insert(&self, table: &str, columns: &[&str]) -> String {
        let table = self.quote_identifier(table);
        if columns.is_empty() {
            return format!("INSERT INTO {table} DEFAULT VALUES");
        }
        let names: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| self.placeholder(i)).collect();
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            names.join(", "),
            placeholders.join(", ")
        )
    }

    /// `UPDATE t SET a = ?, b = ? WHERE id = ?`.
    ///
    /// `where_ops[i]` applies to `where_columns[i]`; missing entries are `=`.
    fn update(
        &self,
        table: &str,
        set_columns: &[&str],
        where_columns: &[&str],
        where_ops: &[Operator],
    ) -> String {
        let sets: Vec<String> = set_columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = {}", self.quote_identifier(c), self.placeholder(i + 1)))
            .collect();
        let mut sql = format!(
            "UPDATE {} SET {}",
            self.quote_identifier(table),
            sets.join(", ")
        );
        push_where(self, &mut sql, where_columns, where_ops, set_columns.len());
        sql
    }

    /// `DELETE FROM t WHERE id = ?`.
    fn delete(&self, table: &str, where_columns: &[&str], where_ops: &[Operator]) -> String {
        let mut sql = format!("DELETE FROM {}", self.quote_identifier(table));
        push_where(self, &mut sql, where_columns, where_ops, 0);
        sql
    }

    /// `SELECT a, b FROM t WHERE c = ? ORDER BY a DESC LIMIT 10 OFFSET 20`.
    fn select(&self, stmt: &SelectStatement) -> String {
        let projection = if stmt.projection.is_empty() {
            "*".to_string()
        } else {
            stmt.projection
                .iter()
                .map(|c| self.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut sql = format!(
            "SELECT {projection} FROM {}",
            self.quote_identifier(&stmt.table)
        );

        let columns: Vec<&str> = stmt.conditions.iter().map(|c| c.column.as_str()).collect();
        let ops: Vec<Operator> = stmt.conditions.iter().map(|c| c.op).collect();
        push_where(self, &mut sql, &columns, &ops, 0);

        if !stmt.order_by.is_empty() {
            let terms: Vec<String> = stmt
                .order_by
                .iter()
                .map(|o| format!("{} {}", self.quote_identifier(&o.column), o.direction.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if let Some(limit) = stmt.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = stmt.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    /// Statement opening a transaction.
    fn begin(&self) -> String {
        "BEGIN".to_string()
    }

    /// Statement committing a transaction.
    fn commit(&self) -> String {
        "COMMIT".to_string()
    }

    /// Statement rolling back a transaction.
    fn rollback(&self) -> String {
        "ROLLBACK".to_string()
    }
}

fn push_where<D: SqlDialect + ?Sized>(
    dialect: &D,
    sql: &mut String,
    columns: &[&str],
    ops: &[Operator],
    bound_before: usize,
) {
    if columns.is_empty() {
        return;
    }
    let terms: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let op = ops.get(i).copied().unwrap_or_default();
            format!(
                "{} {} {}",
                dialect.quote_identifier(c),
                op.as_sql(),
                dialect.placeholder(bound_before + i + 1)
            )
        })
        .collect();
    sql.push_str(" WHERE ");
    sql.push_str(&terms.join(" AND "));
}

/// `?` placeholders and bare identifiers (SQLite, MySQL).
///
/// This is also the exact shape understood by
/// [`MemoryConnection`](crate::MemoryConnection).
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDialect;

impl SqlDialect for GenericDialect {
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }
}

/// `$n` placeholders and double-quoted identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_insert() {
        assert_eq!(
            GenericDialect.insert("users", &["name", "email"]),
            "INSERT INTO users (name, email) VALUES (?, ?)"
        );
        assert_eq!(
            GenericDialect.insert("users", &[]),
            "INSERT INTO users DEFAULT VALUES"
        );
    }

    #[test]
    fn test_generic_update_and_delete() {
        assert_eq!(
            GenericDialect.update("users", &["name"], &["id"], &[Operator::Eq]),
            "UPDATE users SET name = ? WHERE id = ?"
        );
        assert_eq!(
            GenericDialect.delete("posts", &["user_id"], &[]),
            "DELETE FROM posts WHERE user_id = ?"
        );
    }

    #[test]
    fn test_postgres_numbers_where_after_set() {
        assert_eq!(
            PostgresDialect.update("users", &["name", "email"], &["id"], &[Operator::Eq]),
            "UPDATE \"users\" SET \"name\" = $1, \"email\" = $2 WHERE \"id\" = $3"
        );
    }

    #[test]
    fn test_select_full() {
        let mut stmt = SelectStatement::new("posts", vec!["id".into(), "title".into()]);
        stmt.conditions.push(Condition {
            column: "author_id".into(),
            op: Operator::Eq,
        });
        stmt.conditions.push(Condition {
            column: "title".into(),
            op: Operator::Like,
        });
        stmt.order_by.push(OrderBy {
            column: "id".into(),
            direction: Direction::Desc,
        });
        stmt.limit = Some(10);
        stmt.offset = Some(5);

        assert_eq!(
            GenericDialect.select(&stmt),
            "SELECT id, title FROM posts WHERE author_id = ? AND title LIKE ? ORDER BY id DESC LIMIT 10 OFFSET 5"
        );
    }

    #[test]
    fn test_select_star() {
        assert_eq!(
            GenericDialect.select(&SelectStatement::new("tags", vec![])),
            "SELECT * FROM tags"
        );
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(Operator::parse("!="), Some(Operator::NotEq));
        assert_eq!(Operator::parse("like"), Some(Operator::Like));
        assert_eq!(Operator::parse("~"), None);
    }
}
