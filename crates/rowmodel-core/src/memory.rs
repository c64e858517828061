//! An in-memory [`Connection`] for tests and examples.
//!
//! `MemoryConnection` understands exactly the statements produced by
//! [`GenericDialect`](crate::GenericDialect): single-table INSERT, UPDATE,
//! DELETE and SELECT with `?` placeholders, ANDed conditions, ORDER BY,
//! LIMIT and OFFSET, plus BEGIN/COMMIT/ROLLBACK. Tables are created on first
//! use and hold schemaless rows.
//!
//! When an INSERT asks for a generated key, the connection remembers that
//! column as the table's key: it assigns the next integer when the value is
//! missing and rejects duplicates with a constraint violation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use regex::{Captures, Regex};

use crate::connection::{Connection, ExecuteResult, Row};
use crate::dialect::Operator;
use crate::error::{ConnectionError, ConnectionErrorKind, Error, Result};
use crate::field::ColumnDescriptor;
use crate::types::SqlType;
use crate::value::Value;

type Record = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default)]
struct Table {
    key: Option<String>,
    next_id: i64,
    rows: Vec<Record>,
}

impl Table {
    fn observe_key(&mut self, value: &Value) {
        if let Some(id) = value.as_i64() {
            self.next_id = self.next_id.max(id);
        }
    }

    fn key_conflict(&self, value: &Value, skip: Option<usize>) -> bool {
        let Some(key) = &self.key else {
            return false;
        };
        self.rows.iter().enumerate().any(|(i, row)| {
            Some(i) != skip && row.get(key).is_some_and(|existing| existing.sql_eq(value))
        })
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Table>,
    snapshot: Option<HashMap<String, Table>>,
    statements: Vec<String>,
    fail_next: Option<Error>,
}

/// A shared in-memory database. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

struct Patterns {
    insert: Regex,
    insert_default: Regex,
    update: Regex,
    delete: Regex,
    select: Regex,
    assignment: Regex,
    condition: Regex,
    order_term: Regex,
}

fn patterns() -> Result<&'static Patterns> {
    static PATTERNS: OnceLock<std::result::Result<Patterns, regex::Error>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Ok(Patterns {
                insert: Regex::new(r"^INSERT INTO (\w+) \(([^)]*)\) VALUES \(([^)]*)\)$")?,
                insert_default: Regex::new(r"^INSERT INTO (\w+) DEFAULT VALUES$")?,
                update: Regex::new(r"^UPDATE (\w+) SET (.+?)(?: WHERE (.+))?$")?,
                delete: Regex::new(r"^DELETE FROM (\w+)(?: WHERE (.+))?$")?,
                select: Regex::new(
                    r"^SELECT (.+?) FROM (\w+)(?: WHERE (.+?))?(?: ORDER BY (.+?))?(?: LIMIT (\d+))?(?: OFFSET (\d+))?$",
                )?,
                assignment: Regex::new(r"^(\w+) = \?$")?,
                condition: Regex::new(r"^(\w+) (=|<>|<=|>=|<|>|LIKE) \?$")?,
                order_term: Regex::new(r"^(\w+) (ASC|DESC)$")?,
            })
        })
        .as_ref()
        .map_err(|e| syntax(format!("invalid statement pattern: {e}")))
}

fn syntax(message: impl Into<String>) -> Error {
    ConnectionError::new(ConnectionErrorKind::Syntax, message).into()
}

fn unique_violation(table: &str, column: &str) -> Error {
    Error::ConstraintViolation {
        message: format!("UNIQUE constraint failed: {table}.{column}"),
    }
}

struct Filter {
    column: String,
    op: Operator,
    value: Value,
}

impl Filter {
    fn matches(&self, row: &Record) -> bool {
        let Some(stored) = row.get(&self.column) else {
            return false;
        };
        if stored.is_null() || self.value.is_null() {
            return false;
        }
        match self.op {
            Operator::Eq => stored.sql_eq(&self.value),
            Operator::NotEq => !stored.sql_eq(&self.value),
            Operator::Lt => stored.compare(&self.value) == Some(Ordering::Less),
            Operator::Le => matches!(
                stored.compare(&self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Gt => stored.compare(&self.value) == Some(Ordering::Greater),
            Operator::Ge => matches!(
                stored.compare(&self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Like => match (stored.as_str(), self.value.as_str()) {
                (Some(text), Some(pattern)) => like(text, pattern),
                _ => false,
            },
        }
    }
}

fn like(text: &str, pattern: &str) -> bool {
    let translated = regex::escape(pattern).replace('%', ".*").replace('_', ".");
    Regex::new(&format!("(?is)^{translated}$")).is_ok_and(|re| re.is_match(text))
}

fn split_list(list: &str) -> Vec<&str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Parse `a = ? AND b LIKE ?`, binding values from `params`.
fn parse_filters(
    patterns: &Patterns,
    clause: Option<&str>,
    params: &mut impl Iterator<Item = Value>,
) -> Result<Vec<Filter>> {
    let Some(clause) = clause else {
        return Ok(Vec::new());
    };
    clause
        .split(" AND ")
        .map(|term| {
            let caps = patterns
                .condition
                .captures(term.trim())
                .ok_or_else(|| syntax(format!("unsupported condition `{term}`")))?;
            let op = Operator::parse(&caps[2])
                .ok_or_else(|| syntax(format!("unsupported operator `{}`", &caps[2])))?;
            let value = params
                .next()
                .ok_or_else(|| syntax("too few parameters"))?;
            Ok(Filter {
                column: caps[1].to_string(),
                op,
                value,
            })
        })
        .collect()
}

fn group<'t>(caps: &Captures<'t>, index: usize) -> Option<&'t str> {
    caps.get(index).map(|m| m.as_str())
}

fn ensure_consumed(params: &mut impl Iterator<Item = Value>) -> Result<()> {
    match params.next() {
        Some(_) => Err(syntax("too many parameters")),
        None => Ok(()),
    }
}

fn generated_value(column: &ColumnDescriptor, id: i64) -> Option<Value> {
    match column.sql_type {
        SqlType::SmallInt => i16::try_from(id).ok().map(Value::SmallInt),
        SqlType::Integer => i32::try_from(id).ok().map(Value::Int),
        SqlType::BigInt => Some(Value::BigInt(id)),
        _ => None,
    }
}

fn compare_nulls_first(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

impl MemoryConnection {
    /// An empty database.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every statement received so far, in order, including failed ones.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Forget the statement log.
    pub fn clear_statements(&self) {
        self.lock().statements.clear();
    }

    /// Make the next `execute` or `query` fail with `error`.
    pub fn fail_next(&self, error: Error) {
        self.lock().fail_next = Some(error);
    }

    /// Current rows of `table`, columns in name order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(table)
            .map(|t| {
                t.rows
                    .iter()
                    .map(|r| Row::new(r.keys().cloned().collect(), r.values().cloned().collect()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, |t| t.rows.len())
    }

    /// Whether a BEGIN is open.
    pub fn in_transaction(&self) -> bool {
        self.lock().snapshot.is_some()
    }

    fn begin_call(&self, sql: &str) -> Result<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        match state.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

impl MemoryState {
    fn transaction(&mut self, sql: &str) -> Result<Option<ExecuteResult>> {
        match sql {
            "BEGIN" => {
                if self.snapshot.is_some() {
                    return Err(syntax("cannot start a transaction within a transaction"));
                }
                self.snapshot = Some(self.tables.clone());
            }
            "COMMIT" => {
                if self.snapshot.take().is_none() {
                    return Err(syntax("cannot commit - no transaction is active"));
                }
            }
            "ROLLBACK" => match self.snapshot.take() {
                Some(tables) => self.tables = tables,
                None => return Err(syntax("cannot rollback - no transaction is active")),
            },
            _ => return Ok(None),
        }
        Ok(Some(ExecuteResult::affected(0)))
    }

    fn insert(
        &mut self,
        table_name: &str,
        columns: Vec<&str>,
        params: &[Value],
        generated_key: Option<&ColumnDescriptor>,
    ) -> Result<ExecuteResult> {
        if columns.len() != params.len() {
            return Err(syntax(format!(
                "{} values for {} columns",
                params.len(),
                columns.len()
            )));
        }
        let table = self.tables.entry(table_name.to_string()).or_default();
        if let Some(key) = generated_key {
            table.key = Some(key.name.to_string());
        }

        let mut record: Record = columns
            .iter()
            .zip(params)
            .map(|(c, v)| ((*c).to_string(), v.clone()))
            .collect();

        let mut generated = None;
        if let Some(key) = generated_key {
            let supplied = record.get(key.name).filter(|v| !v.is_null()).cloned();
            match supplied {
                Some(value) => {
                    if table.key_conflict(&value, None) {
                        return Err(unique_violation(table_name, key.name));
                    }
                    table.observe_key(&value);
                }
                None => {
                    if let Some(value) = generated_value(key, table.next_id + 1) {
                        table.next_id += 1;
                        record.insert(key.name.to_string(), value.clone());
                        generated = Some(value);
                    }
                }
            }
        } else if let Some(key) = table.key.clone() {
            if let Some(value) = record.get(&key) {
                if table.key_conflict(value, None) {
                    return Err(unique_violation(table_name, &key));
                }
                table.observe_key(value);
            }
        }

        table.rows.push(record);
        let result = ExecuteResult::affected(1);
        Ok(match generated {
            Some(key) => result.with_generated_key(key),
            None => result,
        })
    }

    fn update(
        &mut self,
        patterns: &Patterns,
        table_name: &str,
        assignments: &str,
        clause: Option<&str>,
        params: &[Value],
    ) -> Result<ExecuteResult> {
        let mut values = params.iter().cloned();
        let sets = split_list(assignments)
            .into_iter()
            .map(|a| {
                let caps = patterns
                    .assignment
                    .captures(a)
                    .ok_or_else(|| syntax(format!("unsupported assignment `{a}`")))?;
                let value = values.next().ok_or_else(|| syntax("too few parameters"))?;
                Ok((caps[1].to_string(), value))
            })
            .collect::<Result<Vec<_>>>()?;
        let filters = parse_filters(patterns, clause, &mut values)?;
        ensure_consumed(&mut values)?;

        let table = self.tables.entry(table_name.to_string()).or_default();
        let matched: Vec<usize> = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| filters.iter().all(|f| f.matches(row)))
            .map(|(i, _)| i)
            .collect();

        if let Some(key) = table.key.clone() {
            if let Some((_, new_key)) = sets.iter().find(|(c, _)| *c == key) {
                let conflict = matched.len() > 1
                    || matched
                        .first()
                        .is_some_and(|&i| table.key_conflict(new_key, Some(i)));
                if conflict {
                    return Err(unique_violation(table_name, &key));
                }
                table.observe_key(new_key);
            }
        }

        for &i in &matched {
            for (column, value) in &sets {
                table.rows[i].insert(column.clone(), value.clone());
            }
        }
        Ok(ExecuteResult::affected(matched.len() as u64))
    }

    fn delete(
        &mut self,
        patterns: &Patterns,
        table_name: &str,
        clause: Option<&str>,
        params: &[Value],
    ) -> Result<ExecuteResult> {
        let mut values = params.iter().cloned();
        let filters = parse_filters(patterns, clause, &mut values)?;
        ensure_consumed(&mut values)?;

        let table = self.tables.entry(table_name.to_string()).or_default();
        let before = table.rows.len();
        table
            .rows
            .retain(|row| !filters.iter().all(|f| f.matches(row)));
        Ok(ExecuteResult::affected((before - table.rows.len()) as u64))
    }

    fn select(&self, patterns: &Patterns, caps: &Captures<'_>, params: &[Value]) -> Result<Vec<Row>> {
        let mut values = params.iter().cloned();
        let filters = parse_filters(patterns, group(caps, 3), &mut values)?;
        ensure_consumed(&mut values)?;

        let rows = self
            .tables
            .get(&caps[2])
            .map(|t| t.rows.as_slice())
            .unwrap_or_default();
        let mut selected: Vec<&Record> = rows
            .iter()
            .filter(|row| filters.iter().all(|f| f.matches(row)))
            .collect();

        if let Some(order) = group(caps, 4) {
            let terms = split_list(order)
                .into_iter()
                .map(|t| {
                    let term = patterns
                        .order_term
                        .captures(t)
                        .ok_or_else(|| syntax(format!("unsupported ORDER BY term `{t}`")))?;
                    Ok((term[1].to_string(), &term[2] == "DESC"))
                })
                .collect::<Result<Vec<_>>>()?;
            selected.sort_by(|a, b| {
                terms
                    .iter()
                    .map(|(column, desc)| {
                        let ord = compare_nulls_first(a.get(column), b.get(column));
                        if *desc { ord.reverse() } else { ord }
                    })
                    .find(|ord| ord.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }

        let parse_count = |index: usize| -> Result<Option<usize>> {
            group(caps, index)
                .map(|n| n.parse().map_err(|_| syntax(format!("bad count `{n}`"))))
                .transpose()
        };
        let offset = parse_count(6)?.unwrap_or(0);
        let limit = parse_count(5)?.unwrap_or(usize::MAX);

        let projection = &caps[1];
        Ok(selected
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                if projection.trim() == "*" {
                    Row::new(row.keys().cloned().collect(), row.values().cloned().collect())
                } else {
                    let columns: Vec<String> =
                        split_list(projection).into_iter().map(str::to_string).collect();
                    let values = columns
                        .iter()
                        .map(|c| row.get(c).cloned().unwrap_or_default())
                        .collect();
                    Row::new(columns, values)
                }
            })
            .collect())
    }
}

impl Connection for MemoryConnection {
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
        generated_key: Option<&ColumnDescriptor>,
    ) -> Result<ExecuteResult> {
        let patterns = patterns()?;
        let mut state = self.begin_call(sql)?;
        let sql = sql.trim();

        if let Some(result) = state.transaction(sql)? {
            return Ok(result);
        }
        if let Some(caps) = patterns.insert.captures(sql) {
            return state.insert(&caps[1], split_list(&caps[2]), params, generated_key);
        }
        if let Some(caps) = patterns.insert_default.captures(sql) {
            return state.insert(&caps[1], Vec::new(), params, generated_key);
        }
        if let Some(caps) = patterns.update.captures(sql) {
            return state.update(patterns, &caps[1], &caps[2], group(&caps, 3), params);
        }
        if let Some(caps) = patterns.delete.captures(sql) {
            return state.delete(patterns, &caps[1], group(&caps, 2), params);
        }
        Err(syntax(format!("unsupported statement: {sql}")))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let patterns = patterns()?;
        let state = self.begin_call(sql)?;
        let caps = patterns
            .select
            .captures(sql.trim())
            .ok_or_else(|| syntax(format!("unsupported query: {sql}")))?;
        state.select(patterns, &caps, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ColumnDescriptor {
        ColumnDescriptor::new("id", "id", SqlType::BigInt)
            .primary_key(true)
            .auto_generated(true)
    }

    #[test]
    fn test_insert_generates_keys() {
        let conn = MemoryConnection::new();
        let first = conn
            .execute(
                "INSERT INTO users (name) VALUES (?)",
                &["a".into()],
                Some(&key()),
            )
            .unwrap();
        assert_eq!(first.affected_rows, 1);
        assert_eq!(first.generated_key, Some(Value::BigInt(1)));

        let second = conn
            .execute("INSERT INTO users DEFAULT VALUES", &[], Some(&key()))
            .unwrap();
        assert_eq!(second.generated_key, Some(Value::BigInt(2)));
        assert_eq!(conn.row_count("users"), 2);
    }

    #[test]
    fn test_duplicate_key_is_constraint_violation() {
        let conn = MemoryConnection::new();
        let sql = "INSERT INTO users (id, name) VALUES (?, ?)";
        conn.execute(sql, &[Value::BigInt(5), "a".into()], Some(&key()))
            .unwrap();
        let err = conn
            .execute(sql, &[Value::BigInt(5), "b".into()], Some(&key()))
            .unwrap_err();
        assert!(err.is_constraint_violation());

        let next = conn
            .execute("INSERT INTO users (name) VALUES (?)", &["c".into()], Some(&key()))
            .unwrap();
        assert_eq!(next.generated_key, Some(Value::BigInt(6)));
    }

    #[test]
    fn test_update_delete_select() {
        let conn = MemoryConnection::new();
        for name in ["ann", "bob", "cy"] {
            conn.execute("INSERT INTO users (name) VALUES (?)", &[name.into()], Some(&key()))
                .unwrap();
        }

        let updated = conn
            .execute(
                "UPDATE users SET name = ? WHERE id = ?",
                &["bea".into(), Value::BigInt(2)],
                None,
            )
            .unwrap();
        assert_eq!(updated.affected_rows, 1);

        let rows = conn
            .query(
                "SELECT id, name FROM users WHERE name LIKE ? ORDER BY id DESC LIMIT 1",
                &["b%".into()],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::Text("bea".into())));

        let deleted = conn
            .execute("DELETE FROM users WHERE id > ?", &[Value::Int(1)], None)
            .unwrap();
        assert_eq!(deleted.affected_rows, 2);
        assert_eq!(conn.row_count("users"), 1);
    }

    #[test]
    fn test_rollback_restores_rows() {
        let conn = MemoryConnection::new();
        conn.execute("BEGIN", &[], None).unwrap();
        conn.execute("INSERT INTO t (a) VALUES (?)", &[Value::Int(1)], None)
            .unwrap();
        assert!(conn.in_transaction());
        conn.execute("ROLLBACK", &[], None).unwrap();
        assert_eq!(conn.row_count("t"), 0);
        assert!(conn.execute("COMMIT", &[], None).is_err());
    }

    #[test]
    fn test_fail_next_is_consumed_and_logged() {
        let conn = MemoryConnection::new();
        conn.fail_next(Error::ConstraintViolation {
            message: "nope".into(),
        });
        assert!(conn.query("SELECT * FROM t", &[]).is_err());
        assert!(conn.query("SELECT * FROM t", &[]).unwrap().is_empty());
        assert_eq!(conn.statements().len(), 2);
    }

    #[test]
    fn test_rejects_unknown_shapes() {
        let conn = MemoryConnection::new();
        let err = conn.execute("DROP TABLE users", &[], None).unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Syntax,
                ..
            })
        ));
        assert!(
            conn.execute("UPDATE users SET a = ? WHERE b = ?", &[Value::Int(1)], None)
                .is_err()
        );
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like("Hello", "h_llo"));
        assert!(like("a.b", "a.%"));
        assert!(!like("axb", "a.b"));
    }
}
