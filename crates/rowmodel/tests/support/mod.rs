//! Shared entities and connections for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use rowmodel::prelude::*;
use rowmodel::{ColumnDescriptor, Connection, ExecuteResult, Row};

#[derive(Debug, Default, Entity)]
#[entity(table = "authors")]
pub struct Author {
    #[column(primary_key, auto_generated)]
    pub id: Attribute<Option<i64>>,
    pub name: Attribute<String>,
    #[column(nullable)]
    pub email: Attribute<Option<String>>,
    #[has_many(foreign_key = "author_id")]
    pub posts: HasMany<Post>,
    #[has_one(foreign_key = "author_id")]
    pub profile: HasOne<Profile>,
    pub state: EntityState,
}

impl Author {
    pub fn named(name: &str) -> Self {
        let mut author = Self::default();
        author.name.write(name);
        author
    }
}

#[derive(Debug, Default, Entity)]
#[entity(table = "posts")]
pub struct Post {
    #[column(primary_key, auto_generated)]
    pub id: Attribute<Option<i64>>,
    pub title: Attribute<String>,
    pub author_id: Attribute<Option<i64>>,
    #[belongs_to]
    pub author: BelongsTo<Author>,
    pub state: EntityState,
}

impl Post {
    pub fn titled(title: &str) -> Self {
        let mut post = Self::default();
        post.title.write(title);
        post
    }
}

#[derive(Debug, Default, Entity)]
#[entity(table = "profiles")]
pub struct Profile {
    #[column(primary_key, auto_generated)]
    pub id: Attribute<Option<i64>>,
    pub bio: Attribute<Option<String>>,
    pub author_id: Attribute<Option<i64>>,
    pub state: EntityState,
}

/// An entity keyed by a caller-supplied code.
#[derive(Debug, Default, Entity)]
#[entity(table = "countries")]
pub struct Country {
    #[column(primary_key)]
    pub code: Attribute<String>,
    pub name: Attribute<String>,
    pub population: Attribute<i64>,
    pub state: EntityState,
}

impl Country {
    pub fn new(code: &str, name: &str, population: i64) -> Self {
        let mut country = Self::default();
        country.code.write(code);
        country.name.write(name);
        country.population.write(population);
        country
    }
}

pub fn memory_db() -> (Database, MemoryConnection) {
    let conn = MemoryConnection::new();
    (Database::new(conn.clone(), GenericDialect), conn)
}

/// One statement seen by a [`ScriptedConnection`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct Script {
    results: VecDeque<Result<ExecuteResult>>,
    rows: VecDeque<Vec<Row>>,
    calls: Vec<Call>,
}

/// A connection that replays queued outcomes and records every call.
///
/// Unscripted executes affect one row; unscripted queries return nothing.
#[derive(Clone, Default)]
pub struct ScriptedConnection {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnection {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_affected(&self, rows: u64) -> &Self {
        self.script()
            .results
            .push_back(Ok(ExecuteResult::affected(rows)));
        self
    }

    pub fn push_result(&self, result: ExecuteResult) -> &Self {
        self.script().results.push_back(Ok(result));
        self
    }

    pub fn push_error(&self, error: Error) -> &Self {
        self.script().results.push_back(Err(error));
        self
    }

    pub fn push_rows(&self, rows: Vec<Row>) -> &Self {
        self.script().rows.push_back(rows);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script().calls.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.sql).collect()
    }
}

impl Connection for ScriptedConnection {
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
        _generated_key: Option<&ColumnDescriptor>,
    ) -> Result<ExecuteResult> {
        let mut script = self.script();
        script.calls.push(Call {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        script
            .results
            .pop_front()
            .unwrap_or_else(|| Ok(ExecuteResult::affected(1)))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut script = self.script();
        script.calls.push(Call {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(script.rows.pop_front().unwrap_or_default())
    }
}

pub fn scripted_db() -> (Database, ScriptedConnection) {
    let conn = ScriptedConnection::new();
    (Database::new(conn.clone(), GenericDialect), conn)
}
