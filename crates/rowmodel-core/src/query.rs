//! Typed SELECT queries that hydrate entities.
//!
//! ```
//! use rowmodel_core::{Direction, GenericDialect, Operator, Query};
//! # use rowmodel_core::{Attribute, AttributeCell, ColumnDeclaration, Entity, EntityDeclaration, EntityParts, EntityState};
//! # #[derive(Default)]
//! # struct Post { id: Attribute<i64>, state: EntityState }
//! # impl Entity for Post {
//! #     const NAME: &'static str = "Post";
//! #     fn declaration() -> EntityDeclaration {
//! #         EntityDeclaration::new(Self::NAME)
//! #             .table("posts")
//! #             .column(ColumnDeclaration::new("id", "i64").primary_key())
//! #     }
//! #     fn state(&self) -> &EntityState { &self.state }
//! #     fn attributes(&self) -> Vec<&dyn AttributeCell> { vec![&self.id as &dyn AttributeCell] }
//! #     fn parts(&mut self) -> EntityParts<'_> {
//! #         EntityParts { attributes: vec![&mut self.id as &mut dyn AttributeCell], relationships: vec![], state: &mut self.state }
//! #     }
//! # }
//!
//! let (sql, params) = Query::<Post>::new()
//!     .filter("id", Operator::Gt, 10_i64)
//!     .order_by("id", Direction::Desc)
//!     .limit(5)
//!     .build(&GenericDialect)?;
//!
//! assert_eq!(sql, "SELECT id FROM posts WHERE id > ? ORDER BY id DESC LIMIT 5");
//! assert_eq!(params.len(), 1);
//! # Ok::<(), rowmodel_core::Error>(())
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::connection::Row;
use crate::database::Database;
use crate::dialect::{Condition, Direction, Operator, OrderBy, SelectStatement, SqlDialect};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::mapping::{ObjectMapping, descriptor_for};
use crate::value::Value;

/// A SELECT over the table of `T`.
///
/// Column names are checked against `T`'s descriptor when the query is
/// built; an unknown column fails with
/// [`MappingError::UnknownColumn`](crate::MappingError::UnknownColumn).
pub struct Query<T> {
    conditions: Vec<(Condition, Value)>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Query<T> {
    /// A query returning every row.
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            _marker: PhantomData,
        }
    }

    /// Add a `column <op> value` condition. Conditions are ANDed.
    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        self.conditions.push((
            Condition {
                column: column.into(),
                op,
            },
            value.into(),
        ));
        self
    }

    /// Add a `column = value` condition.
    #[must_use]
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, Operator::Eq, value)
    }

    /// Add an ORDER BY term.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    /// Return at most `n` rows.
    #[must_use]
    pub const fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Skip the first `n` rows.
    #[must_use]
    pub const fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Render SQL and parameters for `dialect`.
    pub fn build(&self, dialect: &dyn SqlDialect) -> Result<(String, Vec<Value>)> {
        self.build_with_limit(dialect, self.limit)
    }

    fn build_with_limit(
        &self,
        dialect: &dyn SqlDialect,
        limit: Option<u64>,
    ) -> Result<(String, Vec<Value>)> {
        let descriptor = descriptor_for::<T>()?;
        for column in self
            .conditions
            .iter()
            .map(|(c, _)| &c.column)
            .chain(self.order_by.iter().map(|o| &o.column))
        {
            descriptor.require_column(column)?;
        }

        let stmt = SelectStatement {
            table: descriptor.table.clone(),
            projection: descriptor.column_names(),
            conditions: self.conditions.iter().map(|(c, _)| c.clone()).collect(),
            order_by: self.order_by.clone(),
            limit,
            offset: self.offset,
        };
        let params = self.conditions.iter().map(|(_, v)| v.clone()).collect();
        Ok((dialect.select(&stmt), params))
    }

    /// Run the query and hydrate every row.
    #[tracing::instrument(level = "debug", skip(self, db), fields(entity = T::NAME))]
    pub fn all(&self, db: &Database) -> Result<Vec<T>> {
        let (sql, params) = self.build(db.dialect())?;
        let rows = db.query(&sql, &params)?;
        tracing::debug!(rows = rows.len(), "Query returned");
        rows.iter().map(hydrate::<T>).collect()
    }

    /// Run the query with `LIMIT 1` and hydrate the row, if any.
    ///
    /// A `limit(0)` set on the query still applies.
    #[tracing::instrument(level = "debug", skip(self, db), fields(entity = T::NAME))]
    pub fn first(&self, db: &Database) -> Result<Option<T>> {
        let limit = self.limit.map_or(1, |l| l.min(1));
        let (sql, params) = self.build_with_limit(db.dialect(), Some(limit))?;
        let rows = db.query(&sql, &params)?;
        rows.first().map(hydrate::<T>).transpose()
    }
}

impl<T: Entity> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("conditions", &self.conditions)
            .field("order_by", &self.order_by)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

/// Build a clean, persisted instance from a result row.
pub fn hydrate<T: Entity>(row: &Row) -> Result<T> {
    let mut entity = T::default();
    {
        let mut mapping = ObjectMapping::of(&mut entity)?;
        let descriptor = std::sync::Arc::clone(&mapping.descriptor);
        for (column, cell) in descriptor.columns.iter().zip(mapping.attributes.iter_mut()) {
            let value = row.get(column.name).ok_or_else(|| Error::Conversion {
                expected: column.sql_type.sql_name(),
                found: format!("no `{}` column in row", column.name),
            })?;
            cell.load(value)?;
        }
        mapping.state.set_persisted(true);
    }
    Ok(entity)
}
