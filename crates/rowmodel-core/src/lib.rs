//! Core types and the persistence engine for rowmodel.
//!
//! `rowmodel-core` is the **foundation layer** of the workspace. It defines
//! the entity contract, the mapping from entity types to tables, and the
//! active-record engine that turns attribute changes into SQL.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: [`Entity`] is implemented by user types (usually via
//!   `#[derive(Entity)]`), [`Connection`] by database drivers and
//!   [`SqlDialect`] by statement formatters.
//! - **Mapping**: [`EntityDeclaration`] is resolved once per type into a
//!   shared [`EntityDescriptor`]; [`ObjectMapping`] binds it to one instance.
//! - **State tracking**: every persistent field is an [`Attribute<T>`] that
//!   remembers its last persisted value and whether it changed since.
//! - **Engine**: [`Persist`] adds `save`, `destroy`, `destroy_all`, `find`
//!   and `query` to every entity; relationships cascade through
//!   [`HasMany`], [`HasOne`] and [`BelongsTo`].
//!
//! # Who Uses This Crate
//!
//! - `rowmodel-macros` generates `Entity` implementations defined here.
//! - `rowmodel` re-exports everything together with the derive macro.
//!
//! Most applications should use the `rowmodel` facade; reach for
//! `rowmodel-core` directly when writing drivers or dialects.

pub mod attribute;
pub mod config;
pub mod connection;
pub mod database;
pub mod dialect;
pub mod engine;
pub mod entity;
pub mod error;
pub mod field;
pub mod mapping;
pub mod memory;
pub mod query;
pub mod relationship;
pub mod types;
pub mod value;

pub use attribute::{Attribute, AttributeCell};
pub use config::{DatabaseConfig, EmptyUpdatePolicy};
pub use connection::{Connection, ExecuteResult, Row};
pub use database::Database;
pub use dialect::{
    Condition, Direction, GenericDialect, Operator, OrderBy, PostgresDialect, SelectStatement,
    SqlDialect,
};
pub use engine::Persist;
pub use entity::{Entity, EntityParts, EntityState};
pub use error::{ConnectionError, ConnectionErrorKind, Error, MappingError, Result};
pub use field::{ColumnDeclaration, ColumnDescriptor};
pub use mapping::{
    EntityDeclaration, EntityDescriptor, ObjectMapping, RelationshipDeclaration, TargetEntity,
    descriptor_for,
};
pub use memory::MemoryConnection;
pub use query::Query;
pub use relationship::{
    BelongsTo, HasMany, HasOne, Relation, RelationshipDescriptor, RelationshipKind,
};
pub use types::SqlType;
pub use value::{SqlValue, Value};
