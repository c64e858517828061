//! rowmodel: active-record persistence for Rust.
//!
//! Entities are plain structs whose persistent fields are [`Attribute<T>`]
//! cells. Each cell remembers the last persisted value, so `save()` knows
//! whether to INSERT or UPDATE and which columns to send. Relationships
//! ([`HasMany`], [`HasOne`], [`BelongsTo`]) cascade saves and deletes in a
//! fixed order.
//!
//! # Role In The Architecture
//!
//! This is the user-facing facade. It re-exports the engine from
//! `rowmodel-core` and the `#[derive(Entity)]` macro from `rowmodel-macros`.
//! Code generated by the derive refers to `::rowmodel_core`, so crates that
//! derive `Entity` depend on `rowmodel-core` alongside this crate.
//!
//! # Example
//!
//! ```ignore
//! use rowmodel::prelude::*;
//!
//! #[derive(Debug, Default, Entity)]
//! #[entity(table = "users")]
//! struct User {
//!     #[column(primary_key, auto_generated)]
//!     id: Attribute<Option<i64>>,
//!     #[column(nullable)]
//!     email: Attribute<Option<String>>,
//!     state: EntityState,
//! }
//!
//! let db = Database::new(MemoryConnection::new(), GenericDialect);
//! let mut user = User::default();
//! user.email.write(Some("ada@example.com".to_string()));
//! assert!(user.save(&db)?);
//! assert!(user.is_persisted());
//! ```

pub use rowmodel_core::*;
pub use rowmodel_macros::Entity;

/// Everything needed to declare and persist entities.
pub mod prelude {
    pub use rowmodel_core::{
        Attribute, BelongsTo, Database, DatabaseConfig, Direction, EmptyUpdatePolicy, Entity,
        EntityState, Error, GenericDialect, HasMany, HasOne, MemoryConnection, Operator, Persist,
        PostgresDialect, Query, Result, Value,
    };
    pub use rowmodel_macros::Entity;
}
