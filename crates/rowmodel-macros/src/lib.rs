//! Procedural macros for rowmodel.
//!
//! `#[derive(Entity)]` generates the `rowmodel_core::Entity` implementation
//! for a struct: its declaration (table, columns, relationships) and the
//! accessors the persistence engine uses to reach the struct's cells.
//!
//! ```ignore
//! #[derive(Debug, Default, Entity)]
//! #[entity(table = "users")]
//! struct User {
//!     #[column(primary_key, auto_generated)]
//!     id: Attribute<Option<i64>>,
//!     #[column(name = "email_address", nullable)]
//!     email: Attribute<Option<String>>,
//!     #[has_many(foreign_key = "author_id")]
//!     posts: HasMany<Post>,
//!     state: EntityState,
//! }
//! ```
//!
//! Generated code refers to `::rowmodel_core`, so the crate deriving must
//! depend on `rowmodel-core` (directly or through the `rowmodel` facade's
//! dependency set in tests).

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod entity_derive;

/// Derive `Entity` for a struct with named fields.
///
/// Struct attribute: `#[entity(table = "...")]` (defaults to the lowercased
/// struct name).
///
/// Field attributes:
///
/// - `#[column(name = "...", sql_type = "...", primary_key, auto_generated, nullable)]`
///   on `Attribute<T>` fields;
/// - `#[has_many(foreign_key = "...", local_key = "...")]` on `HasMany<T>`,
///   `#[has_one(...)]` on `HasOne<T>`, `#[belongs_to(...)]` on `BelongsTo<T>`.
///
/// Exactly one field must have type `EntityState`.
#[proc_macro_derive(Entity, attributes(entity, column, has_many, has_one, belongs_to))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match entity_derive::parse_entity(&input) {
        Ok(def) => entity_derive::generate_entity_impl(&def).into(),
        Err(err) => err.to_compile_error().into(),
    }
}
