//! The persistence engine: `save`, `destroy` and `destroy_all`.
//!
//! Every operation maps the instance, asks the dialect for SQL, executes it
//! through the [`Database`], and only then updates the instance's
//! bookkeeping. A failed execute leaves dirty flags and `persisted` exactly
//! as they were.
//!
//! Ordering within `save()`:
//!
//! 1. belongs-to targets are saved and their keys copied into the local
//!    foreign keys;
//! 2. the instance's own row is inserted or updated;
//! 3. has-one and has-many children are linked to the instance and saved,
//!    whenever the instance is persisted, even if its own UPDATE was stale.
//!
//! `destroy_all()` deletes dependent rows before the instance's own row.

use std::sync::Arc;

use crate::config::EmptyUpdatePolicy;
use crate::database::Database;
use crate::dialect::Operator;
use crate::entity::Entity;
use crate::error::{Error, MappingError, Result};
use crate::mapping::{ObjectMapping, descriptor_for};
use crate::query::Query;
use crate::relationship::RelationshipKind;
use crate::value::Value;

/// Persist an instance. See [`Persist::save`].
#[tracing::instrument(level = "debug", skip(entity, db), fields(entity = E::NAME))]
pub fn save<E: Entity>(entity: &mut E, db: &Database) -> Result<bool> {
    let mut mapping = ObjectMapping::of(entity)?;
    save_mapping(&mut mapping, db)
}

/// Delete an instance's row. See [`Persist::destroy`].
#[tracing::instrument(level = "debug", skip(entity, db), fields(entity = E::NAME))]
pub fn destroy<E: Entity>(entity: &mut E, db: &Database) -> Result<bool> {
    let mut mapping = ObjectMapping::of(entity)?;
    destroy_mapping(&mut mapping, db)
}

/// Delete dependent rows, then the instance's row. See
/// [`Persist::destroy_all`].
#[tracing::instrument(level = "debug", skip(entity, db), fields(entity = E::NAME))]
pub fn destroy_all<E: Entity>(entity: &mut E, db: &Database) -> Result<bool> {
    let mut mapping = ObjectMapping::of(entity)?;
    let descriptor = Arc::clone(&mapping.descriptor);

    for (rel, holder) in descriptor
        .relationships
        .iter()
        .zip(mapping.relationships.iter_mut())
    {
        let local = descriptor.require_column(&rel.local_key)?;
        let local_value = if mapping.state.is_persisted() {
            mapping.attributes[local].original_value()
        } else {
            mapping.attributes[local].value()
        };
        let deleted = holder
            .destroy_all(db, rel, &local_value)
            .map_err(|e| Error::relationship(rel.name, e))?;
        tracing::debug!(relationship = rel.name, deleted, "Destroyed dependents");
    }

    destroy_mapping(&mut mapping, db)
}

/// Load the instance with the given primary key.
#[tracing::instrument(level = "debug", skip(db, key), fields(entity = E::NAME))]
pub fn find<E: Entity>(db: &Database, key: impl Into<Value>) -> Result<Option<E>> {
    let descriptor = descriptor_for::<E>()?;
    Query::<E>::new()
        .eq(descriptor.primary_key().name, key)
        .first(db)
}

fn save_mapping(mapping: &mut ObjectMapping<'_>, db: &Database) -> Result<bool> {
    let descriptor = Arc::clone(&mapping.descriptor);

    for (rel, holder) in descriptor
        .relationships
        .iter()
        .zip(mapping.relationships.iter_mut())
    {
        if rel.kind != RelationshipKind::BelongsTo {
            continue;
        }
        let key = holder
            .save(db, rel, &Value::Null)
            .map_err(|e| Error::relationship(rel.name, e))?;
        if let Some(key) = key {
            let local = descriptor.require_column(&rel.local_key)?;
            mapping.attributes[local].assign(&key)?;
        }
    }

    let row_written = if mapping.state.is_persisted() {
        update_row(mapping, db)?
    } else {
        insert_row(mapping, db)?
    };
    if !mapping.state.is_persisted() {
        return Ok(row_written);
    }

    for (rel, holder) in descriptor
        .relationships
        .iter()
        .zip(mapping.relationships.iter_mut())
    {
        if !rel.kind.is_owning() {
            continue;
        }
        let local = descriptor.require_column(&rel.local_key)?;
        let local_value = mapping.attributes[local].value();
        holder
            .save(db, rel, &local_value)
            .map_err(|e| Error::relationship(rel.name, e))?;
    }

    Ok(row_written)
}

fn insert_row(mapping: &mut ObjectMapping<'_>, db: &Database) -> Result<bool> {
    let descriptor = Arc::clone(&mapping.descriptor);
    let pk = descriptor.primary_key;
    let key_column = descriptor.primary_key();

    let mut columns = mapping.dirty_columns();
    if key_column.auto_generated {
        if mapping.attributes[pk].value().is_null() {
            columns.retain(|&i| i != pk);
        }
    } else if !columns.contains(&pk) {
        columns.push(pk);
        columns.sort_unstable();
    }

    let names: Vec<&str> = columns.iter().map(|&i| descriptor.columns[i].name).collect();
    let values: Vec<Value> = columns
        .iter()
        .map(|&i| mapping.attributes[i].value())
        .collect();
    let sql = db.dialect().insert(&descriptor.table, &names);
    let result = db.execute(&sql, &values, Some(key_column))?;

    if result.affected_rows == 0 {
        tracing::warn!(
            entity = descriptor.entity,
            table = %descriptor.table,
            "Insert touched no rows"
        );
        return Ok(false);
    }

    mapping.state.set_persisted(true);
    for &i in &columns {
        mapping.attributes[i].mark_clean();
    }
    match result.generated_key {
        Some(key) if key_column.auto_generated => mapping.attributes[pk].load(&key)?,
        _ => mapping.attributes[pk].mark_clean(),
    }

    tracing::info!(
        entity = descriptor.entity,
        table = %descriptor.table,
        columns = columns.len(),
        "Inserted row"
    );
    Ok(true)
}

fn update_row(mapping: &mut ObjectMapping<'_>, db: &Database) -> Result<bool> {
    let descriptor = Arc::clone(&mapping.descriptor);
    let pk = descriptor.primary_key;
    let key_name = descriptor.primary_key().name;
    let persisted_key = mapping.attributes[pk].original_value();

    let columns = mapping.dirty_columns();
    let (names, mut values) = if columns.is_empty() {
        match db.config().empty_update {
            EmptyUpdatePolicy::Skip => {
                tracing::trace!(entity = descriptor.entity, "Nothing to update");
                return Ok(true);
            }
            EmptyUpdatePolicy::Execute => (vec![key_name], vec![persisted_key.clone()]),
        }
    } else {
        (
            columns.iter().map(|&i| descriptor.columns[i].name).collect(),
            columns
                .iter()
                .map(|&i| mapping.attributes[i].value())
                .collect::<Vec<_>>(),
        )
    };
    values.push(persisted_key);

    let sql = db
        .dialect()
        .update(&descriptor.table, &names, &[key_name], &[Operator::Eq]);
    let result = db.execute(&sql, &values, None)?;

    if result.affected_rows == 0 {
        tracing::warn!(
            entity = descriptor.entity,
            table = %descriptor.table,
            "Update touched no rows; instance is stale"
        );
        return Ok(false);
    }

    for &i in &columns {
        mapping.attributes[i].mark_clean();
    }
    tracing::info!(
        entity = descriptor.entity,
        table = %descriptor.table,
        columns = columns.len(),
        "Updated row"
    );
    Ok(true)
}

fn destroy_mapping(mapping: &mut ObjectMapping<'_>, db: &Database) -> Result<bool> {
    let descriptor = Arc::clone(&mapping.descriptor);
    let key_name = descriptor.primary_key().name;
    let persisted = mapping.state.is_persisted();
    let key = mapping.stored_value_at(descriptor.primary_key);

    let sql = db
        .dialect()
        .delete(&descriptor.table, &[key_name], &[Operator::Eq]);
    let result = db.execute(&sql, &[key], None)?;

    if result.affected_rows == 0 {
        if persisted {
            tracing::warn!(
                entity = descriptor.entity,
                table = %descriptor.table,
                "Delete touched no rows; instance is stale"
            );
        }
        return Ok(false);
    }

    mapping.forget();
    tracing::info!(
        entity = descriptor.entity,
        table = %descriptor.table,
        "Deleted row"
    );
    Ok(true)
}

/// Active-record operations available on every [`Entity`].
///
/// ```
/// use rowmodel_core::{Database, GenericDialect, MemoryConnection, Persist};
/// # use rowmodel_core::{Attribute, AttributeCell, ColumnDeclaration, Entity, EntityDeclaration, EntityParts, EntityState};
/// # #[derive(Debug, Default)]
/// # struct Tag { id: Attribute<Option<i64>>, label: Attribute<String>, state: EntityState }
/// # impl Entity for Tag {
/// #     const NAME: &'static str = "Tag";
/// #     fn declaration() -> EntityDeclaration {
/// #         EntityDeclaration::new(Self::NAME)
/// #             .column(ColumnDeclaration::new("id", "Option<i64>").primary_key().auto_generated())
/// #             .column(ColumnDeclaration::new("label", "String"))
/// #     }
/// #     fn state(&self) -> &EntityState { &self.state }
/// #     fn attributes(&self) -> Vec<&dyn AttributeCell> {
/// #         vec![&self.id as &dyn AttributeCell, &self.label as &dyn AttributeCell]
/// #     }
/// #     fn parts(&mut self) -> EntityParts<'_> {
/// #         EntityParts {
/// #             attributes: vec![&mut self.id as &mut dyn AttributeCell, &mut self.label as &mut dyn AttributeCell],
/// #             relationships: vec![],
/// #             state: &mut self.state,
/// #         }
/// #     }
/// # }
/// let db = Database::new(MemoryConnection::new(), GenericDialect);
///
/// let mut tag = Tag::default();
/// tag.label.write("rust");
/// assert!(tag.save(&db)?);
/// assert!(tag.is_persisted());
///
/// let loaded = Tag::find(&db, tag.id()?)?.unwrap();
/// assert_eq!(loaded.label.read(), "rust");
/// # Ok::<(), rowmodel_core::Error>(())
/// ```
pub trait Persist: Entity + Sized {
    /// Insert or update the instance's row and cascade through its
    /// relationships.
    ///
    /// Returns `false` when the statement touched no rows. With no modified
    /// attribute on a persisted instance, the configured
    /// [`EmptyUpdatePolicy`] decides whether any SQL runs.
    fn save(&mut self, db: &Database) -> Result<bool> {
        save(self, db)
    }

    /// Delete the instance's row. Relationship rows are left alone.
    ///
    /// On success the instance is no longer persisted and every attribute is
    /// modified, so a following `save()` inserts the full row again.
    fn destroy(&mut self, db: &Database) -> Result<bool> {
        destroy(self, db)
    }

    /// Delete dependent rows of every relationship, then the instance's row.
    fn destroy_all(&mut self, db: &Database) -> Result<bool> {
        destroy_all(self, db)
    }

    /// Current primary key value.
    fn id(&self) -> Result<Value> {
        let descriptor = descriptor_for::<Self>()?;
        let cells = self.attributes();
        cells
            .get(descriptor.primary_key)
            .map(|cell| cell.value())
            .ok_or_else(|| {
                Error::from(MappingError::ShapeMismatch {
                    entity: Self::NAME,
                    what: "columns",
                    expected: descriptor.columns.len(),
                    found: cells.len(),
                })
            })
    }

    /// Whether a row with this instance's key is believed to exist.
    fn is_persisted(&self) -> bool {
        self.state().is_persisted()
    }

    /// Load the instance with the given primary key.
    fn find(db: &Database, key: impl Into<Value>) -> Result<Option<Self>> {
        find(db, key)
    }

    /// Start a query over this entity's table.
    fn query() -> Query<Self> {
        Query::new()
    }
}

impl<E: Entity> Persist for E {}
