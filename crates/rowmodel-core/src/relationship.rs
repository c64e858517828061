//! Relationships between entity types.
//!
//! A relationship is declared on the owning entity (see
//! [`RelationshipDeclaration`](crate::RelationshipDeclaration)) and stored on
//! the instance as a holder: [`HasMany`], [`HasOne`] or [`BelongsTo`]. The
//! holders carry the attached related instances and implement [`Relation`],
//! the cascade contract the engine drives during `save` and `destroy_all`.
//!
//! Cascade policy is fixed by role:
//!
//! | Role | `save` | `destroy_all` |
//! |---|---|---|
//! | belongs-to | target saved first if not persisted; its key written into the local foreign key | nothing |
//! | has-one / has-many | after the owner row: each attached child linked to the owner and saved | child rows deleted by foreign key |

use std::any::TypeId;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::dialect::Operator;
use crate::engine;
use crate::entity::Entity;
use crate::error::{MappingError, Result};
use crate::mapping::{EntityDescriptor, ObjectMapping, descriptor_for};
use crate::query::Query;
use crate::value::Value;

/// The role of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// One-to-one, foreign key on the target: `User` has one `Profile`.
    HasOne,
    /// One-to-many, foreign key on the target: `User` has many `Post`s.
    HasMany,
    /// Many-to-one, foreign key on the owner: `Post` belongs to `User`.
    BelongsTo,
}

impl RelationshipKind {
    /// Whether the foreign key lives on the target.
    pub const fn is_owning(self) -> bool {
        matches!(self, RelationshipKind::HasOne | RelationshipKind::HasMany)
    }

    /// Attribute spelling: `has_one`, `has_many` or `belongs_to`.
    pub const fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::HasOne => "has_one",
            RelationshipKind::HasMany => "has_many",
            RelationshipKind::BelongsTo => "belongs_to",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved metadata about one relationship of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    /// Holder field name.
    pub name: &'static str,
    /// Role.
    pub kind: RelationshipKind,
    /// Target type name.
    pub target_entity: &'static str,
    /// Target type identity.
    pub target_type: TypeId,
    /// Target table.
    pub target_table: String,
    /// Column on the owner.
    ///
    /// For has-one/has-many, the column whose value children point at
    /// (the owner's primary key by default). For belongs-to, the foreign key
    /// column (`<field>_id` by default).
    pub local_key: String,
    /// Column on the target.
    ///
    /// For has-one/has-many, the children's foreign key (`<owner table>_id`
    /// by default). For belongs-to, the referenced column (the target's
    /// primary key by default).
    pub foreign_key: String,
}

/// Cascade contract between an owner and a relationship holder.
///
/// `local_value` is the owner's value in
/// [`local_key`](RelationshipDescriptor::local_key) as stored in the
/// database.
pub trait Relation {
    /// Role of this holder.
    fn kind(&self) -> RelationshipKind;

    /// Target type identity.
    fn target_type(&self) -> TypeId;

    /// Save attached instances.
    ///
    /// Returns the key to write into the owner's local foreign key, for
    /// belongs-to holders with an attached target.
    fn save(
        &mut self,
        db: &Database,
        rel: &RelationshipDescriptor,
        local_value: &Value,
    ) -> Result<Option<Value>>;

    /// Delete dependent rows ahead of the owner. Returns the rows deleted.
    fn destroy_all(
        &mut self,
        db: &Database,
        rel: &RelationshipDescriptor,
        local_value: &Value,
    ) -> Result<u64>;
}

/// Find the single has-one/has-many relationship of `O` targeting `T`.
fn owning_relationship<O: Entity, T: Entity>(
    descriptor: &EntityDescriptor,
) -> std::result::Result<usize, MappingError> {
    let candidates: Vec<usize> = descriptor
        .relationships
        .iter()
        .enumerate()
        .filter(|(_, r)| r.kind.is_owning() && r.target_type == TypeId::of::<T>())
        .map(|(i, _)| i)
        .collect();
    match candidates.as_slice() {
        [single] => Ok(*single),
        [] => Err(MappingError::NoRelationship {
            entity: O::NAME,
            target: T::NAME,
        }),
        many => Err(MappingError::AmbiguousRelationship {
            entity: O::NAME,
            target: T::NAME,
            count: many.len(),
        }),
    }
}

/// A query for the `T` rows whose foreign key points at `owner`.
fn children_query<O: Entity, T: Entity>(owner: &O, name: Option<&str>) -> Result<Query<T>> {
    let descriptor = descriptor_for::<O>()?;
    let index = match name {
        Some(name) => descriptor
            .relationships
            .iter()
            .position(|r| r.name == name && r.kind.is_owning())
            .ok_or(MappingError::NoRelationship {
                entity: O::NAME,
                target: T::NAME,
            })?,
        None => owning_relationship::<O, T>(&descriptor)?,
    };
    let rel = &descriptor.relationships[index];

    let column = descriptor.require_column(&rel.local_key)?;
    let cells = owner.attributes();
    let cell = cells.get(column).ok_or(MappingError::ShapeMismatch {
        entity: O::NAME,
        what: "columns",
        expected: descriptor.columns.len(),
        found: cells.len(),
    })?;
    let value = if owner.state().is_persisted() {
        cell.original_value()
    } else {
        cell.value()
    };

    Ok(Query::new().filter(rel.foreign_key.clone(), Operator::Eq, value))
}

fn save_children<'c, T: Entity>(
    children: impl Iterator<Item = &'c mut T>,
    db: &Database,
    rel: &RelationshipDescriptor,
    local_value: &Value,
) -> Result<Option<Value>> {
    for child in children {
        ObjectMapping::of(&mut *child)?.assign(&rel.foreign_key, local_value)?;
        if !engine::save(child, db)? {
            tracing::warn!(
                relationship = rel.name,
                target = rel.target_entity,
                "Dependent save touched no rows"
            );
        }
    }
    Ok(None)
}

fn destroy_children<'c, T: Entity>(
    children: impl Iterator<Item = &'c mut T>,
    db: &Database,
    rel: &RelationshipDescriptor,
    local_value: &Value,
) -> Result<u64> {
    let sql = db
        .dialect()
        .delete(&rel.target_table, &[rel.foreign_key.as_str()], &[Operator::Eq]);
    let result = db.execute(&sql, std::slice::from_ref(local_value), None)?;
    for child in children {
        let mut mapping = ObjectMapping::of(child)?;
        if mapping.is_persisted() && mapping.stored_value(&rel.foreign_key)?.sql_eq(local_value) {
            mapping.forget();
        }
    }
    Ok(result.affected_rows)
}

/// Zero or more `T` rows whose foreign key points at the owner.
pub struct HasMany<T> {
    items: Vec<T>,
}

impl<T: Entity> HasMany<T> {
    /// An empty holder.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Attach a child; it is saved with the owner.
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Attached children.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Attached children, mutably.
    pub fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Iterate attached children.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of attached children.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is attached.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Detach every child without touching the database.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Query for the stored children of `owner`.
    ///
    /// The relationship is found by target type; use
    /// [`query_via`](Self::query_via) when the owner has several
    /// relationships to `T`.
    pub fn query<O: Entity>(&self, owner: &O) -> Result<Query<T>> {
        children_query(owner, None)
    }

    /// Query for the stored children of `owner` through the named
    /// relationship.
    pub fn query_via<O: Entity>(&self, owner: &O, relationship: &str) -> Result<Query<T>> {
        children_query(owner, Some(relationship))
    }

    /// Load the stored children of `owner`.
    pub fn results<O: Entity>(&self, owner: &O, db: &Database) -> Result<Vec<T>> {
        self.query(owner)?.all(db)
    }
}

impl<T: Entity> Default for HasMany<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for HasMany<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl<T: Entity> FromIterator<T> for HasMany<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T: Entity> Relation for HasMany<T> {
    fn kind(&self) -> RelationshipKind {
        RelationshipKind::HasMany
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn save(
        &mut self,
        db: &Database,
        rel: &RelationshipDescriptor,
        local_value: &Value,
    ) -> Result<Option<Value>> {
        save_children(self.items.iter_mut(), db, rel, local_value)
    }

    fn destroy_all(
        &mut self,
        db: &Database,
        rel: &RelationshipDescriptor,
        local_value: &Value,
    ) -> Result<u64> {
        destroy_children(self.items.iter_mut(), db, rel, local_value)
    }
}

/// At most one `T` row whose foreign key points at the owner.
pub struct HasOne<T> {
    item: Option<Box<T>>,
}

impl<T: Entity> HasOne<T> {
    /// An empty holder.
    pub fn new() -> Self {
        Self { item: None }
    }

    /// Attach the child, replacing any previous one.
    pub fn set(&mut self, item: T) {
        self.item = Some(Box::new(item));
    }

    /// The attached child.
    pub fn get(&self) -> Option<&T> {
        self.item.as_deref()
    }

    /// The attached child, mutably.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.item.as_deref_mut()
    }

    /// Detach and return the child without touching the database.
    pub fn take(&mut self) -> Option<T> {
        self.item.take().map(|b| *b)
    }

    /// Query for the stored child of `owner`.
    pub fn query<O: Entity>(&self, owner: &O) -> Result<Query<T>> {
        children_query(owner, None)
    }

    /// Load the stored child of `owner`.
    pub fn result<O: Entity>(&self, owner: &O, db: &Database) -> Result<Option<T>> {
        self.query(owner)?.first(db)
    }
}

impl<T: Entity> Default for HasOne<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for HasOne<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HasOne").field(&self.item).finish()
    }
}

impl<T: Entity> Relation for HasOne<T> {
    fn kind(&self) -> RelationshipKind {
        RelationshipKind::HasOne
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn save(
        &mut self,
        db: &Database,
        rel: &RelationshipDescriptor,
        local_value: &Value,
    ) -> Result<Option<Value>> {
        save_children(self.item.as_deref_mut().into_iter(), db, rel, local_value)
    }

    fn destroy_all(
        &mut self,
        db: &Database,
        rel: &RelationshipDescriptor,
        local_value: &Value,
    ) -> Result<u64> {
        destroy_children(self.item.as_deref_mut().into_iter(), db, rel, local_value)
    }
}

/// The `T` row referenced by the owner's local foreign key.
pub struct BelongsTo<T> {
    target: Option<Box<T>>,
}

impl<T: Entity> BelongsTo<T> {
    /// An empty holder.
    pub fn new() -> Self {
        Self { target: None }
    }

    /// Attach the target; its key is written into the owner on save.
    pub fn set(&mut self, target: T) {
        self.target = Some(Box::new(target));
    }

    /// The attached target.
    pub fn get(&self) -> Option<&T> {
        self.target.as_deref()
    }

    /// The attached target, mutably.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.target.as_deref_mut()
    }

    /// Detach and return the target. The owner's foreign key is unchanged.
    pub fn take(&mut self) -> Option<T> {
        self.target.take().map(|b| *b)
    }

    /// Detach the target.
    pub fn clear(&mut self) {
        self.target = None;
    }
}

impl<T: Entity> Default for BelongsTo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for BelongsTo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BelongsTo").field(&self.target).finish()
    }
}

impl<T: Entity> From<T> for BelongsTo<T> {
    fn from(target: T) -> Self {
        Self {
            target: Some(Box::new(target)),
        }
    }
}

impl<T: Entity> Relation for BelongsTo<T> {
    fn kind(&self) -> RelationshipKind {
        RelationshipKind::BelongsTo
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn save(
        &mut self,
        db: &Database,
        rel: &RelationshipDescriptor,
        _local_value: &Value,
    ) -> Result<Option<Value>> {
        let Some(target) = self.target.as_deref_mut() else {
            return Ok(None);
        };
        if !target.state().is_persisted() && !engine::save(&mut *target, db)? {
            tracing::warn!(
                relationship = rel.name,
                target = rel.target_entity,
                "Target save touched no rows"
            );
            return Ok(None);
        }
        let mapping = ObjectMapping::of(target)?;
        Ok(Some(mapping.stored_value(&rel.foreign_key)?))
    }

    fn destroy_all(
        &mut self,
        _db: &Database,
        _rel: &RelationshipDescriptor,
        _local_value: &Value,
    ) -> Result<u64> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roles() {
        assert!(RelationshipKind::HasMany.is_owning());
        assert!(RelationshipKind::HasOne.is_owning());
        assert!(!RelationshipKind::BelongsTo.is_owning());
        assert_eq!(RelationshipKind::BelongsTo.to_string(), "belongs_to");
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&RelationshipKind::HasMany).unwrap();
        assert_eq!(json, "\"has_many\"");
        let kind: RelationshipKind = serde_json::from_str("\"has_one\"").unwrap();
        assert_eq!(kind, RelationshipKind::HasOne);
    }
}
