//! Entity declarations, resolved descriptors and per-instance mappings.
//!
//! An [`EntityDeclaration`] is what an entity type says about itself. The
//! first time the engine touches a type, the declaration is validated and
//! resolved into an [`EntityDescriptor`], which is cached for the life of the
//! process and shared by every instance. Resolution failures are cached too,
//! so a malformed type fails the same way on every use.
//!
//! [`ObjectMapping`] binds a descriptor to the live cells of one instance.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::attribute::AttributeCell;
use crate::entity::{Entity, EntityState};
use crate::error::MappingError;
use crate::field::{ColumnDeclaration, ColumnDescriptor};
use crate::relationship::{Relation, RelationshipDescriptor, RelationshipKind};
use crate::value::Value;

/// The target side of a relationship declaration.
#[derive(Debug, Clone, Copy)]
pub struct TargetEntity {
    /// Target type name.
    pub name: &'static str,
    /// Target type identity.
    pub type_id: TypeId,
    /// The target's own declaration.
    pub declaration: fn() -> EntityDeclaration,
}

impl TargetEntity {
    /// Describe entity type `T` as a relationship target.
    pub fn of<T: Entity>() -> Self {
        Self {
            name: T::NAME,
            type_id: TypeId::of::<T>(),
            declaration: T::declaration,
        }
    }
}

/// A relationship as declared on an entity type.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipDeclaration {
    /// Rust field name of the holder.
    pub field: &'static str,
    /// Role.
    pub kind: RelationshipKind,
    /// Target type.
    pub target: TargetEntity,
    /// Column on the declaring entity; see [`RelationshipDescriptor::local_key`].
    pub local_key: Option<&'static str>,
    /// Column on the other side; see [`RelationshipDescriptor::foreign_key`].
    pub foreign_key: Option<&'static str>,
}

impl RelationshipDeclaration {
    fn new<T: Entity>(field: &'static str, kind: RelationshipKind) -> Self {
        Self {
            field,
            kind,
            target: TargetEntity::of::<T>(),
            local_key: None,
            foreign_key: None,
        }
    }

    /// `field` holds any number of `T` rows pointing back at this entity.
    pub fn has_many<T: Entity>(field: &'static str) -> Self {
        Self::new::<T>(field, RelationshipKind::HasMany)
    }

    /// `field` holds at most one `T` row pointing back at this entity.
    pub fn has_one<T: Entity>(field: &'static str) -> Self {
        Self::new::<T>(field, RelationshipKind::HasOne)
    }

    /// This entity points at a `T` row through a local foreign key.
    pub fn belongs_to<T: Entity>(field: &'static str) -> Self {
        Self::new::<T>(field, RelationshipKind::BelongsTo)
    }

    /// Set the local key column.
    #[must_use]
    pub const fn local_key(mut self, column: &'static str) -> Self {
        self.local_key = Some(column);
        self
    }

    /// Set the foreign key column.
    #[must_use]
    pub const fn foreign_key(mut self, column: &'static str) -> Self {
        self.foreign_key = Some(column);
        self
    }
}

/// Everything an entity type declares about its table.
#[derive(Debug, Clone)]
pub struct EntityDeclaration {
    /// Type name.
    pub entity: &'static str,
    /// Table name override.
    pub table: Option<&'static str>,
    /// Columns in field order.
    pub columns: Vec<ColumnDeclaration>,
    /// Relationships in field order.
    pub relationships: Vec<RelationshipDeclaration>,
}

impl EntityDeclaration {
    /// Start a declaration for the named type.
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            table: None,
            columns: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Set the table name.
    #[must_use]
    pub fn table(mut self, table: &'static str) -> Self {
        self.table = Some(table);
        self
    }

    /// Add a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDeclaration) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a relationship.
    #[must_use]
    pub fn relationship(mut self, relationship: RelationshipDeclaration) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// The declared table name, or the lowercased type name.
    pub fn table_name(&self) -> String {
        self.table
            .map_or_else(|| self.entity.to_lowercase(), str::to_string)
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.column_name() == name)
    }

    fn primary_key_column(&self) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .map(ColumnDeclaration::column_name)
    }
}

/// Resolved, validated metadata for an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Type name.
    pub entity: &'static str,
    /// Table name.
    pub table: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
    /// Index of the primary key in `columns`.
    pub primary_key: usize,
    /// Relationships in declaration order.
    pub relationships: Vec<RelationshipDescriptor>,
}

impl EntityDescriptor {
    /// Validate and resolve a declaration.
    pub fn resolve(decl: &EntityDeclaration) -> Result<Self, MappingError> {
        let entity = decl.entity;
        let table = decl.table_name();

        let mut columns = Vec::with_capacity(decl.columns.len());
        let mut seen = HashSet::new();
        for column in &decl.columns {
            let resolved =
                ColumnDescriptor::resolve(column).ok_or_else(|| MappingError::UnsupportedType {
                    entity,
                    field: column.field,
                    rust_type: column.sql_type.unwrap_or(column.rust_type).to_string(),
                })?;
            if !seen.insert(resolved.name) {
                return Err(MappingError::DuplicateColumn {
                    entity,
                    column: resolved.name.to_string(),
                });
            }
            columns.push(resolved);
        }

        let keys: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect();
        let primary_key = match keys.as_slice() {
            [] => return Err(MappingError::MissingPrimaryKey { entity }),
            [single] => *single,
            many => {
                return Err(MappingError::MultiplePrimaryKeys {
                    entity,
                    columns: many.iter().map(|&i| columns[i].name.to_string()).collect(),
                });
            }
        };

        let relationships = decl
            .relationships
            .iter()
            .map(|rel| resolve_relationship(decl, &table, columns[primary_key].name, rel))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            entity,
            table,
            columns,
            primary_key,
            relationships,
        })
    }

    /// Primary key column.
    pub fn primary_key(&self) -> &ColumnDescriptor {
        &self.columns[self.primary_key]
    }

    /// Look up a column by database name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Position of a column by database name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Position of a column, or `UnknownColumn`.
    pub fn require_column(&self, name: &str) -> Result<usize, MappingError> {
        self.column_index(name)
            .ok_or_else(|| MappingError::UnknownColumn {
                entity: self.entity,
                column: name.to_string(),
            })
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.to_string()).collect()
    }

    /// Look up a relationship by field name.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

fn resolve_relationship(
    owner: &EntityDeclaration,
    owner_table: &str,
    owner_key: &'static str,
    rel: &RelationshipDeclaration,
) -> Result<RelationshipDescriptor, MappingError> {
    let target = (rel.target.declaration)();
    let unknown_target = |reason: String| MappingError::UnknownTarget {
        entity: owner.entity,
        relationship: rel.field,
        target: rel.target.name,
        reason,
    };
    let target_key = target
        .primary_key_column()
        .ok_or_else(|| unknown_target("it declares no primary key".to_string()))?;

    let (local_key, foreign_key) = match rel.kind {
        RelationshipKind::HasOne | RelationshipKind::HasMany => (
            rel.local_key.map_or_else(|| owner_key.to_string(), str::to_string),
            rel.foreign_key
                .map_or_else(|| format!("{owner_table}_id"), str::to_string),
        ),
        RelationshipKind::BelongsTo => (
            rel.local_key
                .map_or_else(|| format!("{}_id", rel.field), str::to_string),
            rel.foreign_key.map_or_else(|| target_key.to_string(), str::to_string),
        ),
    };

    if !owner.has_column(&local_key) {
        return Err(MappingError::UnknownColumn {
            entity: owner.entity,
            column: local_key,
        });
    }
    if !target.has_column(&foreign_key) {
        return Err(unknown_target(format!("it has no column `{foreign_key}`")));
    }

    Ok(RelationshipDescriptor {
        name: rel.field,
        kind: rel.kind,
        target_entity: rel.target.name,
        target_type: rel.target.type_id,
        target_table: target.table_name(),
        local_key,
        foreign_key,
    })
}

type DescriptorCache = RwLock<HashMap<TypeId, Result<Arc<EntityDescriptor>, MappingError>>>;

static DESCRIPTORS: OnceLock<DescriptorCache> = OnceLock::new();

/// The shared descriptor for `E`, resolving it on first use.
pub fn descriptor_for<E: Entity>() -> Result<Arc<EntityDescriptor>, MappingError> {
    let cache = DESCRIPTORS.get_or_init(|| RwLock::new(HashMap::new()));
    let type_id = TypeId::of::<E>();

    if let Some(cached) = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&type_id)
    {
        return cached.clone();
    }

    // Resolve outside the write lock; declarations of related types are
    // read but never resolved recursively.
    let resolved = EntityDescriptor::resolve(&E::declaration()).map(Arc::new);
    match &resolved {
        Ok(descriptor) => tracing::debug!(
            entity = E::NAME,
            table = %descriptor.table,
            columns = descriptor.columns.len(),
            relationships = descriptor.relationships.len(),
            "Resolved entity descriptor"
        ),
        Err(error) => tracing::warn!(entity = E::NAME, %error, "Invalid entity declaration"),
    }

    cache
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(type_id)
        .or_insert(resolved)
        .clone()
}

/// A descriptor bound to the live parts of one instance.
pub struct ObjectMapping<'a> {
    pub(crate) descriptor: Arc<EntityDescriptor>,
    pub(crate) attributes: Vec<&'a mut dyn AttributeCell>,
    pub(crate) relationships: Vec<&'a mut dyn Relation>,
    pub(crate) state: &'a mut EntityState,
}

impl<'a> ObjectMapping<'a> {
    /// Map an instance.
    ///
    /// Fails when the type's declaration is invalid, or when the instance
    /// exposes a different number of cells or holders than it declares.
    pub fn of<E: Entity>(entity: &'a mut E) -> Result<Self, MappingError> {
        let descriptor = descriptor_for::<E>()?;
        let parts = entity.parts();

        check_shape(
            E::NAME,
            "columns",
            descriptor.columns.len(),
            parts.attributes.len(),
        )?;
        check_shape(
            E::NAME,
            "relationships",
            descriptor.relationships.len(),
            parts.relationships.len(),
        )?;
        for (rel, holder) in descriptor.relationships.iter().zip(&parts.relationships) {
            if holder.kind() != rel.kind || holder.target_type() != rel.target_type {
                return Err(MappingError::HolderMismatch {
                    entity: E::NAME,
                    relationship: rel.name,
                    found: holder.kind().as_str(),
                });
            }
        }

        Ok(Self {
            descriptor,
            attributes: parts.attributes,
            relationships: parts.relationships,
            state: parts.state,
        })
    }

    /// Whether the instance is persisted.
    pub fn is_persisted(&self) -> bool {
        self.state.is_persisted()
    }

    /// Value of the named column as the database last saw it: the original
    /// value when persisted, else the current one.
    pub fn stored_value(&self, column: &str) -> Result<Value, MappingError> {
        let index = self.descriptor.require_column(column)?;
        Ok(self.stored_value_at(index))
    }

    pub(crate) fn stored_value_at(&self, index: usize) -> Value {
        let cell = &self.attributes[index];
        if self.state.is_persisted() {
            cell.original_value()
        } else {
            cell.value()
        }
    }

    /// Indexes of modified attributes, in column order.
    pub fn dirty_columns(&self) -> Vec<usize> {
        self.attributes
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_dirty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Write a value into the named column with normal dirty tracking.
    pub fn assign(&mut self, column: &str, value: &Value) -> crate::Result<()> {
        let index = self.descriptor.require_column(column)?;
        self.attributes[index].assign(value)
    }

    /// Flag every attribute as not persisted and clear `persisted`.
    pub(crate) fn forget(&mut self) {
        self.state.set_persisted(false);
        for cell in &mut self.attributes {
            cell.mark_dirty();
        }
    }
}

fn check_shape(
    entity: &'static str,
    what: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), MappingError> {
    if expected == found {
        Ok(())
    } else {
        Err(MappingError::ShapeMismatch {
            entity,
            what,
            expected,
            found,
        })
    }
}
