//! The `Entity` trait implemented by every persistent type.

use crate::attribute::AttributeCell;
use crate::mapping::EntityDeclaration;
use crate::relationship::Relation;

/// Per-instance engine bookkeeping.
///
/// Only the engine changes `persisted`; user code can read it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityState {
    persisted: bool,
}

impl EntityState {
    /// Whether the engine believes a row with this instance's key exists.
    pub const fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub(crate) fn set_persisted(&mut self, value: bool) {
        self.persisted = value;
    }
}

/// Mutable borrows of every engine-visible part of an instance.
///
/// `attributes` are in column declaration order and `relationships` in
/// relationship declaration order, matching [`Entity::declaration`].
pub struct EntityParts<'a> {
    /// Attribute cells.
    pub attributes: Vec<&'a mut dyn AttributeCell>,
    /// Relationship holders.
    pub relationships: Vec<&'a mut dyn Relation>,
    /// Bookkeeping.
    pub state: &'a mut EntityState,
}

/// A type whose instances are rows of a table.
///
/// Usually derived with `#[derive(Entity)]`. A hand-written implementation
/// looks like this:
///
/// ```
/// use rowmodel_core::{
///     Attribute, AttributeCell, ColumnDeclaration, Entity, EntityDeclaration, EntityParts,
///     EntityState,
/// };
///
/// #[derive(Debug, Default)]
/// struct Tag {
///     id: Attribute<Option<i64>>,
///     label: Attribute<String>,
///     state: EntityState,
/// }
///
/// impl Entity for Tag {
///     const NAME: &'static str = "Tag";
///
///     fn declaration() -> EntityDeclaration {
///         EntityDeclaration::new(Self::NAME)
///             .table("tags")
///             .column(ColumnDeclaration::new("id", "Option<i64>").primary_key().auto_generated())
///             .column(ColumnDeclaration::new("label", "String"))
///     }
///
///     fn state(&self) -> &EntityState {
///         &self.state
///     }
///
///     fn attributes(&self) -> Vec<&dyn AttributeCell> {
///         vec![&self.id as &dyn AttributeCell, &self.label as &dyn AttributeCell]
///     }
///
///     fn parts(&mut self) -> EntityParts<'_> {
///         EntityParts {
///             attributes: vec![
///                 &mut self.id as &mut dyn AttributeCell,
///                 &mut self.label as &mut dyn AttributeCell,
///             ],
///             relationships: vec![],
///             state: &mut self.state,
///         }
///     }
/// }
/// ```
pub trait Entity: Default + 'static {
    /// Type name, used in errors and as the default table name (lowercased).
    const NAME: &'static str;

    /// Columns and relationships of this type.
    ///
    /// Resolved once per process into an
    /// [`EntityDescriptor`](crate::EntityDescriptor).
    fn declaration() -> EntityDeclaration;

    /// Engine bookkeeping.
    fn state(&self) -> &EntityState;

    /// Attribute cells in column order.
    fn attributes(&self) -> Vec<&dyn AttributeCell>;

    /// Mutable access to every part at once.
    fn parts(&mut self) -> EntityParts<'_>;
}
