//! Per-field value cells with dirty tracking.
//!
//! Every persistent field of an entity is an [`Attribute<T>`]. The cell
//! remembers the last persisted value (`original`) and whether the current
//! value differs from it. The engine talks to cells through the object-safe
//! [`AttributeCell`] trait so it can walk the fields of any entity type.

use std::fmt;
use std::ops::Deref;

use crate::error::Result;
use crate::value::{SqlValue, Value};

/// A typed value cell for one mapped column.
///
/// ```
/// use rowmodel_core::Attribute;
///
/// let mut name = Attribute::<String>::default();
/// assert!(!name.has_been_modified());
///
/// name.write("Ada");
/// assert!(name.has_been_modified());
///
/// name.write("");
/// assert!(!name.has_been_modified());
/// ```
#[derive(Clone, PartialEq)]
pub struct Attribute<T> {
    value: T,
    original: T,
    dirty: bool,
}

impl<T: SqlValue> Attribute<T> {
    /// Construct a cell holding `value`.
    ///
    /// The original value is the type's default, so a cell constructed with
    /// a non-default value starts dirty.
    pub fn new(value: impl Into<T>) -> Self {
        let value = value.into();
        let original = T::default();
        let dirty = value != original;
        Self {
            value,
            original,
            dirty,
        }
    }

    /// Current value.
    pub fn read(&self) -> &T {
        &self.value
    }

    /// Clone out the current value.
    pub fn get(&self) -> T {
        self.value.clone()
    }

    /// Replace the value.
    ///
    /// The cell is dirty afterwards iff the new value differs from the last
    /// persisted one; writing the original value back clears the flag.
    pub fn write(&mut self, value: impl Into<T>) {
        self.value = value.into();
        self.dirty = self.value != self.original;
    }

    /// Value as of the last successful save or load.
    pub fn original(&self) -> &T {
        &self.original
    }

    /// Whether the cell changed since it was last persisted.
    pub fn has_been_modified(&self) -> bool {
        self.dirty
    }

    /// Accept the current value as persisted.
    pub fn mark_clean(&mut self) {
        self.original = self.value.clone();
        self.dirty = false;
    }
}

impl<T: SqlValue> Default for Attribute<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            original: T::default(),
            dirty: false,
        }
    }
}

impl<T> Deref for Attribute<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Attribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Attribute");
        s.field("value", &self.value);
        if self.dirty {
            s.field("original", &self.original);
        }
        s.field("dirty", &self.dirty).finish()
    }
}

impl<T: SqlValue> From<T> for Attribute<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

/// Object-safe view of an attribute cell used by the engine.
pub trait AttributeCell: Send + Sync {
    /// Current value.
    fn value(&self) -> Value;

    /// Value as of the last successful save or load.
    fn original_value(&self) -> Value;

    /// Whether the cell changed since it was last persisted.
    fn is_dirty(&self) -> bool;

    /// Write a dynamic value with the same dirty semantics as
    /// [`Attribute::write`].
    fn assign(&mut self, value: &Value) -> Result<()>;

    /// Replace value and original with a value read from the database.
    fn load(&mut self, value: &Value) -> Result<()>;

    /// Accept the current value as persisted.
    fn mark_clean(&mut self);

    /// Flag the cell as not persisted, keeping its value.
    fn mark_dirty(&mut self);
}

impl<T: SqlValue> AttributeCell for Attribute<T> {
    fn value(&self) -> Value {
        self.value.to_value()
    }

    fn original_value(&self) -> Value {
        self.original.to_value()
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn assign(&mut self, value: &Value) -> Result<()> {
        let value = T::from_value(value)?;
        self.write(value);
        Ok(())
    }

    fn load(&mut self, value: &Value) -> Result<()> {
        let value = T::from_value(value)?;
        self.original = value.clone();
        self.value = value;
        self.dirty = false;
        Ok(())
    }

    fn mark_clean(&mut self) {
        Attribute::mark_clean(self);
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}
