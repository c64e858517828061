//! Column declarations and the resolved column descriptors.

use crate::types::SqlType;

/// A column as declared on an entity type, before resolution.
///
/// This is the field-level declaration surface: `#[column(...)]` with the
/// derive macro, or built by hand in [`Entity::declaration`](crate::Entity::declaration).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDeclaration {
    /// Rust field name.
    pub field: &'static str,
    /// Column name override; defaults to the field name.
    pub name: Option<&'static str>,
    /// Spelling of the attribute's Rust value type (e.g. `"Option<i64>"`).
    pub rust_type: &'static str,
    /// Explicit SQL type; takes precedence over `rust_type`.
    pub sql_type: Option<&'static str>,
    /// Whether this is the primary key.
    pub primary_key: bool,
    /// Whether the database generates the value on insert.
    pub auto_generated: bool,
    /// Nullability override; defaults to whether `rust_type` is an `Option`.
    pub nullable: Option<bool>,
}

impl ColumnDeclaration {
    /// Declare a column for a field of the given Rust value type.
    pub const fn new(field: &'static str, rust_type: &'static str) -> Self {
        Self {
            field,
            name: None,
            rust_type,
            sql_type: None,
            primary_key: false,
            auto_generated: false,
            nullable: None,
        }
    }

    /// Set the database column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Set an explicit SQL type (e.g. `"VARCHAR(255)"`).
    pub const fn sql_type(mut self, sql_type: &'static str) -> Self {
        self.sql_type = Some(sql_type);
        self
    }

    /// Mark as primary key.
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark as generated by the database on insert.
    pub const fn auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }

    /// Override nullability.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = Some(value);
        self
    }

    /// The column name this declaration resolves to.
    pub const fn column_name(&self) -> &'static str {
        match self.name {
            Some(name) => name,
            None => self.field,
        }
    }
}

/// Immutable metadata for a mapped column.
///
/// Built once per entity type and shared by every instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Rust field name.
    pub field: &'static str,
    /// Database column name.
    pub name: &'static str,
    /// SQL type.
    pub sql_type: SqlType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether this is the primary key.
    pub primary_key: bool,
    /// Whether the database generates the value on insert.
    pub auto_generated: bool,
}

impl ColumnDescriptor {
    /// Create a descriptor with minimal required data.
    pub const fn new(field: &'static str, name: &'static str, sql_type: SqlType) -> Self {
        Self {
            field,
            name,
            sql_type,
            nullable: false,
            primary_key: false,
            auto_generated: false,
        }
    }

    /// Set nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set auto-generated flag.
    pub const fn auto_generated(mut self, value: bool) -> Self {
        self.auto_generated = value;
        self
    }

    /// Resolve a declaration into a descriptor.
    ///
    /// Returns `None` when neither the SQL override nor the Rust type maps to
    /// a known column type, or when the override cannot hold values of a
    /// known Rust type.
    pub fn resolve(decl: &ColumnDeclaration) -> Option<Self> {
        let inferred = SqlType::for_rust_type(decl.rust_type);
        let (sql_type, optional) = match (decl.sql_type, inferred) {
            (Some(explicit), Some((natural, optional))) => {
                let explicit = SqlType::parse(explicit)?;
                if !natural.accepts(&explicit) {
                    return None;
                }
                (explicit, optional)
            }
            (Some(explicit), None) => (SqlType::parse(explicit)?, false),
            (None, inferred) => inferred?,
        };

        Some(
            Self::new(decl.field, decl.column_name(), sql_type)
                .nullable(decl.nullable.unwrap_or(optional))
                .primary_key(decl.primary_key)
                .auto_generated(decl.auto_generated),
        )
    }
}
