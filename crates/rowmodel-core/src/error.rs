//! Error types for rowmodel.

use thiserror::Error;

/// Result alias used throughout rowmodel.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// An entity declaration is malformed.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// The database rejected a statement because of a constraint.
    #[error("constraint violation: {message}")]
    ConstraintViolation {
        /// Driver-supplied description.
        message: String,
    },

    /// Transport-level failure.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A stored value cannot be read as the requested Rust type.
    #[error("cannot convert {found} to {expected}")]
    Conversion {
        /// The SQL type the attribute expects.
        expected: String,
        /// What was actually found.
        found: String,
    },

    /// A dependent save or delete failed after the owning row was written.
    #[error("relationship `{relationship}` failed: {source}")]
    Relationship {
        /// Relationship field name.
        relationship: &'static str,
        /// The underlying failure.
        source: Box<Error>,
    },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Wrap an error raised while cascading through a relationship.
    pub fn relationship(relationship: &'static str, source: Error) -> Self {
        Error::Relationship {
            relationship,
            source: Box::new(source),
        }
    }

    /// Whether this is (or wraps) a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Error::ConstraintViolation { .. } => true,
            Error::Relationship { source, .. } => source.is_constraint_violation(),
            _ => false,
        }
    }
}

/// Kind of transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// The connection could not be established or was lost.
    Disconnected,
    /// The operation was cancelled or timed out.
    Cancelled,
    /// The statement was not understood by the backend.
    Syntax,
    /// Anything else.
    Other,
}

/// Transport-level error reported by a [`Connection`](crate::Connection).
#[derive(Debug, Clone, Error)]
#[error("connection error ({kind:?}): {message}")]
pub struct ConnectionError {
    /// Failure class.
    pub kind: ConnectionErrorKind,
    /// Description.
    pub message: String,
}

impl ConnectionError {
    /// Create a connection error.
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A malformed entity declaration.
///
/// Raised when the descriptor for an entity type is first built and memoized
/// for that type, so every later use reports the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// No column is flagged as primary key.
    #[error("entity `{entity}` declares no primary key")]
    MissingPrimaryKey {
        /// Entity type name.
        entity: &'static str,
    },

    /// More than one column is flagged as primary key.
    #[error("entity `{entity}` declares more than one primary key: {}", .columns.join(", "))]
    MultiplePrimaryKeys {
        /// Entity type name.
        entity: &'static str,
        /// The offending columns.
        columns: Vec<String>,
    },

    /// Two attributes map to the same column name.
    #[error("entity `{entity}` maps more than one field to column `{column}`")]
    DuplicateColumn {
        /// Entity type name.
        entity: &'static str,
        /// The shared column name.
        column: String,
    },

    /// A field's Rust type has no SQL column type.
    #[error("field `{field}` of entity `{entity}` has no SQL type mapping for `{rust_type}`")]
    UnsupportedType {
        /// Entity type name.
        entity: &'static str,
        /// Field name.
        field: &'static str,
        /// The Rust type or SQL override as declared.
        rust_type: String,
    },

    /// A relationship points at a target that cannot satisfy it.
    #[error("relationship `{relationship}` of entity `{entity}` references unknown target `{target}`: {reason}")]
    UnknownTarget {
        /// Entity type name.
        entity: &'static str,
        /// Relationship field name.
        relationship: &'static str,
        /// Target entity name.
        target: &'static str,
        /// What is missing on the target.
        reason: String,
    },

    /// A column named by a relationship or query does not exist.
    #[error("entity `{entity}` has no column `{column}`")]
    UnknownColumn {
        /// Entity type name.
        entity: &'static str,
        /// The missing column.
        column: String,
    },

    /// An instance exposes a different number of attribute cells or
    /// relationship holders than its declaration.
    #[error("entity `{entity}` declares {expected} {what} but exposes {found}")]
    ShapeMismatch {
        /// Entity type name.
        entity: &'static str,
        /// "columns" or "relationships".
        what: &'static str,
        /// Declared count.
        expected: usize,
        /// Exposed count.
        found: usize,
    },

    /// A relationship holder's role or target differs from its declaration.
    #[error("relationship `{relationship}` of entity `{entity}` does not match its `{found}` holder")]
    HolderMismatch {
        /// Entity type name.
        entity: &'static str,
        /// Relationship field name.
        relationship: &'static str,
        /// Role of the exposed holder.
        found: &'static str,
    },

    /// No has-one or has-many relationship points at the requested target.
    #[error("entity `{entity}` has no relationship to `{target}`")]
    NoRelationship {
        /// Entity type name.
        entity: &'static str,
        /// Target entity name.
        target: &'static str,
    },

    /// More than one relationship of the requested kind points at a target.
    #[error("entity `{entity}` has {count} relationships to `{target}`; name one explicitly")]
    AmbiguousRelationship {
        /// Entity type name.
        entity: &'static str,
        /// Target entity name.
        target: &'static str,
        /// Candidates found.
        count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_error_display() {
        let err = MappingError::MultiplePrimaryKeys {
            entity: "User",
            columns: vec!["id".into(), "uuid".into()],
        };
        assert_eq!(
            err.to_string(),
            "entity `User` declares more than one primary key: id, uuid"
        );
    }

    #[test]
    fn test_relationship_wraps_constraint() {
        let err = Error::relationship(
            "posts",
            Error::ConstraintViolation {
                message: "duplicate".into(),
            },
        );
        assert!(err.is_constraint_violation());
        assert_eq!(
            err.to_string(),
            "relationship `posts` failed: constraint violation: duplicate"
        );
    }

    #[test]
    fn test_mapping_converts_into_error() {
        let err: Error = MappingError::MissingPrimaryKey { entity: "Tag" }.into();
        assert!(matches!(err, Error::Mapping(_)));
    }
}
