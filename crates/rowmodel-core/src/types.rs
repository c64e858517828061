//! SQL column types and the mapping from Rust type names.

use serde::{Deserialize, Serialize};

/// SQL column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// BOOLEAN
    Boolean,
    /// SMALLINT (16-bit)
    SmallInt,
    /// INTEGER (32-bit)
    Integer,
    /// BIGINT (64-bit)
    BigInt,
    /// REAL (32-bit float)
    Real,
    /// DOUBLE PRECISION (64-bit float)
    Double,
    /// DECIMAL(precision, scale)
    Decimal {
        /// Total digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// TEXT
    Text,
    /// VARCHAR(n)
    Varchar(u32),
    /// BLOB / BYTEA
    Blob,
    /// JSON
    Json,
}

impl SqlType {
    /// The SQL spelling of this type.
    #[must_use]
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Decimal { precision, scale } => format!("DECIMAL({}, {})", precision, scale),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(n) => format!("VARCHAR({})", n),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Json => "JSON".to_string(),
        }
    }

    /// Parse an SQL type spelling (case-insensitive).
    ///
    /// Returns `None` for unrecognized types.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_uppercase();
        let (head, args) = match upper.split_once('(') {
            Some((head, rest)) => (head.trim().to_string(), rest.strip_suffix(')')),
            None => (upper.clone(), None),
        };
        let nums: Vec<u32> = args
            .map(|a| a.split(',').filter_map(|n| n.trim().parse().ok()).collect())
            .unwrap_or_default();

        match (head.as_str(), nums.as_slice()) {
            ("BOOLEAN" | "BOOL", []) => Some(SqlType::Boolean),
            ("SMALLINT" | "INT2", []) => Some(SqlType::SmallInt),
            ("INTEGER" | "INT" | "INT4", []) => Some(SqlType::Integer),
            ("BIGINT" | "INT8", []) => Some(SqlType::BigInt),
            ("REAL" | "FLOAT4", []) => Some(SqlType::Real),
            ("DOUBLE" | "DOUBLE PRECISION" | "FLOAT8", []) => Some(SqlType::Double),
            ("DECIMAL" | "NUMERIC", [p, s]) => Some(SqlType::Decimal {
                precision: u8::try_from(*p).ok()?,
                scale: u8::try_from(*s).ok()?,
            }),
            ("TEXT", []) => Some(SqlType::Text),
            ("VARCHAR", [n]) => Some(SqlType::Varchar(*n)),
            ("BLOB" | "BYTEA", []) => Some(SqlType::Blob),
            ("JSON" | "JSONB", []) => Some(SqlType::Json),
            _ => None,
        }
    }

    /// Map a Rust type spelling to its column type.
    ///
    /// `Option<T>` maps like `T`; the second element of the result reports
    /// whether the type was optional. Whitespace in the spelling is ignored,
    /// so token-stringified types work.
    #[must_use]
    pub fn for_rust_type(rust_type: &str) -> Option<(Self, bool)> {
        let compact: String = rust_type.chars().filter(|c| !c.is_whitespace()).collect();
        let (inner, optional) = match compact
            .strip_prefix("Option<")
            .or_else(|| compact.strip_prefix("std::option::Option<"))
            .and_then(|rest| rest.strip_suffix('>'))
        {
            Some(inner) => (inner.to_string(), true),
            None => (compact, false),
        };

        let ty = match inner.as_str() {
            "bool" => SqlType::Boolean,
            "i16" => SqlType::SmallInt,
            "i32" => SqlType::Integer,
            "i64" => SqlType::BigInt,
            "f32" => SqlType::Real,
            "f64" => SqlType::Double,
            "String" | "std::string::String" => SqlType::Text,
            "Vec<u8>" => SqlType::Blob,
            "serde_json::Value" => SqlType::Json,
            _ => return None,
        };
        Some((ty, optional))
    }

    /// Whether values of this type can be generated by a database sequence.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
        )
    }

    /// Whether a column declared as `column` can hold values whose natural
    /// type is `self`.
    ///
    /// Widths may differ inside a family (any integer for an integer,
    /// `VARCHAR(n)` for text, `DECIMAL` for a float); crossing families is
    /// rejected.
    #[must_use]
    pub const fn accepts(&self, column: &SqlType) -> bool {
        if self.is_integer() || column.is_integer() {
            return self.is_integer() && column.is_integer();
        }
        matches!(
            (self, column),
            (SqlType::Boolean, SqlType::Boolean)
                | (
                    SqlType::Real | SqlType::Double | SqlType::Decimal { .. },
                    SqlType::Real | SqlType::Double | SqlType::Decimal { .. }
                )
                | (
                    SqlType::Text | SqlType::Varchar(_),
                    SqlType::Text | SqlType::Varchar(_)
                )
                | (SqlType::Blob, SqlType::Blob)
                | (SqlType::Json, SqlType::Json)
        )
    }
}
