use std::fmt;

use serde::{Deserialize, Serialize};
use strum::EnumIter;
use test_strategy::Arbitrary;

/// The result type of an expression, as far as null-semantics rewriting cares about it.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Arbitrary,
    EnumIter,
)]
pub enum SqlType {
    Bool,
    SmallInt,
    Int,
    BigInt,
    Double,
    Decimal,
    Text,
    Binary,
    Date,
    Timestamp,
    Uuid,
    /// The type of an untyped `NULL` literal
    Unknown,
}

impl SqlType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::SmallInt | Self::Int | Self::BigInt | Self::Double | Self::Decimal
        )
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Text)
    }

    /// The name of the store type used for this type when nothing more specific is known
    pub fn default_store_type(&self) -> Option<&'static str> {
        Some(match self {
            Self::Bool => "boolean",
            Self::SmallInt => "smallint",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Double => "double precision",
            Self::Decimal => "decimal(18,2)",
            Self::Text => "text",
            Self::Binary => "bytea",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Uuid => "uuid",
            Self::Unknown => return None,
        })
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.default_store_type() {
            Some(name) => f.write_str(name),
            None => f.write_str("unknown"),
        }
    }
}

/// Describes how values of a type are stored and compared: the comparability descriptor carried
/// by every typed node.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeMapping {
    /// The name of the type in the target database, used when rendering casts
    pub store_type: String,
    pub sql_type: SqlType,
    /// Set when values pass through a value converter before reaching the database. Rewrites
    /// that reinterpret a value (such as `a = TRUE` to `a`) must not look through a converter.
    pub has_converter: bool,
}

impl TypeMapping {
    pub fn new<S: Into<String>>(store_type: S, sql_type: SqlType) -> Self {
        Self {
            store_type: store_type.into(),
            sql_type,
            has_converter: false,
        }
    }

    /// The type-only default mapping for the given type, or `None` for [`SqlType::Unknown`].
    pub fn default_for(sql_type: SqlType) -> Option<Self> {
        sql_type
            .default_store_type()
            .map(|store_type| Self::new(store_type, sql_type))
    }

    /// The default mapping for boolean results of comparisons and logical operators
    pub fn boolean() -> Self {
        Self::new("boolean", SqlType::Bool)
    }

    #[must_use]
    pub fn with_converter(mut self) -> Self {
        self.has_converter = true;
        self
    }
}

impl fmt::Display for TypeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.store_type)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn every_known_type_has_a_default_mapping() {
        for ty in SqlType::iter() {
            let mapping = TypeMapping::default_for(ty);
            if ty == SqlType::Unknown {
                assert_eq!(mapping, None);
            } else {
                let mapping = mapping.unwrap();
                assert_eq!(mapping.sql_type, ty);
                assert!(!mapping.has_converter);
            }
        }
    }

    #[test]
    fn boolean_mapping_matches_default() {
        assert_eq!(
            TypeMapping::default_for(SqlType::Bool),
            Some(TypeMapping::boolean())
        );
    }
}
