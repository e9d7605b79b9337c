use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{SqlType, TypeMapping};

/// A reference to a column of a table.
///
/// `nullable` is the column's declared nullability, taken from schema metadata. It is distinct
/// from the nullability derived during rewriting, which also accounts for filters already proven
/// to exclude nulls.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnExpr {
    pub name: String,
    pub table: Option<String>,
    pub nullable: bool,
    pub sql_type: SqlType,
    pub type_mapping: Option<TypeMapping>,
}

impl ColumnExpr {
    /// Construct a column with the default mapping for its type.
    ///
    /// The name may be qualified with a table alias, as in `"t.a"`.
    pub fn new(name: &str, sql_type: SqlType, nullable: bool) -> Self {
        let (table, name) = match name.split_once('.') {
            None => (None, name),
            Some((table, name)) => (Some(table.to_owned()), name),
        };
        Self {
            name: name.to_owned(),
            table,
            nullable,
            sql_type,
            type_mapping: TypeMapping::default_for(sql_type),
        }
    }

    #[must_use]
    pub fn with_type_mapping(mut self, type_mapping: TypeMapping) -> Self {
        self.type_mapping = Some(type_mapping);
        self
    }
}

impl fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = &self.table {
            write!(f, "{table}.")?;
        }
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name() {
        let col = ColumnExpr::new("t.a", SqlType::Int, true);
        assert_eq!(col.table.as_deref(), Some("t"));
        assert_eq!(col.name, "a");
        assert_eq!(col.to_string(), "t.a");
    }

    #[test]
    fn unqualified_name() {
        let col = ColumnExpr::new("a", SqlType::Text, false);
        assert_eq!(col.table, None);
        assert_eq!(col.to_string(), "a");
        assert_eq!(col.type_mapping, TypeMapping::default_for(SqlType::Text));
    }
}
