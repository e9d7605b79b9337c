use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::ast::{SelectExpression, SqlExpr};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SetOperator {
    Union,
    Except,
    Intersect,
}

impl fmt::Display for SetOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Union => write!(f, "UNION"),
            Self::Except => write!(f, "EXCEPT"),
            Self::Intersect => write!(f, "INTERSECT"),
        }
    }
}

/// A join whose rows are matched by a predicate
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PredicateJoin {
    pub table: Box<TableExpression>,
    pub predicate: SqlExpr,
}

/// An item in the `FROM` clause of a [`SelectExpression`]
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableExpression {
    Table {
        name: String,
        schema: Option<String>,
        alias: String,
    },
    FromSql {
        sql: String,
        alias: String,
    },
    Select(Box<SelectExpression>),
    InnerJoin(PredicateJoin),
    LeftJoin(PredicateJoin),
    CrossJoin(Box<TableExpression>),
    CrossApply(Box<TableExpression>),
    OuterApply(Box<TableExpression>),
    SetOperation {
        op: SetOperator,
        distinct: bool,
        left: Box<SelectExpression>,
        right: Box<SelectExpression>,
        alias: String,
    },
    TableValuedFunction {
        name: String,
        schema: Option<String>,
        arguments: Vec<SqlExpr>,
        alias: String,
    },
}

impl TableExpression {
    pub fn table<S: Into<String>>(name: S, alias: S) -> Self {
        Self::Table {
            name: name.into(),
            schema: None,
            alias: alias.into(),
        }
    }
}

impl fmt::Display for TableExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table {
                name,
                schema,
                alias,
            } => {
                if let Some(schema) = schema {
                    write!(f, "{schema}.")?;
                }
                write!(f, "{name} AS {alias}")
            }
            Self::FromSql { sql, alias } => write!(f, "({sql}) AS {alias}"),
            Self::Select(select) => {
                write!(f, "({select})")?;
                if let Some(alias) = &select.alias {
                    write!(f, " AS {alias}")?;
                }
                Ok(())
            }
            Self::InnerJoin(join) => write!(f, "INNER JOIN {} ON {}", join.table, join.predicate),
            Self::LeftJoin(join) => write!(f, "LEFT JOIN {} ON {}", join.table, join.predicate),
            Self::CrossJoin(table) => write!(f, "CROSS JOIN {table}"),
            Self::CrossApply(table) => write!(f, "CROSS APPLY {table}"),
            Self::OuterApply(table) => write!(f, "OUTER APPLY {table}"),
            Self::SetOperation {
                op,
                distinct,
                left,
                right,
                alias,
            } => write!(
                f,
                "({left} {op}{} {right}) AS {alias}",
                if *distinct { "" } else { " ALL" }
            ),
            Self::TableValuedFunction {
                name,
                schema,
                arguments,
                alias,
            } => {
                if let Some(schema) = schema {
                    write!(f, "{schema}.")?;
                }
                write!(f, "{name}({}) AS {alias}", arguments.iter().join(", "))
            }
        }
    }
}
