use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::ast::{SqlExpr, TableExpression};

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectionExpr {
    pub expr: SqlExpr,
    pub alias: Option<String>,
}

impl From<SqlExpr> for ProjectionExpr {
    fn from(expr: SqlExpr) -> Self {
        Self { expr, alias: None }
    }
}

impl fmt::Display for ProjectionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderingExpr {
    pub expr: SqlExpr,
    pub ascending: bool,
}

impl fmt::Display for OrderingExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.expr,
            if self.ascending { "ASC" } else { "DESC" }
        )
    }
}

/// A `SELECT` statement, or a subquery
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelectExpression {
    pub distinct: bool,
    pub projection: Vec<ProjectionExpr>,
    pub tables: Vec<TableExpression>,
    pub predicate: Option<SqlExpr>,
    pub group_by: Vec<SqlExpr>,
    pub having: Option<SqlExpr>,
    pub orderings: Vec<OrderingExpr>,
    pub limit: Option<SqlExpr>,
    pub offset: Option<SqlExpr>,
    pub alias: Option<String>,
}

impl SelectExpression {
    /// If this query projects exactly one expression, returns it
    pub fn single_projection(&self) -> Option<&SqlExpr> {
        match self.projection.as_slice() {
            [projection] => Some(&projection.expr),
            _ => None,
        }
    }
}

impl fmt::Display for SelectExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        if self.projection.is_empty() {
            write!(f, "1")?;
        } else {
            write!(f, "{}", self.projection.iter().join(", "))?;
        }
        if !self.tables.is_empty() {
            write!(f, " FROM {}", self.tables.iter().join(" "))?;
        }
        if let Some(predicate) = &self.predicate {
            write!(f, " WHERE {predicate}")?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", self.group_by.iter().join(", "))?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {having}")?;
        }
        if !self.orderings.is_empty() {
            write!(f, " ORDER BY {}", self.orderings.iter().join(", "))?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}
