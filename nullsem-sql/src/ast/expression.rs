use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::EnumIter;
use test_strategy::Arbitrary;

use crate::ast::{ColumnExpr, Literal, OrderingExpr, SelectExpression, SqlType, TypeMapping};

/// Unary operators.
///
/// This type is used as the operator in [`SqlExpr::Unary`].
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
pub enum UnaryOperator {
    /// Logical `NOT`
    Not,
    /// Numeric negation, `-`
    Negate,
    /// Bitwise complement, `~`
    BitwiseNot,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
    /// `CAST(... AS <type>)`, where the target type is the type of the node
    Convert,
}

impl UnaryOperator {
    /// Returns true for `IS NULL` and `IS NOT NULL`
    pub fn is_null_check(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

/// Binary infix operators.
///
/// This type is used as the operator in [`SqlExpr::Binary`]. `IN` and `LIKE` have their own node
/// kinds, since their right-hand sides are not plain expressions.
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
pub enum BinaryOperator {
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `+`, which is also string concatenation for textual operands
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `&`
    BitwiseAnd,
    /// `|`
    BitwiseOr,
    /// `^`
    BitwiseXor,
}

impl BinaryOperator {
    /// Returns true for `AND` and `OR`
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// Returns true for the six comparison operators
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Greater
                | Self::GreaterOrEqual
                | Self::Less
                | Self::LessOrEqual
        )
    }

    /// Returns true for `=` and `<>`
    pub fn is_equality(&self) -> bool {
        matches!(self, Self::Equal | Self::NotEqual)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo
        )
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(self, Self::BitwiseAnd | Self::BitwiseOr | Self::BitwiseXor)
    }

    /// Returns the operator computing the logical negation of this comparison, such that
    /// `NOT (a op b)` is equivalent to `a op.negate() b` under three-valued logic.
    pub fn negate(self) -> Option<Self> {
        Some(match self {
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::Greater => Self::LessOrEqual,
            Self::GreaterOrEqual => Self::Less,
            Self::Less => Self::GreaterOrEqual,
            Self::LessOrEqual => Self::Greater,
            _ => return None,
        })
    }

    /// Returns the dual of a logical operator (`AND` for `OR` and vice versa)
    pub fn logical_dual(self) -> Option<Self> {
        match self {
            Self::And => Some(Self::Or),
            Self::Or => Some(Self::And),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::BitwiseAnd => "&",
            Self::BitwiseOr => "|",
            Self::BitwiseXor => "^",
        };
        f.write_str(op)
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstantExpr {
    pub value: Literal,
    pub sql_type: SqlType,
    pub type_mapping: Option<TypeMapping>,
}

/// A placeholder for a value supplied at execution time
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterExpr {
    pub name: String,
    pub sql_type: SqlType,
    pub type_mapping: Option<TypeMapping>,
}

impl fmt::Display for ParameterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub op: UnaryOperator,
    pub operand: Box<SqlExpr>,
    pub sql_type: SqlType,
    pub type_mapping: Option<TypeMapping>,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub op: BinaryOperator,
    pub left: Box<SqlExpr>,
    pub right: Box<SqlExpr>,
    pub sql_type: SqlType,
    pub type_mapping: Option<TypeMapping>,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseWhenClause {
    pub test: SqlExpr,
    pub result: SqlExpr,
}

/// `CASE [operand] WHEN test THEN result ... [ELSE else_result] END`.
///
/// Without an operand each test is a boolean condition (a "searched" CASE); with one, each test
/// is a value compared against the operand.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseExpr {
    pub operand: Option<Box<SqlExpr>>,
    pub when_clauses: Vec<CaseWhenClause>,
    pub else_result: Option<Box<SqlExpr>>,
    pub sql_type: SqlType,
    pub type_mapping: Option<TypeMapping>,
}

/// A scalar function call.
///
/// Nullability metadata is declared by whoever built the call: `nullable` is false for functions
/// which can never return null, and the `*_propagates_nullability` flags mark the inputs for
/// which a null input always yields a null result.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionExpr {
    pub name: String,
    pub schema: Option<String>,
    pub instance: Option<Box<SqlExpr>>,
    /// `None` for niladic functions, which are rendered without parentheses
    pub arguments: Option<Vec<SqlExpr>>,
    pub built_in: bool,
    pub nullable: bool,
    pub instance_propagates_nullability: bool,
    pub arguments_propagate_nullability: Vec<bool>,
    pub sql_type: SqlType,
    pub type_mapping: Option<TypeMapping>,
}

impl FunctionExpr {
    /// Returns true if this is a call to the built-in function with the given name
    pub fn is_built_in(&self, name: &str) -> bool {
        self.built_in && self.instance.is_none() && self.name.eq_ignore_ascii_case(name)
    }

    /// Iterate over the instance and arguments which are declared to propagate nullability
    pub fn propagating_inputs(&self) -> impl Iterator<Item = &SqlExpr> + '_ {
        let instance = self
            .instance
            .as_deref()
            .filter(|_| self.instance_propagates_nullability);
        let arguments = self
            .arguments
            .iter()
            .flatten()
            .zip(&self.arguments_propagate_nullability)
            .filter(|(_, propagates)| **propagates)
            .map(|(arg, _)| arg);
        instance.into_iter().chain(arguments)
    }

    pub fn has_propagating_inputs(&self) -> bool {
        self.propagating_inputs().next().is_some()
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LikeExpr {
    pub match_expr: Box<SqlExpr>,
    pub pattern: Box<SqlExpr>,
    pub escape: Option<Box<SqlExpr>>,
    pub type_mapping: Option<TypeMapping>,
}

/// The right-hand side of an `IN`
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InValues {
    /// A list of literal values, all of the same type
    List {
        values: Vec<Literal>,
        type_mapping: Option<TypeMapping>,
    },
    /// A parameter bound to a list of values at execution time
    Parameter(ParameterExpr),
    Subquery(Box<SelectExpression>),
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InExpr {
    pub item: Box<SqlExpr>,
    pub values: InValues,
    pub negated: bool,
    pub type_mapping: Option<TypeMapping>,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExistsExpr {
    pub subquery: Box<SelectExpression>,
    pub negated: bool,
    pub type_mapping: Option<TypeMapping>,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScalarSubqueryExpr {
    pub subquery: Box<SelectExpression>,
    pub sql_type: SqlType,
    pub type_mapping: Option<TypeMapping>,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollateExpr {
    pub operand: Box<SqlExpr>,
    pub collation: String,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowNumberExpr {
    pub partitions: Vec<SqlExpr>,
    pub orderings: Vec<OrderingExpr>,
    pub type_mapping: Option<TypeMapping>,
}

/// A SQL scalar expression.
///
/// Nodes are built through [`SqlExpressionFactory`](crate::SqlExpressionFactory), which assigns
/// type mappings and applies local simplifications. Nullability derived during rewriting is never
/// stored on the node, since the same subtree can be nullable in one context and not in another.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SqlExpr {
    Column(ColumnExpr),
    Constant(ConstantExpr),
    Parameter(ParameterExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Case(CaseExpr),
    Function(FunctionExpr),
    Like(LikeExpr),
    In(InExpr),
    Exists(ExistsExpr),
    ScalarSubquery(ScalarSubqueryExpr),
    Collate(CollateExpr),
    /// `DISTINCT expr`, as used inside aggregate arguments
    Distinct(Box<SqlExpr>),
    RowNumber(RowNumberExpr),
    /// A raw SQL fragment, passed through untouched
    Fragment(String),
}

impl SqlExpr {
    pub fn sql_type(&self) -> SqlType {
        match self {
            Self::Column(c) => c.sql_type,
            Self::Constant(c) => c.sql_type,
            Self::Parameter(p) => p.sql_type,
            Self::Unary(u) => u.sql_type,
            Self::Binary(b) => b.sql_type,
            Self::Case(c) => c.sql_type,
            Self::Function(f) => f.sql_type,
            Self::Like(_) | Self::In(_) | Self::Exists(_) => SqlType::Bool,
            Self::ScalarSubquery(s) => s.sql_type,
            Self::Collate(c) => c.operand.sql_type(),
            Self::Distinct(e) => e.sql_type(),
            Self::RowNumber(_) => SqlType::BigInt,
            Self::Fragment(_) => SqlType::Unknown,
        }
    }

    pub fn type_mapping(&self) -> Option<&TypeMapping> {
        match self {
            Self::Column(c) => c.type_mapping.as_ref(),
            Self::Constant(c) => c.type_mapping.as_ref(),
            Self::Parameter(p) => p.type_mapping.as_ref(),
            Self::Unary(u) => u.type_mapping.as_ref(),
            Self::Binary(b) => b.type_mapping.as_ref(),
            Self::Case(c) => c.type_mapping.as_ref(),
            Self::Function(f) => f.type_mapping.as_ref(),
            Self::Like(l) => l.type_mapping.as_ref(),
            Self::In(i) => i.type_mapping.as_ref(),
            Self::Exists(e) => e.type_mapping.as_ref(),
            Self::ScalarSubquery(s) => s.type_mapping.as_ref(),
            Self::Collate(c) => c.operand.type_mapping(),
            Self::Distinct(e) => e.type_mapping(),
            Self::RowNumber(r) => r.type_mapping.as_ref(),
            Self::Fragment(_) => None,
        }
    }

    /// Returns true if values of this expression pass through a value converter
    pub fn has_converter(&self) -> bool {
        self.type_mapping().is_some_and(|tm| tm.has_converter)
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Constant(c) => Some(&c.value),
            _ => None,
        }
    }

    /// If this is a boolean constant, returns its value
    pub fn as_bool_constant(&self) -> Option<bool> {
        self.as_literal().and_then(Literal::as_bool)
    }

    pub fn is_null_constant(&self) -> bool {
        self.as_literal().is_some_and(Literal::is_null)
    }

    pub fn as_column(&self) -> Option<&ColumnExpr> {
        match self {
            Self::Column(c) => Some(c),
            _ => None,
        }
    }

    /// Returns true for a logical (as opposed to bitwise) `NOT`
    pub fn is_logical_not(&self) -> bool {
        matches!(
            self,
            Self::Unary(UnaryExpr {
                op: UnaryOperator::Not,
                sql_type: SqlType::Bool,
                ..
            })
        )
    }

    /// If this is an `IS NULL` or `IS NOT NULL` check, returns the operator and its operand
    pub fn as_null_check(&self) -> Option<(UnaryOperator, &SqlExpr)> {
        match self {
            Self::Unary(UnaryExpr { op, operand, .. }) if op.is_null_check() => {
                Some((*op, operand.as_ref()))
            }
            _ => None,
        }
    }

    /// If this is `col IS NOT NULL`, returns the column
    pub fn as_column_not_null_check(&self) -> Option<&ColumnExpr> {
        match self.as_null_check() {
            Some((UnaryOperator::IsNotNull, operand)) => operand.as_column(),
            _ => None,
        }
    }

    /// If this is `col IS NULL`, returns the column
    pub fn as_column_null_check(&self) -> Option<&ColumnExpr> {
        match self.as_null_check() {
            Some((UnaryOperator::IsNull, operand)) => operand.as_column(),
            _ => None,
        }
    }

    /// Flattens a tree of the given logical operator into its operands, left to right.
    ///
    /// `(a AND b) AND c` flattens to `[a, b, c]` for `AND`; any other expression flattens to
    /// itself.
    pub fn flatten_logical(&self, op: BinaryOperator) -> Vec<&SqlExpr> {
        let mut out = vec![];
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                Self::Binary(b) if b.op == op => {
                    stack.push(&b.right);
                    stack.push(&b.left);
                }
                _ => out.push(expr),
            }
        }
        out
    }
}

impl From<ColumnExpr> for SqlExpr {
    fn from(c: ColumnExpr) -> Self {
        Self::Column(c)
    }
}

impl From<ParameterExpr> for SqlExpr {
    fn from(p: ParameterExpr) -> Self {
        Self::Parameter(p)
    }
}

impl From<FunctionExpr> for SqlExpr {
    fn from(f: FunctionExpr) -> Self {
        Self::Function(f)
    }
}

impl fmt::Display for CaseExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CASE")?;
        if let Some(operand) = &self.operand {
            write!(f, " {operand}")?;
        }
        for CaseWhenClause { test, result } in &self.when_clauses {
            write!(f, " WHEN {test} THEN {result}")?;
        }
        if let Some(else_result) = &self.else_result {
            write!(f, " ELSE {else_result}")?;
        }
        write!(f, " END")
    }
}

impl fmt::Display for FunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(instance) = &self.instance {
            write!(f, "{instance}.")?;
        } else if let Some(schema) = &self.schema {
            write!(f, "{schema}.")?;
        }
        f.write_str(&self.name)?;
        if let Some(arguments) = &self.arguments {
            write!(f, "({})", arguments.iter().join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Display for InValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List { values, .. } => write!(f, "({})", values.iter().join(", ")),
            Self::Parameter(p) => write!(f, "{p}"),
            Self::Subquery(select) => write!(f, "({select})"),
        }
    }
}

impl fmt::Display for SqlExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(c) => write!(f, "{c}"),
            Self::Constant(c) => write!(f, "{}", c.value),
            Self::Parameter(p) => write!(f, "{p}"),
            Self::Unary(UnaryExpr {
                op,
                operand,
                type_mapping,
                sql_type,
            }) => match op {
                UnaryOperator::Not => write!(f, "NOT {operand}"),
                UnaryOperator::Negate => write!(f, "-{operand}"),
                UnaryOperator::BitwiseNot => write!(f, "~{operand}"),
                UnaryOperator::IsNull => write!(f, "{operand} IS NULL"),
                UnaryOperator::IsNotNull => write!(f, "{operand} IS NOT NULL"),
                UnaryOperator::Convert => match type_mapping {
                    Some(tm) => write!(f, "CAST({operand} AS {tm})"),
                    None => write!(f, "CAST({operand} AS {sql_type})"),
                },
            },
            Self::Binary(b) => write!(f, "({} {} {})", b.left, b.op, b.right),
            Self::Case(c) => write!(f, "{c}"),
            Self::Function(func) => write!(f, "{func}"),
            Self::Like(l) => {
                write!(f, "{} LIKE {}", l.match_expr, l.pattern)?;
                if let Some(escape) = &l.escape {
                    write!(f, " ESCAPE {escape}")?;
                }
                Ok(())
            }
            Self::In(i) => write!(
                f,
                "{} {}IN {}",
                i.item,
                if i.negated { "NOT " } else { "" },
                i.values
            ),
            Self::Exists(e) => write!(
                f,
                "{}EXISTS ({})",
                if e.negated { "NOT " } else { "" },
                e.subquery
            ),
            Self::ScalarSubquery(s) => write!(f, "({})", s.subquery),
            Self::Collate(c) => write!(f, "{} COLLATE {}", c.operand, c.collation),
            Self::Distinct(e) => write!(f, "DISTINCT {e}"),
            Self::RowNumber(r) => {
                write!(f, "ROW_NUMBER() OVER(")?;
                if !r.partitions.is_empty() {
                    write!(f, "PARTITION BY {}", r.partitions.iter().join(", "))?;
                    if !r.orderings.is_empty() {
                        write!(f, " ")?;
                    }
                }
                if !r.orderings.is_empty() {
                    write!(f, "ORDER BY {}", r.orderings.iter().join(", "))?;
                }
                write!(f, ")")
            }
            Self::Fragment(sql) => f.write_str(sql),
        }
    }
}
