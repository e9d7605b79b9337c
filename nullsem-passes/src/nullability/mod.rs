//! Nullability-aware rewriting of SQL expressions.
//!
//! [`SqlNullabilityProcessor`] walks an expression tree once, computing for every node whether it
//! can evaluate to `NULL`. When two-valued ("host") semantics are requested it rewrites `=` and
//! `<>` between nullable operands, and `IN` lists containing nulls, into forms that never yield
//! unknown, so that `NULL = NULL` is true and `NULL = 1` is false as the host language expects.
//!
//! Along the way the processor tracks which columns have been proven non-null on the predicate
//! branch currently being visited (after `a IS NOT NULL AND ...`, `a` can no longer be null on
//! the right-hand side), and whether the rewritten tree depends on the runtime values bound to
//! its parameters. A tree which does cannot be reused for other bindings.

mod expansion;
mod non_nullable;

use nullsem_errors::{NullSemResult, internal, missing_parameter_err, untranslatable};
use nullsem_sql::SqlExpressionFactory;
use nullsem_sql::ast::{
    BinaryExpr, BinaryOperator, CaseExpr, CaseWhenClause, CollateExpr, ExistsExpr, FunctionExpr,
    InExpr, InValues, LikeExpr, Literal, OrderingExpr, ParameterExpr, PredicateJoin,
    ProjectionExpr, RowNumberExpr, ScalarSubqueryExpr, SelectExpression, SqlExpr, SqlType,
    TableExpression, TypeMapping, UnaryExpr, UnaryOperator,
};
use tracing::{trace, trace_span};

use self::expansion::{Comparison, Operand};
use self::non_nullable::NonNullableColumns;
use crate::options::NullSemanticsOptions;
use crate::parameters::{ParameterValue, ParameterValues};

/// The result of rewriting a single expression
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedExpr {
    pub expr: SqlExpr,
    /// Whether the rewritten expression can evaluate to `NULL`
    pub nullable: bool,
    /// Whether the rewritten expression is valid for any values bound to its parameters
    pub can_cache: bool,
}

/// The result of rewriting a `SELECT` statement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedSelect {
    pub select: SelectExpression,
    /// Whether the rewritten statement is valid for any values bound to its parameters
    pub can_cache: bool,
}

/// The values on the right-hand side of an `IN`, with nulls split out
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InValuesPartition {
    /// The non-null values, in their original order
    pub values: Vec<Literal>,
    /// Whether any null values were removed
    pub has_null: bool,
    pub type_mapping: Option<TypeMapping>,
}

/// What happens to the non-null facts proven while visiting a subtree, once the visit is over
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FactScope {
    /// Roll the facts back, so they don't reach the subtree's siblings
    Restore,
    /// Keep the facts, for the caller to propagate or roll back itself
    Preserve,
}

enum OptimizedComparison {
    Done(SqlExpr),
    Unchanged(SqlExpr, SqlExpr),
}

fn strip_logical_not(expr: SqlExpr) -> (SqlExpr, bool) {
    match expr {
        SqlExpr::Unary(UnaryExpr {
            op: UnaryOperator::Not,
            operand,
            sql_type: SqlType::Bool,
            ..
        }) => (*operand, true),
        expr => (expr, false),
    }
}

fn null_check_for(op: BinaryOperator) -> UnaryOperator {
    if op == BinaryOperator::Equal {
        UnaryOperator::IsNull
    } else {
        UnaryOperator::IsNotNull
    }
}

fn predicate_is_false(select: &SelectExpression) -> bool {
    select
        .predicate
        .as_ref()
        .and_then(SqlExpr::as_bool_constant)
        == Some(false)
}

/// Rewrites expressions and statements according to the configured null semantics.
///
/// A processor holds the state of a single traversal, and is reset at the start of each call to
/// one of the `process_*` methods. It must not be shared between threads.
#[derive(Debug)]
pub struct SqlNullabilityProcessor<'a> {
    factory: SqlExpressionFactory,
    use_relational_nulls: bool,
    parameter_values: &'a ParameterValues,
    non_nullable_columns: NonNullableColumns,
    can_cache: bool,
}

impl<'a> SqlNullabilityProcessor<'a> {
    pub fn new(options: &NullSemanticsOptions, parameter_values: &'a ParameterValues) -> Self {
        Self {
            factory: SqlExpressionFactory::new(),
            use_relational_nulls: options.use_relational_nulls,
            parameter_values,
            non_nullable_columns: NonNullableColumns::default(),
            can_cache: true,
        }
    }

    pub fn use_relational_nulls(&self) -> bool {
        self.use_relational_nulls
    }

    fn reset(&mut self) {
        self.non_nullable_columns.clear();
        self.can_cache = true;
    }

    /// Rewrite a whole statement
    pub fn process_select(&mut self, select: SelectExpression) -> NullSemResult<ProcessedSelect> {
        let span = trace_span!("process_select", relational = self.use_relational_nulls).entered();
        self.reset();
        let select = self.visit_select(select)?;
        trace!(parent: &span, can_cache = self.can_cache, select = %select, "rewrote select");
        Ok(ProcessedSelect {
            select,
            can_cache: self.can_cache,
        })
    }

    /// Rewrite an expression used as a filter, where an unknown result is indistinguishable from
    /// false
    pub fn process_predicate(&mut self, expr: SqlExpr) -> NullSemResult<ProcessedExpr> {
        let span = trace_span!("process_predicate", relational = self.use_relational_nulls).entered();
        self.reset();
        let (expr, nullable) = self.visit(expr, true, FactScope::Restore)?;
        trace!(parent: &span, nullable, can_cache = self.can_cache, expr = %expr, "rewrote predicate");
        Ok(ProcessedExpr {
            expr,
            nullable,
            can_cache: self.can_cache,
        })
    }

    /// Rewrite an expression whose value is observed directly, as in a projection
    pub fn process_value(&mut self, expr: SqlExpr) -> NullSemResult<ProcessedExpr> {
        let span = trace_span!("process_value", relational = self.use_relational_nulls).entered();
        self.reset();
        let (expr, nullable) = self.visit(expr, false, FactScope::Restore)?;
        trace!(parent: &span, nullable, can_cache = self.can_cache, expr = %expr, "rewrote value");
        Ok(ProcessedExpr {
            expr,
            nullable,
            can_cache: self.can_cache,
        })
    }

    /// Split the values of an `IN` list into its non-null values and whether it contained a null.
    ///
    /// Enumerating a parameter bound to a list makes the rewritten tree depend on the bound
    /// values, so clears cacheability. Fails for a subquery, whose values are not known.
    pub fn partition_in_values(&mut self, values: InValues) -> NullSemResult<InValuesPartition> {
        let (values, type_mapping) = self.in_values_list(values)?;
        let (nulls, values): (Vec<_>, Vec<_>) = values.into_iter().partition(Literal::is_null);
        Ok(InValuesPartition {
            values,
            has_null: !nulls.is_empty(),
            type_mapping,
        })
    }

    fn do_not_cache(&mut self, reason: &str) {
        if self.can_cache {
            trace!(reason, "rewritten tree depends on parameter values");
        }
        self.can_cache = false;
    }

    fn parameter_value(&mut self, parameter: &ParameterExpr) -> NullSemResult<&'a ParameterValue> {
        let values = self.parameter_values;
        let Some(value) = values.get(&parameter.name) else {
            return Err(missing_parameter_err(parameter.name.clone()));
        };
        self.do_not_cache("parameter value inspected");
        Ok(value)
    }

    fn in_values_list(
        &mut self,
        values: InValues,
    ) -> NullSemResult<(Vec<Literal>, Option<TypeMapping>)> {
        match values {
            InValues::List {
                values,
                type_mapping,
            } => Ok((values, type_mapping)),
            InValues::Parameter(parameter) => {
                let values = match self.parameter_value(&parameter)? {
                    ParameterValue::Scalar(value) => vec![value.clone()],
                    ParameterValue::List(values) => values.clone(),
                };
                Ok((values, parameter.type_mapping))
            }
            InValues::Subquery(subquery) => {
                internal!("cannot enumerate the values of subquery {subquery}")
            }
        }
    }

    /// Record the columns proven non-null by `expr` holding: those of `col IS NOT NULL`, on its
    /// own or as a conjunct
    fn record_not_null_check(&mut self, expr: &SqlExpr) {
        self.non_nullable_columns.extend(
            expr.flatten_logical(BinaryOperator::And)
                .into_iter()
                .filter_map(SqlExpr::as_column_not_null_check)
                .cloned(),
        );
    }

    fn compare(&self, op: BinaryOperator, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        if op == BinaryOperator::Equal {
            self.factory.equal(left, right)
        } else {
            self.factory.not_equal(left, right)
        }
    }

    /// Fold a list of conditions with `AND` (or `OR`), simplifying through the factory
    fn combine(&self, conditions: Vec<SqlExpr>, conjunction: bool) -> SqlExpr {
        conditions
            .into_iter()
            .fold(self.factory.boolean(conjunction), |acc, condition| {
                if conjunction {
                    self.factory.and_also(acc, condition)
                } else {
                    self.factory.or_else(acc, condition)
                }
            })
    }

    fn visit(
        &mut self,
        expr: SqlExpr,
        allow_optimized_expansion: bool,
        scope: FactScope,
    ) -> NullSemResult<(SqlExpr, bool)> {
        let mark = self.non_nullable_columns.mark();
        let result = self.visit_expr(expr, allow_optimized_expansion)?;
        if scope == FactScope::Restore {
            self.non_nullable_columns.restore(mark);
        }
        Ok(result)
    }

    fn visit_value(&mut self, expr: SqlExpr) -> NullSemResult<(SqlExpr, bool)> {
        self.visit(expr, false, FactScope::Restore)
    }

    fn visit_expr(
        &mut self,
        expr: SqlExpr,
        allow_optimized_expansion: bool,
    ) -> NullSemResult<(SqlExpr, bool)> {
        match expr {
            SqlExpr::Column(column) => {
                let nullable =
                    column.nullable && !self.non_nullable_columns.contains(&column);
                Ok((SqlExpr::Column(column), nullable))
            }
            SqlExpr::Constant(constant) => {
                let nullable = constant.value.is_null();
                Ok((SqlExpr::Constant(constant), nullable))
            }
            SqlExpr::Parameter(parameter) => self.visit_parameter(parameter),
            SqlExpr::Unary(unary) => self.visit_unary(unary),
            SqlExpr::Binary(binary) => self.visit_binary(binary, allow_optimized_expansion),
            SqlExpr::Case(case) => self.visit_case(case),
            SqlExpr::Function(function) => self.visit_function(function),
            SqlExpr::Like(like) => self.visit_like(like),
            SqlExpr::In(in_expr) => self.visit_in(in_expr, allow_optimized_expansion),
            SqlExpr::Exists(ExistsExpr {
                subquery,
                negated,
                type_mapping,
            }) => {
                let subquery = self.visit_select(*subquery)?;
                if predicate_is_false(&subquery) {
                    return Ok((self.factory.boolean(negated), false));
                }
                let exists = SqlExpr::Exists(ExistsExpr {
                    subquery: Box::new(subquery),
                    negated,
                    type_mapping,
                });
                Ok((exists, false))
            }
            SqlExpr::ScalarSubquery(ScalarSubqueryExpr {
                subquery,
                sql_type,
                type_mapping,
            }) => {
                let subquery = self.visit_select(*subquery)?;
                let scalar = SqlExpr::ScalarSubquery(ScalarSubqueryExpr {
                    subquery: Box::new(subquery),
                    sql_type,
                    type_mapping,
                });
                Ok((scalar, true))
            }
            SqlExpr::Collate(CollateExpr { operand, collation }) => {
                let (operand, nullable) = self.visit_value(*operand)?;
                Ok((self.factory.collate(operand, collation), nullable))
            }
            SqlExpr::Distinct(operand) => {
                let (operand, nullable) = self.visit_value(*operand)?;
                Ok((self.factory.distinct(operand), nullable))
            }
            SqlExpr::RowNumber(RowNumberExpr {
                partitions,
                orderings,
                type_mapping,
            }) => {
                let partitions = partitions
                    .into_iter()
                    .map(|partition| self.visit_value(partition).map(|(partition, _)| partition))
                    .collect::<NullSemResult<Vec<_>>>()?;
                let orderings = self.visit_orderings(orderings)?;
                let row_number = SqlExpr::RowNumber(RowNumberExpr {
                    partitions,
                    orderings,
                    type_mapping,
                });
                Ok((row_number, false))
            }
            SqlExpr::Fragment(sql) => Ok((SqlExpr::Fragment(sql), false)),
        }
    }

    fn visit_parameter(&mut self, parameter: ParameterExpr) -> NullSemResult<(SqlExpr, bool)> {
        if self.parameter_value(&parameter)?.is_null() {
            trace!(parameter = %parameter, "inlining null parameter");
            let null = self
                .factory
                .typed_null(parameter.sql_type, parameter.type_mapping);
            return Ok((null, true));
        }
        Ok((SqlExpr::Parameter(parameter), false))
    }

    fn visit_unary(&mut self, unary: UnaryExpr) -> NullSemResult<(SqlExpr, bool)> {
        let UnaryExpr {
            op,
            operand,
            sql_type,
            type_mapping,
        } = unary;

        // Push a logical NOT as far in as it goes before visiting, so that the visit sees the
        // negated comparisons and null checks themselves
        if op == UnaryOperator::Not && sql_type == SqlType::Bool {
            return match self.factory.not(*operand) {
                SqlExpr::Unary(UnaryExpr {
                    op: UnaryOperator::Not,
                    operand,
                    sql_type: SqlType::Bool,
                    ..
                }) => {
                    let (operand, operand_nullable) = self.visit_value(*operand)?;
                    let not = self.factory.not(operand);
                    self.record_not_null_check(&not);
                    Ok((not, operand_nullable))
                }
                negated => self.visit_expr(negated, false),
            };
        }

        let (operand, operand_nullable) = self.visit_value(*operand)?;
        match op {
            UnaryOperator::IsNull | UnaryOperator::IsNotNull => {
                let check = self.process_null_not_null(op, operand, operand_nullable)?;
                self.record_not_null_check(&check);
                Ok((check, false))
            }
            op => {
                let unary = SqlExpr::Unary(UnaryExpr {
                    op,
                    operand: Box::new(operand),
                    sql_type,
                    type_mapping,
                });
                Ok((unary, operand_nullable))
            }
        }
    }

    /// Build `operand IS [NOT] NULL`, simplified against everything known about `operand`.
    ///
    /// `operand_nullable` is the nullability derived for `operand`, or `true` where it isn't
    /// known.
    fn process_null_not_null(
        &mut self,
        op: UnaryOperator,
        operand: SqlExpr,
        operand_nullable: bool,
    ) -> NullSemResult<SqlExpr> {
        let is_not_null = op == UnaryOperator::IsNotNull;
        if !operand_nullable {
            return Ok(self.factory.boolean(is_not_null));
        }

        match operand {
            SqlExpr::Constant(constant) => {
                Ok(self.factory.boolean(constant.value.is_null() != is_not_null))
            }
            SqlExpr::Parameter(parameter) => {
                let null = self.parameter_value(&parameter)?.is_null();
                Ok(self.factory.boolean(null != is_not_null))
            }
            SqlExpr::Column(column)
                if !column.nullable || self.non_nullable_columns.contains(&column) =>
            {
                Ok(self.factory.boolean(is_not_null))
            }
            SqlExpr::Unary(UnaryExpr {
                op:
                    UnaryOperator::Convert
                    | UnaryOperator::Not
                    | UnaryOperator::Negate
                    | UnaryOperator::BitwiseNot,
                operand,
                ..
            }) => self.process_null_not_null(op, *operand, true),
            SqlExpr::Unary(unary) if unary.op.is_null_check() => {
                Ok(self.factory.boolean(is_not_null))
            }
            SqlExpr::Binary(BinaryExpr {
                op: binary_op,
                left,
                right,
                ..
            }) if !binary_op.is_logical() => {
                // a + b IS NULL -> a IS NULL OR b IS NULL
                let left = self.process_null_not_null(op, *left, true)?;
                let right = self.process_null_not_null(op, *right, true)?;
                Ok(self.combine(vec![left, right], is_not_null))
            }
            SqlExpr::Function(function) if function.is_built_in("COALESCE") => {
                // COALESCE(a, b) IS NULL -> a IS NULL AND b IS NULL
                let mut checks = vec![];
                for argument in function.arguments.unwrap_or_default() {
                    checks.push(self.process_null_not_null(op, argument, true)?);
                }
                Ok(self.combine(checks, !is_not_null))
            }
            SqlExpr::Function(function) if !function.nullable => {
                Ok(self.factory.boolean(is_not_null))
            }
            SqlExpr::Function(function) if function.has_propagating_inputs() => {
                let inputs = function.propagating_inputs().cloned().collect::<Vec<_>>();
                let mut checks = Vec::with_capacity(inputs.len());
                for input in inputs {
                    checks.push(self.process_null_not_null(op, input, true)?);
                }
                Ok(self.combine(checks, is_not_null))
            }
            operand if is_not_null => Ok(self.factory.is_not_null(operand)),
            operand => Ok(self.factory.is_null(operand)),
        }
    }

    fn visit_binary(
        &mut self,
        binary: BinaryExpr,
        allow_optimized_expansion: bool,
    ) -> NullSemResult<(SqlExpr, bool)> {
        let BinaryExpr {
            op,
            left,
            right,
            sql_type,
            type_mapping,
        } = binary;
        let optimize_operands = allow_optimized_expansion && op.is_logical();

        // The left operand of AND holds for its right operand; for anything else the operands
        // are independent
        let mark = self.non_nullable_columns.mark();
        let (left, left_nullable) = self.visit(*left, optimize_operands, FactScope::Preserve)?;
        let left_facts = if op == BinaryOperator::Or {
            self.non_nullable_columns.since(mark).to_vec()
        } else {
            vec![]
        };
        if op != BinaryOperator::And {
            self.non_nullable_columns.restore(mark);
        }
        // The right operand of OR only matters where the left one isn't true, so every column
        // with an `IS NULL` disjunct on the left is non-null on the right
        if op == BinaryOperator::Or {
            self.non_nullable_columns.extend(
                left.flatten_logical(BinaryOperator::Or)
                    .into_iter()
                    .filter_map(SqlExpr::as_column_null_check)
                    .cloned(),
            );
        }
        let right_mark = self.non_nullable_columns.mark();
        let (right, right_nullable) =
            self.visit(*right, optimize_operands, FactScope::Preserve)?;
        match op {
            BinaryOperator::And => {}
            BinaryOperator::Or => {
                let proven_by_both = self
                    .non_nullable_columns
                    .since(right_mark)
                    .iter()
                    .filter(|column| left_facts.contains(column))
                    .cloned()
                    .collect::<Vec<_>>();
                self.non_nullable_columns.restore(mark);
                self.non_nullable_columns.extend(proven_by_both);
            }
            _ => self.non_nullable_columns.restore(mark),
        }

        if op == BinaryOperator::Add && sql_type.is_textual() {
            let left = if left_nullable {
                self.coalesce_to_empty(left, sql_type, type_mapping.as_ref())?
            } else {
                left
            };
            let right = if right_nullable {
                self.coalesce_to_empty(right, sql_type, type_mapping.as_ref())?
            } else {
                right
            };
            let concat = SqlExpr::Binary(BinaryExpr {
                op,
                left: Box::new(left),
                right: Box::new(right),
                sql_type,
                type_mapping,
            });
            return Ok((concat, false));
        }

        if op.is_equality() {
            return self.visit_equality(
                op,
                left,
                right,
                left_nullable,
                right_nullable,
                allow_optimized_expansion,
            );
        }

        let nullable = left_nullable || right_nullable;
        let expr = match op {
            BinaryOperator::And => self.factory.and_also(left, right),
            BinaryOperator::Or => self.factory.or_else(left, right),
            op => SqlExpr::Binary(BinaryExpr {
                op,
                left: Box::new(left),
                right: Box::new(right),
                sql_type,
                type_mapping,
            }),
        };
        Ok((expr, nullable))
    }

    /// Nulls concatenate as empty strings in the host language
    fn coalesce_to_empty(
        &self,
        expr: SqlExpr,
        sql_type: SqlType,
        type_mapping: Option<&TypeMapping>,
    ) -> NullSemResult<SqlExpr> {
        let empty =
            self.factory
                .typed_constant(Literal::String(String::new()), sql_type, type_mapping.cloned());
        match expr {
            SqlExpr::Constant(_) | SqlExpr::Parameter(_) => Ok(empty),
            expr => self.factory.coalesce(vec![expr, empty], type_mapping.cloned()),
        }
    }

    fn visit_equality(
        &mut self,
        op: BinaryOperator,
        left: SqlExpr,
        right: SqlExpr,
        left_nullable: bool,
        right_nullable: bool,
        allow_optimized_expansion: bool,
    ) -> NullSemResult<(SqlExpr, bool)> {
        // `col = x` with a non-null `x` can only hold for a non-null `col`. That is a fact for
        // the enclosing branch when the comparison is false for a null `col` (two-valued), or
        // when unknown is as good as false
        let proven_column = match (&left, &right) {
            (SqlExpr::Column(column), _) if left_nullable && !right_nullable => Some(column.clone()),
            (_, SqlExpr::Column(column)) if right_nullable && !left_nullable => {
                Some(column.clone())
            }
            _ => None,
        }
        .filter(|_| {
            op == BinaryOperator::Equal
                && (allow_optimized_expansion || !self.use_relational_nulls)
        });

        let (expr, nullable) =
            match self.optimize_comparison(op, left, right, left_nullable, right_nullable)? {
                OptimizedComparison::Done(expr) => {
                    self.record_not_null_check(&expr);
                    (expr, false)
                }
                OptimizedComparison::Unchanged(left, right)
                    if (left_nullable || right_nullable) && !self.use_relational_nulls =>
                {
                    let (expr, nullable) = self.rewrite_null_semantics(
                        op,
                        left,
                        right,
                        left_nullable,
                        right_nullable,
                        allow_optimized_expansion,
                    )?;
                    self.record_not_null_check(&expr);
                    (expr, nullable)
                }
                OptimizedComparison::Unchanged(left, right) => {
                    (self.compare(op, left, right), left_nullable || right_nullable)
                }
            };

        if let Some(column) = proven_column {
            self.non_nullable_columns.push(column);
        }
        Ok((expr, nullable))
    }

    /// Simplifications of `=` and `<>` which need to know the nullability of the operands
    fn optimize_comparison(
        &mut self,
        op: BinaryOperator,
        left: SqlExpr,
        right: SqlExpr,
        left_nullable: bool,
        right_nullable: bool,
    ) -> NullSemResult<OptimizedComparison> {
        // a = NULL -> a IS NULL
        if right.is_null_constant() {
            let check = self.process_null_not_null(null_check_for(op), left, left_nullable)?;
            return Ok(OptimizedComparison::Done(check));
        }
        if left.is_null_constant() {
            let check = self.process_null_not_null(null_check_for(op), right, right_nullable)?;
            return Ok(OptimizedComparison::Done(check));
        }

        // a = TRUE -> a, a = FALSE -> NOT a
        if !left.has_converter() && !right.has_converter() {
            if !left_nullable {
                if let Some(value) = right.as_bool_constant() {
                    return Ok(OptimizedComparison::Done(
                        self.compare_to_bool(op, left, value),
                    ));
                }
            }
            if !right_nullable {
                if let Some(value) = left.as_bool_constant() {
                    return Ok(OptimizedComparison::Done(
                        self.compare_to_bool(op, right, value),
                    ));
                }
            }
        }

        if !left_nullable && !right_nullable {
            if left == right {
                return Ok(OptimizedComparison::Done(
                    self.factory.boolean(op == BinaryOperator::Equal),
                ));
            }
            // NOT a = NOT b -> a = b, NOT a = b -> a <> b
            if left.is_logical_not() || right.is_logical_not() {
                let (left, left_negated) = strip_logical_not(left);
                let (right, right_negated) = strip_logical_not(right);
                let op = if left_negated == right_negated {
                    op
                } else {
                    op.negate().unwrap_or(op)
                };
                return Ok(OptimizedComparison::Done(self.compare(op, left, right)));
            }
        }

        Ok(OptimizedComparison::Unchanged(left, right))
    }

    fn compare_to_bool(&self, op: BinaryOperator, operand: SqlExpr, value: bool) -> SqlExpr {
        if (op == BinaryOperator::Equal) != value {
            self.factory.not(operand)
        } else {
            operand
        }
    }

    fn rewrite_null_semantics(
        &mut self,
        op: BinaryOperator,
        left: SqlExpr,
        right: SqlExpr,
        left_nullable: bool,
        right_nullable: bool,
        allow_optimized_expansion: bool,
    ) -> NullSemResult<(SqlExpr, bool)> {
        let (left, left_negated) = strip_logical_not(left);
        let (right, right_negated) = strip_logical_not(right);
        trace!(
            %op,
            left_nullable,
            right_nullable,
            left_negated,
            right_negated,
            optimized = allow_optimized_expansion,
            "expanding comparison to two-valued semantics"
        );
        let comparison = Comparison {
            op,
            left: self.operand(left, left_nullable)?,
            right: self.operand(right, right_nullable)?,
            left_negated,
            right_negated,
        };
        expansion::expand_two_valued(&self.factory, comparison, allow_optimized_expansion)
    }

    fn operand(&mut self, expr: SqlExpr, nullable: bool) -> NullSemResult<Operand> {
        let is_null = self.process_null_not_null(UnaryOperator::IsNull, expr.clone(), nullable)?;
        let is_not_null = self.factory.not(is_null.clone());
        Ok(Operand {
            expr,
            nullable,
            is_null,
            is_not_null,
        })
    }

    fn visit_case(&mut self, case: CaseExpr) -> NullSemResult<(SqlExpr, bool)> {
        let CaseExpr {
            operand,
            when_clauses,
            else_result,
            sql_type: _,
            type_mapping,
        } = case;
        let searched = operand.is_none();
        let operand = match operand {
            Some(operand) => Some(self.visit_value(*operand)?.0),
            None => None,
        };

        let mark = self.non_nullable_columns.mark();
        let mut clauses = Vec::with_capacity(when_clauses.len());
        let mut results_nullable = false;
        let mut always_matches = false;
        for CaseWhenClause { test, result } in when_clauses {
            // A branch is only taken when its test holds, so what the test proves holds for the
            // result too
            let (test, _) = if searched {
                self.visit(test, true, FactScope::Preserve)?
            } else {
                self.visit_value(test)?
            };
            if searched {
                if test.is_null_constant() || test.as_bool_constant() == Some(false) {
                    self.non_nullable_columns.restore(mark);
                    continue;
                }
                always_matches = test.as_bool_constant() == Some(true);
            }

            let (result, result_nullable) = self.visit_value(result)?;
            self.non_nullable_columns.restore(mark);
            results_nullable |= result_nullable;
            clauses.push(CaseWhenClause { test, result });
            if always_matches {
                break;
            }
        }

        let (else_result, else_nullable) = match else_result {
            _ if always_matches => (None, false),
            Some(else_result) => {
                let (else_result, nullable) = self.visit_value(*else_result)?;
                (Some(else_result), nullable)
            }
            None => (None, true),
        };

        let case = self
            .factory
            .case(operand, clauses, else_result, type_mapping)?;
        Ok((case, results_nullable || else_nullable))
    }

    fn visit_function(&mut self, function: FunctionExpr) -> NullSemResult<(SqlExpr, bool)> {
        let FunctionExpr {
            name,
            schema,
            instance,
            arguments,
            built_in,
            nullable: declared_nullable,
            instance_propagates_nullability,
            arguments_propagate_nullability,
            sql_type,
            type_mapping,
        } = function;

        let (instance, instance_nullable) = match instance {
            Some(instance) => {
                let (instance, nullable) = self.visit_value(*instance)?;
                (Some(Box::new(instance)), nullable)
            }
            None => (None, false),
        };
        let mut arguments_nullable = vec![];
        let arguments = match arguments {
            Some(arguments) => {
                let mut visited = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    let (argument, nullable) = self.visit_value(argument)?;
                    visited.push(argument);
                    arguments_nullable.push(nullable);
                }
                Some(visited)
            }
            None => None,
        };

        let function = FunctionExpr {
            name,
            schema,
            instance,
            arguments,
            built_in,
            nullable: declared_nullable,
            instance_propagates_nullability,
            arguments_propagate_nullability,
            sql_type,
            type_mapping,
        };

        // SUM over no rows is null whatever its arguments are, so it is always replaced by zero
        if function.is_built_in("SUM") {
            let zero = self.factory.typed_constant(
                Literal::Integer(0),
                function.sql_type,
                function.type_mapping.clone(),
            );
            let type_mapping = function.type_mapping.clone();
            let sum = SqlExpr::Function(FunctionExpr {
                nullable: true,
                ..function
            });
            let sum = self.factory.coalesce(vec![sum, zero], type_mapping)?;
            return Ok((sum, false));
        }

        let nullable = if function.is_built_in("COALESCE") {
            !arguments_nullable.is_empty() && arguments_nullable.iter().all(|nullable| *nullable)
        } else if !function.nullable {
            false
        } else if !function.has_propagating_inputs() {
            true
        } else {
            (function.instance_propagates_nullability && instance_nullable)
                || arguments_nullable
                    .iter()
                    .zip(&function.arguments_propagate_nullability)
                    .any(|(nullable, propagates)| *nullable && *propagates)
        };

        Ok((SqlExpr::Function(function), nullable))
    }

    fn visit_like(&mut self, like: LikeExpr) -> NullSemResult<(SqlExpr, bool)> {
        let LikeExpr {
            match_expr,
            pattern,
            escape,
            type_mapping,
        } = like;
        let (match_expr, match_nullable) = self.visit_value(*match_expr)?;
        let (pattern, pattern_nullable) = self.visit_value(*pattern)?;
        let (escape, escape_nullable) = match escape {
            Some(escape) => {
                let (escape, nullable) = self.visit_value(*escape)?;
                (Some(Box::new(escape)), nullable)
            }
            None => (None, false),
        };
        let like = SqlExpr::Like(LikeExpr {
            match_expr: Box::new(match_expr),
            pattern: Box::new(pattern),
            escape,
            type_mapping,
        });
        Ok((like, match_nullable || pattern_nullable || escape_nullable))
    }

    /// `item IN (value)` is `item = value`, unless `value` is null
    fn in_or_equal(&self, item: SqlExpr, mut values: Vec<Literal>, negated: bool) -> SqlExpr {
        if values.len() == 1 && !values[0].is_null() {
            if let Some(value) = values.pop() {
                let op = if negated {
                    BinaryOperator::NotEqual
                } else {
                    BinaryOperator::Equal
                };
                return self.compare(op, item, self.factory.constant(value));
            }
        }
        self.factory.in_values(item, values, negated)
    }

    fn visit_in(
        &mut self,
        in_expr: InExpr,
        allow_optimized_expansion: bool,
    ) -> NullSemResult<(SqlExpr, bool)> {
        let InExpr {
            item,
            values,
            negated,
            type_mapping,
        } = in_expr;
        let (item, item_nullable) = self.visit_value(*item)?;

        if let InValues::Subquery(subquery) = values {
            let subquery = self.visit_select(*subquery)?;
            if predicate_is_false(&subquery) {
                return Ok((self.factory.boolean(negated), false));
            }
            let projection_nullable = !matches!(
                subquery.single_projection(),
                Some(SqlExpr::Column(column)) if !column.nullable
            );
            let in_subquery = SqlExpr::In(InExpr {
                item: Box::new(item),
                values: InValues::Subquery(Box::new(subquery)),
                negated,
                type_mapping,
            });
            return Ok((in_subquery, item_nullable || projection_nullable));
        }

        // Where unknown is as good as false, `col IN (...)` only holds for a non-null `col`
        let proven_column = match &item {
            SqlExpr::Column(column)
                if item_nullable && allow_optimized_expansion && !negated =>
            {
                Some(column.clone())
            }
            _ => None,
        };

        if self.use_relational_nulls {
            let (values, _) = self.in_values_list(values)?;
            if values.is_empty() {
                return Ok((self.factory.boolean(negated), false));
            }
            let nullable = item_nullable || values.iter().any(Literal::is_null);
            self.non_nullable_columns.extend(proven_column);
            return Ok((self.in_or_equal(item, values, negated), nullable));
        }

        let InValuesPartition {
            values, has_null, ..
        } = self.partition_in_values(values)?;
        trace!(values = values.len(), has_null, negated, "partitioned IN values");

        if values.is_empty() {
            // Only a null could match
            if has_null && item_nullable {
                let op = if negated {
                    UnaryOperator::IsNotNull
                } else {
                    UnaryOperator::IsNull
                };
                let check = self.process_null_not_null(op, item, true)?;
                self.record_not_null_check(&check);
                return Ok((check, false));
            }
            return Ok((self.factory.boolean(negated), false));
        }

        let simplified = self.in_or_equal(item.clone(), values, negated);
        if !item_nullable || (allow_optimized_expansion && !negated && !has_null) {
            self.non_nullable_columns.extend(proven_column);
            return Ok((simplified, item_nullable));
        }

        // item IN (1, NULL)     -> item IS NULL OR item IN (1)
        // item NOT IN (1, NULL) -> item IS NOT NULL AND item NOT IN (1)
        // item IN (1)           -> item IS NOT NULL AND item IN (1)
        // item NOT IN (1)       -> item IS NULL OR item NOT IN (1)
        let expr = if negated == has_null {
            let not_null = self.process_null_not_null(UnaryOperator::IsNotNull, item, true)?;
            self.factory.and_also(not_null, simplified)
        } else {
            let null = self.process_null_not_null(UnaryOperator::IsNull, item, true)?;
            self.factory.or_else(null, simplified)
        };
        self.record_not_null_check(&expr);
        Ok((expr, false))
    }

    fn visit_orderings(&mut self, orderings: Vec<OrderingExpr>) -> NullSemResult<Vec<OrderingExpr>> {
        orderings
            .into_iter()
            .map(|OrderingExpr { expr, ascending }| {
                Ok(OrderingExpr {
                    expr: self.visit_value(expr)?.0,
                    ascending,
                })
            })
            .collect()
    }

    fn visit_optional_value(&mut self, expr: Option<SqlExpr>) -> NullSemResult<Option<SqlExpr>> {
        expr.map(|expr| self.visit_value(expr).map(|(expr, _)| expr))
            .transpose()
    }

    /// Visit a WHERE or HAVING clause, dropping it if it always holds
    fn visit_filter(&mut self, filter: Option<SqlExpr>) -> NullSemResult<Option<SqlExpr>> {
        let Some(filter) = filter else {
            return Ok(None);
        };
        let (filter, _) = self.visit(filter, true, FactScope::Restore)?;
        Ok((filter.as_bool_constant() != Some(true)).then_some(filter))
    }

    fn visit_select(&mut self, select: SelectExpression) -> NullSemResult<SelectExpression> {
        let SelectExpression {
            distinct,
            projection,
            tables,
            predicate,
            group_by,
            having,
            orderings,
            limit,
            offset,
            alias,
        } = select;
        let mark = self.non_nullable_columns.mark();

        let projection = projection
            .into_iter()
            .map(|ProjectionExpr { expr, alias }| {
                Ok(ProjectionExpr {
                    expr: self.visit_value(expr)?.0,
                    alias,
                })
            })
            .collect::<NullSemResult<Vec<_>>>()?;
        let tables = tables
            .into_iter()
            .map(|table| self.visit_table(table))
            .collect::<NullSemResult<Vec<_>>>()?;
        let predicate = self.visit_filter(predicate)?;
        let group_by = group_by
            .into_iter()
            .map(|expr| self.visit_value(expr).map(|(expr, _)| expr))
            .collect::<NullSemResult<Vec<_>>>()?;
        let having = self.visit_filter(having)?;
        let orderings = self.visit_orderings(orderings)?;
        let limit = self.visit_optional_value(limit)?;
        let offset = self.visit_optional_value(offset)?;

        self.non_nullable_columns.restore(mark);
        Ok(SelectExpression {
            distinct,
            projection,
            tables,
            predicate,
            group_by,
            having,
            orderings,
            limit,
            offset,
            alias,
        })
    }

    fn visit_table(&mut self, table: TableExpression) -> NullSemResult<TableExpression> {
        Ok(match table {
            table @ (TableExpression::Table { .. } | TableExpression::FromSql { .. }) => table,
            TableExpression::Select(select) => {
                TableExpression::Select(Box::new(self.visit_select(*select)?))
            }
            TableExpression::InnerJoin(PredicateJoin { table, predicate }) => {
                let table = Box::new(self.visit_table(*table)?);
                let predicate = self.process_join_predicate(predicate)?;
                if predicate.as_bool_constant() == Some(true) {
                    TableExpression::CrossJoin(table)
                } else {
                    TableExpression::InnerJoin(PredicateJoin { table, predicate })
                }
            }
            TableExpression::LeftJoin(PredicateJoin { table, predicate }) => {
                let table = Box::new(self.visit_table(*table)?);
                let predicate = self.process_join_predicate(predicate)?;
                TableExpression::LeftJoin(PredicateJoin { table, predicate })
            }
            TableExpression::CrossJoin(table) => {
                TableExpression::CrossJoin(Box::new(self.visit_table(*table)?))
            }
            TableExpression::CrossApply(table) => {
                TableExpression::CrossApply(Box::new(self.visit_table(*table)?))
            }
            TableExpression::OuterApply(table) => {
                TableExpression::OuterApply(Box::new(self.visit_table(*table)?))
            }
            TableExpression::SetOperation {
                op,
                distinct,
                left,
                right,
                alias,
            } => TableExpression::SetOperation {
                op,
                distinct,
                left: Box::new(self.visit_select(*left)?),
                right: Box::new(self.visit_select(*right)?),
                alias,
            },
            TableExpression::TableValuedFunction {
                name,
                schema,
                arguments,
                alias,
            } => TableExpression::TableValuedFunction {
                name,
                schema,
                arguments: arguments
                    .into_iter()
                    .map(|argument| self.visit_value(argument).map(|(argument, _)| argument))
                    .collect::<NullSemResult<Vec<_>>>()?,
                alias,
            },
        })
    }

    /// Rewrite the predicate of a join.
    ///
    /// Rows with null keys never join, so equalities keep their native semantics and are only
    /// simplified; anything other than comparisons and conjunctions of them is rejected.
    fn process_join_predicate(&mut self, predicate: SqlExpr) -> NullSemResult<SqlExpr> {
        match predicate {
            SqlExpr::Binary(BinaryExpr {
                op: BinaryOperator::Equal,
                left,
                right,
                ..
            }) => {
                let (left, left_nullable) = self.visit_value(*left)?;
                let (right, right_nullable) = self.visit_value(*right)?;
                Ok(
                    match self.optimize_comparison(
                        BinaryOperator::Equal,
                        left,
                        right,
                        left_nullable,
                        right_nullable,
                    )? {
                        OptimizedComparison::Done(expr) => expr,
                        OptimizedComparison::Unchanged(left, right) => {
                            self.factory.equal(left, right)
                        }
                    },
                )
            }
            SqlExpr::Binary(BinaryExpr {
                op: BinaryOperator::And,
                left,
                right,
                ..
            }) => {
                let left = self.process_join_predicate(*left)?;
                let right = self.process_join_predicate(*right)?;
                Ok(self.factory.and_also(left, right))
            }
            SqlExpr::Binary(binary) if binary.op.is_comparison() => Ok(self
                .visit(SqlExpr::Binary(binary), true, FactScope::Restore)?
                .0),
            predicate if predicate.as_bool_constant().is_some() => Ok(predicate),
            predicate => {
                untranslatable!(predicate, "unsupported join predicate")
            }
        }
    }
}
