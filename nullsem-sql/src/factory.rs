//! Smart constructors for [`SqlExpr`] nodes.
//!
//! [`SqlExpressionFactory`] is the only sanctioned way to build expression nodes. Every
//! constructor assigns a type mapping to the node it builds (inferring one from its operands
//! where possible) and applies local simplifications which are valid under three-valued logic,
//! looking no further than its immediate operands. The factory never looks at the runtime value
//! of a parameter, only at its presence, so anything it builds is independent of parameter
//! bindings.
//!
//! The factory holds no state, and can be shared freely between threads.

use nullsem_errors::{NullSemResult, internal, invariant_eq, unsupported};

use crate::ast::{
    BinaryExpr, BinaryOperator, CaseExpr, CaseWhenClause, CollateExpr, ColumnExpr, ConstantExpr,
    ExistsExpr, FunctionExpr, InExpr, InValues, LikeExpr, Literal, OrderingExpr, ParameterExpr,
    RowNumberExpr, ScalarSubqueryExpr, SelectExpression, SqlExpr, SqlType, TypeMapping,
    UnaryExpr, UnaryOperator,
};

/// Declared nullability of a function call, see [`FunctionExpr`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionNullability {
    pub nullable: bool,
    pub instance_propagates: bool,
    pub arguments_propagate: Vec<bool>,
}

impl FunctionNullability {
    /// A function which never returns null
    pub fn non_nullable(arity: usize) -> Self {
        Self {
            nullable: false,
            instance_propagates: false,
            arguments_propagate: vec![false; arity],
        }
    }

    /// A function which can return null for reasons not tied to any particular input
    pub fn nullable(arity: usize) -> Self {
        Self {
            nullable: true,
            instance_propagates: false,
            arguments_propagate: vec![false; arity],
        }
    }

    /// A function which returns null exactly when one of its arguments is null
    pub fn propagating(arity: usize) -> Self {
        Self {
            nullable: true,
            instance_propagates: false,
            arguments_propagate: vec![true; arity],
        }
    }

    #[must_use]
    pub fn with_instance_propagating(mut self) -> Self {
        self.instance_propagates = true;
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SqlExpressionFactory;

/// Returns the most specific type mapping among the given operands: a mapping from something
/// other than a constant or parameter is preferred, then any mapping, then the default for the
/// first operand with a known type.
fn infer_type_mapping<'a, I>(operands: I) -> Option<TypeMapping>
where
    I: IntoIterator<Item = &'a SqlExpr>,
    I::IntoIter: Clone,
{
    let operands = operands.into_iter();
    operands
        .clone()
        .filter(|e| !matches!(e, SqlExpr::Constant(_) | SqlExpr::Parameter(_)))
        .find_map(|e| e.type_mapping())
        .or_else(|| operands.clone().find_map(|e| e.type_mapping()))
        .cloned()
        .or_else(|| {
            operands
                .map(SqlExpr::sql_type)
                .find(|ty| *ty != SqlType::Unknown)
                .and_then(TypeMapping::default_for)
        })
}

/// Returns true if the expression can be seen to be non-null without any knowledge of the
/// context it appears in.
fn is_statically_non_nullable(expr: &SqlExpr) -> bool {
    match expr {
        SqlExpr::Constant(c) => !c.value.is_null(),
        SqlExpr::Column(c) => !c.nullable,
        SqlExpr::Unary(u) => u.op.is_null_check(),
        SqlExpr::Function(f) => !f.nullable,
        SqlExpr::Exists(_) | SqlExpr::RowNumber(_) => true,
        _ => false,
    }
}

impl SqlExpressionFactory {
    pub fn new() -> Self {
        Self
    }

    /// Assign `type_mapping` to `expr` if `expr` doesn't yet have one.
    ///
    /// Descends through arithmetic, negation and CASE results, so that a literal buried in an
    /// untyped arithmetic expression picks up the mapping of whatever it is compared against.
    pub fn apply_type_mapping(&self, expr: SqlExpr, type_mapping: Option<&TypeMapping>) -> SqlExpr {
        let Some(tm) = type_mapping else {
            return expr;
        };
        if expr.type_mapping().is_some() {
            return expr;
        }

        match expr {
            SqlExpr::Constant(c) => SqlExpr::Constant(ConstantExpr {
                sql_type: tm.sql_type,
                type_mapping: Some(tm.clone()),
                ..c
            }),
            SqlExpr::Parameter(p) => SqlExpr::Parameter(ParameterExpr {
                sql_type: tm.sql_type,
                type_mapping: Some(tm.clone()),
                ..p
            }),
            SqlExpr::Unary(UnaryExpr {
                op: op @ (UnaryOperator::Negate | UnaryOperator::BitwiseNot),
                operand,
                ..
            }) => SqlExpr::Unary(UnaryExpr {
                op,
                operand: Box::new(self.apply_type_mapping(*operand, Some(tm))),
                sql_type: tm.sql_type,
                type_mapping: Some(tm.clone()),
            }),
            SqlExpr::Binary(b) if b.op.is_arithmetic() || b.op.is_bitwise() => {
                SqlExpr::Binary(BinaryExpr {
                    op: b.op,
                    left: Box::new(self.apply_type_mapping(*b.left, Some(tm))),
                    right: Box::new(self.apply_type_mapping(*b.right, Some(tm))),
                    sql_type: tm.sql_type,
                    type_mapping: Some(tm.clone()),
                })
            }
            SqlExpr::Case(c) => SqlExpr::Case(CaseExpr {
                when_clauses: c
                    .when_clauses
                    .into_iter()
                    .map(|CaseWhenClause { test, result }| CaseWhenClause {
                        test,
                        result: self.apply_type_mapping(result, Some(tm)),
                    })
                    .collect(),
                else_result: c
                    .else_result
                    .map(|e| Box::new(self.apply_type_mapping(*e, Some(tm)))),
                sql_type: tm.sql_type,
                type_mapping: Some(tm.clone()),
                operand: c.operand,
            }),
            expr => expr,
        }
    }

    /// Assign the default mapping for the expression's type, if it doesn't have a mapping yet
    pub fn apply_default_type_mapping(&self, expr: SqlExpr) -> SqlExpr {
        let tm = TypeMapping::default_for(expr.sql_type());
        self.apply_type_mapping(expr, tm.as_ref())
    }

    pub fn column(&self, name: &str, sql_type: SqlType, nullable: bool) -> SqlExpr {
        SqlExpr::Column(ColumnExpr::new(name, sql_type, nullable))
    }

    /// A constant whose mapping will be inferred from the context it is used in
    pub fn constant<L: Into<Literal>>(&self, value: L) -> SqlExpr {
        let value = value.into();
        SqlExpr::Constant(ConstantExpr {
            sql_type: value.sql_type(),
            value,
            type_mapping: None,
        })
    }

    pub fn typed_constant(
        &self,
        value: Literal,
        sql_type: SqlType,
        type_mapping: Option<TypeMapping>,
    ) -> SqlExpr {
        SqlExpr::Constant(ConstantExpr {
            value,
            sql_type,
            type_mapping,
        })
    }

    /// A fully typed boolean constant
    pub fn boolean(&self, value: bool) -> SqlExpr {
        self.typed_constant(
            Literal::Boolean(value),
            SqlType::Bool,
            Some(TypeMapping::boolean()),
        )
    }

    pub fn typed_null(&self, sql_type: SqlType, type_mapping: Option<TypeMapping>) -> SqlExpr {
        self.typed_constant(Literal::Null, sql_type, type_mapping)
    }

    pub fn parameter(&self, name: &str, sql_type: SqlType) -> ParameterExpr {
        ParameterExpr {
            name: name.to_owned(),
            sql_type,
            type_mapping: None,
        }
    }

    pub fn fragment<S: Into<String>>(&self, sql: S) -> SqlExpr {
        SqlExpr::Fragment(sql.into())
    }

    /// Build a binary node for any operator, dispatching to the specific constructor.
    pub fn make_binary(
        &self,
        op: BinaryOperator,
        left: SqlExpr,
        right: SqlExpr,
    ) -> NullSemResult<SqlExpr> {
        match op {
            BinaryOperator::And => Ok(self.and_also(left, right)),
            BinaryOperator::Or => Ok(self.or_else(left, right)),
            op if op.is_comparison() => Ok(self.comparison(op, left, right)),
            op => self.arithmetic(op, left, right),
        }
    }

    /// Build a unary node for any operator, dispatching to the specific constructor.
    ///
    /// `sql_type` and `type_mapping` are only used for [`UnaryOperator::Convert`], where they
    /// describe the target type.
    pub fn make_unary(
        &self,
        op: UnaryOperator,
        operand: SqlExpr,
        sql_type: SqlType,
        type_mapping: Option<TypeMapping>,
    ) -> NullSemResult<SqlExpr> {
        match op {
            UnaryOperator::Not => Ok(self.not(operand)),
            UnaryOperator::IsNull => Ok(self.is_null(operand)),
            UnaryOperator::IsNotNull => Ok(self.is_not_null(operand)),
            UnaryOperator::Negate => self.negate(operand),
            UnaryOperator::BitwiseNot => self.bitwise_not(operand),
            UnaryOperator::Convert => self.convert(operand, sql_type, type_mapping),
        }
    }

    /// Build a comparison, inferring a common mapping for both operands. `op` must be a
    /// comparison operator.
    fn comparison(&self, op: BinaryOperator, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        let tm = infer_type_mapping([&left, &right]);
        let left = self.apply_type_mapping(left, tm.as_ref());
        let right = self.apply_type_mapping(right, tm.as_ref());
        SqlExpr::Binary(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
            sql_type: SqlType::Bool,
            type_mapping: Some(TypeMapping::boolean()),
        })
    }

    pub fn equal(&self, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        self.comparison(BinaryOperator::Equal, left, right)
    }

    pub fn not_equal(&self, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        self.comparison(BinaryOperator::NotEqual, left, right)
    }

    pub fn greater_than(&self, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        self.comparison(BinaryOperator::Greater, left, right)
    }

    pub fn greater_than_or_equal(&self, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        self.comparison(BinaryOperator::GreaterOrEqual, left, right)
    }

    pub fn less_than(&self, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        self.comparison(BinaryOperator::Less, left, right)
    }

    pub fn less_than_or_equal(&self, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        self.comparison(BinaryOperator::LessOrEqual, left, right)
    }

    /// Build an arithmetic or bitwise node. Fails if no mapping can be inferred for the result.
    pub fn arithmetic(
        &self,
        op: BinaryOperator,
        left: SqlExpr,
        right: SqlExpr,
    ) -> NullSemResult<SqlExpr> {
        if !(op.is_arithmetic() || op.is_bitwise()) {
            internal!("{op} is not an arithmetic or bitwise operator");
        }
        let Some(tm) = infer_type_mapping([&left, &right]) else {
            internal!("no type mapping can be inferred for ({left} {op} {right})");
        };
        let left = self.apply_type_mapping(left, Some(&tm));
        let right = self.apply_type_mapping(right, Some(&tm));
        Ok(SqlExpr::Binary(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
            sql_type: tm.sql_type,
            type_mapping: Some(tm),
        }))
    }

    pub fn add(&self, left: SqlExpr, right: SqlExpr) -> NullSemResult<SqlExpr> {
        self.arithmetic(BinaryOperator::Add, left, right)
    }

    pub fn subtract(&self, left: SqlExpr, right: SqlExpr) -> NullSemResult<SqlExpr> {
        self.arithmetic(BinaryOperator::Subtract, left, right)
    }

    pub fn multiply(&self, left: SqlExpr, right: SqlExpr) -> NullSemResult<SqlExpr> {
        self.arithmetic(BinaryOperator::Multiply, left, right)
    }

    pub fn divide(&self, left: SqlExpr, right: SqlExpr) -> NullSemResult<SqlExpr> {
        self.arithmetic(BinaryOperator::Divide, left, right)
    }

    pub fn modulo(&self, left: SqlExpr, right: SqlExpr) -> NullSemResult<SqlExpr> {
        self.arithmetic(BinaryOperator::Modulo, left, right)
    }

    pub fn bitwise_and(&self, left: SqlExpr, right: SqlExpr) -> NullSemResult<SqlExpr> {
        self.arithmetic(BinaryOperator::BitwiseAnd, left, right)
    }

    pub fn bitwise_or(&self, left: SqlExpr, right: SqlExpr) -> NullSemResult<SqlExpr> {
        self.arithmetic(BinaryOperator::BitwiseOr, left, right)
    }

    pub fn bitwise_xor(&self, left: SqlExpr, right: SqlExpr) -> NullSemResult<SqlExpr> {
        self.arithmetic(BinaryOperator::BitwiseXor, left, right)
    }

    fn logical(&self, op: BinaryOperator, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        SqlExpr::Binary(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
            sql_type: SqlType::Bool,
            type_mapping: Some(TypeMapping::boolean()),
        })
    }

    /// Returns true if `left` and `right` are `x IS NULL` and `x IS NOT NULL` for the same `x`,
    /// in either order
    fn are_complementary_null_checks(left: &SqlExpr, right: &SqlExpr) -> bool {
        match (left.as_null_check(), right.as_null_check()) {
            (Some((lop, loperand)), Some((rop, roperand))) => lop != rop && loperand == roperand,
            _ => false,
        }
    }

    /// `left AND right`.
    ///
    /// Folds boolean constants on either side, absorbs an operand which already appears as a
    /// conjunct of the other, and folds `x IS NULL AND x IS NOT NULL` to `FALSE`.
    pub fn and_also(&self, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        match (left.as_bool_constant(), right.as_bool_constant()) {
            (Some(true), _) | (_, Some(false)) => return right,
            (Some(false), _) | (_, Some(true)) => return left,
            _ => {}
        }

        if left.flatten_logical(BinaryOperator::And).contains(&&right) {
            return left;
        }
        if right.flatten_logical(BinaryOperator::And).contains(&&left) {
            return right;
        }
        if Self::are_complementary_null_checks(&left, &right) {
            return self.boolean(false);
        }

        self.logical(BinaryOperator::And, left, right)
    }

    /// `left OR right`.
    ///
    /// Folds boolean constants on either side, absorbs an operand which already appears as a
    /// disjunct of the other, and folds `x IS NULL OR x IS NOT NULL` to `TRUE`.
    pub fn or_else(&self, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        match (left.as_bool_constant(), right.as_bool_constant()) {
            (Some(false), _) | (_, Some(true)) => return right,
            (Some(true), _) | (_, Some(false)) => return left,
            _ => {}
        }

        if left.flatten_logical(BinaryOperator::Or).contains(&&right) {
            return left;
        }
        if right.flatten_logical(BinaryOperator::Or).contains(&&left) {
            return right;
        }
        if Self::are_complementary_null_checks(&left, &right) {
            return self.boolean(true);
        }

        self.logical(BinaryOperator::Or, left, right)
    }

    /// Logical `NOT operand`, pushed as far into the operand as three-valued logic allows:
    ///
    /// * `NOT TRUE` is `FALSE` and vice versa
    /// * `NOT NOT a` is `a`
    /// * `NOT (a IS NULL)` is `a IS NOT NULL` and vice versa
    /// * `NOT (a AND b)` is `NOT a OR NOT b`, and dually for `OR`
    /// * `NOT (a = b)` is `a <> b`, and likewise for the other comparisons
    /// * `NOT (a IN (...))` is `a NOT IN (...)`, and likewise for `EXISTS`
    pub fn not(&self, operand: SqlExpr) -> SqlExpr {
        match operand {
            SqlExpr::Constant(ConstantExpr {
                value: Literal::Boolean(b),
                ..
            }) => self.boolean(!b),
            SqlExpr::Unary(UnaryExpr {
                op: UnaryOperator::Not,
                operand,
                sql_type: SqlType::Bool,
                ..
            }) => *operand,
            SqlExpr::Unary(UnaryExpr {
                op: UnaryOperator::IsNull,
                operand,
                ..
            }) => self.is_not_null(*operand),
            SqlExpr::Unary(UnaryExpr {
                op: UnaryOperator::IsNotNull,
                operand,
                ..
            }) => self.is_null(*operand),
            SqlExpr::Binary(BinaryExpr {
                op: BinaryOperator::And,
                left,
                right,
                ..
            }) => {
                let (left, right) = (self.not(*left), self.not(*right));
                self.or_else(left, right)
            }
            SqlExpr::Binary(BinaryExpr {
                op: BinaryOperator::Or,
                left,
                right,
                ..
            }) => {
                let (left, right) = (self.not(*left), self.not(*right));
                self.and_also(left, right)
            }
            SqlExpr::Binary(b) if b.op.is_comparison() => match b.op.negate() {
                Some(op) => SqlExpr::Binary(BinaryExpr { op, ..b }),
                None => self.logical_not(SqlExpr::Binary(b)),
            },
            SqlExpr::In(i) => SqlExpr::In(InExpr {
                negated: !i.negated,
                ..i
            }),
            SqlExpr::Exists(e) => SqlExpr::Exists(ExistsExpr {
                negated: !e.negated,
                ..e
            }),
            operand => self.logical_not(operand),
        }
    }

    fn logical_not(&self, operand: SqlExpr) -> SqlExpr {
        SqlExpr::Unary(UnaryExpr {
            op: UnaryOperator::Not,
            operand: Box::new(operand),
            sql_type: SqlType::Bool,
            type_mapping: Some(TypeMapping::boolean()),
        })
    }

    fn null_check(&self, op: UnaryOperator, operand: SqlExpr) -> SqlExpr {
        if let Some(value) = operand.as_literal() {
            return self.boolean(value.is_null() == (op == UnaryOperator::IsNull));
        }
        SqlExpr::Unary(UnaryExpr {
            op,
            operand: Box::new(operand),
            sql_type: SqlType::Bool,
            type_mapping: Some(TypeMapping::boolean()),
        })
    }

    /// `operand IS NULL`, folded to a constant if the operand is a constant
    pub fn is_null(&self, operand: SqlExpr) -> SqlExpr {
        self.null_check(UnaryOperator::IsNull, operand)
    }

    /// `operand IS NOT NULL`, folded to a constant if the operand is a constant
    pub fn is_not_null(&self, operand: SqlExpr) -> SqlExpr {
        self.null_check(UnaryOperator::IsNotNull, operand)
    }

    fn typed_unary(&self, op: UnaryOperator, operand: SqlExpr) -> NullSemResult<SqlExpr> {
        let Some(tm) = infer_type_mapping([&operand]) else {
            internal!("no type mapping can be inferred for {op:?} of {operand}");
        };
        let operand = self.apply_type_mapping(operand, Some(&tm));
        Ok(SqlExpr::Unary(UnaryExpr {
            op,
            operand: Box::new(operand),
            sql_type: tm.sql_type,
            type_mapping: Some(tm),
        }))
    }

    /// Numeric negation
    pub fn negate(&self, operand: SqlExpr) -> NullSemResult<SqlExpr> {
        self.typed_unary(UnaryOperator::Negate, operand)
    }

    pub fn bitwise_not(&self, operand: SqlExpr) -> NullSemResult<SqlExpr> {
        self.typed_unary(UnaryOperator::BitwiseNot, operand)
    }

    /// `CAST(operand AS sql_type)`
    pub fn convert(
        &self,
        operand: SqlExpr,
        sql_type: SqlType,
        type_mapping: Option<TypeMapping>,
    ) -> NullSemResult<SqlExpr> {
        if sql_type == SqlType::Unknown {
            unsupported!("CAST({operand} AS ...) has no target type to render");
        }
        let Some(tm) = type_mapping.or_else(|| TypeMapping::default_for(sql_type)) else {
            internal!("cannot convert {operand} to {sql_type:?} without a type mapping");
        };
        let operand = self.apply_default_type_mapping(operand);
        Ok(SqlExpr::Unary(UnaryExpr {
            op: UnaryOperator::Convert,
            operand: Box::new(operand),
            sql_type,
            type_mapping: Some(tm),
        }))
    }

    /// `COALESCE(arguments...)`.
    ///
    /// Leading `NULL` constants are dropped, and everything after the first argument which is
    /// statically known to be non-null is unreachable and dropped too. If that leaves a single
    /// argument, it is returned as is.
    pub fn coalesce(
        &self,
        arguments: Vec<SqlExpr>,
        type_mapping: Option<TypeMapping>,
    ) -> NullSemResult<SqlExpr> {
        if arguments.is_empty() {
            internal!("COALESCE requires at least one argument");
        }
        let tm = type_mapping.or_else(|| infer_type_mapping(&arguments));

        let mut kept = Vec::with_capacity(arguments.len());
        for argument in arguments {
            if argument.is_null_constant() {
                continue;
            }
            let non_nullable = is_statically_non_nullable(&argument);
            kept.push(argument);
            if non_nullable {
                break;
            }
        }

        let Some(tm) = tm else {
            internal!("no type mapping can be inferred for COALESCE");
        };
        if kept.len() <= 1 {
            return Ok(match kept.pop() {
                Some(argument) => self.apply_type_mapping(argument, Some(&tm)),
                None => self.typed_null(tm.sql_type, Some(tm)),
            });
        }

        let arity = kept.len();
        Ok(SqlExpr::Function(FunctionExpr {
            name: "COALESCE".into(),
            schema: None,
            instance: None,
            arguments: Some(
                kept.into_iter()
                    .map(|arg| self.apply_type_mapping(arg, Some(&tm)))
                    .collect(),
            ),
            built_in: true,
            nullable: true,
            instance_propagates_nullability: false,
            arguments_propagate_nullability: vec![false; arity],
            sql_type: tm.sql_type,
            type_mapping: Some(tm),
        }))
    }

    /// `CASE [operand] WHEN ... THEN ... [ELSE ...] END`.
    ///
    /// For a searched CASE (one without an operand): branches whose test is `FALSE` or `NULL`
    /// can never be taken and are dropped; a `TRUE` test makes its result the ELSE and
    /// everything after it unreachable; a searched CASE in the ELSE position is flattened into
    /// this one. A CASE left without branches is just its ELSE (or `NULL`).
    pub fn case(
        &self,
        operand: Option<SqlExpr>,
        when_clauses: Vec<CaseWhenClause>,
        else_result: Option<SqlExpr>,
        type_mapping: Option<TypeMapping>,
    ) -> NullSemResult<SqlExpr> {
        let tm = type_mapping.or_else(|| {
            infer_type_mapping(
                when_clauses
                    .iter()
                    .map(|c| &c.result)
                    .chain(else_result.as_ref()),
            )
        });
        let Some(tm) = tm else {
            internal!("no type mapping can be inferred for CASE");
        };

        let searched = operand.is_none();
        let mut clauses = Vec::with_capacity(when_clauses.len());
        let mut else_result = else_result;

        for clause in when_clauses {
            if searched {
                if clause.test.is_null_constant() {
                    continue;
                }
                match clause.test.as_bool_constant() {
                    Some(false) => continue,
                    Some(true) => {
                        else_result = Some(clause.result);
                        break;
                    }
                    None => {}
                }
            }
            clauses.push(clause);
        }

        if searched {
            loop {
                match else_result {
                    Some(SqlExpr::Case(inner)) if inner.operand.is_none() => {
                        clauses.extend(inner.when_clauses);
                        else_result = inner.else_result.map(|e| *e);
                    }
                    other => {
                        else_result = other;
                        break;
                    }
                }
            }
        }

        if clauses.is_empty() {
            return Ok(match else_result {
                Some(else_result) => self.apply_type_mapping(else_result, Some(&tm)),
                None => self.typed_null(tm.sql_type, Some(tm)),
            });
        }

        let operand_tm = operand.as_ref().and_then(|o| infer_type_mapping([o]));
        let clauses = clauses
            .into_iter()
            .map(|CaseWhenClause { test, result }| CaseWhenClause {
                test: self.apply_type_mapping(test, operand_tm.as_ref()),
                result: self.apply_type_mapping(result, Some(&tm)),
            })
            .collect();

        Ok(SqlExpr::Case(CaseExpr {
            operand: operand.map(Box::new),
            when_clauses: clauses,
            else_result: else_result.map(|e| Box::new(self.apply_type_mapping(e, Some(&tm)))),
            sql_type: tm.sql_type,
            type_mapping: Some(tm),
        }))
    }

    /// `item [NOT] IN (values...)`. An empty list is never matched, so folds to a constant.
    pub fn in_values(&self, item: SqlExpr, values: Vec<Literal>, negated: bool) -> SqlExpr {
        if values.is_empty() {
            return self.boolean(negated);
        }
        let item = self.apply_default_type_mapping(item);
        let type_mapping = item.type_mapping().cloned();
        SqlExpr::In(InExpr {
            item: Box::new(item),
            values: InValues::List {
                values,
                type_mapping,
            },
            negated,
            type_mapping: Some(TypeMapping::boolean()),
        })
    }

    /// `item [NOT] IN @parameter`, where the parameter is bound to a list of values
    pub fn in_parameter(&self, item: SqlExpr, parameter: ParameterExpr, negated: bool) -> SqlExpr {
        let item = self.apply_default_type_mapping(item);
        let parameter = match parameter.type_mapping {
            Some(_) => parameter,
            None => ParameterExpr {
                type_mapping: item.type_mapping().cloned(),
                ..parameter
            },
        };
        SqlExpr::In(InExpr {
            item: Box::new(item),
            values: InValues::Parameter(parameter),
            negated,
            type_mapping: Some(TypeMapping::boolean()),
        })
    }

    /// `item [NOT] IN (subquery)`
    pub fn in_subquery(&self, item: SqlExpr, subquery: SelectExpression, negated: bool) -> SqlExpr {
        let item = self.apply_default_type_mapping(item);
        SqlExpr::In(InExpr {
            item: Box::new(item),
            values: InValues::Subquery(Box::new(subquery)),
            negated,
            type_mapping: Some(TypeMapping::boolean()),
        })
    }

    pub fn like(&self, match_expr: SqlExpr, pattern: SqlExpr, escape: Option<SqlExpr>) -> SqlExpr {
        let tm = infer_type_mapping([&match_expr, &pattern].into_iter().chain(escape.as_ref()));
        SqlExpr::Like(LikeExpr {
            match_expr: Box::new(self.apply_type_mapping(match_expr, tm.as_ref())),
            pattern: Box::new(self.apply_type_mapping(pattern, tm.as_ref())),
            escape: escape.map(|e| Box::new(self.apply_type_mapping(e, tm.as_ref()))),
            type_mapping: Some(TypeMapping::boolean()),
        })
    }

    pub fn exists(&self, subquery: SelectExpression, negated: bool) -> SqlExpr {
        SqlExpr::Exists(ExistsExpr {
            subquery: Box::new(subquery),
            negated,
            type_mapping: Some(TypeMapping::boolean()),
        })
    }

    pub fn scalar_subquery(&self, subquery: SelectExpression) -> SqlExpr {
        let (sql_type, type_mapping) = match subquery.single_projection() {
            Some(projection) => (projection.sql_type(), projection.type_mapping().cloned()),
            None => (SqlType::Unknown, None),
        };
        SqlExpr::ScalarSubquery(ScalarSubqueryExpr {
            subquery: Box::new(subquery),
            sql_type,
            type_mapping,
        })
    }

    fn build_function(
        &self,
        name: &str,
        schema: Option<&str>,
        instance: Option<SqlExpr>,
        arguments: Option<Vec<SqlExpr>>,
        nullability: FunctionNullability,
        sql_type: SqlType,
    ) -> NullSemResult<SqlExpr> {
        invariant_eq!(
            arguments.as_ref().map_or(0, Vec::len),
            nullability.arguments_propagate.len(),
            "one nullability propagation flag is required per argument of {name}"
        );
        let Some(tm) = TypeMapping::default_for(sql_type) else {
            internal!("no type mapping can be inferred for the result of {name}");
        };
        Ok(SqlExpr::Function(FunctionExpr {
            name: name.to_owned(),
            schema: schema.map(str::to_owned),
            instance: instance.map(Box::new),
            arguments: arguments.map(|args| {
                args.into_iter()
                    .map(|a| self.apply_default_type_mapping(a))
                    .collect()
            }),
            built_in: schema.is_none(),
            nullable: nullability.nullable,
            instance_propagates_nullability: nullability.instance_propagates,
            arguments_propagate_nullability: nullability.arguments_propagate,
            sql_type,
            type_mapping: Some(tm),
        }))
    }

    /// A call to a built-in function
    pub fn function(
        &self,
        name: &str,
        arguments: Vec<SqlExpr>,
        nullability: FunctionNullability,
        sql_type: SqlType,
    ) -> NullSemResult<SqlExpr> {
        self.build_function(name, None, None, Some(arguments), nullability, sql_type)
    }

    /// A call to a user-defined function in the given schema
    pub fn schema_function(
        &self,
        schema: &str,
        name: &str,
        arguments: Vec<SqlExpr>,
        nullability: FunctionNullability,
        sql_type: SqlType,
    ) -> NullSemResult<SqlExpr> {
        self.build_function(name, Some(schema), None, Some(arguments), nullability, sql_type)
    }

    /// A method-style call on an instance, as in `geom.STArea()`
    pub fn instance_function(
        &self,
        instance: SqlExpr,
        name: &str,
        arguments: Vec<SqlExpr>,
        nullability: FunctionNullability,
        sql_type: SqlType,
    ) -> NullSemResult<SqlExpr> {
        self.build_function(
            name,
            None,
            Some(instance),
            Some(arguments),
            nullability,
            sql_type,
        )
    }

    /// A function called without parentheses, as in `CURRENT_TIMESTAMP`
    pub fn niladic_function(
        &self,
        name: &str,
        nullable: bool,
        sql_type: SqlType,
    ) -> NullSemResult<SqlExpr> {
        let nullability = FunctionNullability {
            nullable,
            ..Default::default()
        };
        self.build_function(name, None, None, None, nullability, sql_type)
    }

    pub fn collate<S: Into<String>>(&self, operand: SqlExpr, collation: S) -> SqlExpr {
        SqlExpr::Collate(CollateExpr {
            operand: Box::new(operand),
            collation: collation.into(),
        })
    }

    pub fn distinct(&self, operand: SqlExpr) -> SqlExpr {
        SqlExpr::Distinct(Box::new(operand))
    }

    pub fn row_number(&self, partitions: Vec<SqlExpr>, orderings: Vec<OrderingExpr>) -> SqlExpr {
        SqlExpr::RowNumber(RowNumberExpr {
            partitions,
            orderings,
            type_mapping: TypeMapping::default_for(SqlType::BigInt),
        })
    }
}
