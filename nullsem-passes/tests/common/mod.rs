//! Shared helpers for the rewriter's integration tests: a small schema, generators of predicate
//! trees over it, and reference evaluators for both null semantics.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::BTreeMap;

use nullsem_passes::{
    NullSemanticsOptions, ParameterValue, ParameterValues, ProcessedExpr, SqlNullabilityProcessor,
};
use nullsem_sql::ast::{
    BinaryExpr, BinaryOperator, CaseExpr, CaseWhenClause, FunctionExpr, InExpr, InValues,
    Literal, SqlExpr, SqlType, TypeMapping, UnaryExpr, UnaryOperator,
};
use nullsem_sql::{FunctionNullability, SqlExpressionFactory};
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;

pub const F: SqlExpressionFactory = SqlExpressionFactory;

/// `t.a INT NULL`
pub fn a() -> SqlExpr {
    F.column("t.a", SqlType::Int, true)
}

/// `t.b INT NULL`
pub fn b() -> SqlExpr {
    F.column("t.b", SqlType::Int, true)
}

/// `t.c INT NOT NULL`
pub fn c() -> SqlExpr {
    F.column("t.c", SqlType::Int, false)
}

/// `t.f BIT NULL`
pub fn f() -> SqlExpr {
    F.column("t.f", SqlType::Bool, true)
}

/// `t.g BIT NOT NULL`
pub fn g() -> SqlExpr {
    F.column("t.g", SqlType::Bool, false)
}

/// `t.s NVARCHAR NULL`
pub fn s() -> SqlExpr {
    F.column("t.s", SqlType::Text, true)
}

/// `@p INT`
pub fn p() -> SqlExpr {
    SqlExpr::Parameter(F.parameter("p", SqlType::Int))
}

pub fn int(value: i64) -> SqlExpr {
    F.constant(value)
}

pub fn null() -> SqlExpr {
    F.constant(Literal::Null)
}

/// A logical `NOT` which is not pushed into its operand
pub fn raw_not(operand: SqlExpr) -> SqlExpr {
    SqlExpr::Unary(UnaryExpr {
        op: UnaryOperator::Not,
        operand: Box::new(operand),
        sql_type: SqlType::Bool,
        type_mapping: Some(TypeMapping::boolean()),
    })
}

pub fn rewrite(
    expr: SqlExpr,
    relational: bool,
    predicate: bool,
    parameters: &ParameterValues,
) -> ProcessedExpr {
    let options = NullSemanticsOptions {
        use_relational_nulls: relational,
        ..Default::default()
    };
    let mut processor = SqlNullabilityProcessor::new(&options, parameters);
    let processed = if predicate {
        processor.process_predicate(expr.clone())
    } else {
        processor.process_value(expr.clone())
    };
    processed.unwrap_or_else(|e| panic!("failed to rewrite {expr}: {e}"))
}

/// A value produced by evaluating an expression
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Value {
    pub fn is_true(&self) -> bool {
        *self == Value::Bool(true)
    }

    fn from_literal(literal: &Literal) -> Self {
        match literal {
            Literal::Null => Value::Null,
            Literal::Boolean(b) => Value::Bool(*b),
            Literal::Integer(i) => Value::Int(*i),
            Literal::String(s) => Value::Text(s.clone()),
            literal => panic!("no test value for literal {literal}"),
        }
    }

    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
            (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
            (Value::Text(l), Value::Text(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }
}

/// How `NULL` behaves when evaluating
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Semantics {
    /// `=`, `<>` and `IN` are two-valued and nulls concatenate as empty strings; everything
    /// else is three-valued
    Host,
    /// SQL's three-valued logic throughout
    Relational,
    /// Three-valued logic, except that a comparison with a `NULL` constant or a parameter bound
    /// to `NULL` is a null check and nulls concatenate as empty strings
    Native,
}

/// A row of table `t`, and the values bound to parameters
#[derive(Clone, Debug)]
pub struct Env {
    pub row: BTreeMap<String, Value>,
    pub parameters: ParameterValues,
}

impl Env {
    pub fn new<I>(row: I, p: Option<i64>) -> Self
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        let mut parameters = ParameterValues::new();
        parameters.insert("p", Literal::from(p));
        Self {
            row: row
                .into_iter()
                .map(|(column, value)| (column.to_owned(), value))
                .collect(),
            parameters,
        }
    }
}

fn optional<T>(value: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
    value.map_or(Value::Null, f)
}

/// Rows of `t` consistent with its declared nullability, and a value for `@p`
pub fn env() -> impl Strategy<Value = Env> {
    let text = prop_oneof![Just(String::new()), Just("x".to_owned())];
    (
        option::of(0i64..3),
        option::of(0i64..3),
        0i64..3,
        option::of(any::<bool>()),
        any::<bool>(),
        option::of(text),
        option::of(0i64..3),
    )
        .prop_map(|(a, b, c, f, g, s, p)| {
            Env::new(
                [
                    ("t.a", optional(a, Value::Int)),
                    ("t.b", optional(b, Value::Int)),
                    ("t.c", Value::Int(c)),
                    ("t.f", optional(f, Value::Bool)),
                    ("t.g", Value::Bool(g)),
                    ("t.s", optional(s, Value::Text)),
                ],
                p,
            )
        })
}

fn kleene_and(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
        (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
        _ => Value::Null,
    }
}

fn kleene_or(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
        (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
        _ => Value::Null,
    }
}

fn kleene_not(value: Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(!b),
        _ => Value::Null,
    }
}

/// SQL `item IN (values...)`
fn relational_in(item: &Value, values: &[Value]) -> Value {
    if values.is_empty() {
        return Value::Bool(false);
    }
    if *item == Value::Null {
        return Value::Null;
    }
    if values.contains(item) {
        Value::Bool(true)
    } else if values.contains(&Value::Null) {
        Value::Null
    } else {
        Value::Bool(false)
    }
}

fn arithmetic(op: BinaryOperator, left: Value, right: Value) -> Value {
    let (Value::Int(l), Value::Int(r)) = (left, right) else {
        return Value::Null;
    };
    match op {
        BinaryOperator::Add => Value::Int(l.wrapping_add(r)),
        BinaryOperator::Subtract => Value::Int(l.wrapping_sub(r)),
        BinaryOperator::Multiply => Value::Int(l.wrapping_mul(r)),
        BinaryOperator::Divide => l.checked_div(r).map_or(Value::Null, Value::Int),
        BinaryOperator::Modulo => l.checked_rem(r).map_or(Value::Null, Value::Int),
        BinaryOperator::BitwiseAnd => Value::Int(l & r),
        BinaryOperator::BitwiseOr => Value::Int(l | r),
        BinaryOperator::BitwiseXor => Value::Int(l ^ r),
        op => panic!("{op} is not arithmetic"),
    }
}

fn concat(left: Value, right: Value, semantics: Semantics) -> Value {
    let text = |value: Value| match value {
        Value::Text(s) => Some(s),
        Value::Null if semantics != Semantics::Relational => Some(String::new()),
        _ => None,
    };
    match (text(left), text(right)) {
        (Some(l), Some(r)) => Value::Text(l + &r),
        _ => Value::Null,
    }
}

/// Whether `expr` is a `NULL` constant, or a parameter bound to `NULL`
fn is_null_value(expr: &SqlExpr, env: &Env) -> bool {
    match expr {
        SqlExpr::Constant(constant) => constant.value.is_null(),
        SqlExpr::Parameter(parameter) => matches!(
            env.parameters.get(&parameter.name),
            Some(ParameterValue::Scalar(Literal::Null))
        ),
        _ => false,
    }
}

/// Evaluate `expr` against `env`
pub fn eval(expr: &SqlExpr, env: &Env, semantics: Semantics) -> Value {
    let host = semantics == Semantics::Host;
    match expr {
        SqlExpr::Column(column) => env
            .row
            .get(&column.to_string())
            .cloned()
            .unwrap_or_else(|| panic!("no value for column {column}")),
        SqlExpr::Constant(constant) => Value::from_literal(&constant.value),
        SqlExpr::Parameter(parameter) => match env.parameters.get(&parameter.name) {
            Some(ParameterValue::Scalar(value)) => Value::from_literal(value),
            _ => panic!("no scalar value for parameter {parameter}"),
        },
        SqlExpr::Unary(UnaryExpr { op, operand, .. }) => {
            let operand = eval(operand, env, semantics);
            match op {
                UnaryOperator::Not => kleene_not(operand),
                UnaryOperator::IsNull => Value::Bool(operand == Value::Null),
                UnaryOperator::IsNotNull => Value::Bool(operand != Value::Null),
                UnaryOperator::Negate => match operand {
                    Value::Int(i) => Value::Int(i.wrapping_neg()),
                    _ => Value::Null,
                },
                UnaryOperator::BitwiseNot => match operand {
                    Value::Int(i) => Value::Int(!i),
                    _ => Value::Null,
                },
                UnaryOperator::Convert => operand,
            }
        }
        SqlExpr::Binary(BinaryExpr {
            op,
            left,
            right,
            sql_type,
            ..
        }) => {
            let null_comparison = semantics == Semantics::Native
                && (is_null_value(left, env) || is_null_value(right, env));
            let left = eval(left, env, semantics);
            let right = eval(right, env, semantics);
            match op {
                BinaryOperator::And => kleene_and(left, right),
                BinaryOperator::Or => kleene_or(left, right),
                BinaryOperator::Equal | BinaryOperator::NotEqual => {
                    let equal = if host || null_comparison {
                        Value::Bool(left == right)
                    } else if left == Value::Null || right == Value::Null {
                        Value::Null
                    } else {
                        Value::Bool(left == right)
                    };
                    if *op == BinaryOperator::Equal {
                        equal
                    } else {
                        kleene_not(equal)
                    }
                }
                BinaryOperator::Greater
                | BinaryOperator::GreaterOrEqual
                | BinaryOperator::Less
                | BinaryOperator::LessOrEqual => match left.compare(&right) {
                    None => Value::Null,
                    Some(ordering) => Value::Bool(match op {
                        BinaryOperator::Greater => ordering.is_gt(),
                        BinaryOperator::GreaterOrEqual => ordering.is_ge(),
                        BinaryOperator::Less => ordering.is_lt(),
                        _ => ordering.is_le(),
                    }),
                },
                BinaryOperator::Add if sql_type.is_textual() => concat(left, right, semantics),
                op => arithmetic(*op, left, right),
            }
        }
        SqlExpr::Case(CaseExpr {
            operand,
            when_clauses,
            else_result,
            ..
        }) => {
            let operand = operand.as_ref().map(|operand| eval(operand, env, semantics));
            for CaseWhenClause { test, result } in when_clauses {
                let test = eval(test, env, semantics);
                let matched = match &operand {
                    Some(operand) => *operand != Value::Null && *operand == test,
                    None => test.is_true(),
                };
                if matched {
                    return eval(result, env, semantics);
                }
            }
            else_result
                .as_ref()
                .map_or(Value::Null, |else_result| eval(else_result, env, semantics))
        }
        SqlExpr::Function(FunctionExpr {
            name, arguments, ..
        }) => {
            let arguments = arguments
                .iter()
                .flatten()
                .map(|argument| eval(argument, env, semantics))
                .collect::<Vec<_>>();
            match name.as_str() {
                "COALESCE" => arguments
                    .into_iter()
                    .find(|argument| *argument != Value::Null)
                    .unwrap_or(Value::Null),
                "ABS" => match arguments.as_slice() {
                    [Value::Int(i)] => Value::Int(i.wrapping_abs()),
                    _ => Value::Null,
                },
                name => panic!("no test implementation of {name}"),
            }
        }
        SqlExpr::In(InExpr {
            item,
            values,
            negated,
            ..
        }) => {
            let item = eval(item, env, semantics);
            let values = match values {
                InValues::List { values, .. } => {
                    values.iter().map(Value::from_literal).collect::<Vec<_>>()
                }
                InValues::Parameter(parameter) => match env.parameters.get(&parameter.name) {
                    Some(ParameterValue::List(values)) => {
                        values.iter().map(Value::from_literal).collect()
                    }
                    Some(ParameterValue::Scalar(value)) => vec![Value::from_literal(value)],
                    None => panic!("no value for parameter {parameter}"),
                },
                InValues::Subquery(_) => panic!("subqueries can't be evaluated"),
            };
            let found = if host {
                Value::Bool(values.contains(&item))
            } else {
                relational_in(&item, &values)
            };
            if *negated { kleene_not(found) } else { found }
        }
        expr => panic!("no test evaluation of {expr}"),
    }
}

/// Nullable and non-nullable integer columns
pub fn int_column() -> BoxedStrategy<SqlExpr> {
    prop_oneof![Just(a()), Just(b()), Just(c())].boxed()
}

fn int_leaf(with_parameter: bool) -> BoxedStrategy<SqlExpr> {
    let constant = prop_oneof![
        3 => (0i64..3).prop_map(int),
        1 => Just(null()),
    ];
    if with_parameter {
        prop_oneof![3 => int_column(), 2 => constant, 1 => Just(p())].boxed()
    } else {
        prop_oneof![3 => int_column(), 2 => constant].boxed()
    }
}

/// Integer-valued expressions: columns, constants, arithmetic and function calls
pub fn int_expr(with_parameter: bool) -> BoxedStrategy<SqlExpr> {
    prop_oneof![
        4 => int_leaf(with_parameter),
        1 => (int_column(), int_leaf(with_parameter))
            .prop_map(|(l, r)| F.add(l, r).expect("typed addition")),
        1 => int_column().prop_map(|column| {
            F.coalesce(vec![column, int(0)], None).expect("typed COALESCE")
        }),
        1 => int_column().prop_map(|column| {
            F.function("ABS", vec![column], FunctionNullability::propagating(1), SqlType::Int)
                .expect("typed function")
        }),
    ]
    .boxed()
}

fn comparison(op: BinaryOperator, left: SqlExpr, right: SqlExpr) -> SqlExpr {
    match op {
        BinaryOperator::Equal => F.equal(left, right),
        BinaryOperator::NotEqual => F.not_equal(left, right),
        BinaryOperator::Less => F.less_than(left, right),
        _ => F.greater_than_or_equal(left, right),
    }
}

fn comparison_op() -> impl Strategy<Value = BinaryOperator> {
    prop_oneof![
        Just(BinaryOperator::Equal),
        Just(BinaryOperator::NotEqual),
        Just(BinaryOperator::Less),
        Just(BinaryOperator::GreaterOrEqual),
    ]
}

fn in_list() -> impl Strategy<Value = Vec<Literal>> {
    vec(prop_oneof![3 => (0i64..3).prop_map(Literal::from), 1 => Just(Literal::Null)], 0..4)
}

/// Comparisons of integers, null checks, `IN` lists and boolean columns
fn comparison_leaf(with_parameter: bool) -> BoxedStrategy<SqlExpr> {
    prop_oneof![
        4 => (comparison_op(), int_expr(with_parameter), int_expr(with_parameter))
            .prop_map(|(op, l, r)| comparison(op, l, r)),
        1 => int_expr(with_parameter).prop_map(|e| F.is_null(e)),
        1 => int_expr(with_parameter).prop_map(|e| F.is_not_null(e)),
        2 => (int_column(), in_list(), any::<bool>())
            .prop_map(|(item, values, negated)| F.in_values(item, values, negated)),
        1 => Just(f()),
        1 => Just(g()),
    ]
    .boxed()
}

fn bool_operand() -> impl Strategy<Value = SqlExpr> {
    prop_oneof![
        Just(f()),
        Just(g()),
        any::<bool>().prop_map(|value| F.boolean(value)),
        Just(F.not(f())),
    ]
}

/// Everything [`comparison_leaf`] generates, plus comparisons of booleans and concatenations
fn predicate_leaf(with_parameter: bool) -> BoxedStrategy<SqlExpr> {
    prop_oneof![
        6 => comparison_leaf(with_parameter),
        1 => (bool_operand(), bool_operand(), any::<bool>()).prop_map(|(l, r, equal)| {
            if equal { F.equal(l, r) } else { F.not_equal(l, r) }
        }),
        1 => prop_oneof![Just(""), Just("x")].prop_map(|text| {
            let concat = F.add(s(), F.constant("x")).expect("typed concatenation");
            F.equal(concat, F.constant(text))
        }),
    ]
    .boxed()
}

/// Trees of `AND`, `OR` and `NOT` over comparisons of plain values
pub fn comparison_tree() -> impl Strategy<Value = SqlExpr> {
    comparison_leaf(false).prop_recursive(3, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| F.and_also(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| F.or_else(l, r)),
            inner.clone().prop_map(|e| F.not(e)),
            inner.prop_map(raw_not),
        ]
    })
}

/// ELSE results which can't become a `NULL` constant once rewritten
fn case_else() -> BoxedStrategy<SqlExpr> {
    prop_oneof![
        2 => int_column(),
        1 => (0i64..3).prop_map(int),
        1 => int_column().prop_map(|column| {
            F.coalesce(vec![column, int(0)], None).expect("typed COALESCE")
        }),
    ]
    .boxed()
}

/// Arbitrary boolean trees, including comparisons between predicates and searched CASEs
pub fn predicate(with_parameter: bool) -> impl Strategy<Value = SqlExpr> {
    predicate_leaf(with_parameter).prop_recursive(3, 24, 2, move |inner| {
        prop_oneof![
            2 => (inner.clone(), inner.clone()).prop_map(|(l, r)| F.and_also(l, r)),
            2 => (inner.clone(), inner.clone()).prop_map(|(l, r)| F.or_else(l, r)),
            1 => inner.clone().prop_map(|e| F.not(e)),
            1 => inner.clone().prop_map(raw_not),
            1 => (inner.clone(), inner.clone(), any::<bool>()).prop_map(|(l, r, equal)| {
                if equal { F.equal(l, r) } else { F.not_equal(l, r) }
            }),
            1 => (inner, int_column(), case_else(), 0i64..3)
                .prop_map(|(test, then, otherwise, value)| {
                    let case = F
                        .case(
                            None,
                            vec![CaseWhenClause { test, result: then }],
                            Some(otherwise),
                            None,
                        )
                        .expect("typed CASE");
                    F.equal(case, int(value))
                }),
        ]
    })
}

/// Whether `expr` mentions the parameter `@p` anywhere
pub fn mentions_parameter(expr: &SqlExpr) -> bool {
    expr.to_string().contains("@p")
}
