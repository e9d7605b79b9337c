//! Truth-table expansions of two-valued equality into three-valued SQL.
//!
//! Under two-valued semantics `NULL = NULL` is true and `NULL = 1` is false, whereas SQL makes
//! both unknown. Each expansion below removes the unknown rows from the truth table of a
//! comparison with nullable operands, by spelling out the null cases explicitly. In the comments
//! `?a` is a nullable operand and `a` a non-nullable one.

use nullsem_errors::{NullSemResult, internal};
use nullsem_sql::SqlExpressionFactory;
use nullsem_sql::ast::{BinaryOperator, SqlExpr};

/// One side of an equality under rewrite, with any logical `NOT` already stripped off
#[derive(Debug, Clone)]
pub(super) struct Operand {
    pub(super) expr: SqlExpr,
    pub(super) nullable: bool,
    /// `expr IS NULL`, already simplified against what is known about `expr`
    pub(super) is_null: SqlExpr,
    /// `expr IS NOT NULL`, already simplified against what is known about `expr`
    pub(super) is_not_null: SqlExpr,
}

/// An `=` or `<>` between two operands, each of which may have been negated
#[derive(Debug, Clone)]
pub(super) struct Comparison {
    pub(super) op: BinaryOperator,
    pub(super) left: Operand,
    pub(super) right: Operand,
    pub(super) left_negated: bool,
    pub(super) right_negated: bool,
}

fn compare(
    f: &SqlExpressionFactory,
    op: BinaryOperator,
    left: SqlExpr,
    right: SqlExpr,
) -> SqlExpr {
    match op {
        BinaryOperator::Equal => f.equal(left, right),
        _ => f.not_equal(left, right),
    }
}

/// Rewrite a comparison whose operands may be null so that it yields the two-valued result.
///
/// When `optimize` is set, the result may be unknown wherever the two-valued result is false;
/// that is only correct where the caller cannot tell the two apart. Returns the rewritten
/// expression and whether it can still be null.
pub(super) fn expand_two_valued(
    f: &SqlExpressionFactory,
    comparison: Comparison,
    optimize: bool,
) -> NullSemResult<(SqlExpr, bool)> {
    let Comparison {
        op,
        left,
        right,
        left_negated,
        right_negated,
    } = comparison;

    if !op.is_equality() {
        internal!("two-valued expansion of {op} is not defined");
    }

    // Two-valued equality is reflexive, nulls included
    if left_negated == right_negated && left.expr == right.expr {
        return Ok((f.boolean(op == BinaryOperator::Equal), false));
    }

    if optimize && op == BinaryOperator::Equal && !left_negated && !right_negated {
        // ?a = ?b -> (a = b) OR (a IS NULL AND b IS NULL)
        if left.nullable && right.nullable {
            let equal = f.equal(left.expr, right.expr);
            let both_null = f.and_also(left.is_null, right.is_null);
            return Ok((f.or_else(equal, both_null), true));
        }
        // ?a = b -> a = b
        if left.nullable || right.nullable {
            return Ok((f.equal(left.expr, right.expr), true));
        }
    }

    // NOT(?a) = ?b is ?a <> ?b, so a single negated operand flips the inner comparison
    let inner = if left_negated == right_negated {
        op
    } else if op == BinaryOperator::Equal {
        BinaryOperator::NotEqual
    } else {
        BinaryOperator::Equal
    };

    // The null checks come first, so that whatever they prove holds for the comparison after
    // them
    let expanded = match (op, left.nullable, right.nullable) {
        // ?a = ?b -> [(a IS NOT NULL AND b IS NOT NULL) AND (a = b)] OR (a IS NULL AND b IS NULL)
        (BinaryOperator::Equal, true, true) => {
            let both_not_null = f.and_also(left.is_not_null, right.is_not_null);
            let equal = f.and_also(both_not_null, compare(f, inner, left.expr, right.expr));
            let both_null = f.and_also(left.is_null, right.is_null);
            f.or_else(equal, both_null)
        }
        // ?a = b -> a IS NOT NULL AND (a = b)
        (BinaryOperator::Equal, true, false) => f.and_also(
            left.is_not_null,
            compare(f, inner, left.expr, right.expr),
        ),
        // a = ?b -> b IS NOT NULL AND (a = b)
        (BinaryOperator::Equal, false, true) => f.and_also(
            right.is_not_null,
            compare(f, inner, left.expr, right.expr),
        ),
        // ?a <> ?b -> (a IS NOT NULL OR b IS NOT NULL) AND [(a IS NULL OR b IS NULL) OR (a <> b)]
        (_, true, true) => {
            let either_not_null = f.or_else(left.is_not_null, right.is_not_null);
            let either_null = f.or_else(left.is_null, right.is_null);
            let not_equal = f.or_else(either_null, compare(f, inner, left.expr, right.expr));
            f.and_also(either_not_null, not_equal)
        }
        // ?a <> b -> a IS NULL OR (a <> b)
        (_, true, false) => f.or_else(left.is_null, compare(f, inner, left.expr, right.expr)),
        // a <> ?b -> b IS NULL OR (a <> b)
        (_, false, true) => f.or_else(right.is_null, compare(f, inner, left.expr, right.expr)),
        (_, false, false) => compare(f, inner, left.expr, right.expr),
    };

    Ok((expanded, false))
}

#[cfg(test)]
mod tests {
    use nullsem_sql::ast::SqlType;
    use pretty_assertions::assert_eq;

    use super::*;

    const F: SqlExpressionFactory = SqlExpressionFactory;

    fn operand(name: &str, nullable: bool) -> Operand {
        let expr = F.column(name, SqlType::Int, nullable);
        let (is_null, is_not_null) = if nullable {
            (F.is_null(expr.clone()), F.is_not_null(expr.clone()))
        } else {
            (F.boolean(false), F.boolean(true))
        };
        Operand {
            expr,
            nullable,
            is_null,
            is_not_null,
        }
    }

    fn expand(
        op: BinaryOperator,
        (left, left_nullable, left_negated): (&str, bool, bool),
        (right, right_nullable, right_negated): (&str, bool, bool),
        optimize: bool,
    ) -> (String, bool) {
        let comparison = Comparison {
            op,
            left: operand(left, left_nullable),
            right: operand(right, right_nullable),
            left_negated,
            right_negated,
        };
        let (expr, nullable) = expand_two_valued(&F, comparison, optimize).unwrap();
        (expr.to_string(), nullable)
    }

    macro_rules! truth_table_tests {
        ($($name:ident: $op:ident, $left:expr, $right:expr, $optimize:expr => $expected:expr, $nullable:expr;)*) => {
            $(
                #[test]
                fn $name() {
                    let (rendered, nullable) =
                        expand(BinaryOperator::$op, $left, $right, $optimize);
                    assert_eq!(rendered, $expected);
                    assert_eq!(nullable, $nullable, "{rendered}");
                }
            )*
        };
    }

    truth_table_tests! {
        optimized_equal_both_nullable: Equal, ("a", true, false), ("b", true, false), true
            => "((a = b) OR (a IS NULL AND b IS NULL))", true;
        optimized_equal_one_nullable: Equal, ("a", true, false), ("b", false, false), true
            => "(a = b)", true;
        optimized_is_skipped_for_negated_operand: Equal, ("a", true, true), ("b", false, false), true
            => "(a IS NOT NULL AND (a <> b))", false;
        optimized_is_skipped_for_inequality: NotEqual, ("a", true, false), ("b", false, false), true
            => "(a IS NULL OR (a <> b))", false;
        equal_both_nullable: Equal, ("a", true, false), ("b", true, false), false
            => "(((a IS NOT NULL AND b IS NOT NULL) AND (a = b)) OR (a IS NULL AND b IS NULL))", false;
        negated_equal_both_nullable: Equal, ("a", true, true), ("b", true, false), false
            => "(((a IS NOT NULL AND b IS NOT NULL) AND (a <> b)) OR (a IS NULL AND b IS NULL))", false;
        both_negated_equal_both_nullable: Equal, ("a", true, true), ("b", true, true), false
            => "(((a IS NOT NULL AND b IS NOT NULL) AND (a = b)) OR (a IS NULL AND b IS NULL))", false;
        equal_left_nullable: Equal, ("a", true, false), ("b", false, false), false
            => "(a IS NOT NULL AND (a = b))", false;
        equal_right_nullable: Equal, ("a", false, false), ("b", true, false), false
            => "(b IS NOT NULL AND (a = b))", false;
        not_equal_both_nullable: NotEqual, ("a", true, false), ("b", true, false), false
            => "((a IS NOT NULL OR b IS NOT NULL) AND ((a IS NULL OR b IS NULL) OR (a <> b)))", false;
        negated_not_equal_both_nullable: NotEqual, ("a", true, false), ("b", true, true), false
            => "((a IS NOT NULL OR b IS NOT NULL) AND ((a IS NULL OR b IS NULL) OR (a = b)))", false;
        not_equal_left_nullable: NotEqual, ("a", true, false), ("b", false, false), false
            => "(a IS NULL OR (a <> b))", false;
        not_equal_right_nullable: NotEqual, ("a", false, false), ("b", true, false), false
            => "(b IS NULL OR (a <> b))", false;
        negated_not_equal_right_nullable: NotEqual, ("a", false, true), ("b", true, false), false
            => "(b IS NULL OR (a = b))", false;
        identical_nullable_operands_are_equal: Equal, ("a", true, false), ("a", true, false), false
            => "TRUE", false;
        identical_nullable_operands_in_predicate: Equal, ("a", true, false), ("a", true, false), true
            => "TRUE", false;
        identical_nullable_operands_are_not_unequal: NotEqual, ("a", true, true), ("a", true, true), false
            => "FALSE", false;
        single_negation_of_identical_operands_is_expanded: Equal, ("a", true, true), ("a", true, false), false
            => "((a IS NOT NULL AND (a <> a)) OR a IS NULL)", false;
    }

    #[test]
    fn ordering_comparisons_are_rejected() {
        let comparison = Comparison {
            op: BinaryOperator::Less,
            left: operand("a", true),
            right: operand("b", true),
            left_negated: false,
            right_negated: false,
        };
        assert!(
            expand_two_valued(&F, comparison, false)
                .unwrap_err()
                .is_internal()
        );
    }
}
