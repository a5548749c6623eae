//! Row-wise expression evaluation.

use std::cmp::Ordering;

use strata_common::prelude::*;
use strata_sql::{ExpressionKind, OperatorExpression};

/// Evaluate a projection expression against one row.
///
/// Only operands and arithmetic are value-producing; comparisons and logical
/// operators live in predicates and are evaluated through
/// [`matches_scan_type`].
pub fn evaluate(expression: &OperatorExpression, row: &[Value]) -> Result<Value> {
    match expression.kind() {
        ExpressionKind::Literal(value) => Ok(value.clone()),
        ExpressionKind::Column(column_id) => {
            row.get(column_id.0 as usize).cloned().ok_or_else(|| {
                Error::internal(format!("column index {} out of bounds", column_id.0))
            })
        }
        ExpressionKind::Placeholder(index) => Err(Error::execution(format!(
            "unbound placeholder #{}",
            index
        ))),
        _ if expression.is_arithmetic_operator() => {
            let left = evaluate(
                expression
                    .left_child()
                    .ok_or_else(|| Error::internal("operator needs a left child"))?,
                row,
            )?;
            let right = evaluate(
                expression
                    .right_child()
                    .ok_or_else(|| Error::internal("binary operator needs a right child"))?,
                row,
            )?;
            evaluate_arithmetic(expression.kind(), &left, &right)
        }
        other => Err(Error::execution(format!(
            "expression {:?} cannot be evaluated in a value context",
            other
        ))),
    }
}

/// Arithmetic with standard numeric semantics: integer division truncates
/// toward zero, integer modulo follows the dividend sign, floating math is
/// IEEE-754, NULL propagates, overflow and division by zero are errors.
fn evaluate_arithmetic(
    kind: &ExpressionKind<ColumnId>,
    left: &Value,
    right: &Value,
) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    let floating = matches!(left, Value::Float(_) | Value::Double(_))
        || matches!(right, Value::Float(_) | Value::Double(_));

    if floating {
        let (a, b) = match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(Error::Sql(SqlError::TypeMismatch {
                    expected: "numeric operands".into(),
                    actual: format!("{} and {}", left, right),
                }))
            }
        };
        let result = match kind {
            ExpressionKind::Addition => a + b,
            ExpressionKind::Subtraction => a - b,
            ExpressionKind::Multiplication => a * b,
            ExpressionKind::Division => {
                if b == 0.0 {
                    return Err(Error::Query(QueryError::DivisionByZero));
                }
                a / b
            }
            ExpressionKind::Modulo => {
                if b == 0.0 {
                    return Err(Error::Query(QueryError::DivisionByZero));
                }
                a % b
            }
            ExpressionKind::Power => a.powf(b),
            _ => unreachable!("checked by caller"),
        };
        return Ok(Value::Double(result));
    }

    let (a, b) = match (left.as_i64(), right.as_i64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(Error::Sql(SqlError::TypeMismatch {
                expected: "numeric operands".into(),
                actual: format!("{} and {}", left, right),
            }))
        }
    };
    let result = match kind {
        ExpressionKind::Addition => a.checked_add(b),
        ExpressionKind::Subtraction => a.checked_sub(b),
        ExpressionKind::Multiplication => a.checked_mul(b),
        ExpressionKind::Division => {
            if b == 0 {
                return Err(Error::Query(QueryError::DivisionByZero));
            }
            a.checked_div(b)
        }
        ExpressionKind::Modulo => {
            if b == 0 {
                return Err(Error::Query(QueryError::DivisionByZero));
            }
            a.checked_rem(b)
        }
        ExpressionKind::Power => u32::try_from(b).ok().and_then(|e| a.checked_pow(e)),
        _ => unreachable!("checked by caller"),
    };
    result
        .map(Value::Int64)
        .ok_or(Error::Query(QueryError::Overflow))
}

/// Whether `value` passes a scan against `search` (and `search2` for
/// Between). Comparisons involving NULL evaluate to NULL, and a NULL
/// predicate result filters the row out, so this returns plain `false` for
/// them; `NULL = NULL` does not match.
pub fn matches_scan_type(
    scan_type: ScanType,
    value: &Value,
    search: &Value,
    search2: Option<&Value>,
) -> bool {
    if value.is_null() || search.is_null() {
        return false;
    }

    match scan_type {
        ScanType::Equals => value.compare(search) == Ordering::Equal,
        ScanType::NotEquals => value.compare(search) != Ordering::Equal,
        ScanType::LessThan => value.compare(search) == Ordering::Less,
        ScanType::LessThanEquals => value.compare(search) != Ordering::Greater,
        ScanType::GreaterThan => value.compare(search) == Ordering::Greater,
        ScanType::GreaterThanEquals => value.compare(search) != Ordering::Less,
        ScanType::Like => like_match(&value.to_string(), &search.to_string()),
        ScanType::NotLike => !like_match(&value.to_string(), &search.to_string()),
        ScanType::Between => match search2 {
            Some(upper) if !upper.is_null() => {
                value.compare(search) != Ordering::Less
                    && value.compare(upper) != Ordering::Greater
            }
            _ => false,
        },
    }
}

/// SQL LIKE: `%` matches any run of characters, `_` any single character.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            // backtrack: let the last % swallow one more character
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_sql::Expression;

    fn add(a: Value, b: Value) -> Result<Value> {
        evaluate(
            &Expression::binary_operator(
                ExpressionKind::Addition,
                Expression::literal(a),
                Expression::literal(b),
            ),
            &[],
        )
    }

    #[test]
    fn test_column_and_literal() {
        let row = vec![Value::Int32(3), Value::String("x".into())];
        assert_eq!(
            evaluate(&Expression::column(ColumnId(0)), &row).unwrap(),
            Value::Int32(3)
        );
        assert_eq!(
            evaluate(&Expression::literal(Value::Int64(9)), &row).unwrap(),
            Value::Int64(9)
        );
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(add(Value::Int32(2), Value::Int64(3)).unwrap(), Value::Int64(5));

        // truncation toward zero and dividend-sign modulo
        let division = evaluate(
            &Expression::binary_operator(
                ExpressionKind::Division,
                Expression::literal(Value::Int64(-7)),
                Expression::literal(Value::Int64(2)),
            ),
            &[],
        )
        .unwrap();
        assert_eq!(division, Value::Int64(-3));

        let modulo = evaluate(
            &Expression::binary_operator(
                ExpressionKind::Modulo,
                Expression::literal(Value::Int64(-7)),
                Expression::literal(Value::Int64(2)),
            ),
            &[],
        )
        .unwrap();
        assert_eq!(modulo, Value::Int64(-1));
    }

    #[test]
    fn test_division_by_zero_and_overflow() {
        let err = evaluate(
            &Expression::binary_operator(
                ExpressionKind::Division,
                Expression::literal(Value::Int64(1)),
                Expression::literal(Value::Int64(0)),
            ),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::DivisionByZero)));

        let err = add(Value::Int64(i64::MAX), Value::Int64(1)).unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::Overflow)));
    }

    #[test]
    fn test_null_propagation() {
        assert_eq!(add(Value::Null, Value::Int64(1)).unwrap(), Value::Null);
    }

    #[test]
    fn test_float_arithmetic() {
        assert_eq!(
            add(Value::Int64(1), Value::Double(0.5)).unwrap(),
            Value::Double(1.5)
        );
    }

    #[test]
    fn test_matches_scan_type() {
        let v = Value::Int32(5);
        assert!(matches_scan_type(ScanType::Equals, &v, &Value::Int64(5), None));
        assert!(matches_scan_type(ScanType::LessThan, &v, &Value::Int64(6), None));
        assert!(!matches_scan_type(ScanType::GreaterThan, &v, &Value::Int64(6), None));

        // Between is inclusive on both ends
        assert!(matches_scan_type(
            ScanType::Between,
            &v,
            &Value::Int64(5),
            Some(&Value::Int64(7))
        ));
        assert!(matches_scan_type(
            ScanType::Between,
            &v,
            &Value::Int64(3),
            Some(&Value::Int64(5))
        ));

        // NULL on either side filters the row
        assert!(!matches_scan_type(ScanType::Equals, &Value::Null, &Value::Null, None));
        assert!(!matches_scan_type(ScanType::NotEquals, &v, &Value::Null, None));
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("hello", "h%"));
        assert!(like_match("hello", "%llo"));
        assert!(like_match("hello", "h_llo"));
        assert!(like_match("hello", "%"));
        assert!(!like_match("hello", "h_l"));
        assert!(!like_match("hello", "world%"));
        assert!(like_match("a%b", "a%b"));
    }
}
