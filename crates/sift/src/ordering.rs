//! Sort keys for ordering operations.
//!
//! Provides [`Dir`] for sort direction and the sort plan the engine derives
//! from a filter's `OrderBy*`/`ThenBy*` operations.

use std::cmp::Ordering;

use tracing::warn;

use crate::expr::Lambda;
use crate::operation::{Operation, OperationKind};
use crate::value::{Datum, Value};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dir {
    /// Ascending order (smallest first).
    #[default]
    Asc,
    /// Descending order (largest first).
    Desc,
}

impl Dir {
    /// Returns the direction of an ordering kind, or `None` for other kinds.
    pub fn of(kind: OperationKind) -> Option<Dir> {
        match kind {
            OperationKind::OrderBy | OperationKind::ThenBy => Some(Dir::Asc),
            OperationKind::OrderByDescending | OperationKind::ThenByDescending => Some(Dir::Desc),
            _ => None,
        }
    }

    /// Applies this direction to an ordering.
    ///
    /// For `Asc`, returns the ordering unchanged.
    /// For `Desc`, reverses the ordering.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Dir::Asc => ordering,
            Dir::Desc => ordering.reverse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Asc => "asc",
            Dir::Desc => "desc",
        }
    }
}

impl std::fmt::Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One key of a sort plan.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SortKey<'f> {
    pub lambda: &'f Lambda,
    pub dir: Dir,
}

/// Derives the sort keys from a filter's operations, most significant first.
///
/// Each `OrderBy*` starts a new chain and each `ThenBy*` extends the current
/// one. A later chain outranks an earlier one, which keeps the earlier chain
/// as its tie-break: the result of sorting once per chain with a stable sort.
pub(crate) fn sort_plan(operations: &[Operation]) -> Vec<SortKey<'_>> {
    let mut chains: Vec<Vec<SortKey<'_>>> = Vec::new();

    for op in operations {
        let Some(dir) = Dir::of(op.kind()) else {
            continue;
        };
        let Some(lambda) = op.expression() else {
            continue;
        };
        let key = SortKey { lambda, dir };

        match op.kind() {
            OperationKind::OrderBy | OperationKind::OrderByDescending => chains.push(vec![key]),
            _ => match chains.last_mut() {
                Some(chain) => chain.push(key),
                None => {
                    warn!(kind = %op.kind(), "tie-break ordering without a primary ordering; treating it as primary");
                    chains.push(vec![key]);
                }
            },
        }
    }

    chains.into_iter().rev().flatten().collect()
}

/// Compares two values of the same type.
///
/// Returns `None` if the types don't match or comparison is not possible (NaN).
pub fn compare_values(a: &Value<'_>, b: &Value<'_>) -> Option<Ordering> {
    match (a, b) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.compare(*b),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Row(a), Value::Row(b)) => compare_rows(a, b),

        // Null values sort last
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Greater),
        (_, Value::Null) => Some(Ordering::Less),

        // Type mismatch - cannot compare
        _ => None,
    }
}

fn compare_rows(a: &[(String, Datum)], b: &[(String, Datum)]) -> Option<Ordering> {
    for ((_, x), (_, y)) in a.iter().zip(b) {
        match compare_values(&x.as_value(), &y.as_value())? {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(a.len().cmp(&b.len()))
}

/// Compares two precomputed key vectors under the plan's directions.
pub(crate) fn compare_keys(a: &[Value<'_>], b: &[Value<'_>], plan: &[SortKey<'_>]) -> Ordering {
    for ((key, x), y) in plan.iter().zip(a).zip(b) {
        let ordering = key.dir.apply(sort_order(x, y));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total order used for sort keys.
///
/// Matches [`compare_values`] for comparable values. Otherwise values rank
/// by type (bool, number, string, row, record, null), NaN sorts after every
/// other number, and records compare equal to each other.
pub(crate) fn sort_order(a: &Value<'_>, b: &Value<'_>) -> Ordering {
    match (a, b) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a.total_cmp(*b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Row(a), Value::Row(b)) => {
            for ((_, x), (_, y)) in a.iter().zip(b.iter()) {
                match sort_order(&x.as_value(), &y.as_value()) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            a.len().cmp(&b.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value<'_>) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::Str(_) => 2,
        Value::Row(_) => 3,
        Value::Record(_) => 4,
        Value::Null => 5,
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;
    use crate::expr::field;
    use crate::operation::{ExpressionOperation, ValueOperation};
    use crate::value::Number;

    fn ordering(kind: OperationKind, name: &str) -> Operation {
        ExpressionOperation::new(kind, Some(Lambda::of(field(name))))
            .unwrap()
            .into()
    }

    fn plan_names(ops: &[Operation]) -> Vec<(String, Dir)> {
        sort_plan(ops)
            .into_iter()
            .map(|k| (k.lambda.to_string(), k.dir))
            .collect()
    }

    #[test]
    fn dir_apply() {
        assert_eq!(Dir::Asc.apply(Ordering::Less), Ordering::Less);
        assert_eq!(Dir::Asc.apply(Ordering::Equal), Ordering::Equal);
        assert_eq!(Dir::Desc.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(Dir::Desc.apply(Ordering::Greater), Ordering::Less);
    }

    #[test]
    fn dir_of_kind() {
        assert_eq!(Dir::of(OperationKind::ThenByDescending), Some(Dir::Desc));
        assert_eq!(Dir::of(OperationKind::OrderBy), Some(Dir::Asc));
        assert_eq!(Dir::of(OperationKind::Top), None);
        assert_eq!(Dir::Desc.to_string(), "desc");
    }

    #[test]
    fn then_by_extends_current_chain() {
        let ops = [
            ordering(OperationKind::OrderBy, "a"),
            ordering(OperationKind::ThenByDescending, "b"),
        ];
        assert_eq!(
            plan_names(&ops),
            vec![
                ("x => x.a".to_string(), Dir::Asc),
                ("x => x.b".to_string(), Dir::Desc)
            ]
        );
    }

    #[test]
    fn later_order_by_outranks_earlier_chain() {
        let ops = [
            ordering(OperationKind::OrderBy, "a"),
            ordering(OperationKind::ThenBy, "b"),
            ordering(OperationKind::OrderByDescending, "c"),
            ordering(OperationKind::ThenBy, "d"),
        ];
        let names: Vec<String> = plan_names(&ops).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["x => x.c", "x => x.d", "x => x.a", "x => x.b"]);
    }

    #[test]
    fn leading_then_by_is_primary() {
        let ops = [ordering(OperationKind::ThenBy, "a")];
        assert_eq!(plan_names(&ops).len(), 1);
    }

    #[test]
    fn non_ordering_and_empty_operations_are_ignored() {
        let ops: Vec<Operation> = vec![
            ValueOperation::new(OperationKind::Top, Some(1)).unwrap().into(),
            ExpressionOperation::new(OperationKind::OrderBy, None)
                .unwrap()
                .into(),
        ];
        assert!(sort_plan(&ops).is_empty());
    }

    #[test]
    fn compare_strings_and_numbers() {
        let a = Value::Str(Cow::Borrowed("apple"));
        let b = Value::Str(Cow::Borrowed("banana"));
        assert_eq!(compare_values(&a, &b), Some(Ordering::Less));

        let n = Value::Number(Number::I64(42));
        assert_eq!(compare_values(&a, &n), None);

        let nan = Value::Number(Number::F64(f64::NAN));
        assert_eq!(compare_values(&nan, &n), None);
    }

    #[test]
    fn null_sorts_last() {
        let some = Value::Bool(false);
        assert_eq!(compare_values(&Value::Null, &some), Some(Ordering::Greater));
        assert_eq!(compare_values(&some, &Value::Null), Some(Ordering::Less));
        assert_eq!(
            compare_values(&Value::Null, &Value::Null),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn mixed_types_rank_by_type() {
        let lambda = Lambda::of(field("a"));
        let plan = [
            SortKey {
                lambda: &lambda,
                dir: Dir::Asc,
            },
            SortKey {
                lambda: &lambda,
                dir: Dir::Desc,
            },
        ];
        let a = [Value::Str(Cow::Borrowed("s")), Value::Number(Number::I64(1))];
        let b = [Value::Number(Number::I64(0)), Value::Number(Number::I64(2))];
        assert_eq!(compare_keys(&a, &b, &plan), Ordering::Greater);

        assert_eq!(sort_order(&Value::Bool(true), &Value::Number(Number::I64(0))), Ordering::Less);
        assert_eq!(sort_order(&Value::Str(Cow::Borrowed("")), &Value::Null), Ordering::Less);
    }

    #[test]
    fn nan_sorts_after_numbers_and_before_null() {
        let nan = Value::Number(Number::F64(f64::NAN));
        let one = Value::Number(Number::F64(1.0));
        assert_eq!(sort_order(&nan, &one), Ordering::Greater);
        assert_eq!(sort_order(&one, &nan), Ordering::Less);
        assert_eq!(sort_order(&nan, &nan), Ordering::Equal);
        assert_eq!(sort_order(&nan, &Value::Null), Ordering::Less);
    }

    #[test]
    fn float_and_integer_keys_compare_exactly() {
        let big = Value::Number(Number::I64((1 << 53) + 1));
        let float = Value::Number(Number::F64(9_007_199_254_740_992.0));
        let exact = Value::Number(Number::U64(1 << 53));
        assert_eq!(sort_order(&big, &float), Ordering::Greater);
        assert_eq!(sort_order(&float, &exact), Ordering::Equal);
        assert_eq!(sort_order(&exact, &big), Ordering::Less);
    }
}
