use super::rules::Operator;
use chrono::{DateTime, FixedOffset};
use flowcore::{TypedValue, VariableType};
use serde_json::Value;
use std::cmp::Ordering;

/// Evaluate `left <op> right` with the handler for the left type. The pair
/// has already been checked against the rule table; operand values that
/// still don't fit (a non-numeric "number", an unparsable date) are false.
pub fn evaluate(left: &TypedValue, op: Operator, right: &TypedValue) -> bool {
    if matches!(op, Operator::IsEmpty | Operator::IsNotEmpty) {
        let empty = is_empty(&left.value);
        return (op == Operator::IsEmpty) == empty;
    }

    match left.ty {
        VariableType::String => string_handler(&left.value, op, &right.value),
        VariableType::Integer | VariableType::Number => {
            number_handler(&left.value, op, &right.value)
        }
        VariableType::Boolean => boolean_handler(&left.value, op, &right.value),
        VariableType::DateTime => datetime_handler(&left.value, op, &right.value),
        VariableType::Array => array_handler(&left.value, op, &right.value),
        VariableType::Map => map_handler(&left.value, op, &right.value),
        VariableType::Null => null_handler(op, &right.value),
        // objects only support the emptiness checks above
        VariableType::Object => false,
    }
}

fn string_handler(left: &Value, op: Operator, right: &Value) -> bool {
    let Some(left) = left.as_str() else {
        return false;
    };
    match op {
        Operator::Eq => right.as_str() == Some(left),
        Operator::Neq => right.as_str() != Some(left),
        Operator::Contains => right.as_str().is_some_and(|r| left.contains(r)),
        Operator::NotContains => right.as_str().is_some_and(|r| !left.contains(r)),
        Operator::In => array_contains(right, &Value::String(left.to_string())),
        Operator::Nin => !array_contains(right, &Value::String(left.to_string())),
        _ => false,
    }
}

fn number_handler(left: &Value, op: Operator, right: &Value) -> bool {
    let Some(l) = left.as_f64() else {
        return false;
    };
    match op {
        Operator::In => return array_contains(right, left),
        Operator::Nin => return !array_contains(right, left),
        _ => {}
    }
    let Some(r) = right.as_f64() else {
        return false;
    };
    match op {
        Operator::Eq => l == r,
        Operator::Neq => l != r,
        Operator::Gt => l > r,
        Operator::Gte => l >= r,
        Operator::Lt => l < r,
        Operator::Lte => l <= r,
        _ => false,
    }
}

fn boolean_handler(left: &Value, op: Operator, right: &Value) -> bool {
    let Some(l) = left.as_bool() else {
        return false;
    };
    match op {
        Operator::Eq => right.as_bool() == Some(l),
        Operator::Neq => right.as_bool().is_some_and(|r| r != l),
        Operator::IsTrue => l,
        Operator::IsFalse => !l,
        Operator::In => array_contains(right, left),
        Operator::Nin => !array_contains(right, left),
        _ => false,
    }
}

fn datetime_handler(left: &Value, op: Operator, right: &Value) -> bool {
    let (Some(l), Some(r)) = (parse_datetime(left), parse_datetime(right)) else {
        tracing::debug!("date-time comparison on unparsable operand");
        return false;
    };
    let ordering = l.cmp(&r);
    match op {
        Operator::Eq => ordering == Ordering::Equal,
        Operator::Neq => ordering != Ordering::Equal,
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Gte => ordering != Ordering::Less,
        Operator::Lt => ordering == Ordering::Less,
        Operator::Lte => ordering != Ordering::Greater,
        _ => false,
    }
}

fn array_handler(left: &Value, op: Operator, right: &Value) -> bool {
    match op {
        Operator::Contains => array_contains(left, right),
        Operator::NotContains => left.is_array() && !array_contains(left, right),
        _ => false,
    }
}

fn map_handler(left: &Value, op: Operator, right: &Value) -> bool {
    let (Some(map), Some(key)) = (left.as_object(), right.as_str()) else {
        return false;
    };
    match op {
        Operator::Contains => map.contains_key(key),
        Operator::NotContains => !map.contains_key(key),
        _ => false,
    }
}

fn null_handler(op: Operator, right: &Value) -> bool {
    match op {
        Operator::Eq => right.is_null(),
        Operator::Neq => !right.is_null(),
        _ => false,
    }
}

fn parse_datetime(value: &Value) -> Option<DateTime<FixedOffset>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Membership test with numeric equality across integer and float
fn array_contains(array: &Value, needle: &Value) -> bool {
    array
        .as_array()
        .is_some_and(|items| items.iter().any(|item| values_equal(item, needle)))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
