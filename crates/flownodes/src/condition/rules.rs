use flowcore::VariableType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operators a condition clause can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Contains,
    NotContains,
    IsEmpty,
    IsNotEmpty,
    IsTrue,
    IsFalse,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::IsEmpty => "is_empty",
            Operator::IsNotEmpty => "is_not_empty",
            Operator::IsTrue => "is_true",
            Operator::IsFalse => "is_false",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the right-hand side of a clause must be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightOperand {
    /// Unary operator, the right side must be absent
    Absent,
    Of(VariableType),
    /// Any value; the handler decides
    Any,
}

impl RightOperand {
    pub fn accepts(self, actual: VariableType) -> bool {
        match self {
            RightOperand::Absent => actual == VariableType::Null,
            RightOperand::Any => true,
            // date-time constants usually arrive as plain strings
            RightOperand::Of(VariableType::DateTime) => {
                matches!(actual, VariableType::DateTime | VariableType::String)
            }
            RightOperand::Of(expected) => expected.accepts(actual),
        }
    }
}

/// Rule table: `(left type, operator) -> expected right operand`.
/// `None` means the operator does not apply to the left type.
pub fn expected_right(left: VariableType, op: Operator) -> Option<RightOperand> {
    use Operator::*;
    use RightOperand::{Absent, Any, Of};
    use VariableType as T;

    let rule = match (left, op) {
        (_, IsEmpty | IsNotEmpty) => Absent,

        (T::String, Eq | Neq) => Of(T::String),
        (T::String, Contains | NotContains) => Of(T::String),
        (T::String, In | Nin) => Of(T::Array),

        (T::Integer | T::Number, Eq | Neq | Gt | Gte | Lt | Lte) => Of(T::Number),
        (T::Integer | T::Number, In | Nin) => Of(T::Array),

        (T::Boolean, Eq | Neq) => Of(T::Boolean),
        (T::Boolean, IsTrue | IsFalse) => Absent,
        (T::Boolean, In | Nin) => Of(T::Array),

        (T::DateTime, Eq | Neq | Gt | Gte | Lt | Lte) => Of(T::DateTime),

        (T::Array, Contains | NotContains) => Any,

        (T::Map, Contains | NotContains) => Of(T::String),

        (T::Null, Eq | Neq) => Of(T::Null),

        _ => return None,
    };
    Some(rule)
}

