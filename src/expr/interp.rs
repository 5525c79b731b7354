//! Tree-walking interpreter over the expression AST

use super::parser::{BinaryOp, Expr, ParseError, UnaryOp};
use crate::state::{format_number, AnswerValue};
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("expression failed to parse: {0}")]
    Invalid(ParseError),

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("invalid operands for {op}: {left} and {right}")]
    InvalidOperands {
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("{member} is not defined on {target}")]
    InvalidMember {
        member: &'static str,
        target: String,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Loose numeric coercion. Empty strings and null count as zero.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Null => Some(0.0),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Some(*n),
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    trimmed.parse::<f64>().ok()
                }
            }
            Value::List(_) => None,
        }
    }

    /// Whether `+` should treat this operand as a number
    fn is_numeric(&self) -> bool {
        match self {
            Value::Null | Value::Bool(_) | Value::Number(_) => true,
            Value::Str(s) => !s.trim().is_empty() && s.trim().parse::<f64>().is_ok(),
            Value::List(_) => false,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    fn describe(&self) -> String {
        match self {
            Value::Str(s) => format!("'{s}'"),
            other => other.to_text(),
        }
    }

    /// Convert a result into an answer. `None` means "leave the field alone".
    pub fn into_answer(self) -> EvalResult<Option<AnswerValue>> {
        Ok(match self {
            Value::Null => None,
            Value::Bool(b) => Some(AnswerValue::Bool(b)),
            Value::Number(n) if !n.is_finite() => return Err(EvalError::NonFinite),
            Value::Number(n) => Some(AnswerValue::Number(n)),
            Value::Str(s) => Some(AnswerValue::text(s)),
            Value::List(items) => Some(AnswerValue::Choices(
                items.iter().map(Value::to_text).collect(),
            )),
        })
    }
}

impl From<&AnswerValue> for Value {
    fn from(answer: &AnswerValue) -> Self {
        match answer {
            AnswerValue::Empty => Value::Str(String::new()),
            AnswerValue::Text(s) => Value::Str(s.clone()),
            AnswerValue::Choices(c) => Value::List(c.iter().cloned().map(Value::Str).collect()),
            AnswerValue::Number(n) => Value::Number(*n),
            AnswerValue::Bool(b) => Value::Bool(*b),
        }
    }
}

/// Read access to the answer map an expression is evaluated against
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<&AnswerValue>;
}

impl Scope for HashMap<String, AnswerValue> {
    fn lookup(&self, name: &str) -> Option<&AnswerValue> {
        self.get(name)
    }
}

pub fn eval(expr: &Expr, scope: &dyn Scope) -> EvalResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),

        Expr::Ident(name) => scope
            .lookup(name)
            .map(Value::from)
            .ok_or_else(|| EvalError::UnknownIdentifier(name.clone())),

        Expr::Placeholder(name) => Ok(scope.lookup(name).map(Value::from).unwrap_or(Value::Null)),

        Expr::Unary { op, operand } => {
            let value = eval(operand, scope)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => value
                    .to_number()
                    .map(|n| Value::Number(-n))
                    .ok_or_else(|| EvalError::InvalidOperands {
                        op: "-",
                        left: value.describe(),
                        right: String::new(),
                    }),
            }
        }

        Expr::Binary { op, left, right } => {
            let left = eval(left, scope)?;
            // Short-circuit connectives return an operand, not a bool
            match op {
                BinaryOp::And if !left.is_truthy() => return Ok(left),
                BinaryOp::And => return eval(right, scope),
                BinaryOp::Or if left.is_truthy() => return Ok(left),
                BinaryOp::Or => return eval(right, scope),
                _ => {}
            }
            let right = eval(right, scope)?;
            binary(*op, left, right)
        }

        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => {
            if eval(cond, scope)?.is_truthy() {
                eval(then, scope)
            } else {
                eval(otherwise, scope)
            }
        }

        Expr::Length(target) => match eval(target, scope)? {
            Value::Str(s) => Ok(Value::Number(s.chars().count() as f64)),
            Value::List(items) => Ok(Value::Number(items.len() as f64)),
            other => Err(EvalError::InvalidMember {
                member: "length",
                target: other.describe(),
            }),
        },

        Expr::Includes { target, needle } => {
            let needle = eval(needle, scope)?;
            match eval(target, scope)? {
                Value::List(items) => Ok(Value::Bool(items.iter().any(|i| loose_eq(i, &needle)))),
                Value::Str(s) => Ok(Value::Bool(s.contains(&needle.to_text()))),
                other => Err(EvalError::InvalidMember {
                    member: "includes",
                    target: other.describe(),
                }),
            }
        }
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> EvalResult<Value> {
    let invalid = |left: &Value, right: &Value| EvalError::InvalidOperands {
        op: op.symbol(),
        left: left.describe(),
        right: right.describe(),
    };

    match op {
        BinaryOp::Add => {
            if left.is_numeric() && right.is_numeric() {
                let (a, b) = numbers(&left, &right).ok_or_else(|| invalid(&left, &right))?;
                Ok(Value::Number(a + b))
            } else {
                Ok(Value::Str(format!("{}{}", left.to_text(), right.to_text())))
            }
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (a, b) = numbers(&left, &right).ok_or_else(|| invalid(&left, &right))?;
            match op {
                BinaryOp::Sub => Ok(Value::Number(a - b)),
                BinaryOp::Mul => Ok(Value::Number(a * b)),
                _ if b == 0.0 => Err(EvalError::DivisionByZero),
                BinaryOp::Div => Ok(Value::Number(a / b)),
                _ => Ok(Value::Number(a % b)),
            }
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&left, &right) {
                (Value::Str(a), Value::Str(b)) if !(left.is_numeric() && right.is_numeric()) => {
                    Some(a.cmp(b))
                }
                _ => numbers(&left, &right).and_then(|(a, b)| a.partial_cmp(&b)),
            };
            // Incomparable operands are simply false
            let result = match ordering {
                None => false,
                Some(ordering) => match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                },
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(&left, &right))),
        BinaryOp::NotEq => Ok(Value::Bool(!loose_eq(&left, &right))),
        BinaryOp::StrictEq => Ok(Value::Bool(left == right)),
        BinaryOp::StrictNotEq => Ok(Value::Bool(left != right)),
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit operators are handled in eval"),
    }
}

fn numbers(left: &Value, right: &Value) -> Option<(f64, f64)> {
    Some((left.to_number()?, right.to_number()?))
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::List(_), _) | (_, Value::List(_)) => false,
        _ => match numbers(left, right) {
            Some((a, b)) => a == b,
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse;
    use super::*;

    fn scope(pairs: &[(&str, AnswerValue)]) -> HashMap<String, AnswerValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn run(source: &str, scope: &HashMap<String, AnswerValue>) -> EvalResult<Value> {
        eval(&parse(source).unwrap(), scope)
    }

    mod coercion {
        use super::*;

        #[test]
        fn test_numeric_string_compares_as_number() {
            let s = scope(&[("age", AnswerValue::text("20"))]);
            assert_eq!(run("age > 18", &s), Ok(Value::Bool(true)));
            let s = scope(&[("age", AnswerValue::text("9"))]);
            assert_eq!(run("age > 18", &s), Ok(Value::Bool(false)));
        }

        #[test]
        fn test_two_numeric_strings_compare_numerically() {
            let s = scope(&[("a", AnswerValue::text("9")), ("b", AnswerValue::text("10"))]);
            assert_eq!(run("a < b", &s), Ok(Value::Bool(true)));
        }

        #[test]
        fn test_non_numeric_strings_compare_lexically() {
            let s = scope(&[("a", AnswerValue::text("apple"))]);
            assert_eq!(run("a < 'banana'", &s), Ok(Value::Bool(true)));
        }

        #[test]
        fn test_empty_answer_is_zero_in_comparisons() {
            let s = scope(&[("age", AnswerValue::Empty)]);
            assert_eq!(run("age > 18", &s), Ok(Value::Bool(false)));
        }

        #[test]
        fn test_loose_equality_across_types() {
            let s = scope(&[("count", AnswerValue::text("3"))]);
            assert_eq!(run("count == 3", &s), Ok(Value::Bool(true)));
            assert_eq!(run("count === 3", &s), Ok(Value::Bool(false)));
            assert_eq!(run("count !== '3'", &s), Ok(Value::Bool(false)));
        }

        #[test]
        fn test_add_numbers_or_concatenate() {
            let s = scope(&[("a", AnswerValue::text("2")), ("b", AnswerValue::text("x"))]);
            assert_eq!(run("a + 3", &s), Ok(Value::Number(5.0)));
            assert_eq!(run("a + b", &s), Ok(Value::Str("2x".into())));
        }
    }

    mod operators {
        use super::*;

        #[test]
        fn test_short_circuit_skips_unknown_identifier() {
            let s = scope(&[]);
            assert_eq!(run("false && missing", &s), Ok(Value::Bool(false)));
            assert_eq!(run("true || missing", &s), Ok(Value::Bool(true)));
        }

        #[test]
        fn test_division_by_zero() {
            assert_eq!(run("1 / 0", &scope(&[])), Err(EvalError::DivisionByZero));
        }

        #[test]
        fn test_arithmetic_on_text_is_error() {
            let s = scope(&[("name", AnswerValue::text("bob"))]);
            assert!(matches!(
                run("name * 2", &s),
                Err(EvalError::InvalidOperands { op: "*", .. })
            ));
        }

        #[test]
        fn test_conditional_picks_branch() {
            let s = scope(&[("score", AnswerValue::Number(7.0))]);
            assert_eq!(
                run("score > 5 ? 'high' : 'low'", &s),
                Ok(Value::Str("high".into()))
            );
        }

        #[test]
        fn test_includes_on_choices() {
            let s = scope(&[("symptoms", AnswerValue::choices(["fever", "cough"]))]);
            assert_eq!(run("symptoms.includes('cough')", &s), Ok(Value::Bool(true)));
            assert_eq!(run("symptoms.includes('rash')", &s), Ok(Value::Bool(false)));
            assert_eq!(run("symptoms.length", &s), Ok(Value::Number(2.0)));
        }

        #[test]
        fn test_length_on_number_is_error() {
            let s = scope(&[("n", AnswerValue::Number(3.0))]);
            assert!(matches!(
                run("n.length", &s),
                Err(EvalError::InvalidMember { member: "length", .. })
            ));
        }
    }

    mod lookup {
        use super::*;

        #[test]
        fn test_unknown_identifier_is_error() {
            assert_eq!(
                run("age > 18", &scope(&[])),
                Err(EvalError::UnknownIdentifier("age".into()))
            );
        }

        #[test]
        fn test_missing_placeholder_is_null() {
            assert_eq!(run("${age}", &scope(&[])), Ok(Value::Null));
        }
    }

    mod into_answer {
        use super::*;

        #[test]
        fn test_null_means_no_update() {
            assert_eq!(Value::Null.into_answer(), Ok(None));
        }

        #[test]
        fn test_nan_is_error() {
            assert_eq!(Value::Number(f64::NAN).into_answer(), Err(EvalError::NonFinite));
        }

        #[test]
        fn test_list_becomes_choices() {
            let value = Value::List(vec![Value::Str("a".into()), Value::Number(1.0)]);
            assert_eq!(
                value.into_answer(),
                Ok(Some(AnswerValue::choices(["a", "1"])))
            );
        }
    }
}
