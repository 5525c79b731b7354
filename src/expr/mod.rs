//! Expression evaluation for visibility conditions and calculated values
//!
//! Expressions are parsed once when a schema is loaded and evaluated against
//! the live answer map by a small tree-walking interpreter. Evaluation never
//! fails outward: a broken visibility condition shows the field, a broken
//! calculated value yields an empty answer.

mod interp;
mod lexer;
mod parser;

pub use interp::{EvalError, Scope, Value};
pub use parser::ParseError;

use crate::state::AnswerValue;
use parser::Expr;

/// A compiled expression together with its source text
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    compiled: Result<Expr, ParseError>,
}

impl Expression {
    /// Compile an expression. Parse failures are kept and surface at evaluation.
    pub fn parse(source: &str) -> Self {
        let compiled = parser::parse(source);
        if let Err(ref err) = compiled {
            tracing::warn!(expression = source, error = %err, "Expression failed to parse");
        }
        Self {
            source: source.to_string(),
            compiled,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_valid(&self) -> bool {
        self.compiled.is_ok()
    }

    pub fn parse_error(&self) -> Option<&ParseError> {
        self.compiled.as_ref().err()
    }

    pub fn evaluate(&self, scope: &dyn Scope) -> Result<Value, EvalError> {
        match &self.compiled {
            Ok(expr) => interp::eval(expr, scope),
            Err(err) => Err(EvalError::Invalid(err.clone())),
        }
    }

    /// Name referenced by a pure `${name}` expression
    fn single_placeholder(&self) -> Option<&str> {
        let inner = self.source.strip_prefix("${")?.strip_suffix('}')?;
        let is_word = !inner.is_empty() && inner.chars().all(|c| c.is_alphanumeric() || c == '_');
        is_word.then_some(inner)
    }
}

/// Evaluate a visibility condition. Absent or blank conditions are visible,
/// and any evaluation failure is logged and treated as visible.
pub fn evaluate_visibility(expression: Option<&Expression>, scope: &dyn Scope) -> bool {
    let Some(expression) = expression else {
        return true;
    };
    if expression.source().trim().is_empty() {
        return true;
    }
    match expression.evaluate(scope) {
        Ok(value) => value.is_truthy(),
        Err(err) => {
            tracing::warn!(
                expression = expression.source(),
                error = %err,
                "Visibility condition failed, showing field"
            );
            true
        }
    }
}

/// Evaluate a calculated-value expression.
///
/// A pure `${name}` reference returns the referenced answer unchanged.
/// `None` means the expression produced null and the field keeps its value.
/// Failures are logged and produce an empty answer.
pub fn evaluate_calculated(expression: &Expression, scope: &dyn Scope) -> Option<AnswerValue> {
    if let Some(name) = expression.single_placeholder() {
        return Some(scope.lookup(name).cloned().unwrap_or_default());
    }
    match expression.evaluate(scope).and_then(Value::into_answer) {
        Ok(answer) => answer,
        Err(err) => {
            tracing::warn!(
                expression = expression.source(),
                error = %err,
                "Calculated value failed"
            );
            Some(AnswerValue::Empty)
        }
    }
}
