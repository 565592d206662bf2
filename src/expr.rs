//! Expression engine.
//!
//! An [`Expression`] is a small typed function over a span (or any [`Value`]):
//!
//! ```text
//!   text ──lexer──▶ tokens ──parser──▶ Node tree ──kind()──▶ ExpressionType
//!                                          │
//!                        apply / test / count / extract
//!                                          ▼
//!                               eval(node, &Value) ─▶ Value
//! ```
//!
//! Lexicon references and regexes are resolved while compiling, so a compiled
//! expression holds no borrowed state and can be shared across threads.

#[path = "expr/eval.rs"]
mod eval;
#[path = "expr/kind.rs"]
mod kind;
#[path = "expr/lexer.rs"]
mod lexer;
#[path = "expr/parser.rs"]
mod parser;
#[path = "expr/value.rs"]
mod value;

pub use kind::{ExpressionType, KindSet};
pub use value::{Counter, Value};

use crate::api::Registry;
use crate::{Error, Result, Span};
use parser::Node;
use std::fmt;
use std::sync::Arc;

/// A compiled expression.
///
/// ```
/// use tokenrules::{Document, Expression};
///
/// let doc = Document::from_tagged("d", "Old/JJ cars/NNS/car");
/// let expr = Expression::compile("if(#NOUN, $LEMMA, lower())").unwrap();
/// assert_eq!(expr.apply(&doc.token(0).unwrap()), "old");
/// assert_eq!(expr.apply(&doc.token(1).unwrap()), "car");
/// ```
#[derive(Debug, Clone)]
pub struct Expression {
    pattern: String,
    kind: ExpressionType,
    root: Arc<Node>,
}

impl Expression {
    /// Compile against an empty registry; `%name` references fail.
    pub fn compile(text: &str) -> Result<Self> {
        Self::compile_with(text, &Registry::default())
    }

    pub fn compile_with(text: &str, registry: &Registry) -> Result<Self> {
        let root = parser::parse(text, registry)?;
        let kind = root.kind();
        Ok(Expression { pattern: root.to_string(), kind, root: Arc::new(root) })
    }

    /// Compile an expression whose result must render as text (`HSpan` or `Str`).
    pub fn compile_string(text: &str, registry: &Registry) -> Result<Self> {
        let expr = Self::compile_with(text, registry)?;
        if !expr.kind.is_instance(KindSet::TEXTUAL) {
            return Err(Error::usage(format!("expression {} is {}, expected a string", expr.pattern, expr.kind)));
        }
        Ok(expr)
    }

    /// Compile an expression usable with [`extract`](Self::extract).
    pub fn extractor(text: &str, registry: &Registry) -> Result<Self> {
        let expr = Self::compile_with(text, registry)?;
        expr.check_extractable()?;
        Ok(expr)
    }

    /// Canonical source; recompiling it yields the same pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn kind(&self) -> ExpressionType {
        self.kind
    }

    /// True for the identity projection `$_`.
    pub fn is_identity(&self) -> bool {
        matches!(*self.root, Node::Input)
    }

    /// True when the result never depends on the input.
    pub fn is_constant(&self) -> bool {
        self.root.is_constant()
    }

    /// Evaluate and render as text; null renders empty.
    pub fn apply(&self, span: &Span<'_>) -> String {
        self.apply_as_object(&Value::Span(*span)).to_string()
    }

    pub fn apply_as_object<'d>(&self, input: &Value<'d>) -> Value<'d> {
        eval::eval(&self.root, input)
    }

    /// Numeric result, `NaN` when the result is not a number.
    pub fn apply_as_double(&self, input: &Value<'_>) -> f64 {
        self.apply_as_object(input).as_double()
    }

    pub fn apply_as_list<'d>(&self, input: &Value<'d>) -> Vec<Value<'d>> {
        self.apply_as_object(input).into_list()
    }

    pub fn test(&self, span: &Span<'_>) -> bool {
        self.test_value(&Value::Span(*span))
    }

    pub fn test_value(&self, input: &Value<'_>) -> bool {
        self.apply_as_object(input).truthy(input)
    }

    /// Frequency counter of the result. Blank keys are dropped.
    pub fn count(&self, span: &Span<'_>) -> Counter {
        let result = self.apply_as_object(&Value::Span(*span));
        match (self.kind, result) {
            (ExpressionType::Counter, Value::Counter(mut counter)) => {
                counter.retain_non_blank();
                counter
            }
            (_, result) => eval::string_counter(eval::flat_list(result)),
        }
    }

    /// [`count`](Self::count) for extractable expressions only.
    pub fn extract(&self, span: &Span<'_>) -> Result<Counter> {
        self.check_extractable()?;
        Ok(self.count(span))
    }

    fn check_extractable(&self) -> Result<()> {
        if self.kind.is_instance(KindSet::EXTRACTABLE) {
            Ok(())
        } else {
            Err(Error::usage(format!("cannot extract from {} expression {}", self.kind, self.pattern)))
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}
