//! Runtime values produced by expression evaluation.

use crate::document::ANY;
use crate::{AttrValue, LexiconRef, Span, format_number};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A bag of string keys with numeric weights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counter {
    counts: BTreeMap<String, f64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: impl Into<String>, by: f64) {
        *self.counts.entry(key.into()).or_insert(0.0) += by;
    }

    /// Weight of `key`, `0.0` when absent.
    pub fn get(&self, key: &str) -> f64 {
        self.counts.get(key).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.counts.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn merge(&mut self, other: &Counter) {
        for (key, weight) in other.iter() {
            self.increment(key, weight);
        }
    }

    pub(crate) fn retain_non_blank(&mut self) {
        self.counts.retain(|k, _| !k.trim().is_empty());
    }
}

impl<K: Into<String>> FromIterator<K> for Counter {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut counter = Counter::new();
        for key in iter {
            counter.increment(key, 1.0);
        }
        counter
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, weight)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={}", format_number(weight))?;
        }
        f.write_str("}")
    }
}

/// A dynamically typed value. Spans borrow the document under evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'d> {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Span(Span<'d>),
    List(Vec<Value<'d>>),
    Counter(Counter),
    Lexicon(LexiconRef),
    Tag(String),
}

impl<'d> Value<'d> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_span(&self) -> Option<Span<'d>> {
        match self {
            Value::Span(span) => Some(*span),
            _ => None,
        }
    }

    /// Text of scalar values; `None` for null and collections.
    pub fn text(&self) -> Option<String> {
        match self {
            Value::Str(s) | Value::Tag(s) => Some(s.clone()),
            Value::Span(span) => Some(span.text().to_string()),
            Value::Number(n) => Some(format_number(*n)),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::List(_) | Value::Counter(_) | Value::Lexicon(_) => None,
        }
    }

    pub(crate) fn is_textual(&self) -> bool {
        matches!(self, Value::Str(_) | Value::Span(_) | Value::Tag(_))
    }

    /// Truthiness under `input`, the value the expression was applied to.
    ///
    /// A lexicon reference is true when it contains the input.
    pub fn truthy(&self, input: &Value<'_>) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
            Value::Counter(counter) => !counter.is_empty(),
            Value::Str(s) => !s.trim().is_empty(),
            Value::Number(n) => n.is_finite(),
            Value::Tag(tag) => tag != ANY,
            Value::Lexicon(lexicon) => match input {
                Value::Span(span) => lexicon.contains_span(span),
                Value::Str(s) => lexicon.contains(s),
                _ => true,
            },
            Value::Span(_) => true,
        }
    }

    /// Numeric reading: numbers as-is, strings parsed, booleans as 1/0 and
    /// anything else NaN. Never infinite.
    pub fn as_double(&self) -> f64 {
        let n = match self {
            Value::Number(n) => *n,
            Value::Str(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            Value::Bool(b) => f64::from(u8::from(*b)),
            _ => f64::NAN,
        };
        if n.is_infinite() { f64::NAN } else { n }
    }

    /// Null is empty, a list is itself, anything else a singleton.
    pub fn into_list(self) -> Vec<Value<'d>> {
        match self {
            Value::Null => Vec::new(),
            Value::List(items) => items,
            other => vec![other],
        }
    }

    /// Equality across representations: numbers numerically, text by content.
    pub fn loose_eq(&self, other: &Value<'_>) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Number(a), b) | (b, Value::Number(a)) if !matches!(b, Value::List(_)) => *a == b.numeric_reading(),
            (Value::List(a), Value::List(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y)),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Counter(a), Value::Counter(b)) => a == b,
            (Value::Lexicon(a), Value::Lexicon(b)) => a == b,
            (a, b) if a.is_textual() && b.is_textual() => a.text() == b.text(),
            _ => false,
        }
    }

    /// Ordering for `<`-style comparisons: numeric when both sides read as
    /// numbers, lexicographic when both are text.
    pub fn compare(&self, other: &Value<'_>) -> Option<Ordering> {
        let (a, b) = (self.numeric_reading(), other.numeric_reading());
        if !a.is_nan() && !b.is_nan() {
            return a.partial_cmp(&b);
        }
        if self.is_textual() && other.is_textual() {
            return Some(self.text()?.cmp(&other.text()?));
        }
        None
    }

    /// Like [`as_double`](Self::as_double), but spans are read through their text.
    pub(crate) fn numeric_reading(&self) -> f64 {
        match self {
            Value::Span(span) => span.text().trim().parse::<f64>().unwrap_or(f64::NAN),
            Value::Tag(_) => f64::NAN,
            other => other.as_double(),
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Counter(counter) => write!(f, "{counter}"),
            Value::Lexicon(lexicon) => write!(f, "%{}", lexicon.name()),
            scalar => f.write_str(&scalar.text().unwrap_or_default()),
        }
    }
}

impl<'d> From<Span<'d>> for Value<'d> {
    fn from(span: Span<'d>) -> Self {
        Value::Span(span)
    }
}

impl From<&str> for Value<'_> {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value<'_> {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&AttrValue> for Value<'_> {
    fn from(value: &AttrValue) -> Self {
        match value {
            AttrValue::Str(s) => Value::Str(s.clone()),
            AttrValue::Number(n) => Value::Number(*n),
            AttrValue::Bool(b) => Value::Bool(*b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, WordList};
    use std::sync::Arc;

    #[test]
    fn truthiness() {
        let input = Value::Null;
        assert!(!Value::Null.truthy(&input));
        assert!(!Value::Str("  ".into()).truthy(&input));
        assert!(Value::Str("x".into()).truthy(&input));
        assert!(!Value::List(vec![]).truthy(&input));
        assert!(!Value::Number(f64::NAN).truthy(&input));
        assert!(Value::Number(0.0).truthy(&input));
        assert!(!Value::Tag(ANY.into()).truthy(&input));
        assert!(Value::Tag("NN".into()).truthy(&input));
    }

    #[test]
    fn lexicon_truthiness_tests_the_input() {
        let doc = Document::from_tagged("d", "red/JJ car/NN");
        let colors = LexiconRef::new("colors", Arc::new(WordList::new(["red"])));
        let value = Value::Lexicon(colors);
        assert!(value.truthy(&Value::Span(doc.token(0).unwrap())));
        assert!(!value.truthy(&Value::Span(doc.token(1).unwrap())));
        assert!(value.truthy(&Value::Str("RED".into())));
    }

    #[test]
    fn numeric_reading_never_infinite() {
        assert_eq!(Value::Str(" 2.5 ".into()).as_double(), 2.5);
        assert!(Value::Str("inf".into()).as_double().is_nan());
        assert!(Value::Number(f64::INFINITY).as_double().is_nan());
        assert_eq!(Value::Bool(true).as_double(), 1.0);
        assert!(Value::Null.as_double().is_nan());
    }

    #[test]
    fn loose_equality_and_ordering() {
        let doc = Document::from_tagged("d", "42/CD");
        let span = Value::Span(doc.token(0).unwrap());
        assert!(span.loose_eq(&Value::Number(42.0)));
        assert!(span.loose_eq(&Value::Str("42".into())));
        assert_eq!(span.compare(&Value::Number(7.0)), Some(Ordering::Greater));
        assert_eq!(Value::Str("a".into()).compare(&Value::Str("b".into())), Some(Ordering::Less));
        assert_eq!(Value::Null.compare(&Value::Number(1.0)), None);
    }

    #[test]
    fn counters_render_sorted() {
        let counter: Counter = ["b", "a", "b"].into_iter().collect();
        assert_eq!(counter.get("b"), 2.0);
        assert_eq!(Value::Counter(counter).to_string(), "{a=1, b=2}");
        assert_eq!(Value::List(vec![Value::from("x"), Value::Number(1.5)]).to_string(), "[x, 1.5]");
    }
}
