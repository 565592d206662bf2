//! tokenrules: a token-level query and rule engine for annotated documents.
//!
//! Three engines share one in-memory [`Document`]:
//!
//! ```text
//!   Expression   "lower($LEMMA)"           span  ──▶ Value
//!   TokenPattern "#DT? #JJ* (?<n> #NN)"    tokens ──▶ Match { groups }
//!   Rule         trigger + providers        Match ──▶ annotations + relations
//! ```
//!
//! Compiled expressions, patterns and rules are immutable, `Send + Sync`, and
//! can be reused across any number of documents. Lexicons referenced as
//! `%name` are resolved through an explicit [`Registry`] at compile time.
//!
//! ```
//! use tokenrules::{Document, Rule};
//!
//! let rules = Rule::compile("[v]\ntrigger: 'old' 'car'\nannotation: type=VEHICLE_MENTION\n", "demo.rules").unwrap();
//! let mut doc = Document::from_whitespace("d", "I bought an old car yesterday");
//! let report = rules[0].execute(&mut doc);
//! assert_eq!(report.annotations_created, 1);
//! ```

#[macro_use]
mod macros;
mod api;
mod document;
mod engine;
mod error;
mod expr;
mod lexicon;
mod pattern;
mod scan;

pub use api::{Options, Registry};
pub use document::{ANY, Annotation, AnnotationId, AttrValue, DEPENDENCY, Document, LEMMA, Relation, Span, TAG, TOKEN, TokenSpec};
pub use engine::{
    AnnotationProvider, Endpoint, RelationProvider, Rule, RuleIndex, RuleReport, RuleSet, RunReport, TriggerInfo,
};
pub use error::{Error, Result};
pub use expr::{Counter, Expression, ExpressionType, KindSet, Value};
pub use lexicon::{Lexicon, LexiconRef, WordList};
pub use pattern::{Match, Matcher, TokenPattern, WHOLE_MATCH};

use std::fmt;

/// Half-open byte range into a document's text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Range {
    /// Start byte index (inclusive).
    pub start: usize,
    /// End byte index (exclusive).
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        Range { start, end: end.max(start) }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when `other` lies inside this range.
    pub fn contains(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl From<std::ops::Range<usize>> for Range {
    fn from(range: std::ops::Range<usize>) -> Self {
        Range::new(range.start, range.end)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Render a number the way expressions print it: integral values without a
/// fractional part (`3`, not `3.0`).
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges() {
        let a = Range::new(2, 5);
        assert_eq!(a.len(), 3);
        assert!(a.overlaps(&Range::new(4, 9)));
        assert!(!a.overlaps(&Range::new(5, 9)));
        assert!(a.contains(&Range::new(3, 5)));
        assert_eq!(Range::from(1..4), Range::new(1, 4));
        assert!(Range::new(4, 2).is_empty());
    }

    #[test]
    fn numbers_print_without_trailing_zero() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
    }
}
