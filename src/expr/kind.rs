//! Static expression types.
//!
//! `ExpressionType` classifies what an expression produces; it never decides
//! how a value is represented at runtime (see `value.rs`). Composite nodes
//! combine the types of their children with [`ExpressionType::join`]:
//!
//! ```text
//!              Predicate  HSpan  Str  Feature  Numeric  Counter  Object
//! Predicate    Predicate  Obj    Obj  Obj      Obj      Obj      Obj
//! HSpan        Obj        HSpan  Str  Obj      Obj      Obj      Obj
//! Str          Obj        Str    Str  Obj      Obj      Obj      Obj
//! Feature      Obj        Obj    Obj  Feature  Obj      Obj      Obj
//! Numeric      Obj        Obj    Obj  Obj      Numeric  Obj      Obj
//! Counter      Obj        Obj    Obj  Obj      Obj      Counter  Obj
//! Object       Obj        Obj    Obj  Obj      Obj      Obj      Obj
//! ```
//!
//! The table is symmetric and `Object` absorbs every type, so `join(t, t) == t`
//! and `join(t, Object) == Object` hold for all `t`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionType {
    Predicate,
    HSpan,
    Str,
    Feature,
    Object,
    Numeric,
    Counter,
}

bitflags::bitflags! {
    /// A set of expression types, used for "instance of" checks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KindSet: u8 {
        const PREDICATE = 1 << 0;
        const HSPAN     = 1 << 1;
        const STR       = 1 << 2;
        const FEATURE   = 1 << 3;
        const OBJECT    = 1 << 4;
        const NUMERIC   = 1 << 5;
        const COUNTER   = 1 << 6;

        /// Types `Expression::extract` accepts.
        const EXTRACTABLE = Self::HSPAN.bits() | Self::STR.bits() | Self::COUNTER.bits() | Self::FEATURE.bits();
        /// Types that render to text.
        const TEXTUAL = Self::HSPAN.bits() | Self::STR.bits();
    }
}

impl ExpressionType {
    pub const ALL: [ExpressionType; 7] = [
        ExpressionType::Predicate,
        ExpressionType::HSpan,
        ExpressionType::Str,
        ExpressionType::Feature,
        ExpressionType::Object,
        ExpressionType::Numeric,
        ExpressionType::Counter,
    ];

    /// Select-most-common of two sibling types, `self` first.
    pub fn join(self, other: ExpressionType) -> ExpressionType {
        use ExpressionType::*;
        match (self, other) {
            (Predicate, Predicate) => Predicate,
            (HSpan, HSpan) => HSpan,
            (HSpan, Str) => Str,
            (Str, HSpan | Str) => Str,
            (Feature, Feature) => Feature,
            (Numeric, Numeric) => Numeric,
            (Counter, Counter) => Counter,
            _ => Object,
        }
    }

    /// Fold `types` left to right with [`join`](Self::join), stopping as soon
    /// as `Object` is reached. An empty sequence is `Object`.
    pub fn select_most_common<I>(types: I) -> ExpressionType
    where
        I: IntoIterator<Item = ExpressionType>,
    {
        let mut iter = types.into_iter();
        let Some(mut acc) = iter.next() else {
            return ExpressionType::Object;
        };
        for t in iter {
            if acc == ExpressionType::Object {
                break;
            }
            acc = acc.join(t);
        }
        acc
    }

    pub fn flag(self) -> KindSet {
        match self {
            ExpressionType::Predicate => KindSet::PREDICATE,
            ExpressionType::HSpan => KindSet::HSPAN,
            ExpressionType::Str => KindSet::STR,
            ExpressionType::Feature => KindSet::FEATURE,
            ExpressionType::Object => KindSet::OBJECT,
            ExpressionType::Numeric => KindSet::NUMERIC,
            ExpressionType::Counter => KindSet::COUNTER,
        }
    }

    pub fn is_instance(self, set: KindSet) -> bool {
        set.contains(self.flag())
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpressionType::Predicate => "PREDICATE",
            ExpressionType::HSpan => "HSPAN",
            ExpressionType::Str => "STRING",
            ExpressionType::Feature => "FEATURE",
            ExpressionType::Object => "OBJECT",
            ExpressionType::Numeric => "NUMERIC",
            ExpressionType::Counter => "COUNTER",
        };
        f.write_str(name)
    }
}
