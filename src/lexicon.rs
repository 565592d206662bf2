//! Lexicon interface.
//!
//! Expressions (`%name`) and token patterns (`%name`) test membership against a
//! [`Lexicon`] looked up in the [`Registry`](crate::Registry) at compile time.
//! The compiled artefact keeps an `Arc` to it, so lookups at match time never
//! touch the registry.

use crate::Result;
use crate::document::Span;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A set of words or phrases.
pub trait Lexicon: fmt::Debug + Send + Sync {
    fn contains(&self, text: &str) -> bool;

    /// Longest entry measured in tokens; bounds multi-token lookups.
    fn max_tokens(&self) -> usize {
        1
    }

    fn contains_span(&self, span: &Span<'_>) -> bool {
        self.contains(span.text())
    }
}

/// Hash-set lexicon with whitespace normalisation and optional case folding.
#[derive(Debug, Clone, Default)]
pub struct WordList {
    entries: HashSet<String>,
    case_sensitive: bool,
    max_tokens: usize,
}

impl WordList {
    /// Case-insensitive word list.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(entries, false)
    }

    pub fn case_sensitive<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(entries, true)
    }

    fn build<I, S>(entries: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = WordList { entries: HashSet::new(), case_sensitive, max_tokens: 1 };
        for entry in entries {
            let key = list.normalize(entry.as_ref());
            if key.is_empty() {
                continue;
            }
            list.max_tokens = list.max_tokens.max(key.split(' ').count());
            list.entries.insert(key);
        }
        list
    }

    /// One entry per line; blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn normalize(&self, text: &str) -> String {
        let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if self.case_sensitive { joined } else { joined.to_lowercase() }
    }
}

impl Lexicon for WordList {
    fn contains(&self, text: &str) -> bool {
        self.entries.contains(&self.normalize(text))
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}

/// A named handle to a registered lexicon.
#[derive(Clone)]
pub struct LexiconRef {
    name: String,
    lexicon: Arc<dyn Lexicon>,
}

impl LexiconRef {
    pub fn new(name: impl Into<String>, lexicon: Arc<dyn Lexicon>) -> Self {
        LexiconRef { name: name.into(), lexicon }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lexicon(&self) -> &dyn Lexicon {
        self.lexicon.as_ref()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.lexicon.contains(text)
    }

    pub fn contains_span(&self, span: &Span<'_>) -> bool {
        self.lexicon.contains_span(span)
    }

    pub fn max_tokens(&self) -> usize {
        self.lexicon.max_tokens().max(1)
    }
}

impl PartialEq for LexiconRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for LexiconRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_lists_fold_case_and_whitespace() {
        let list = WordList::parse("# vehicles\nold car\n\nTruck\n");
        assert_eq!(list.len(), 2);
        assert!(list.contains("OLD   car"));
        assert!(list.contains("truck"));
        assert_eq!(list.max_tokens(), 2);
    }

    #[test]
    fn case_sensitive_lists_keep_case() {
        let list = WordList::case_sensitive(["Apple"]);
        assert!(list.contains("Apple"));
        assert!(!list.contains("apple"));
    }
}
