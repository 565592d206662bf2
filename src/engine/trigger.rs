//! Trigger scanning (document pre-classification).
//!
//! Before a rule's pattern is run, the document is checked for the cheap
//! necessary conditions its trigger advertises:
//!
//! - **Words**: every literal the trigger requires (see
//!   [`TokenPattern::required_literals`]) must occur as a token text.
//! - **Annotation types**: every `@TYPE` the trigger must consume has to exist
//!   on the document at the time the rule runs.
//!
//! Words are fixed when the document is built, so they are scanned once per
//! run. Annotation types change as rules create and retract annotations, so
//! they are checked against the live document.
//!
//! This is a *sound* filter: a rule that is skipped could not have matched.

use crate::{Document, TokenPattern};
use std::collections::HashSet;

/// Token texts present in a document.
#[derive(Debug, Clone, Default)]
pub struct TriggerInfo {
    pub words: HashSet<String>,
}

impl TriggerInfo {
    pub fn scan(doc: &Document) -> Self {
        TriggerInfo { words: doc.tokens().map(|t| t.text().to_string()).collect() }
    }

    /// First requirement of `trigger` that `doc` cannot satisfy.
    pub fn missing(&self, trigger: &TokenPattern, doc: &Document) -> Option<String> {
        if let Some(word) = trigger.required_literals().iter().find(|w| !self.words.contains(*w)) {
            return Some(format!("word '{word}'"));
        }
        trigger
            .required_annotation_types()
            .iter()
            .find(|t| doc.annotations_of(t).next().is_none())
            .map(|t| format!("annotation @{t}"))
    }

    /// Cheap pre-check used to index rules: true when the literals are present.
    pub fn has_words(&self, trigger: &TokenPattern) -> bool {
        trigger.required_literals().iter().all(|w| self.words.contains(w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Range;

    #[test]
    fn literals_gate_on_token_texts() {
        let doc = Document::from_whitespace("d", "I bought an old car yesterday");
        let info = TriggerInfo::scan(&doc);
        assert!(info.missing(&TokenPattern::compile("'old' 'car'").unwrap(), &doc).is_none());
        assert_eq!(info.missing(&TokenPattern::compile("'new' 'car'").unwrap(), &doc).as_deref(), Some("word 'new'"));
        // case matters: literals compare exactly
        assert!(!info.has_words(&TokenPattern::compile("'Old'").unwrap()));
    }

    #[test]
    fn annotation_types_are_checked_live() {
        let mut doc = Document::from_whitespace("d", "Ada Lovelace wrote");
        let info = TriggerInfo::scan(&doc);
        let trigger = TokenPattern::compile("@PERSON 'wrote'").unwrap();
        assert_eq!(info.missing(&trigger, &doc).as_deref(), Some("annotation @PERSON"));
        doc.create_annotation("PERSON", Range::new(0, 12), Default::default());
        assert!(info.missing(&trigger, &doc).is_none());
    }
}
