//! Rule sets and their index.
//!
//! A [`RuleSet`] is the unit a caller loads from a program file and runs over
//! many documents. Running is split the same way for every document:
//!
//! 1. **Scan** the document once for its token texts (`trigger.rs`).
//! 2. **Select** the rules whose required words are all present, using the
//!    index built here: rules without required words are always on, the rest
//!    are filed under one of their words.
//! 3. **Execute** the selected rules in program order (`execute.rs`). Program
//!    order matters: a later rule may consume annotations an earlier one wrote.
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `RuleSet::rules`.
//! - Every rule appears either in `always_on` or under exactly one word.

use super::metrics::{RuleReport, RunReport};
use super::rule::Rule;
use super::trigger::TriggerInfo;
use crate::api::{Options, Registry};
use crate::{Document, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// Rule identifier (index into the rules vector).
pub(crate) type RuleId = usize;

#[derive(Default, Debug, Clone)]
pub struct RuleIndex {
    pub always_on: Vec<RuleId>,
    pub by_word: HashMap<String, Vec<RuleId>>,
}

impl RuleIndex {
    fn new(rules: &[Rule]) -> Self {
        let mut index = RuleIndex::default();
        for (id, rule) in rules.iter().enumerate() {
            match rule.trigger().required_literals().iter().next() {
                None => index.always_on.push(id),
                Some(word) => index.by_word.entry(word.clone()).or_default().push(id),
            }
        }
        index
    }

    /// Rules that might fire on a document with these words, in program order.
    fn select(&self, info: &TriggerInfo) -> Vec<RuleId> {
        let mut active = self.always_on.clone();
        for word in &info.words {
            if let Some(ids) = self.by_word.get(word) {
                active.extend(ids);
            }
        }
        active.sort_unstable();
        active
    }
}

/// Compiled rules in program order.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    index: RuleIndex,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        let index = RuleIndex::new(&rules);
        RuleSet { rules, index }
    }

    /// Compile a program; `source` is used in provenance.
    pub fn compile(program: &str, source: &str, registry: &Registry) -> Result<Self> {
        Rule::compile_with(program, source, registry).map(Self::new)
    }

    /// Load and compile a program file. The path as given becomes the source.
    pub fn from_path(path: impl AsRef<Path>, registry: &Registry) -> Result<Self> {
        let path = path.as_ref();
        let program = std::fs::read_to_string(path)?;
        Self::compile(&program, &path.display().to_string(), registry)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn execute(&self, doc: &mut Document) -> RunReport {
        self.execute_with(doc, &Options::default())
    }

    /// Run every rule in program order. Rules the index rules out are reported
    /// as skipped without running their trigger.
    pub fn execute_with(&self, doc: &mut Document, options: &Options) -> RunReport {
        let started = Instant::now();
        let info = TriggerInfo::scan(doc);
        let active = self.index.select(&info);
        log::debug!("[ruleset:select] {} of {} rule(s) active on {}", active.len(), self.rules.len(), doc.id());

        let mut reports = Vec::with_capacity(self.rules.len());
        let mut active = active.into_iter().peekable();
        for (id, rule) in self.rules.iter().enumerate() {
            if active.next_if_eq(&id).is_some() {
                reports.push(rule.run(doc, options, &info));
            } else {
                log::debug!("[rule:skip] {} not selected", rule.provenance());
                reports.push(RuleReport { skipped: true, ..RuleReport::new(rule.provenance()) });
            }
        }
        RunReport { rules: reports, total: started.elapsed() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = "\
[cars]
trigger: 'old' 'car'
annotation: type=VEHICLE

[names]
trigger: #NNP+
annotation: type=NAME

[boats]
trigger: 'boat'
annotation: type=VEHICLE
";

    #[test]
    fn index_files_rules_by_word() {
        let set = RuleSet::compile(PROGRAM, "p", &Registry::default()).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.index.always_on, vec![1]);
        assert_eq!(set.index.by_word.get("boat"), Some(&vec![2]));
    }

    #[test]
    fn unselected_rules_are_reported_as_skipped() {
        let set = RuleSet::compile(PROGRAM, "p", &Registry::default()).unwrap();
        let mut doc = Document::from_tagged("d", "Ann/NNP sold/VBD an/DT old/JJ car/NN");
        let report = set.execute(&mut doc);
        let skipped: Vec<bool> = report.rules.iter().map(|r| r.skipped).collect();
        assert_eq!(skipped, [false, false, true]);
        assert_eq!(report.matches(), 2);
        assert_eq!(doc.annotations_of("VEHICLE").count(), 1);
        assert_eq!(doc.annotations_of("NAME").count(), 1);
    }

    #[test]
    fn missing_program_file_is_an_io_error() {
        let err = RuleSet::from_path("/nonexistent/rules.txt", &Registry::default()).unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
