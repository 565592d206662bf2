//! Rule execution reports.
//!
//! Every execution returns a report; collecting it costs a few counters and
//! one `Instant` per rule.

use std::fmt;
use std::time::Duration;

/// What one rule did to one document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RuleReport {
    /// Provenance of the rule (`"<file>::<rule>"`).
    pub rule: String,
    pub matches: usize,
    pub annotations_created: usize,
    pub annotations_reused: usize,
    pub annotations_retracted: usize,
    /// New edges written to the document.
    pub relations_committed: usize,
    /// Relation providers whose edges were withheld because a prerequisite had
    /// no candidate pairing.
    pub relations_blocked: usize,
    /// The trigger could not match, so the pattern was never run.
    pub skipped: bool,
    pub elapsed: Duration,
}

impl RuleReport {
    pub(crate) fn new(rule: String) -> Self {
        RuleReport { rule, ..RuleReport::default() }
    }

    /// Annotations created and not retracted.
    pub fn annotations_kept(&self) -> usize {
        self.annotations_created - self.annotations_retracted
    }
}

impl fmt::Display for RuleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            return write!(f, "{}: skipped", self.rule);
        }
        write!(
            f,
            "{}: {} match(es), {} created, {} reused, {} retracted, {} relation(s) ({:.2?})",
            self.rule,
            self.matches,
            self.annotations_created,
            self.annotations_reused,
            self.annotations_retracted,
            self.relations_committed,
            self.elapsed
        )
    }
}

/// Reports for a whole rule set, in execution order.
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    pub rules: Vec<RuleReport>,
    /// Total elapsed time including trigger scanning.
    pub total: Duration,
}

impl RunReport {
    pub fn matches(&self) -> usize {
        self.rules.iter().map(|r| r.matches).sum()
    }

    pub fn annotations_kept(&self) -> usize {
        self.rules.iter().map(RuleReport::annotations_kept).sum()
    }

    pub fn relations_committed(&self) -> usize {
        self.rules.iter().map(|r| r.relations_committed).sum()
    }

    pub fn skipped(&self) -> usize {
        self.rules.iter().filter(|r| r.skipped).count()
    }
}
