//! Rule engine.
//!
//! This module is the entry point for declarative rules: program text is
//! compiled into [`Rule`]s, which are grouped into a [`RuleSet`] and executed
//! against documents.
//!
//! ## How the parts work together
//!
//! ```text
//! program text ── program::parse ──▶ Vec<Rule>          (program.rs, rule.rs)
//!                                        │
//!                                 RuleSet::new           (compiled_rules.rs)
//!                                        │  index by required words
//!                                        ▼
//! document ── TriggerInfo::scan ──▶ select active rules  (trigger.rs)
//!                                        │
//!                                        ▼  per rule, per match, in order
//!                          Rule::run                      (execute.rs)
//!                            1. materialize annotations
//!                            2. candidate relation edges
//!                            3. commit satisfied relations
//!                            4. retract unsatisfied annotations
//!                                        │
//!                                        ▼
//!                          RuleReport / RunReport         (metrics.rs)
//! ```
//!
//! Matches are processed strictly in document order and each match's writes
//! are visible to the search for the next one, which is why `execute` takes
//! `&mut Document` and never runs matches in parallel.
//!
//! ## Debugging
//!
//! Every decision is logged at `debug` level through the `log` facade with a
//! bracketed tag (`[rule:skip]`, `[rule:match]`, `[rule:commit]`,
//! `[rule:retract]`). The CLI prints them with `--debug`.

#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/execute.rs"]
mod execute;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/program.rs"]
mod program;
#[path = "engine/rule.rs"]
mod rule;
#[path = "engine/trigger.rs"]
mod trigger;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub use compiled_rules::{RuleIndex, RuleSet};
pub use metrics::{RuleReport, RunReport};
pub use rule::{AnnotationProvider, Endpoint, RelationProvider, Rule};
pub use trigger::TriggerInfo;
