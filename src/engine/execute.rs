//! Rule execution.
//!
//! Every trigger match is applied in four steps before the next match is
//! searched, so annotations written for match N are visible to match N+1:
//!
//! ```text
//!  match ──▶ 1. materialize   annotation providers create or reuse annotations
//!        ──▶ 2. candidates    relation providers pair source x target endpoints
//!        ──▶ 3. commit        providers whose `requires` all have candidates
//!        ──▶ 4. retract       annotations whose `requires` did not all commit
//! ```
//!
//! Step 3 checks prerequisites against the *candidate* keys of step 2, while
//! step 4 checks them against what step 3 actually committed. Retraction only
//! touches annotations this match created.

use super::metrics::RuleReport;
use super::rule::{Endpoint, Rule};
use super::trigger::TriggerInfo;
use crate::api::Options;
use crate::pattern::{Match, WHOLE_MATCH};
use crate::{AnnotationId, Document, Range, Relation, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// An annotation produced in step 1, with the provider that produced it.
struct Materialized {
    provider: usize,
    id: AnnotationId,
    created: bool,
}

impl Rule {
    /// Run the rule over the whole document.
    pub fn execute(&self, doc: &mut Document) -> RuleReport {
        self.execute_with(doc, &Options::default())
    }

    pub fn execute_with(&self, doc: &mut Document, options: &Options) -> RuleReport {
        let trigger = TriggerInfo::scan(doc);
        self.run(doc, options, &trigger)
    }

    pub(crate) fn run(&self, doc: &mut Document, options: &Options, trigger: &TriggerInfo) -> RuleReport {
        let started = Instant::now();
        let mut report = RuleReport::new(self.provenance());

        if let Some(missing) = trigger.missing(&self.trigger, doc) {
            log::debug!("[rule:skip] {} needs {missing}", report.rule);
            report.skipped = true;
            report.elapsed = started.elapsed();
            return report;
        }

        for scope in scopes(doc, options) {
            let mut from = scope.start;
            while let Some(found) = self.trigger.find_at(doc, scope.clone(), from) {
                from = found.tokens.end;
                report.matches += 1;
                log::debug!("[rule:match] {} {:?} {:?}", report.rule, found.tokens, found.text(doc));
                self.apply(doc, &found, &mut report);
            }
        }

        report.elapsed = started.elapsed();
        report
    }

    fn apply(&self, doc: &mut Document, found: &Match, report: &mut RuleReport) {
        let (materialized, mut by_capture) = self.materialize(doc, found, report);
        if !self.claims_whole_match() {
            let tokens = found.tokens.clone().filter_map(|i| doc.token(i)?.annotation_id()).collect();
            by_capture.insert(WHOLE_MATCH, tokens);
        }

        // step 2: candidate edges, keyed by provider name
        let mut candidates: BTreeMap<&str, Vec<(AnnotationId, Relation)>> = BTreeMap::new();
        for provider in &self.relations {
            let sources = resolve(doc, found, &by_capture, &provider.source);
            let targets = resolve(doc, found, &by_capture, &provider.target);
            let mut edges = Vec::new();
            for &source in &sources {
                for &target in &targets {
                    if source == target {
                        continue;
                    }
                    edges.push((source, Relation::new(&provider.rel_type, &provider.value, target)));
                    if provider.bidirectional {
                        edges.push((target, Relation::new(&provider.rel_type, &provider.value, source)));
                    }
                }
            }
            if !edges.is_empty() {
                candidates.insert(provider.name.as_str(), edges);
            }
        }

        // step 3: commit when every prerequisite has candidates
        let mut committed: BTreeSet<&str> = BTreeSet::new();
        for provider in &self.relations {
            let Some(edges) = candidates.get(provider.name.as_str()) else {
                continue;
            };
            if let Some(absent) = provider.requires.iter().find(|r| !candidates.contains_key(r.as_str())) {
                log::debug!("[rule:commit] {} withholds '{}': no candidates for '{absent}'", report.rule, provider.name);
                report.relations_blocked += 1;
                continue;
            }
            let mut wrote = false;
            for (source, relation) in edges {
                if doc.add_relation(*source, relation.clone()) {
                    report.relations_committed += 1;
                    wrote = true;
                } else if doc.outgoing(*source, Some(relation.rel_type.as_str())).contains(&relation) {
                    wrote = true;
                }
            }
            if wrote {
                log::debug!("[rule:commit] {} commits '{}' ({} edge(s))", report.rule, provider.name, edges.len());
                committed.insert(provider.name.as_str());
            }
        }

        // step 4: retract what lost a prerequisite
        for item in materialized {
            let provider = &self.annotations[item.provider];
            if provider.requires.iter().all(|r| committed.contains(r.as_str())) {
                continue;
            }
            if !item.created {
                log::debug!("[rule:retract] {} keeps reused {} {}", report.rule, provider.ann_type, item.id);
                continue;
            }
            if doc.remove_annotation(item.id).is_some() {
                log::debug!("[rule:retract] {} removes {} {}", report.rule, provider.ann_type, item.id);
                report.annotations_retracted += 1;
            }
        }
    }

    /// Step 1: create or reuse one annotation per captured span.
    fn materialize<'r>(
        &'r self,
        doc: &mut Document,
        found: &Match,
        report: &mut RuleReport,
    ) -> (Vec<Materialized>, BTreeMap<&'r str, Vec<AnnotationId>>) {
        let mut materialized = Vec::new();
        let mut by_capture: BTreeMap<&str, Vec<AnnotationId>> = BTreeMap::new();
        for (index, provider) in self.annotations.iter().enumerate() {
            for &range in found.group(&provider.capture) {
                let (id, created) = match doc.find_annotation(&provider.ann_type, range, &provider.attributes) {
                    Some(id) => {
                        report.annotations_reused += 1;
                        (id, false)
                    }
                    None => {
                        let id = doc.create_annotation(&provider.ann_type, range, provider.attributes.clone());
                        doc.set_provenance(id, &report.rule);
                        report.annotations_created += 1;
                        (id, true)
                    }
                };
                let ids = by_capture.entry(provider.capture.as_str()).or_default();
                if !ids.contains(&id) {
                    ids.push(id);
                }
                materialized.push(Materialized { provider: index, id, created });
            }
        }
        (materialized, by_capture)
    }
}

/// Token windows to search: the whole document, or each scope annotation.
fn scopes(doc: &Document, options: &Options) -> Vec<std::ops::Range<usize>> {
    let Some(scope) = options.scope.as_deref() else {
        return vec![0..doc.token_count()];
    };
    let mut ranges: Vec<Range> = doc.annotations_of(scope).map(|a| a.range()).collect();
    ranges.sort_by_key(|r| (r.start, r.end));
    ranges.into_iter().map(|r| doc.token_range(r)).filter(|r| !r.is_empty()).collect()
}

/// Annotations for one endpoint of a relation provider.
fn resolve(
    doc: &Document,
    found: &Match,
    by_capture: &BTreeMap<&str, Vec<AnnotationId>>,
    endpoint: &Endpoint,
) -> Vec<AnnotationId> {
    let bases = match by_capture.get(endpoint.capture.as_str()) {
        Some(ids) => ids.clone(),
        None => found.group(&endpoint.capture).iter().flat_map(|range| annotations_at(doc, *range)).collect(),
    };
    if endpoint.is_identity() {
        return bases;
    }

    let mut projected = Vec::new();
    for id in bases {
        let Some(span) = doc.annotation_span(id) else {
            continue;
        };
        let value = endpoint.projection.apply_as_object(&Value::Span(span));
        for item in flatten(value) {
            let Value::Span(target) = item else {
                continue;
            };
            let ids = match target.annotation_id() {
                Some(id) => vec![id],
                None => annotations_at(doc, target.range()),
            };
            for id in ids {
                if !projected.contains(&id) {
                    projected.push(id);
                }
            }
        }
    }
    projected
}

fn flatten(value: Value<'_>) -> Vec<Value<'_>> {
    match value {
        Value::List(items) => items.into_iter().flat_map(flatten).collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Annotations standing for `range`: a token with exactly this range, else any
/// annotation with exactly this range, else the tokens it covers.
fn annotations_at(doc: &Document, range: Range) -> Vec<AnnotationId> {
    let tokens = doc.token_range(range);
    if let Some(token) = tokens.clone().filter_map(|i| doc.token(i)).find(|t| t.range() == range) {
        return token.annotation_id().into_iter().collect();
    }
    if let Some(ann) = doc.annotations().find(|a| a.range() == range) {
        return vec![ann.id()];
    }
    tokens.filter_map(|i| doc.token(i)?.annotation_id()).collect()
}
