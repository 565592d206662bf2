//! Backtracking matcher.
//!
//! Matching is continuation-passing over token indices: every node gets the
//! position to start at and a continuation `k(end, captures)` for the rest of
//! the pattern. A node succeeds when some way of matching it makes `k` succeed,
//! so alternation and greedy repetition backtrack naturally.
//!
//! ```text
//!   Seq[a, b]   : a(i, |j| b(j, k))
//!   Alt[a, b]   : a(i, k) || b(i, k)
//!   Repeat{a}   : a(i, |j| Repeat{a}(j, k)) || k(i)      (greedy)
//!   Group{a}    : a(i, |j| { push(i..j); k(j) || { pop(); false } })
//! ```
//!
//! Repetition is the one node that is not nested calls: a body matches the same
//! way whatever follows it, so every way of matching one iteration is listed up
//! front and the greedy search runs on an explicit stack. Call depth therefore
//! depends on the pattern, never on how many tokens a repetition consumes.
//!
//! Captures are a trail of `(group, start, end)` entries. A failing call leaves
//! the trail exactly as it found it.

use super::parser::{AttrTest, Cond, Direction, Node};
use crate::document::{LEMMA, TAG};
use crate::{AttrValue, Document, Range, Span};

/// `(group index, first token, end token)`.
pub(crate) type Capture = (usize, usize, usize);

type Cont<'k> = &'k mut dyn FnMut(usize, &mut Vec<Capture>) -> bool;

pub(crate) struct Run<'d> {
    pub doc: &'d Document,
    /// Token indices the match may use; `^` anchors to `lo`.
    pub lo: usize,
    pub hi: usize,
}

impl<'d> Run<'d> {
    /// Match `root` starting exactly at `start`; returns the end and captures
    /// of the first non-empty match.
    pub(crate) fn match_at(&self, root: &Node, start: usize) -> Option<(usize, Vec<Capture>)> {
        let mut caps = Vec::new();
        let mut end = start;
        let found = self.m(root, start, &mut caps, &mut |j, _| {
            end = j;
            j > start
        });
        found.then_some((end, caps))
    }

    fn token(&self, i: usize) -> Option<Span<'d>> {
        if i < self.hi { self.doc.token(i) } else { None }
    }

    fn m(&self, node: &Node, i: usize, caps: &mut Vec<Capture>, k: Cont<'_>) -> bool {
        match node {
            Node::Token(cond) => self.token(i).is_some_and(|t| test(cond, &t)) && k(i + 1, caps),
            Node::Lexicon(lexicon) => {
                let longest = lexicon.max_tokens().min(self.hi.saturating_sub(i));
                (1..=longest).rev().any(|n| {
                    let Some(range) = self.doc.token_span_range(i..i + n) else {
                        return false;
                    };
                    lexicon.contains_span(&self.doc.span(range)) && k(i + n, caps)
                })
            }
            Node::Annotation { ann_type, nested } => {
                let Some(token) = self.token(i) else {
                    return false;
                };
                let mut ends: Vec<usize> = Vec::new();
                for ann in token.annotations(ann_type) {
                    if !covers(ann.range(), token.range()) || !nested.as_ref().is_none_or(|c| test(c, &ann)) {
                        continue;
                    }
                    let end = ann.token_range().end;
                    if end <= self.hi && end > i && !ends.contains(&end) {
                        ends.push(end);
                    }
                }
                ends.into_iter().any(|end| k(end, caps))
            }
            Node::Seq(items) => self.seq(items, i, caps, k),
            Node::Alt(alts) => alts.iter().any(|alt| self.m(alt, i, caps, k)),
            Node::And(operands) => match operands.split_first() {
                Some((first, rest)) => self.m(first, i, caps, &mut |j, caps| self.same_extent(rest, i, j, caps, k)),
                None => k(i, caps),
            },
            Node::Repeat { node, min, max } => self.repeat(node, *min, *max, i, caps, k),
            Node::Group { index, node } => self.m(node, i, caps, &mut |j, caps| {
                caps.push((*index, i, j));
                if k(j, caps) {
                    return true;
                }
                caps.pop();
                false
            }),
            Node::Look { look, node, width } => {
                let mut scratch = Vec::new();
                let holds = if look.is_behind() {
                    let from = width.map_or(self.lo, |w| i.saturating_sub(w).max(self.lo));
                    (from..=i).rev().any(|s| self.m(node, s, &mut scratch, &mut |e, _| e == i))
                } else {
                    self.m(node, i, &mut scratch, &mut |_, _| true)
                };
                holds != look.is_negated() && k(i, caps)
            }
            Node::Start => i == self.lo && k(i, caps),
            Node::NotStart => i != self.lo && k(i, caps),
        }
    }

    fn seq(&self, items: &[Node], i: usize, caps: &mut Vec<Capture>, k: Cont<'_>) -> bool {
        match items.split_first() {
            None => k(i, caps),
            Some((first, rest)) => self.m(first, i, caps, &mut |j, caps| self.seq(rest, j, caps, k)),
        }
    }

    /// Every node in `rest` must match `start..end` exactly.
    fn same_extent(&self, rest: &[Node], start: usize, end: usize, caps: &mut Vec<Capture>, k: Cont<'_>) -> bool {
        match rest.split_first() {
            None => k(end, caps),
            Some((first, more)) => self.m(first, start, caps, &mut |j, caps| {
                j == end && self.same_extent(more, start, end, caps, k)
            }),
        }
    }

    /// Greedy repetition over an explicit stack of iterations.
    ///
    /// Each frame is one point reached after `count` iterations. Its remaining
    /// ways to match one more iteration are tried first, deepest frame first;
    /// once they are exhausted the frame hands its position to `k`.
    fn repeat(
        &self,
        node: &Node,
        min: usize,
        max: Option<usize>,
        i: usize,
        caps: &mut Vec<Capture>,
        k: Cont<'_>,
    ) -> bool {
        let base = caps.len();
        let mut stack = vec![Iteration { pos: i, count: 0, trail: base, next: self.iterations(node, min, max, 0, i) }];
        while let Some(top) = stack.last_mut() {
            if let Some((end, added)) = top.next.next() {
                caps.truncate(top.trail);
                caps.extend(added);
                let count = top.count + 1;
                let next = self.iterations(node, min, max, count, end);
                stack.push(Iteration { pos: end, count, trail: caps.len(), next });
                continue;
            }
            caps.truncate(top.trail);
            if top.count >= min && k(top.pos, caps) {
                return true;
            }
            stack.pop();
        }
        caps.truncate(base);
        false
    }

    /// Every way `node` can match once at `i`, as `(end, captures added)`.
    fn iterations(
        &self,
        node: &Node,
        min: usize,
        max: Option<usize>,
        count: usize,
        i: usize,
    ) -> std::vec::IntoIter<(usize, Vec<Capture>)> {
        let mut found = Vec::new();
        if max.is_none_or(|max| count < max) {
            let mut scratch = Vec::new();
            self.m(node, i, &mut scratch, &mut |j, added| {
                // an empty iteration only counts towards the minimum
                if j != i || count < min {
                    found.push((j, added.clone()));
                }
                false
            });
        }
        found.into_iter()
    }
}

/// One point of a repetition: `count` iterations done, ending at `pos`.
struct Iteration {
    pos: usize,
    count: usize,
    /// Capture trail length on reaching `pos`.
    trail: usize,
    next: std::vec::IntoIter<(usize, Vec<Capture>)>,
}

fn covers(outer: Range, inner: Range) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

/// Evaluate a single-span condition.
pub(crate) fn test(cond: &Cond, span: &Span<'_>) -> bool {
    match cond {
        Cond::Any => true,
        Cond::Literal(text) => span.text() == text,
        Cond::Regex(regex) => regex.is_match(span.text()),
        Cond::Tag(tag) => span.is_instance_of(tag),
        Cond::HasAttr(name) => attribute_text(span, name).is_some(),
        Cond::Attr { name, test: check } => match check {
            AttrTest::Str(expected) => attribute_text(span, name).is_some_and(|v| v == *expected),
            AttrTest::Regex(regex) => attribute_text(span, name).is_some_and(|v| regex.is_match(&v)),
            AttrTest::Number(expected) => match span.attribute(name) {
                Some(AttrValue::Number(n)) => n == expected,
                Some(AttrValue::Str(s)) => s.trim().parse::<f64>().is_ok_and(|n| n == *expected),
                _ => false,
            },
        },
        Cond::Lexicon(lexicon) => lexicon.contains_span(span),
        Cond::Annotation { ann_type, nested } => span
            .annotations(ann_type)
            .iter()
            .any(|ann| covers(ann.range(), span.range()) && nested.as_ref().is_none_or(|c| test(c, ann))),
        Cond::Relation { direction, rel_type, value, nested } => {
            let rel_type = (!rel_type.is_empty()).then_some(rel_type.as_str());
            let edges = match direction {
                Direction::Outgoing => span.outgoing(rel_type),
                Direction::Incoming => span.incoming(rel_type),
            };
            edges.iter().any(|(relation, end)| {
                value.as_ref().is_none_or(|v| *v == relation.value) && nested.as_ref().is_none_or(|c| test(c, end))
            })
        }
        Cond::And(conds) => conds.iter().all(|c| test(c, span)),
        Cond::Or(conds) => conds.iter().any(|c| test(c, span)),
        Cond::Not(cond) => !test(cond, span),
    }
}

fn attribute_text(span: &Span<'_>, name: &str) -> Option<String> {
    match name {
        LEMMA => Some(span.lemma()),
        TAG => span.tag().map(str::to_string),
        _ => span.attribute(name).map(|v| v.to_string()),
    }
}
