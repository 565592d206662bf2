//! Static facts about a compiled pattern, used to skip rules cheaply and to
//! bound lookbehind.
//!
//! The required-set functions under-approximate: a literal or annotation type
//! is reported only when every possible match needs it. Lookarounds and
//! negations never contribute.

use super::parser::{Cond, Node};
use std::collections::BTreeSet;

/// Token texts that every match must contain.
pub(crate) fn required_literals(node: &Node) -> BTreeSet<String> {
    required(node, &|node| match node {
        Node::Token(cond) => Some(cond_literals(cond)),
        _ => None,
    })
}

/// Annotation types (`@TYPE` atoms) that every match must cover.
pub(crate) fn required_annotation_types(node: &Node) -> BTreeSet<String> {
    required(node, &|node| match node {
        Node::Annotation { ann_type, .. } => Some(BTreeSet::from([ann_type.clone()])),
        Node::Token(_) => Some(BTreeSet::new()),
        _ => None,
    })
}

/// Fold `leaf` over the mandatory structure of `node`: sequences and
/// conjunctions take the union, alternatives the intersection.
fn required(node: &Node, leaf: &dyn Fn(&Node) -> Option<BTreeSet<String>>) -> BTreeSet<String> {
    if let Some(found) = leaf(node) {
        return found;
    }
    match node {
        Node::Seq(items) | Node::And(items) => items.iter().flat_map(|item| required(item, leaf)).collect(),
        Node::Alt(alts) => intersect(alts.iter().map(|alt| required(alt, leaf))),
        Node::Repeat { node, min, .. } if *min > 0 => required(node, leaf),
        Node::Group { node, .. } => required(node, leaf),
        _ => BTreeSet::new(),
    }
}

/// Most tokens a match of `node` can span; `None` when unbounded.
pub(crate) fn max_width(node: &Node) -> Option<usize> {
    match node {
        Node::Token(_) => Some(1),
        Node::Lexicon(lexicon) => Some(lexicon.max_tokens()),
        Node::Annotation { .. } => None,
        Node::Seq(items) => items.iter().try_fold(0usize, |sum, item| sum.checked_add(max_width(item)?)),
        Node::Alt(alts) => alts.iter().try_fold(0usize, |widest, alt| Some(widest.max(max_width(alt)?))),
        // operands share one extent, so the narrowest bound holds for all
        Node::And(operands) => operands.iter().filter_map(max_width).min(),
        Node::Repeat { node, max, .. } => match (max_width(node)?, max) {
            (0, _) => Some(0),
            (width, Some(max)) => width.checked_mul(*max),
            (_, None) => None,
        },
        Node::Group { node, .. } => max_width(node),
        Node::Look { .. } | Node::Start | Node::NotStart => Some(0),
    }
}

fn cond_literals(cond: &Cond) -> BTreeSet<String> {
    match cond {
        Cond::Literal(text) => BTreeSet::from([text.clone()]),
        Cond::And(conds) => conds.iter().flat_map(cond_literals).collect(),
        Cond::Or(conds) => intersect(conds.iter().map(cond_literals)),
        _ => BTreeSet::new(),
    }
}

fn intersect(mut sets: impl Iterator<Item = BTreeSet<String>>) -> BTreeSet<String> {
    let Some(first) = sets.next() else {
        return BTreeSet::new();
    };
    sets.fold(first, |acc, set| acc.intersection(&set).cloned().collect())
}
