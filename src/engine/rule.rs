//! Compiled rules and their providers.

use crate::api::Registry;
use crate::{AttrValue, Expression, Result, TokenPattern};
use std::collections::{BTreeMap, BTreeSet};

/// A trigger pattern plus the annotations and relations it produces.
///
/// Rules are built by [`Rule::compile`] from program text and are immutable
/// afterwards; one rule can be executed against any number of documents.
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) name: String,
    pub(crate) source: String,
    pub(crate) trigger: TokenPattern,
    pub(crate) annotations: Vec<AnnotationProvider>,
    pub(crate) relations: Vec<RelationProvider>,
}

/// Creates (or reuses) an annotation for every span bound to `capture`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationProvider {
    pub capture: String,
    pub ann_type: String,
    /// Relation providers that must commit, or the annotation is retracted.
    pub requires: BTreeSet<String>,
    pub attributes: BTreeMap<String, AttrValue>,
}

/// Wires relations between the annotations bound to two captures.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationProvider {
    pub name: String,
    pub rel_type: String,
    pub value: String,
    pub bidirectional: bool,
    /// Relation providers that must have candidate edges for this one to commit.
    pub requires: BTreeSet<String>,
    pub source: Endpoint,
    pub target: Endpoint,
}

/// One end of a relation: a capture group and a projection applied to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub capture: String,
    pub projection: Expression,
}

impl Endpoint {
    /// `{*}=$_`
    pub fn whole_match() -> Result<Self> {
        Ok(Endpoint { capture: crate::pattern::WHOLE_MATCH.to_string(), projection: Expression::compile("$_")? })
    }

    pub fn is_identity(&self) -> bool {
        self.projection.is_identity()
    }
}

impl Rule {
    /// Compile every rule block in `program`. `source` names the program and
    /// becomes the first half of each rule's provenance.
    pub fn compile(program: &str, source: &str) -> Result<Vec<Rule>> {
        Self::compile_with(program, source, &Registry::default())
    }

    pub fn compile_with(program: &str, source: &str, registry: &Registry) -> Result<Vec<Rule>> {
        super::program::parse(program, source, registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provenance recorded on created annotations: `"<file>::<rule>"`.
    pub fn provenance(&self) -> String {
        format!("{}::{}", self.source, self.name)
    }

    pub fn trigger(&self) -> &TokenPattern {
        &self.trigger
    }

    pub fn annotation_providers(&self) -> &[AnnotationProvider] {
        &self.annotations
    }

    pub fn relation_providers(&self) -> &[RelationProvider] {
        &self.relations
    }

    /// True when some annotation provider claims the `*` group.
    pub(crate) fn claims_whole_match(&self) -> bool {
        self.annotations.iter().any(|p| p.capture == crate::pattern::WHOLE_MATCH)
    }
}
