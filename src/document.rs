//! In-memory span model.
//!
//! A [`Document`] owns its text, an arena of [`Annotation`]s and a relation
//! store. Tokens are ordinary annotations of type [`TOKEN`] whose order is fixed
//! when the document is built; everything else (sentences, entities, rule
//! output) is created and removed through the mutators below.
//!
//! ```text
//! text:        "John met Sally"
//! annotations: #0 token 0..4   #1 token 5..8   #2 token 9..14   #3 ENTITY 0..4
//! tokens:      [#0, #1, #2]
//! relations:   #0 -> [dependency:nsubj -> #1]
//! ```
//!
//! Relations are kept as an adjacency list keyed by the source annotation id.
//! Endpoints are opaque [`AnnotationId`]s, never references, so removing an
//! annotation only has to drop the edges that mention it.

mod pos;
mod span;

pub use pos::ANY;
pub use span::Span;

pub(crate) use pos::is_instance_of;

use crate::{Range, format_number};
use std::collections::BTreeMap;
use std::fmt;

/// Annotation type of the token sequence.
pub const TOKEN: &str = "token";
/// Relation type used by [`Document::add_dependency`].
pub const DEPENDENCY: &str = "dependency";
/// Attribute holding a part-of-speech or entity tag.
pub const TAG: &str = "TAG";
/// Attribute holding a lemma.
pub const LEMMA: &str = "LEMMA";

/// Opaque arena index of an annotation. Ids are never reused within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(usize);

impl AnnotationId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Attribute value stored on an annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Number(f64),
    Bool(bool),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Number(n) => f.write_str(&format_number(*n)),
            AttrValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Number(value as f64)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// A typed span stored on a document.
#[derive(Debug, Clone)]
pub struct Annotation {
    id: AnnotationId,
    ann_type: String,
    range: Range,
    attributes: BTreeMap<String, AttrValue>,
    provenance: Option<String>,
}

impl Annotation {
    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn ann_type(&self) -> &str {
        &self.ann_type
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn tag(&self) -> Option<&str> {
        self.attribute(TAG).and_then(AttrValue::as_str)
    }

    /// `"<file>::<rule>"` for annotations created by a rule.
    pub fn provenance(&self) -> Option<&str> {
        self.provenance.as_deref()
    }
}

/// A directed, typed, valued edge to another annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relation {
    pub rel_type: String,
    pub value: String,
    pub target: AnnotationId,
}

impl Relation {
    pub fn new(rel_type: impl Into<String>, value: impl Into<String>, target: AnnotationId) -> Self {
        Relation { rel_type: rel_type.into(), value: value.into(), target }
    }
}

/// Description of one token for [`Document::from_tokens`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenSpec {
    pub text: String,
    pub tag: Option<String>,
    pub lemma: Option<String>,
}

impl TokenSpec {
    pub fn new(text: impl Into<String>) -> Self {
        TokenSpec { text: text.into(), tag: None, lemma: None }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn lemma(mut self, lemma: impl Into<String>) -> Self {
        self.lemma = Some(lemma.into());
        self
    }

    /// Parse `word`, `word/TAG` or `word/TAG/lemma`.
    pub fn parse_tagged(input: &str) -> Self {
        let mut parts = input.splitn(3, '/');
        let word = parts.next().unwrap_or_default();
        if word.is_empty() {
            return TokenSpec::new(input);
        }
        let mut spec = TokenSpec::new(word);
        if let Some(tag) = parts.next().filter(|t| !t.is_empty()) {
            spec = spec.tag(tag);
        }
        if let Some(lemma) = parts.next().filter(|l| !l.is_empty()) {
            spec = spec.lemma(lemma);
        }
        spec
    }
}

/// Text plus annotations, tokens and relations.
#[derive(Debug, Clone)]
pub struct Document {
    id: String,
    text: String,
    annotations: Vec<Option<Annotation>>,
    tokens: Vec<AnnotationId>,
    token_ranges: Vec<Range>,
    relations: BTreeMap<AnnotationId, Vec<Relation>>,
}

impl Document {
    /// Create a document without tokens.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            text: text.into(),
            annotations: Vec::new(),
            tokens: Vec::new(),
            token_ranges: Vec::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Build a document whose text is the token texts joined by single spaces.
    pub fn from_tokens<I>(id: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = TokenSpec>,
    {
        let specs: Vec<TokenSpec> = tokens.into_iter().collect();
        let mut text = String::new();
        let mut ranges = Vec::with_capacity(specs.len());
        for spec in &specs {
            if !text.is_empty() {
                text.push(' ');
            }
            let start = text.len();
            text.push_str(&spec.text);
            ranges.push(Range::new(start, text.len()));
        }

        let mut doc = Document::new(id, text);
        for (spec, range) in specs.into_iter().zip(ranges) {
            doc.push_token(range, spec.tag, spec.lemma);
        }
        doc
    }

    /// Build a document from whitespace separated `word/TAG/lemma` tokens.
    pub fn from_tagged(id: impl Into<String>, tagged: &str) -> Self {
        Self::from_tokens(id, tagged.split_whitespace().map(TokenSpec::parse_tagged))
    }

    /// Build a document from raw text, one token per whitespace separated word.
    pub fn from_whitespace(id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut doc = Document::new(id, text);
        let ranges: Vec<Range> =
            crate::regex!(r"\S+").find_iter(&doc.text).map(|m| Range::new(m.start(), m.end())).collect();
        for range in ranges {
            doc.push_token(range, None, None);
        }
        doc
    }

    fn push_token(&mut self, range: Range, tag: Option<String>, lemma: Option<String>) {
        let mut attributes = BTreeMap::new();
        if let Some(tag) = tag {
            attributes.insert(TAG.to_string(), AttrValue::Str(tag));
        }
        if let Some(lemma) = lemma {
            attributes.insert(LEMMA.to_string(), AttrValue::Str(lemma));
        }
        let id = self.create_annotation(TOKEN, range, attributes);
        self.tokens.push(id);
        self.token_ranges.push(range);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// The token at `index` as an annotation-backed span.
    pub fn token(&self, index: usize) -> Option<Span<'_>> {
        let id = *self.tokens.get(index)?;
        Some(Span::new(self, self.token_ranges[index], Some(id)))
    }

    pub fn tokens(&self) -> impl Iterator<Item = Span<'_>> + '_ {
        (0..self.tokens.len()).filter_map(move |i| self.token(i))
    }

    /// Indices of the tokens overlapping `range`.
    pub fn token_range(&self, range: Range) -> std::ops::Range<usize> {
        let first = self.token_ranges.partition_point(|t| t.end <= range.start);
        let last = self.token_ranges.partition_point(|t| t.start < range.end);
        if first >= last { first..first } else { first..last }
    }

    /// Byte range covered by the tokens `start..end` (token indices).
    pub fn token_span_range(&self, tokens: std::ops::Range<usize>) -> Option<Range> {
        if tokens.is_empty() {
            return None;
        }
        let first = self.token_ranges.get(tokens.start)?;
        let last = self.token_ranges.get(tokens.end - 1)?;
        Some(Range::new(first.start, last.end))
    }

    pub(crate) fn token_index_of(&self, id: AnnotationId) -> Option<usize> {
        let range = self.annotation(id)?.range;
        let idx = self.token_ranges.partition_point(|t| t.start < range.start);
        (self.tokens.get(idx) == Some(&id)).then_some(idx)
    }

    pub fn is_token(&self, id: AnnotationId) -> bool {
        self.token_index_of(id).is_some()
    }

    /// A detached span over `range`.
    pub fn span(&self, range: Range) -> Span<'_> {
        Span::new(self, range, None)
    }

    pub fn annotation_span(&self, id: AnnotationId) -> Option<Span<'_>> {
        let ann = self.annotation(id)?;
        Some(Span::new(self, ann.range, Some(id)))
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(id.0).and_then(Option::as_ref)
    }

    /// Every live annotation, in creation order.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.annotations.iter().filter_map(Option::as_ref)
    }

    pub fn annotations_of<'a>(&'a self, ann_type: &str) -> impl Iterator<Item = &'a Annotation> {
        self.annotations().filter(move |a| a.ann_type == ann_type)
    }

    /// Annotations of `ann_type` overlapping `range`, ordered by start and then
    /// longest first.
    pub fn annotations_overlapping(&self, ann_type: &str, range: Range) -> Vec<&Annotation> {
        let mut found: Vec<&Annotation> =
            self.annotations().filter(|a| a.ann_type == ann_type && a.range.overlaps(&range)).collect();
        found.sort_by(|a, b| a.range.start.cmp(&b.range.start).then(b.range.end.cmp(&a.range.end)));
        found
    }

    /// An annotation with exactly this type, range and attribute set.
    pub fn find_annotation(
        &self,
        ann_type: &str,
        range: Range,
        attributes: &BTreeMap<String, AttrValue>,
    ) -> Option<AnnotationId> {
        self.annotations_of(ann_type).find(|a| a.range == range && &a.attributes == attributes).map(|a| a.id)
    }

    pub fn create_annotation(
        &mut self,
        ann_type: impl Into<String>,
        range: Range,
        attributes: BTreeMap<String, AttrValue>,
    ) -> AnnotationId {
        let id = AnnotationId(self.annotations.len());
        self.annotations.push(Some(Annotation { id, ann_type: ann_type.into(), range, attributes, provenance: None }));
        id
    }

    pub fn set_provenance(&mut self, id: AnnotationId, provenance: impl Into<String>) {
        if let Some(Some(ann)) = self.annotations.get_mut(id.0) {
            ann.provenance = Some(provenance.into());
        }
    }

    /// Remove an annotation together with every edge that mentions it.
    ///
    /// Tokens cannot be removed; the token sequence is fixed at construction.
    pub fn remove_annotation(&mut self, id: AnnotationId) -> Option<Annotation> {
        if self.is_token(id) {
            log::warn!("[document:remove] refusing to remove token {id} from {}", self.id);
            return None;
        }
        let removed = self.annotations.get_mut(id.0)?.take()?;
        self.relations.remove(&id);
        for edges in self.relations.values_mut() {
            edges.retain(|r| r.target != id);
        }
        self.relations.retain(|_, edges| !edges.is_empty());
        Some(removed)
    }

    /// Attach `relation` to `source`. Returns false when either endpoint is
    /// missing or an identical edge already exists.
    pub fn add_relation(&mut self, source: AnnotationId, relation: Relation) -> bool {
        if self.annotation(source).is_none() || self.annotation(relation.target).is_none() {
            return false;
        }
        let edges = self.relations.entry(source).or_default();
        if edges.contains(&relation) {
            return false;
        }
        edges.push(relation);
        true
    }

    /// Record a dependency edge from token `child` to token `head` labelled `label`.
    pub fn add_dependency(&mut self, child: usize, head: usize, label: impl Into<String>) -> bool {
        match (self.tokens.get(child).copied(), self.tokens.get(head).copied()) {
            (Some(c), Some(h)) => self.add_relation(c, Relation::new(DEPENDENCY, label, h)),
            _ => false,
        }
    }

    /// Outgoing edges of `id`, optionally restricted to one relation type.
    pub fn outgoing(&self, id: AnnotationId, rel_type: Option<&str>) -> Vec<&Relation> {
        self.relations
            .get(&id)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|r| rel_type.is_none_or(|t| r.rel_type == t))
                    .filter(|r| self.annotation(r.target).is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Incoming edges of `id` as `(source, relation)` pairs.
    pub fn incoming(&self, id: AnnotationId, rel_type: Option<&str>) -> Vec<(AnnotationId, &Relation)> {
        self.relations
            .iter()
            .filter(|(source, _)| self.annotation(**source).is_some())
            .flat_map(|(source, edges)| edges.iter().map(move |r| (*source, r)))
            .filter(|(_, r)| r.target == id && rel_type.is_none_or(|t| r.rel_type == t))
            .collect()
    }

    /// Every edge in the document as `(source, relation)`, ordered by source id.
    pub fn relations(&self) -> impl Iterator<Item = (AnnotationId, &Relation)> + '_ {
        self.relations.iter().flat_map(|(source, edges)| edges.iter().map(move |r| (*source, r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;

    fn sample() -> Document {
        Document::from_tagged("doc", "John/NNP met/VBD/meet Sally/NNP")
    }

    #[test]
    fn tagged_tokens_carry_tag_and_lemma() {
        let doc = sample();
        assert_eq!(doc.text(), "John met Sally");
        assert_eq!(doc.token_count(), 3);
        let met = doc.token(1).unwrap();
        assert_eq!(met.text(), "met");
        assert_eq!(met.tag(), Some("VBD"));
        assert_eq!(met.lemma(), "meet");
        assert_eq!(doc.token(0).unwrap().lemma(), "john");
    }

    #[test]
    fn whitespace_documents_keep_offsets() {
        let doc = Document::from_whitespace("ws", "  old   car ");
        assert_eq!(doc.token_count(), 2);
        assert_eq!(doc.token(1).unwrap().range(), Range::new(8, 11));
    }

    #[test]
    fn token_range_covers_overlapping_tokens() {
        let doc = sample();
        assert_eq!(doc.token_range(Range::new(0, 8)), 0..2);
        assert_eq!(doc.token_range(Range::new(2, 6)), 0..2);
        assert_eq!(doc.token_range(Range::new(4, 5)), 1..1);
    }

    #[test]
    fn removing_an_annotation_drops_its_edges() {
        let mut doc = sample();
        let ent = doc.create_annotation("ENTITY", Range::new(0, 4), attrs! { "TAG" => "PERSON" });
        let other = doc.create_annotation("ENTITY", Range::new(9, 14), attrs! { "TAG" => "PERSON" });
        assert!(doc.add_relation(ent, Relation::new("knows", "", other)));
        assert!(doc.add_relation(other, Relation::new("knows", "", ent)));
        assert!(!doc.add_relation(ent, Relation::new("knows", "", other)));

        assert!(doc.remove_annotation(ent).is_some());
        assert!(doc.annotation(ent).is_none());
        assert!(doc.outgoing(other, None).is_empty());
        assert_eq!(doc.relations().count(), 0);
    }

    #[test]
    fn tokens_cannot_be_removed() {
        let mut doc = sample();
        let id = doc.token(0).unwrap().annotation_id().unwrap();
        assert!(doc.remove_annotation(id).is_none());
        assert_eq!(doc.token_count(), 3);
    }

    #[test]
    fn dependencies_are_navigable_both_ways() {
        let mut doc = sample();
        assert!(doc.add_dependency(0, 1, "nsubj"));
        let john = doc.token(0).unwrap();
        let met = doc.token(1).unwrap();
        let out = john.outgoing(Some(DEPENDENCY));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0.value, "nsubj");
        assert_eq!(out[0].1.text(), "met");
        assert_eq!(met.incoming(None)[0].1.text(), "John");
    }

    #[test]
    fn overlapping_annotations_outlive_the_type_name() {
        let mut doc = sample();
        doc.create_annotation("ENTITY", Range::new(0, 8), attrs! {});
        doc.create_annotation("ENTITY", Range::new(0, 4), attrs! {});
        doc.create_annotation("ENTITY", Range::new(9, 14), attrs! {});
        let found = {
            let ann_type = String::from("ENTITY");
            doc.annotations_overlapping(&ann_type, Range::new(2, 6))
        };
        let ranges: Vec<Range> = found.iter().map(|a| a.range()).collect();
        assert_eq!(ranges, [Range::new(0, 8), Range::new(0, 4)]);

        let named: Vec<&Annotation> = {
            let ann_type = String::from("ENTITY");
            doc.annotations_of(&ann_type).collect()
        };
        assert_eq!(named.len(), 3);
    }

    #[test]
    fn find_annotation_uses_exact_attribute_sets() {
        let mut doc = sample();
        let id = doc.create_annotation("ENTITY", Range::new(0, 4), attrs! { "TAG" => "PERSON" });
        assert_eq!(doc.find_annotation("ENTITY", Range::new(0, 4), &attrs! { "TAG" => "PERSON" }), Some(id));
        assert_eq!(doc.find_annotation("ENTITY", Range::new(0, 4), &attrs! {}), None);
    }
}
