//! Borrowed span views.

use super::{AnnotationId, Annotation, AttrValue, Document, LEMMA, Relation, TAG, TOKEN};
use crate::Range;
use std::fmt;

/// A read-only view over a region of a [`Document`].
///
/// Spans backed by an annotation carry its id; spans without one are detached
/// regions (substrings, trimmed text, token windows) that are never stored on
/// the document.
#[derive(Clone, Copy)]
pub struct Span<'d> {
    doc: &'d Document,
    range: Range,
    annotation: Option<AnnotationId>,
}

impl<'d> Span<'d> {
    pub(crate) fn new(doc: &'d Document, range: Range, annotation: Option<AnnotationId>) -> Self {
        Span { doc, range, annotation }
    }

    pub fn document(&self) -> &'d Document {
        self.doc
    }

    pub fn text(&self) -> &'d str {
        self.doc.text().get(self.range.start..self.range.end).unwrap_or("")
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn start(&self) -> usize {
        self.range.start
    }

    pub fn end(&self) -> usize {
        self.range.end
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn annotation_id(&self) -> Option<AnnotationId> {
        self.annotation
    }

    pub fn annotation(&self) -> Option<&'d Annotation> {
        self.doc.annotation(self.annotation?)
    }

    pub fn is_detached(&self) -> bool {
        self.annotation.is_none()
    }

    pub fn ann_type(&self) -> Option<&'d str> {
        self.annotation().map(Annotation::ann_type)
    }

    /// The annotation used for relation lookups: the span's own annotation, or
    /// the token whose range it matches exactly.
    pub fn anchor(&self) -> Option<AnnotationId> {
        if self.annotation.is_some() {
            return self.annotation;
        }
        let tokens = self.token_range();
        if tokens.len() != 1 {
            return None;
        }
        let token = self.doc.token(tokens.start)?;
        (token.range == self.range).then_some(token.annotation).flatten()
    }

    /// Indices of the tokens this span overlaps.
    pub fn token_range(&self) -> std::ops::Range<usize> {
        self.doc.token_range(self.range)
    }

    pub fn tokens(&self) -> Vec<Span<'d>> {
        if self.ann_type() == Some(TOKEN) {
            return vec![*self];
        }
        self.token_range().filter_map(|i| self.doc.token(i)).collect()
    }

    fn single_token(&self) -> Option<Span<'d>> {
        let tokens = self.token_range();
        if tokens.len() == 1 { self.doc.token(tokens.start) } else { None }
    }

    /// Attribute of the backing annotation, falling back to the single token
    /// the span lies on.
    pub fn attribute(&self, name: &str) -> Option<&'d AttrValue> {
        if let Some(value) = self.annotation().and_then(|a| a.attribute(name)) {
            return Some(value);
        }
        let token = self.single_token()?;
        if token.annotation == self.annotation {
            return None;
        }
        token.annotation().and_then(|a| a.attribute(name))
    }

    pub fn tag(&self) -> Option<&'d str> {
        self.attribute(TAG).and_then(AttrValue::as_str)
    }

    /// `LEMMA` when present, otherwise token lemmas joined by a space, otherwise
    /// the lowercased text.
    pub fn lemma(&self) -> String {
        if let Some(lemma) = self.attribute(LEMMA).and_then(AttrValue::as_str) {
            return lemma.to_string();
        }
        let tokens = self.tokens();
        if tokens.is_empty() || (tokens.len() == 1 && tokens[0].range == self.range) {
            return self.text().to_lowercase();
        }
        tokens.iter().map(|t| t.lemma()).collect::<Vec<_>>().join(" ")
    }

    pub fn is_instance_of(&self, tag: &str) -> bool {
        self.tag().is_some_and(|t| super::is_instance_of(t, tag))
    }

    /// Annotations of `ann_type` overlapping this span.
    pub fn annotations(&self, ann_type: &str) -> Vec<Span<'d>> {
        self.doc
            .annotations_overlapping(ann_type, self.range)
            .into_iter()
            .map(|a| Span::new(self.doc, a.range(), Some(a.id())))
            .collect()
    }

    /// Outgoing edges and the spans they point at.
    pub fn outgoing(&self, rel_type: Option<&str>) -> Vec<(&'d Relation, Span<'d>)> {
        let Some(id) = self.anchor() else {
            return Vec::new();
        };
        self.doc
            .outgoing(id, rel_type)
            .into_iter()
            .filter_map(|r| Some((r, self.doc.annotation_span(r.target)?)))
            .collect()
    }

    /// Incoming edges and the spans they come from.
    pub fn incoming(&self, rel_type: Option<&str>) -> Vec<(&'d Relation, Span<'d>)> {
        let Some(id) = self.anchor() else {
            return Vec::new();
        };
        self.doc
            .incoming(id, rel_type)
            .into_iter()
            .filter_map(|(source, r)| Some((r, self.doc.annotation_span(source)?)))
            .collect()
    }

    /// Detached span over characters `start..end` of this span's text.
    pub fn substring(&self, start: usize, end: usize) -> Span<'d> {
        let text = self.text();
        let byte_at = |chars: usize| text.char_indices().nth(chars).map(|(b, _)| b).unwrap_or(text.len());
        let (s, e) = (byte_at(start), byte_at(end.max(start)));
        Span::new(self.doc, Range::new(self.range.start + s, self.range.start + e), None)
    }

    /// Detached span without leading and trailing whitespace.
    pub fn trim(&self) -> Span<'d> {
        let text = self.text();
        let lead = text.len() - text.trim_start().len();
        let trail = text.len() - text.trim_end().len();
        let end = (self.range.end - trail).max(self.range.start + lead);
        Span::new(self.doc, Range::new(self.range.start + lead, end), None)
    }

    /// The token `offset` positions before (negative) or after (positive) this
    /// span; `0` is the span itself.
    pub fn context(&self, offset: isize) -> Option<Span<'d>> {
        if offset == 0 {
            return Some(*self);
        }
        let tokens = self.token_range();
        if tokens.is_empty() {
            return None;
        }
        let index = if offset < 0 {
            tokens.start.checked_sub(offset.unsigned_abs())?
        } else {
            tokens.end - 1 + offset as usize
        };
        self.doc.token(index)
    }
}

impl PartialEq for Span<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.range == other.range && self.annotation == other.annotation
    }
}

impl fmt::Debug for Span<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("range", &self.range)
            .field("annotation", &self.annotation)
            .field("text", &self.text())
            .finish()
    }
}

impl fmt::Display for Span<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}
