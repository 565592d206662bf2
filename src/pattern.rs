//! Token pattern engine.
//!
//! A [`TokenPattern`] is a regular expression whose alphabet is tokens rather
//! than characters. Atoms test one token (text, tag, attribute, lexicon,
//! relation) or consume a whole annotation; combinators are the familiar
//! regex ones plus same-extent conjunction `&`.
//!
//! ```text
//!   "#DT? (?<adj> #JJ)* 'car'"
//!          │ lexer + parser
//!          ▼
//!   Seq[ Repeat{Token(#DT),0,1}, Repeat{Group{adj, Token(#JJ)},0,∞}, Token('car') ]
//!          │ Run::match_at(start)        (backtracking, leftmost, greedy)
//!          ▼
//!   Match { tokens: 2..5, groups: { "*": [..], "adj": [old, red] } }
//! ```
//!
//! Matches own their data so callers can mutate the document between two
//! calls to [`TokenPattern::find_at`].

#[path = "pattern/analysis.rs"]
mod analysis;
#[path = "pattern/lexer.rs"]
mod lexer;
#[path = "pattern/matcher.rs"]
mod matcher;
#[path = "pattern/parser.rs"]
mod parser;

use crate::api::Registry;
use crate::{Document, Range, Result, Span};
use matcher::Run;
use parser::Node;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Name of the implicit group holding the whole match.
pub const WHOLE_MATCH: &str = "*";

/// A compiled token pattern.
#[derive(Debug, Clone)]
pub struct TokenPattern {
    source: String,
    root: Arc<Node>,
    groups: Arc<[String]>,
    literals: BTreeSet<String>,
    annotation_types: BTreeSet<String>,
}

impl TokenPattern {
    /// Compile against an empty registry; `%name` references fail.
    pub fn compile(text: &str) -> Result<Self> {
        Self::compile_with(text, &Registry::default())
    }

    pub fn compile_with(text: &str, registry: &Registry) -> Result<Self> {
        let parsed = parser::parse(text, registry)?;
        let literals = analysis::required_literals(&parsed.root);
        let annotation_types = analysis::required_annotation_types(&parsed.root);
        log::debug!(
            "[pattern:compile] {:?} groups={:?} literals={:?}",
            text.trim(),
            parsed.groups,
            literals
        );
        Ok(TokenPattern {
            source: text.trim().to_string(),
            root: Arc::new(parsed.root),
            groups: parsed.groups.into(),
            literals,
            annotation_types,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.source
    }

    /// Named groups in order of first appearance, without `*`.
    pub fn group_names(&self) -> &[String] {
        &self.groups
    }

    /// True for `*` and for every named group.
    pub fn has_group(&self, name: &str) -> bool {
        name == WHOLE_MATCH || self.groups.iter().any(|g| g == name)
    }

    /// Token texts every match contains.
    pub fn required_literals(&self) -> &BTreeSet<String> {
        &self.literals
    }

    /// Annotation types every match consumes.
    pub fn required_annotation_types(&self) -> &BTreeSet<String> {
        &self.annotation_types
    }

    /// Iterate the matches over the whole document.
    pub fn matcher<'p, 'd>(&'p self, doc: &'d Document) -> Matcher<'p, 'd> {
        self.matcher_over(doc, 0..doc.token_count())
    }

    /// Iterate the matches inside `scope`; `^` anchors to its first token.
    pub fn matcher_in<'p, 'd>(&'p self, scope: &Span<'d>) -> Matcher<'p, 'd> {
        self.matcher_over(scope.document(), scope.token_range())
    }

    fn matcher_over<'p, 'd>(&'p self, doc: &'d Document, scope: std::ops::Range<usize>) -> Matcher<'p, 'd> {
        let next = scope.start;
        Matcher { pattern: self, doc, scope, next }
    }

    /// Leftmost match inside `scope` starting at token `from` or later.
    pub fn find_at(&self, doc: &Document, scope: std::ops::Range<usize>, from: usize) -> Option<Match> {
        let hi = scope.end.min(doc.token_count());
        let run = Run { doc, lo: scope.start, hi };
        (from.max(scope.start)..hi).find_map(|start| {
            let (end, caps) = run.match_at(&self.root, start)?;
            Some(self.build_match(doc, start..end, caps))
        })
    }

    fn build_match(&self, doc: &Document, tokens: std::ops::Range<usize>, caps: Vec<matcher::Capture>) -> Match {
        let range = doc.token_span_range(tokens.clone()).unwrap_or_default();
        let mut groups: BTreeMap<String, Vec<Range>> = BTreeMap::new();
        groups.insert(WHOLE_MATCH.to_string(), vec![range]);
        for (index, start, end) in caps {
            let Some(name) = self.groups.get(index) else {
                continue;
            };
            if let Some(captured) = doc.token_span_range(start..end) {
                groups.entry(name.clone()).or_default().push(captured);
            }
        }
        Match { tokens, range, groups }
    }
}

impl PartialEq for TokenPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for TokenPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// One match: its token indices, byte range and captured groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub tokens: std::ops::Range<usize>,
    pub range: Range,
    groups: BTreeMap<String, Vec<Range>>,
}

impl Match {
    /// Spans captured by `name`, in capture order; `*` is the whole match.
    pub fn group(&self, name: &str) -> &[Range] {
        self.groups.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &[Range])> + '_ {
        self.groups.iter().map(|(name, ranges)| (name.as_str(), ranges.as_slice()))
    }

    pub fn text<'d>(&self, doc: &'d Document) -> &'d str {
        doc.span(self.range).text()
    }

    pub fn span<'d>(&self, doc: &'d Document) -> Span<'d> {
        doc.span(self.range)
    }
}

/// Iterator over non-overlapping matches, left to right.
pub struct Matcher<'p, 'd> {
    pattern: &'p TokenPattern,
    doc: &'d Document,
    scope: std::ops::Range<usize>,
    next: usize,
}

impl Matcher<'_, '_> {
    /// Next match, or `None` once the scope is exhausted.
    pub fn find(&mut self) -> Option<Match> {
        let found = self.pattern.find_at(self.doc, self.scope.clone(), self.next)?;
        self.next = found.tokens.end;
        Some(found)
    }
}

impl Iterator for Matcher<'_, '_> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        self.find()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{WordList, attrs};
    use proptest::prelude::*;
    use rstest::rstest;

    fn texts(pattern: &str, doc: &Document) -> Vec<String> {
        let pattern = TokenPattern::compile(pattern).unwrap();
        pattern.matcher(doc).map(|m| m.text(doc).to_string()).collect()
    }

    #[test]
    fn alternation_yields_matches_in_order() {
        let doc = Document::from_whitespace("d", "John met Sally by the seashore");
        let pattern = TokenPattern::compile("'John' | 'Sally'").unwrap();
        let mut matcher = pattern.matcher(&doc);
        assert_eq!(matcher.find().unwrap().text(&doc), "John");
        assert_eq!(matcher.find().unwrap().text(&doc), "Sally");
        assert!(matcher.find().is_none());
    }

    #[test]
    fn greedy_tags_cover_the_sentence() {
        let doc = Document::from_tagged("d", "John/NNP met/VBD Sally/NNP");
        let matches: Vec<Match> = TokenPattern::compile("#NOUN+ #VERB+ #NOUN+").unwrap().matcher(&doc).collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text(&doc), "John met Sally");
        assert_eq!(matches[0].tokens, 0..3);
    }

    #[rstest]
    #[case("'the' ~", &["the big"])]
    #[case("/b.*/", &["big", "bit"])]
    #[case("#DT #JJ? #NN", &["the big dog", "a cat"])]
    #[case("#JJ{2,}", &[])]
    #[case("$LEMMA='bite'", &["bit"])]
    #[case("!#DT #NN", &["big dog"])]
    #[case("#DT & 'a'", &["a"])]
    #[case("^ #DT", &["the"])]
    #[case("^^ #DT", &["a"])]
    fn single_token_atoms(#[case] pattern: &str, #[case] expected: &[&str]) {
        let doc = Document::from_tagged("d", "the/DT big/JJ dog/NN bit/VBD/bite a/DT cat/NN");
        assert_eq!(texts(pattern, &doc), expected);
    }

    #[test]
    fn named_groups_append_inside_repetition() {
        let doc = Document::from_tagged("d", "an/DT old/JJ red/JJ car/NN");
        let pattern = TokenPattern::compile("#DT (?<adj> #JJ)* 'car'").unwrap();
        assert!(pattern.has_group("adj") && pattern.has_group(WHOLE_MATCH));
        let found = pattern.matcher(&doc).next().unwrap();
        let adjectives: Vec<&str> = found.group("adj").iter().map(|r| doc.span(*r).text()).collect();
        assert_eq!(adjectives, ["old", "red"]);
        assert_eq!(found.group(WHOLE_MATCH), [found.range]);
        assert!(found.group("missing").is_empty());
    }

    #[test]
    fn optional_groups_that_do_not_participate_are_absent() {
        let doc = Document::from_tagged("d", "car/NN");
        let found = TokenPattern::compile("(?<adj> #JJ)? 'car'").unwrap().matcher(&doc).next().unwrap();
        assert!(found.group("adj").is_empty());
    }

    #[test]
    fn lookarounds_do_not_consume_or_capture() {
        let doc = Document::from_tagged("d", "the/DT dog/NN saw/VBD dog/NN");
        assert_eq!(texts("(?< #DT) #NN", &doc), ["dog"]);
        assert_eq!(texts("(?!< #DT) #NN", &doc), ["dog"]);
        assert_eq!(texts("#NN (?> #VBD)", &doc), ["dog"]);
        let found = TokenPattern::compile("(?< (?<det> #DT)) #NN").unwrap().matcher(&doc).next().unwrap();
        assert!(found.group("det").is_empty());
    }

    #[test]
    fn zero_width_patterns_never_match() {
        let doc = Document::from_whitespace("d", "a b c");
        assert!(texts("'x'*", &doc).is_empty());
        assert!(texts("^", &doc).is_empty());
        assert_eq!(texts("'b'*", &doc), ["b"]);
    }

    #[test]
    fn lexicon_prefers_the_longest_phrase() {
        let registry = Registry::new().with_lexicon("cities", WordList::new(["new york", "new york city", "york"]));
        let pattern = TokenPattern::compile_with("%cities", &registry).unwrap();
        let doc = Document::from_whitespace("d", "from new york city to york");
        let found: Vec<String> = pattern.matcher(&doc).map(|m| m.text(&doc).to_string()).collect();
        assert_eq!(found, ["new york city", "york"]);
        assert!(TokenPattern::compile("%cities").is_err());
    }

    #[test]
    fn annotations_consume_their_tokens() {
        let mut doc = Document::from_tagged("d", "Mary/NNP Ann/NNP Smith/NNP left/VBD");
        let name = doc.token_span_range(0..3).unwrap();
        doc.create_annotation("PERSON", name, attrs! { "TAG" => "PER" });
        assert_eq!(texts("@PERSON #VERB", &doc), ["Mary Ann Smith left"]);
        assert_eq!(texts("@PERSON($TAG='PER') 'left'", &doc), ["Mary Ann Smith left"]);
        assert!(texts("@PERSON($TAG='ORG')", &doc).is_empty());
        assert_eq!(texts("#NNP{3} & @PERSON", &doc), ["Mary Ann Smith"]);
        // entering mid-annotation still consumes through its last token
        assert_eq!(texts("'Smith' & @PERSON", &doc), ["Smith"]);
    }

    #[test]
    fn relation_tests_check_endpoints() {
        let mut doc = Document::from_tagged("d", "John/NNP met/VBD Sally/NNP");
        doc.add_dependency(0, 1, "nsubj");
        doc.add_dependency(2, 1, "dobj");
        assert_eq!(texts("@>dependency{'nsubj'}", &doc), ["John"]);
        assert_eq!(texts("@<dependency(#NNP)", &doc), ["met"]);
        assert_eq!(texts("@>{'dobj'}(#VERB)", &doc), ["Sally"]);
        assert!(texts("@>dependency{'iobj'}", &doc).is_empty());
    }

    #[test]
    fn scoped_matching_anchors_to_the_scope() {
        let mut doc = Document::from_whitespace("d", "it rained . the sun came out");
        let second = Range::new(doc.token_span_range(3..4).unwrap().start, doc.text().len());
        let id = doc.create_annotation("sentence", second, Default::default());
        let sentence = doc.annotation_span(id).unwrap();
        let pattern = TokenPattern::compile("^ ~").unwrap();
        let found: Vec<String> = pattern.matcher_in(&sentence).map(|m| m.text(&doc).to_string()).collect();
        assert_eq!(found, ["the"]);
        assert!(pattern.find_at(&doc, 3..7, 4).is_none());
    }

    #[test]
    fn required_literals_are_exposed() {
        let pattern = TokenPattern::compile("'old' ('car' | 'car')").unwrap();
        assert_eq!(pattern.required_literals().iter().collect::<Vec<_>>(), ["car", "old"]);
    }

    #[test]
    fn compile_errors_report_positions() {
        for bad in ["'a' (", "#", "{2}", "'a'{3,1}", "!('a' 'b')", "(?<g> 'a'", "/[/"] {
            let err = TokenPattern::compile(bad).unwrap_err();
            assert!(err.is_compile(), "{bad}: {err}");
        }
    }

    #[test]
    fn long_repetitions_run_on_small_stacks() {
        let worker = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let doc = Document::from_tagged("long", &vec!["w/NN"; 10_000].join(" "));
                let nouns: Vec<Match> = TokenPattern::compile("#NOUN+").unwrap().matcher(&doc).collect();
                let words = TokenPattern::compile("(?<w> #DT | #NN)* 'z'?").unwrap().matcher(&doc).next().unwrap();
                (nouns.len(), nouns[0].tokens.clone(), words.tokens.clone(), words.group("w").len())
            })
            .unwrap();
        assert_eq!(worker.join().unwrap(), (1, 0..10_000, 0..10_000, 10_000));
    }

    #[test]
    fn repetition_backtracks_into_wider_iterations() {
        let doc = Document::from_whitespace("d", "a b a b c");
        assert_eq!(texts("('a' | 'a' 'b')+ 'c'", &doc), ["a b a b c"]);
        assert_eq!(texts("(?<x> ~)+ 'c'", &doc), ["a b a b c"]);
        assert_eq!(texts("~{2,3} 'b'", &doc), ["a b a b"]);
    }

    #[test]
    fn lookbehind_is_bounded_by_its_width() {
        let long = Document::from_tagged("long", &vec!["w/NN"; 20_000].join(" "));
        assert_eq!(TokenPattern::compile("(?< #DT) #NN").unwrap().matcher(&long).count(), 0);

        let doc = Document::from_tagged("d", "the/DT dog/NN a/DT big/JJ cat/NN");
        assert_eq!(texts("(?< #DT) #NN", &doc), ["dog"]);
        assert_eq!(texts("(?< #DT #JJ?) #NN", &doc), ["dog", "cat"]);
        assert_eq!(texts("(?!< #DT) #NN", &doc), ["cat"]);
    }

    #[test]
    fn compiled_patterns_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TokenPattern>();
    }

    const PATTERNS: &[&str] = &["~", "#NOUN+", "~ ~?", "'a' | 'b' 'a'", "(?<x> ~){2}", "#DT? ~", "!'a'+"];

    proptest! {
        #[test]
        fn matches_are_ordered_and_disjoint(
            words in proptest::collection::vec(prop_oneof![Just("a/DT"), Just("b/NN"), Just("c/VB")], 0..12),
            idx in 0..PATTERNS.len(),
        ) {
            let doc = Document::from_tagged("p", &words.join(" "));
            let pattern = TokenPattern::compile(PATTERNS[idx]).unwrap();
            let mut last_end = 0;
            for found in pattern.matcher(&doc) {
                prop_assert!(found.tokens.start >= last_end);
                prop_assert!(found.tokens.end > found.tokens.start);
                prop_assert!(found.tokens.end <= doc.token_count());
                last_end = found.tokens.end;
            }
        }
    }
}
