//! Token pattern grammar.
//!
//! ```text
//! alt     := seq ( '|' seq )*
//! seq     := conj+
//! conj    := postfix ( '&' postfix )*
//! postfix := unary ( '?' | '*' | '+' | '{m}' | '{m,}' | '{m,n}' )*
//! unary   := '!' unary | primary
//! primary := atom | '(' alt ')' | '(?<name>' alt ')' | lookaround alt ')' | '^' | '^^'
//! ```
//!
//! Single-token tests compile to a [`Cond`] tree; `!` and `&` between
//! single-token operands stay inside that tree.

use super::lexer::{Lexed, Tok, tokenize};
use crate::api::Registry;
use crate::scan::{Lookaround, build_regex};
use crate::{Error, LexiconRef, Result};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone)]
pub(crate) enum AttrTest {
    Str(String),
    Number(f64),
    Regex(Regex),
}

/// A boolean test over one span.
#[derive(Debug, Clone)]
pub(crate) enum Cond {
    Any,
    Literal(String),
    Regex(Regex),
    Tag(String),
    HasAttr(String),
    Attr { name: String, test: AttrTest },
    Lexicon(LexiconRef),
    Annotation { ann_type: String, nested: Option<Box<Cond>> },
    Relation { direction: Direction, rel_type: String, value: Option<String>, nested: Option<Box<Cond>> },
    And(Vec<Cond>),
    Or(Vec<Cond>),
    Not(Box<Cond>),
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    /// Exactly one token satisfying the condition.
    Token(Cond),
    /// Longest lexicon phrase starting at the token.
    Lexicon(LexiconRef),
    /// An annotation covering the token; consumes through its last token.
    Annotation { ann_type: String, nested: Option<Cond> },
    Seq(Vec<Node>),
    Alt(Vec<Node>),
    /// All operands match the same extent.
    And(Vec<Node>),
    Repeat { node: Box<Node>, min: usize, max: Option<usize> },
    Group { index: usize, node: Box<Node> },
    /// `width` is the most tokens `node` can span, `None` when unbounded.
    Look { look: Lookaround, node: Box<Node>, width: Option<usize> },
    Start,
    NotStart,
}

impl Node {
    /// The node as a single-span test, if it has no sequence structure.
    fn into_cond(self) -> Option<Cond> {
        match self {
            Node::Token(cond) => Some(cond),
            Node::Lexicon(lexicon) => Some(Cond::Lexicon(lexicon)),
            Node::Annotation { ann_type, nested } => Some(Cond::Annotation { ann_type, nested: nested.map(Box::new) }),
            Node::Alt(nodes) => nodes.into_iter().map(Node::into_cond).collect::<Option<Vec<_>>>().map(Cond::Or),
            Node::And(nodes) => nodes.into_iter().map(Node::into_cond).collect::<Option<Vec<_>>>().map(Cond::And),
            Node::Seq(mut nodes) if nodes.len() == 1 => nodes.pop().and_then(Node::into_cond),
            _ => None,
        }
    }
}

pub(crate) struct Parsed {
    pub root: Node,
    pub groups: Vec<String>,
}

pub(crate) fn parse(src: &str, registry: &Registry) -> Result<Parsed> {
    let toks = tokenize(src)?;
    let mut parser = Parser { toks, idx: 0, registry, groups: Vec::new() };
    let root = parser.parse_alt()?;
    if parser.peek() != &Tok::Eof {
        return Err(Error::compile(parser.pos(), format!("unexpected {:?} in pattern", parser.peek())));
    }
    Ok(Parsed { root, groups: parser.groups })
}

struct Parser<'r> {
    toks: Vec<Lexed>,
    idx: usize,
    registry: &'r Registry,
    groups: Vec<String>,
}

impl Parser<'_> {
    fn current(&self) -> &Lexed {
        &self.toks[self.idx.min(self.toks.len() - 1)]
    }

    fn peek(&self) -> &Tok {
        &self.current().tok
    }

    fn pos(&self) -> usize {
        self.current().pos
    }

    fn next(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.idx < self.toks.len() - 1 {
            self.idx += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.next();
            true
        } else {
            false
        }
    }

    /// Consume `tok` only if it directly follows the previous token.
    fn eat_adjacent(&mut self, tok: &Tok) -> bool {
        let prev_end = self.idx.checked_sub(1).map(|i| self.toks[i].end);
        if prev_end == Some(self.pos()) && self.peek() == tok {
            self.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<()> {
        if self.eat(&tok) { Ok(()) } else { Err(Error::compile(self.pos(), format!("expected {what}"))) }
    }

    fn ends_seq(&self) -> bool {
        matches!(self.peek(), Tok::Pipe | Tok::RParen | Tok::Eof)
    }

    fn parse_alt(&mut self) -> Result<Node> {
        let mut alts = vec![self.parse_seq()?];
        while self.eat(&Tok::Pipe) {
            alts.push(self.parse_seq()?);
        }
        Ok(if alts.len() == 1 { alts.remove(0) } else { Node::Alt(alts) })
    }

    fn parse_seq(&mut self) -> Result<Node> {
        let mut items = Vec::new();
        while !self.ends_seq() {
            items.push(self.parse_conj()?);
        }
        match items.len() {
            0 => Err(Error::compile(self.pos(), "empty pattern")),
            1 => Ok(items.remove(0)),
            _ => Ok(Node::Seq(items)),
        }
    }

    fn parse_conj(&mut self) -> Result<Node> {
        let mut operands = vec![self.parse_postfix()?];
        while self.eat(&Tok::Amp) {
            operands.push(self.parse_postfix()?);
        }
        if operands.len() == 1 {
            return Ok(operands.remove(0));
        }
        if operands.iter().all(|n| matches!(n, Node::Token(_))) {
            let conds = operands.into_iter().filter_map(Node::into_cond).collect();
            return Ok(Node::Token(Cond::And(conds)));
        }
        Ok(Node::And(operands))
    }

    fn parse_postfix(&mut self) -> Result<Node> {
        let mut node = self.parse_unary()?;
        loop {
            let (min, max) = match self.peek() {
                Tok::Question => (0, Some(1)),
                Tok::Star => (0, None),
                Tok::Plus => (1, None),
                Tok::LBrace => {
                    self.next();
                    let bounds = self.parse_bounds()?;
                    node = Node::Repeat { node: Box::new(node), min: bounds.0, max: bounds.1 };
                    continue;
                }
                _ => return Ok(node),
            };
            self.next();
            node = Node::Repeat { node: Box::new(node), min, max };
        }
    }

    /// `m}`, `m,}` or `m,n}` after the opening brace; the closing brace is consumed.
    fn parse_bounds(&mut self) -> Result<(usize, Option<usize>)> {
        let pos = self.pos();
        let min = self.count()?;
        let max = if self.eat(&Tok::Comma) {
            if self.peek() == &Tok::RBrace { None } else { Some(self.count()?) }
        } else {
            Some(min)
        };
        self.expect(Tok::RBrace, "'}' closing quantifier")?;
        match max {
            Some(max) if max < min => {
                Err(Error::compile(pos, format!("quantifier bounds {{{min},{max}}} are reversed")))
            }
            _ => Ok((min, max)),
        }
    }

    fn count(&mut self) -> Result<usize> {
        match self.next() {
            Tok::Num(n) if n.fract() == 0.0 && n >= 0.0 => Ok(n as usize),
            _ => Err(Error::compile(self.pos(), "expected a repetition count")),
        }
    }

    fn parse_unary(&mut self) -> Result<Node> {
        let pos = self.pos();
        if self.eat(&Tok::Bang) {
            let operand = self.parse_unary()?;
            let cond = operand
                .into_cond()
                .ok_or_else(|| Error::compile(pos, "'!' applies only to single-token tests"))?;
            return Ok(Node::Token(Cond::Not(Box::new(cond))));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let pos = self.pos();
        match self.next() {
            Tok::Caret => Ok(Node::Start),
            Tok::DoubleCaret => Ok(Node::NotStart),
            Tok::LParen => {
                let node = self.parse_alt()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(node)
            }
            Tok::NamedGroup(name) => {
                let index = match self.groups.iter().position(|g| *g == name) {
                    Some(index) => index,
                    None => {
                        self.groups.push(name);
                        self.groups.len() - 1
                    }
                };
                let node = self.parse_alt()?;
                self.expect(Tok::RParen, "')' closing group")?;
                Ok(Node::Group { index, node: Box::new(node) })
            }
            Tok::Look(look) => {
                let node = self.parse_alt()?;
                self.expect(Tok::RParen, "')' closing lookaround")?;
                let width = super::analysis::max_width(&node);
                Ok(Node::Look { look, node: Box::new(node), width })
            }
            Tok::Percent(name) => self
                .registry
                .lexicon(&name)
                .map(Node::Lexicon)
                .ok_or_else(|| Error::compile(pos, format!("unknown lexicon '%{name}'"))),
            Tok::At(ann_type) => {
                let nested = self.parse_nested()?;
                Ok(Node::Annotation { ann_type, nested })
            }
            other => self.parse_atom(other, pos).map(Node::Token),
        }
    }

    fn parse_atom(&mut self, tok: Tok, pos: usize) -> Result<Cond> {
        match tok {
            Tok::Str(text) => Ok(Cond::Literal(text)),
            Tok::Regex { body, flags } => Ok(Cond::Regex(build_regex(&body, &flags, true, pos)?)),
            Tok::Tilde => Ok(Cond::Any),
            Tok::Hash(tag) => Ok(Cond::Tag(tag)),
            Tok::Dollar(name) => {
                if !self.eat(&Tok::Eq) {
                    return Ok(Cond::HasAttr(name));
                }
                let value_pos = self.pos();
                let test = match self.next() {
                    Tok::Str(s) => AttrTest::Str(s),
                    Tok::Num(n) => AttrTest::Number(n),
                    Tok::Regex { body, flags } => AttrTest::Regex(build_regex(&body, &flags, true, value_pos)?),
                    _ => return Err(Error::compile(value_pos, format!("expected a value after '${name}='"))),
                };
                Ok(Cond::Attr { name, test })
            }
            Tok::RelOut(rel_type) => self.parse_relation(Direction::Outgoing, rel_type),
            Tok::RelIn(rel_type) => self.parse_relation(Direction::Incoming, rel_type),
            Tok::Eof => Err(Error::compile(pos, "unexpected end of pattern")),
            other => Err(Error::compile(pos, format!("unexpected {other:?} in pattern"))),
        }
    }

    fn parse_relation(&mut self, direction: Direction, rel_type: String) -> Result<Cond> {
        let value = if self.eat_adjacent(&Tok::LBrace) {
            let Tok::Str(value) = self.next() else {
                return Err(Error::compile(self.pos(), "expected a quoted relation value"));
            };
            self.expect(Tok::RBrace, "'}' after relation value")?;
            Some(value)
        } else {
            None
        };
        let nested = self.parse_nested()?.map(Box::new);
        Ok(Cond::Relation { direction, rel_type, value, nested })
    }

    /// Optional `(pattern)` directly after an atom, reduced to a condition.
    fn parse_nested(&mut self) -> Result<Option<Cond>> {
        if !self.eat_adjacent(&Tok::LParen) {
            return Ok(None);
        }
        let pos = self.pos();
        let node = self.parse_alt()?;
        self.expect(Tok::RParen, "')' closing nested test")?;
        node.into_cond()
            .map(Some)
            .ok_or_else(|| Error::compile(pos, "nested tests must be boolean predicates"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(src: &str) -> Node {
        parse(src, &Registry::default()).unwrap().root
    }

    #[test]
    fn juxtaposition_binds_looser_than_conjunction() {
        match root("'old' & #JJ 'car'") {
            Node::Seq(items) => {
                assert!(matches!(items[0], Node::Token(Cond::And(_))));
                assert!(matches!(items[1], Node::Token(Cond::Literal(_))));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn quantifiers() {
        assert!(matches!(root("#NN{2,3}"), Node::Repeat { min: 2, max: Some(3), .. }));
        assert!(matches!(root("#NN{2,}"), Node::Repeat { min: 2, max: None, .. }));
        assert!(matches!(root("#NN{2}"), Node::Repeat { min: 2, max: Some(2), .. }));
        assert!(matches!(root("#NN+?"), Node::Repeat { min: 0, max: Some(1), .. }));
        assert!(parse("#NN{3,2}", &Registry::default()).is_err());
    }

    #[test]
    fn nested_tests_attach_only_when_adjacent() {
        assert!(matches!(root("@ENTITY(#NNP)"), Node::Annotation { nested: Some(_), .. }));
        assert!(matches!(root("@ENTITY (#NNP)"), Node::Seq(_)));
        assert!(matches!(
            root("@>dependency{'nsubj'}(#NOUN)"),
            Node::Token(Cond::Relation { value: Some(_), nested: Some(_), .. })
        ));
    }

    #[test]
    fn groups_are_numbered_by_name() {
        let parsed = parse("(?<a> ~) (?<b> ~) (?<a> ~)", &Registry::default()).unwrap();
        assert_eq!(parsed.groups, vec!["a", "b"]);
    }

    #[test]
    fn structural_errors() {
        let registry = Registry::default();
        for bad in ["", "'a' |", "('a'", "!('a' 'b')", "@X(('a' 'b'))", "%nope", "$X=", "{2}", "'a' )"] {
            assert!(parse(bad, &registry).is_err(), "{bad} should not compile");
        }
    }
}
