//! Expression AST and precedence-climbing parser.
//!
//! ```text
//! pipe    := or ( '|>' or )*
//! or      := and ( ('||' | 'or') and )*
//! and     := cmp ( ('&&' | 'and') cmp )*
//! cmp     := add ( ('==' | '!=' | '<' | '<=' | '>' | '>=' | 'in') add )*
//! add     := mul ( ('+' | '-') mul )*
//! mul     := unary ( ('*' | '/') unary )*
//! unary   := ('!' | 'not' | '-') unary | postfix
//! postfix := primary ( '[' index ']' )*
//! ```
//!
//! The canonical form printed by `Display` is fully parenthesised and
//! re-parses to the same tree.

use super::kind::ExpressionType;
use super::lexer::{Lexed, Tok, tokenize};
use crate::api::Registry;
use crate::document::LEMMA;
use crate::scan::{Lookaround, build_regex, quote};
use crate::{Error, LexiconRef, Result, format_number};
use regex::Regex;
use std::fmt;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Pipe,
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Pipe => "|>",
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    Lower,
    Upper,
    Trim,
    Len,
    Str,
    Number,
    Lemma,
    Tag,
    Tokens,
    If,
    Cxt,
    Map,
    Filter,
    Flatten,
    First,
    Last,
    Get,
    Count,
    Join,
    Feature,
}

impl Func {
    const ALL: [Func; 20] = [
        Func::Lower,
        Func::Upper,
        Func::Trim,
        Func::Len,
        Func::Str,
        Func::Number,
        Func::Lemma,
        Func::Tag,
        Func::Tokens,
        Func::If,
        Func::Cxt,
        Func::Map,
        Func::Filter,
        Func::Flatten,
        Func::First,
        Func::Last,
        Func::Get,
        Func::Count,
        Func::Join,
        Func::Feature,
    ];

    fn lookup(name: &str) -> Option<Func> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Func::Lower => "lower",
            Func::Upper => "upper",
            Func::Trim => "trim",
            Func::Len => "len",
            Func::Str => "str",
            Func::Number => "number",
            Func::Lemma => "lemma",
            Func::Tag => "tag",
            Func::Tokens => "tokens",
            Func::If => "if",
            Func::Cxt => "cxt",
            Func::Map => "map",
            Func::Filter => "filter",
            Func::Flatten => "flatten",
            Func::First => "first",
            Func::Last => "last",
            Func::Get => "get",
            Func::Count => "count",
            Func::Join => "join",
            Func::Feature => "feature",
        }
    }

    fn arity(self) -> RangeInclusive<usize> {
        match self {
            Func::Lower
            | Func::Upper
            | Func::Trim
            | Func::Len
            | Func::Str
            | Func::Number
            | Func::Lemma
            | Func::Tag
            | Func::Tokens
            | Func::Flatten
            | Func::First
            | Func::Last
            | Func::Count => 0..=1,
            Func::If => 3..=3,
            Func::Cxt | Func::Map | Func::Filter | Func::Get | Func::Feature => 2..=2,
                        Func::Join => 1..=2,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Node>),
    /// `$_`
    Input,
    Attribute(String),
    TagTest(String),
    Annotations { ann_type: String, filter: Option<Box<Node>> },
    Relations { direction: Direction, rel_type: String, value: Option<String> },
    Lexicon(LexiconRef),
    Regex { body: String, flags: String, regex: Regex },
    Subst { body: String, replacement: String, flags: String, regex: Regex },
    Look { look: Lookaround, node: Box<Node> },
    Unary { op: UnaryOp, node: Box<Node> },
    Binary { op: BinaryOp, left: Box<Node>, right: Box<Node> },
    Index { node: Box<Node>, index: Box<Node> },
    Slice { node: Box<Node>, start: Option<Box<Node>>, end: Option<Box<Node>> },
    Call { func: Func, args: Vec<Node> },
}

impl Node {
    /// Static type, computed bottom-up.
    pub(crate) fn kind(&self) -> ExpressionType {
        use ExpressionType as T;
        match self {
            Node::Attribute(name) if name == LEMMA => T::Str,
            Node::Null | Node::Attribute(_) => T::Object,
            Node::Bool(_) => T::Predicate,
            Node::Number(_) => T::Numeric,
            Node::Str(_) | Node::Subst { .. } => T::Str,
            Node::Array(items) => {
                if items.is_empty() {
                    T::Object
                } else {
                    T::select_most_common(items.iter().map(Node::kind))
                }
            }
            Node::Input | Node::Annotations { .. } | Node::Relations { .. } => T::HSpan,
            Node::TagTest(_) | Node::Lexicon(_) | Node::Regex { .. } | Node::Look { .. } => T::Predicate,
            Node::Unary { op: UnaryOp::Not, .. } => T::Predicate,
            Node::Unary { op: UnaryOp::Neg, .. } => T::Numeric,
            Node::Binary { op, left, right } => match op {
                BinaryOp::Pipe => right.kind(),
                BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => T::Numeric,
                BinaryOp::Add => match (left.kind(), right.kind()) {
                    (T::Numeric, T::Numeric) => T::Numeric,
                    (T::HSpan | T::Str, _) | (_, T::HSpan | T::Str) => T::Str,
                    _ => T::Object,
                },
                _ => T::Predicate,
            },
            Node::Index { node, .. } | Node::Slice { node, .. } => match node.kind() {
                kind @ (T::HSpan | T::Str) => kind,
                _ => T::Object,
            },
            Node::Call { func, args } => {
                let arg = |i: usize| args.get(i).map_or(T::HSpan, Node::kind);
                match func {
                    Func::Lower | Func::Upper | Func::Str | Func::Lemma | Func::Join => T::Str,
                    Func::Trim => arg(0),
                    Func::Len | Func::Number => T::Numeric,
                    Func::Tag => T::Object,
                    Func::Tokens | Func::Cxt => T::HSpan,
                    Func::If => arg(1).join(arg(2)),
                    Func::Map => arg(1),
                    Func::Filter | Func::Flatten | Func::First | Func::Last | Func::Get => arg(0),
                    Func::Count => T::Counter,
                    Func::Feature => T::Feature,
                }
            }
        }
    }

    /// True when the node never reads its input.
    pub(crate) fn is_constant(&self) -> bool {
        match self {
            Node::Null | Node::Bool(_) | Node::Number(_) | Node::Str(_) => true,
            Node::Array(items) => items.iter().all(Node::is_constant),
            Node::Unary { node, .. } => node.is_constant(),
            Node::Binary { op: BinaryOp::Pipe, left, .. } => left.is_constant(),
            Node::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            _ => false,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Null => f.write_str("null"),
            Node::Bool(b) => write!(f, "{b}"),
            Node::Number(n) => f.write_str(&format_number(*n)),
            Node::Str(s) => f.write_str(&quote(s)),
            Node::Array(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            }
            Node::Input => f.write_str("$_"),
            Node::Attribute(name) => write!(f, "${name}"),
            Node::TagTest(tag) => write!(f, "#{tag}"),
            Node::Annotations { ann_type, filter: None } => write!(f, "@{ann_type}"),
            Node::Annotations { ann_type, filter: Some(filter) } => write!(f, "@{ann_type}({filter})"),
            Node::Relations { direction, rel_type, value } => {
                let arrow = if *direction == Direction::Outgoing { "@>" } else { "@<" };
                write!(f, "{arrow}{rel_type}")?;
                match value {
                    Some(value) => write!(f, "{{{}}}", quote(value)),
                    None => Ok(()),
                }
            }
            Node::Lexicon(lexicon) => write!(f, "%{}", lexicon.name()),
            Node::Regex { body, flags, .. } => write!(f, "/{body}/{flags}"),
            Node::Subst { body, replacement, flags, .. } => {
                write!(f, "s/{body}/{}/{flags}", replacement.replace('/', "\\/"))
            }
            Node::Look { look, node } => write!(f, "{} {node})", look.opener()),
            Node::Unary { op: UnaryOp::Not, node } => write!(f, "!{node}"),
            Node::Unary { op: UnaryOp::Neg, node } => {
                f.write_str("-")?;
                write_tight_operand(f, node)
            }
            Node::Binary { op: op @ (BinaryOp::Pipe | BinaryOp::Or | BinaryOp::And), left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Node::Binary { op, left, right } => {
                f.write_str("(")?;
                write_tight_operand(f, left)?;
                write!(f, " {} ", op.symbol())?;
                write_tight_operand(f, right)?;
                f.write_str(")")
            }
            Node::Index { node, index } => {
                write_postfix_operand(f, node)?;
                write!(f, "[{index}]")
            }
            Node::Slice { node, start, end } => {
                write_postfix_operand(f, node)?;
                f.write_str("[")?;
                if let Some(start) = start {
                    write!(f, "{start}")?;
                }
                f.write_str(":")?;
                if let Some(end) = end {
                    write!(f, "{end}")?;
                }
                f.write_str("]")
            }
            Node::Call { func, args } => {
                write!(f, "{}(", func.name())?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Node]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

// `!` only parses at the `&&` level, so inside comparisons and arithmetic a
// negation needs its own parentheses.
fn write_tight_operand(f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
    match node {
        Node::Unary { op: UnaryOp::Not, .. } => write!(f, "({node})"),
        _ => write!(f, "{node}"),
    }
}

// Postfix binds tighter than prefix operators; keep `(-x)[0]` distinct from `-x[0]`.
fn write_postfix_operand(f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
    match node {
        Node::Unary { .. } => write!(f, "({node})"),
        _ => write!(f, "{node}"),
    }
}

pub(crate) fn parse(src: &str, registry: &Registry) -> Result<Node> {
    let toks = tokenize(src)?;
    let mut parser = Parser { toks, idx: 0, registry };
    if parser.peek() == &Tok::Eof {
        return Err(Error::compile(0, "empty expression"));
    }
    let node = parser.parse_pipe()?;
    match parser.peek() {
        Tok::Eof => Ok(node),
        other => Err(Error::compile(parser.pos(), format!("unexpected {other:?} after expression"))),
    }
}

struct Parser<'r> {
    toks: Vec<Lexed>,
    idx: usize,
    registry: &'r Registry,
}

impl Parser<'_> {
    fn peek(&self) -> &Tok {
        &self.toks[self.idx.min(self.toks.len() - 1)].tok
    }

    fn pos(&self) -> usize {
        self.toks[self.idx.min(self.toks.len() - 1)].pos
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

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Tok::Ident(w) if w == word) {
            self.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<()> {
        if self.eat(&tok) { Ok(()) } else { Err(Error::compile(self.pos(), format!("expected {what}"))) }
    }

    fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
        Node::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    fn parse_pipe(&mut self) -> Result<Node> {
        let mut left = self.parse_or()?;
        while self.eat(&Tok::Pipe) {
            let right = self.parse_or()?;
            left = Self::binary(BinaryOp::Pipe, left, right);
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut left = self.parse_and()?;
        while self.eat(&Tok::OrOr) || self.eat_word("or") {
            let right = self.parse_and()?;
            left = Self::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut left = self.parse_not()?;
        while self.eat(&Tok::AndAnd) || self.eat_word("and") {
            let right = self.parse_not()?;
            left = Self::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    /// `!`/`not` negates a whole comparison: `not $LEMMA == 'car'`.
    fn parse_not(&mut self) -> Result<Node> {
        if self.eat(&Tok::Bang) || self.eat_word("not") {
            let node = self.parse_not()?;
            return Ok(Node::Unary { op: UnaryOp::Not, node: Box::new(node) });
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Node> {
        let mut left = self.parse_add()?;
        loop {
            let op = match self.peek() {
                Tok::EqEq => BinaryOp::Eq,
                Tok::NotEq => BinaryOp::Ne,
                Tok::Lt => BinaryOp::Lt,
                Tok::Le => BinaryOp::Le,
                Tok::Gt => BinaryOp::Gt,
                Tok::Ge => BinaryOp::Ge,
                Tok::Ident(w) if w == "in" => BinaryOp::In,
                _ => return Ok(left),
            };
            self.next();
            let right = self.parse_add()?;
            left = Self::binary(op, left, right);
        }
    }

    fn parse_add(&mut self) -> Result<Node> {
        let mut left = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinaryOp::Add,
                Tok::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.next();
            let right = self.parse_mul()?;
            left = Self::binary(op, left, right);
        }
    }

    fn parse_mul(&mut self) -> Result<Node> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinaryOp::Mul,
                Tok::Slash => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.next();
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Node> {
        if self.eat(&Tok::Minus) {
            let node = self.parse_unary()?;
            return Ok(Node::Unary { op: UnaryOp::Neg, node: Box::new(node) });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Node> {
        let mut node = self.parse_primary()?;
        while self.eat(&Tok::LBracket) {
            let start = if self.peek() == &Tok::Colon { None } else { Some(Box::new(self.parse_pipe()?)) };
            if self.eat(&Tok::Colon) {
                let end = if self.peek() == &Tok::RBracket { None } else { Some(Box::new(self.parse_pipe()?)) };
                self.expect(Tok::RBracket, "']'")?;
                node = Node::Slice { node: Box::new(node), start, end };
            } else {
                self.expect(Tok::RBracket, "']'")?;
                let index = start.ok_or_else(|| Error::compile(self.pos(), "empty index"))?;
                node = Node::Index { node: Box::new(node), index };
            }
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let pos = self.pos();
        match self.next() {
            Tok::Str(s) => Ok(Node::Str(s)),
            Tok::Num(n) => Ok(Node::Number(n)),
            Tok::Dollar(name) if name == "_" => Ok(Node::Input),
            Tok::Dollar(name) => Ok(Node::Attribute(name)),
            Tok::Hash(tag) => Ok(Node::TagTest(tag)),
            Tok::Percent(name) => self
                .registry
                .lexicon(&name)
                .map(Node::Lexicon)
                .ok_or_else(|| Error::compile(pos, format!("unknown lexicon '%{name}'"))),
            Tok::At(ann_type) => {
                let filter = if self.eat(&Tok::LParen) {
                    let filter = self.parse_pipe()?;
                    self.expect(Tok::RParen, "')' after annotation filter")?;
                    Some(Box::new(filter))
                } else {
                    None
                };
                Ok(Node::Annotations { ann_type, filter })
            }
            Tok::RelOut(rel_type) => self.parse_relation(Direction::Outgoing, rel_type),
            Tok::RelIn(rel_type) => self.parse_relation(Direction::Incoming, rel_type),
            Tok::Regex { body, flags } => {
                let regex = build_regex(&body, &flags, false, pos)?;
                Ok(Node::Regex { body, flags, regex })
            }
            Tok::Subst { body, replacement, flags } => {
                let regex = build_regex(&body, &flags, false, pos)?;
                Ok(Node::Subst { body, replacement, flags, regex })
            }
            Tok::Look(look) => {
                let node = self.parse_pipe()?;
                self.expect(Tok::RParen, "')' closing lookaround")?;
                Ok(Node::Look { look, node: Box::new(node) })
            }
            Tok::LParen => {
                let node = self.parse_pipe()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(node)
            }
            Tok::LBracket => {
                let items = self.parse_args(Tok::RBracket)?;
                Ok(Node::Array(items))
            }
            Tok::Ident(word) => match word.as_str() {
                "true" => Ok(Node::Bool(true)),
                "false" => Ok(Node::Bool(false)),
                "null" => Ok(Node::Null),
                name => {
                    let func =
                        Func::lookup(name).ok_or_else(|| Error::compile(pos, format!("unknown function '{name}'")))?;
                    self.expect(Tok::LParen, "'(' after function name")?;
                    let args = self.parse_args(Tok::RParen)?;
                    if !func.arity().contains(&args.len()) {
                        return Err(Error::compile(
                            pos,
                            format!("{}() takes {:?} arguments, got {}", func.name(), func.arity(), args.len()),
                        ));
                    }
                    Ok(Node::Call { func, args })
                }
            },
            Tok::Eof => Err(Error::compile(pos, "unexpected end of expression")),
            other => Err(Error::compile(pos, format!("unexpected {other:?}"))),
        }
    }

    fn parse_relation(&mut self, direction: Direction, rel_type: String) -> Result<Node> {
        let value = if self.eat(&Tok::LBrace) {
            let Tok::Str(value) = self.next() else {
                return Err(Error::compile(self.pos(), "expected a quoted relation value"));
            };
            self.expect(Tok::RBrace, "'}'")?;
            Some(value)
        } else {
            None
        };
        Ok(Node::Relations { direction, rel_type, value })
    }

    fn parse_args(&mut self, close: Tok) -> Result<Vec<Node>> {
        let mut args = Vec::new();
        if self.eat(&close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_pipe()?);
            if self.eat(&close) {
                return Ok(args);
            }
            self.expect(Tok::Comma, "',' between arguments")?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(src: &str) -> String {
        parse(src, &Registry::default()).unwrap().to_string()
    }

    #[test]
    fn precedence_is_explicit_in_canonical_form() {
        assert_eq!(canonical("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(canonical("#NOUN and not $LEMMA == 'car'"), "(#NOUN && !($LEMMA == 'car'))");
        assert_eq!(canonical("!#NOUN || #VERB"), "(!#NOUN || #VERB)");
        assert_eq!(canonical("(!#NOUN) == false"), "((!#NOUN) == false)");
        assert_eq!(canonical("-(!#NOUN)"), "-(!#NOUN)");
        assert_eq!(canonical("not not #NOUN"), "!!#NOUN");
        assert_eq!(canonical("$_ |> lower() |> /x/"), "(($_ |> lower()) |> /x/)");
    }

    #[test]
    fn postfix_and_unary_print_distinctly() {
        assert_eq!(canonical("-$_[0]"), "-$_[0]");
        assert_eq!(canonical("(-$_)[0]"), "(-$_)[0]");
        assert_eq!(canonical("$_[1:]"), "$_[1:]");
        assert_eq!(canonical("$_[:-1]"), "$_[:-1]");
    }

    #[test]
    fn relations_and_annotations() {
        assert_eq!(canonical("@>dependency{'nsubj'}"), "@>dependency{'nsubj'}");
        assert_eq!(canonical("@ENTITY( $TYPE == \"PER\" )"), "@ENTITY(($TYPE == 'PER'))");
        assert_eq!(canonical("(?!< #DET )"), "(?!< #DET)");
    }

    #[test]
    fn arity_and_names_are_checked() {
        let registry = Registry::default();
        assert!(parse("if(#NOUN, 1)", &registry).is_err());
        assert!(parse("shout($_)", &registry).is_err());
        assert!(parse("%missing", &registry).is_err());
        assert!(parse("/(/", &registry).is_err());
        assert!(parse("", &registry).is_err());
        assert!(parse("1 2", &registry).is_err());
        assert!(parse("1e999", &registry).is_err());
        assert!(parse("first(1, 2)", &registry).is_err());
        for unary in ["first()", "last()", "flatten()", "count()", "@>dependency |> first() |> $LEMMA"] {
            assert!(parse(unary, &registry).is_ok(), "{unary}");
        }
    }

    #[test]
    fn types_are_inferred_bottom_up() {
        let registry = Registry::default();
        let kind = |src: &str| parse(src, &registry).unwrap().kind();
        assert_eq!(kind("$_"), ExpressionType::HSpan);
        assert_eq!(kind("lower()"), ExpressionType::Str);
        assert_eq!(kind("if(#NOUN, $_, 'x')"), ExpressionType::Str);
        assert_eq!(kind("if(#NOUN, 1, 'x')"), ExpressionType::Object);
        assert_eq!(kind("if(true, 'a', $X)"), ExpressionType::Object);
        assert_eq!(kind("first()"), ExpressionType::HSpan);
        assert_eq!(kind("len() + 1"), ExpressionType::Numeric);
        assert_eq!(kind("count(tokens())"), ExpressionType::Counter);
        assert_eq!(kind("map(tokens(), lemma())"), ExpressionType::Str);
        assert_eq!(kind("#NOUN || /x/"), ExpressionType::Predicate);
    }
}
