//! Token pattern tokenizer.

use crate::scan::{Cursor, Lookaround};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Str(String),
    Num(f64),
    Regex { body: String, flags: String },
    Tilde,
    Hash(String),
    Dollar(String),
    Percent(String),
    At(String),
    RelOut(String),
    RelIn(String),
    Eq,
    LParen,
    NamedGroup(String),
    Look(Lookaround),
    RParen,
    Pipe,
    Amp,
    Bang,
    Question,
    Star,
    Plus,
    LBrace,
    RBrace,
    Comma,
    Caret,
    DoubleCaret,
    Eof,
}

/// A token with its byte extent in the pattern source.
#[derive(Debug, Clone)]
pub(crate) struct Lexed {
    pub tok: Tok,
    pub pos: usize,
    pub end: usize,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Lexed>> {
    let mut cur = Cursor::new(src);
    let mut out = Vec::new();
    loop {
        cur.skip_whitespace();
        let pos = cur.pos();
        let Some(c) = cur.peek() else {
            out.push(Lexed { tok: Tok::Eof, pos, end: pos });
            return Ok(out);
        };
        let tok = match c {
            '\'' | '"' => Tok::Str(cur.read_quoted()?),
            '/' => {
                let body = cur.read_delimited()?;
                Tok::Regex { body, flags: cur.read_flags() }
            }
            '0'..='9' => Tok::Num(cur.read_number()?),
            '#' => {
                cur.bump();
                Tok::Hash(name(&mut cur, pos, "$")?)
            }
            '$' => {
                cur.bump();
                Tok::Dollar(name(&mut cur, pos, "")?)
            }
            '%' => {
                cur.bump();
                Tok::Percent(name(&mut cur, pos, "-")?)
            }
            '@' => {
                cur.bump();
                if cur.eat(">") {
                    Tok::RelOut(cur.read_name(""))
                } else if cur.eat("<") {
                    Tok::RelIn(cur.read_name(""))
                } else {
                    Tok::At(name(&mut cur, pos, "")?)
                }
            }
            '(' => {
                if let Some(caps) = crate::regex!(r"^\(\?<([A-Za-z_][A-Za-z0-9_]*)>").captures(cur.rest()) {
                    let opener = caps.get(0).map_or("", |m| m.as_str());
                    let group = caps.get(1).map_or("", |m| m.as_str()).to_string();
                    cur.eat(opener);
                    Tok::NamedGroup(group)
                } else if let Some(look) = cur.eat_lookaround() {
                    Tok::Look(look)
                } else {
                    cur.bump();
                    Tok::LParen
                }
            }
            '^' => {
                if cur.eat("^^") {
                    Tok::DoubleCaret
                } else {
                    cur.bump();
                    Tok::Caret
                }
            }
            _ => {
                cur.bump();
                match c {
                    '~' => Tok::Tilde,
                    '=' => Tok::Eq,
                    ')' => Tok::RParen,
                    '|' => Tok::Pipe,
                    '&' => Tok::Amp,
                    '!' => Tok::Bang,
                    '?' => Tok::Question,
                    '*' => Tok::Star,
                    '+' => Tok::Plus,
                    '{' => Tok::LBrace,
                    '}' => Tok::RBrace,
                    ',' => Tok::Comma,
                    other => return Err(Error::compile(pos, format!("unexpected character '{other}' in pattern"))),
                }
            }
        };
        out.push(Lexed { tok, pos, end: cur.pos() });
    }
}

fn name(cur: &mut Cursor<'_>, pos: usize, extra: &str) -> Result<String> {
    let name = cur.read_name(extra);
    if name.is_empty() {
        return Err(Error::compile(pos, "expected a name after sigil"));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|l| l.tok).collect()
    }

    #[test]
    fn named_groups_versus_lookbehind() {
        assert_eq!(toks("(?<who> ~)")[0], Tok::NamedGroup("who".into()));
        assert_eq!(toks("(?< #DET)")[0], Tok::Look(Lookaround::Behind));
        assert_eq!(toks("(?!> 'x')")[0], Tok::Look(Lookaround::NotAhead));
    }

    #[test]
    fn atoms_and_quantifiers() {
        assert_eq!(
            toks("^^ 'old' #NN+ $LEMMA=/car/i{1,2}"),
            vec![
                Tok::DoubleCaret,
                Tok::Str("old".into()),
                Tok::Hash("NN".into()),
                Tok::Plus,
                Tok::Dollar("LEMMA".into()),
                Tok::Eq,
                Tok::Regex { body: "car".into(), flags: "i".into() },
                Tok::LBrace,
                Tok::Num(1.0),
                Tok::Comma,
                Tok::Num(2.0),
                Tok::RBrace,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn extents_allow_adjacency_checks() {
        let lexed = tokenize("@ENTITY(#NNP) (~)").unwrap();
        assert_eq!(lexed[0].end, lexed[1].pos);
        assert!(lexed[4].pos > lexed[3].end);
        assert!(tokenize("'a' ; 'b'").is_err());
    }
}
