//! Expression tokenizer.
//!
//! `/` is ambiguous between division and a regex literal. It divides when the
//! previous token ends a value (`$X / 2`, `len() / 3`) and opens a regex
//! otherwise (`/^th/`, `$_ |> /x/`).

use crate::scan::{Cursor, Lookaround};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Str(String),
    Num(f64),
    Ident(String),
    /// `$NAME`, or `$_` for the input itself.
    Dollar(String),
    Hash(String),
    Percent(String),
    At(String),
    /// `@>type` / `@<type`; the type may be empty.
    RelOut(String),
    RelIn(String),
    Regex { body: String, flags: String },
    Subst { body: String, replacement: String, flags: String },
    Look(Lookaround),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Pipe,
    Eof,
}

impl Tok {
    fn ends_value(&self) -> bool {
        match self {
            Tok::Ident(word) => !matches!(word.as_str(), "and" | "or" | "not" | "in"),
            Tok::Str(_)
            | Tok::Num(_)
            | Tok::Dollar(_)
            | Tok::Hash(_)
            | Tok::Percent(_)
            | Tok::At(_)
            | Tok::RelOut(_)
            | Tok::RelIn(_)
            | Tok::Regex { .. }
            | Tok::Subst { .. }
            | Tok::RParen
            | Tok::RBracket
            | Tok::RBrace => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Lexed {
    pub tok: Tok,
    pub pos: usize,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Lexed>> {
    let mut cur = Cursor::new(src);
    let mut out: Vec<Lexed> = Vec::new();
    loop {
        cur.skip_whitespace();
        let pos = cur.pos();
        let after_value = out.last().is_some_and(|l| l.tok.ends_value());
        let Some(c) = cur.peek() else {
            out.push(Lexed { tok: Tok::Eof, pos });
            return Ok(out);
        };
        let tok = match c {
            '\'' | '"' => Tok::Str(cur.read_quoted()?),
            '0'..='9' => Tok::Num(cur.read_number()?),
            '$' => {
                cur.bump();
                Tok::Dollar(sigil_name(&mut cur, pos, "")?)
            }
            '#' => {
                cur.bump();
                Tok::Hash(sigil_name(&mut cur, pos, "$")?)
            }
            '%' => {
                cur.bump();
                Tok::Percent(sigil_name(&mut cur, pos, "-")?)
            }
            '@' => {
                cur.bump();
                if cur.eat(">") {
                    Tok::RelOut(cur.read_name(""))
                } else if cur.eat("<") {
                    Tok::RelIn(cur.read_name(""))
                } else {
                    Tok::At(sigil_name(&mut cur, pos, "")?)
                }
            }
            '/' if !after_value => {
                let body = cur.read_delimited()?;
                Tok::Regex { body, flags: cur.read_flags() }
            }
            's' if !after_value && cur.peek_nth(1) == Some('/') => {
                cur.bump();
                let body = cur.read_delimited()?;
                // the closing slash of the pattern opens the replacement
                let replacement = read_replacement(&mut cur, pos)?;
                Tok::Subst { body, replacement, flags: cur.read_flags() }
            }
            c if c.is_alphabetic() || c == '_' => Tok::Ident(cur.read_name("")),
            '(' => match cur.eat_lookaround() {
                Some(look) => Tok::Look(look),
                None => punct(&mut cur, Tok::LParen),
            },
            ')' => punct(&mut cur, Tok::RParen),
            '[' => punct(&mut cur, Tok::LBracket),
            ']' => punct(&mut cur, Tok::RBracket),
            '{' => punct(&mut cur, Tok::LBrace),
            '}' => punct(&mut cur, Tok::RBrace),
            ',' => punct(&mut cur, Tok::Comma),
            ':' => punct(&mut cur, Tok::Colon),
            '+' => punct(&mut cur, Tok::Plus),
            '-' => punct(&mut cur, Tok::Minus),
            '*' => punct(&mut cur, Tok::Star),
            '/' => punct(&mut cur, Tok::Slash),
            _ => {
                let table: [(&str, Tok); 9] = [
                    ("==", Tok::EqEq),
                    ("!=", Tok::NotEq),
                    ("<=", Tok::Le),
                    (">=", Tok::Ge),
                    ("&&", Tok::AndAnd),
                    ("||", Tok::OrOr),
                    ("|>", Tok::Pipe),
                    ("<", Tok::Lt),
                    (">", Tok::Gt),
                ];
                match table.into_iter().find(|(text, _)| cur.eat(text)) {
                    Some((_, tok)) => tok,
                    None if cur.eat("!") => Tok::Bang,
                    None => return Err(Error::compile(pos, format!("unexpected character '{c}'"))),
                }
            }
        };
        out.push(Lexed { tok, pos });
    }
}

fn punct(cur: &mut Cursor<'_>, tok: Tok) -> Tok {
    cur.bump();
    tok
}

fn sigil_name(cur: &mut Cursor<'_>, pos: usize, extra: &str) -> Result<String> {
    let name = cur.read_name(extra);
    if name.is_empty() {
        return Err(Error::compile(pos, "expected a name after sigil"));
    }
    Ok(name)
}

/// Replacement text of `s/re/repl/`, read up to the closing unescaped slash.
fn read_replacement(cur: &mut Cursor<'_>, pos: usize) -> Result<String> {
    let mut out = String::new();
    loop {
        match cur.bump() {
            Some('\\') if cur.peek() == Some('/') => {
                cur.bump();
                out.push('/');
            }
            Some('/') => return Ok(out),
            Some(c) => out.push(c),
            None => return Err(Error::compile(pos, "unterminated substitution")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|l| l.tok).collect()
    }

    #[test]
    fn slash_is_division_after_a_value() {
        assert_eq!(toks("$X / 2"), vec![Tok::Dollar("X".into()), Tok::Slash, Tok::Num(2.0), Tok::Eof]);
        assert_eq!(
            toks("/^th/i"),
            vec![Tok::Regex { body: "^th".into(), flags: "i".into() }, Tok::Eof]
        );
    }

    #[test]
    fn sigils_and_relations() {
        assert_eq!(
            toks("$_ #PRP$ %colors @>dep @<"),
            vec![
                Tok::Dollar("_".into()),
                Tok::Hash("PRP$".into()),
                Tok::Percent("colors".into()),
                Tok::RelOut("dep".into()),
                Tok::RelIn(String::new()),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn substitution_and_lookaround() {
        assert_eq!(
            toks("s/a+/b/g (?> #NOUN)"),
            vec![
                Tok::Subst { body: "a+".into(), replacement: "b".into(), flags: "g".into() },
                Tok::Look(Lookaround::Ahead),
                Tok::Hash("NOUN".into()),
                Tok::RParen,
                Tok::Eof,
            ]
        );
        assert_eq!(toks("s")[0], Tok::Ident("s".into()));
    }

    #[test]
    fn operators() {
        assert_eq!(
            toks("a |> b || !c <= d"),
            vec![
                Tok::Ident("a".into()),
                Tok::Pipe,
                Tok::Ident("b".into()),
                Tok::OrOr,
                Tok::Bang,
                Tok::Ident("c".into()),
                Tok::Le,
                Tok::Ident("d".into()),
                Tok::Eof,
            ]
        );
        assert!(tokenize("a ; b").is_err());
    }
}
