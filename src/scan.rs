//! Character cursor shared by the expression and token pattern lexers.
//!
//! Both languages share their leaf syntax: quoted strings, `/regex/flags`
//! bodies, sigil names (`#NOUN`, `$LEMMA`, `%lexicon`, `@ENTITY`) and numbers.

use crate::{Error, Result};
use regex::{Regex, RegexBuilder};

pub(crate) struct Cursor<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Cursor<'s> {
    pub(crate) fn new(src: &'s str) -> Self {
        Cursor { src, pos: 0 }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub(crate) fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume `prefix` if the input continues with it.
    pub(crate) fn eat(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    pub(crate) fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    pub(crate) fn error(&self, msg: impl Into<String>) -> Error {
        Error::compile(self.pos, msg)
    }

    /// Read `[A-Za-z0-9_]` plus any of `extra`.
    pub(crate) fn read_name(&mut self, extra: &str) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_' || extra.contains(c)) {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    /// Read a quoted string; the cursor must sit on the opening quote.
    pub(crate) fn read_quoted(&mut self) -> Result<String> {
        let start = self.pos;
        let quote = self.bump().ok_or_else(|| self.error("expected a quoted string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => break,
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(Error::compile(start, "unterminated string literal"))
    }

    /// Read a `/`-delimited body; the cursor must sit on the opening slash.
    ///
    /// The body is returned raw (escapes kept) so it prints back verbatim.
    pub(crate) fn read_delimited(&mut self) -> Result<String> {
        let start = self.pos;
        self.bump();
        let body_start = self.pos;
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some('/') => return Ok(self.src[body_start..self.pos - 1].to_string()),
                Some(_) => {}
                None => return Err(Error::compile(start, "unterminated regular expression")),
            }
        }
    }

    pub(crate) fn read_flags(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    /// An unsigned decimal literal. Literals that overflow to infinity are
    /// rejected so every accepted number prints back as a number.
    pub(crate) fn read_number(&mut self) -> Result<f64> {
        let Some(m) = crate::regex!(r"^[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?").find(self.rest()) else {
            return Err(self.error("malformed number"));
        };
        let value = m.as_str().parse::<f64>().map_err(|_| self.error("malformed number"))?;
        if !value.is_finite() {
            return Err(self.error(format!("number {} is out of range", m.as_str())));
        }
        self.pos += m.end();
        Ok(value)
    }
}

/// Zero-width neighbour tests: `(?> x)`, `(?!> x)`, `(?< x)` and `(?!< x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookaround {
    Ahead,
    NotAhead,
    Behind,
    NotBehind,
}

impl Lookaround {
    pub(crate) fn opener(self) -> &'static str {
        match self {
            Lookaround::Ahead => "(?>",
            Lookaround::NotAhead => "(?!>",
            Lookaround::Behind => "(?<",
            Lookaround::NotBehind => "(?!<",
        }
    }

    pub(crate) fn is_negated(self) -> bool {
        matches!(self, Lookaround::NotAhead | Lookaround::NotBehind)
    }

    pub(crate) fn is_behind(self) -> bool {
        matches!(self, Lookaround::Behind | Lookaround::NotBehind)
    }
}

impl<'s> Cursor<'s> {
    pub(crate) fn eat_lookaround(&mut self) -> Option<Lookaround> {
        [Lookaround::NotAhead, Lookaround::NotBehind, Lookaround::Ahead, Lookaround::Behind]
            .into_iter()
            .find(|look| self.eat(look.opener()))
    }
}

/// Single-quote `s` for canonical output.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Compile a `/body/flags` literal. `anchored` requires a full-text match.
pub(crate) fn build_regex(body: &str, flags: &str, anchored: bool, position: usize) -> Result<Regex> {
    let body = body.replace("\\/", "/");
    let source = if anchored { format!("^(?:{body})$") } else { body };
    let mut builder = RegexBuilder::new(&source);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            // global replacement; only meaningful for substitutions
            'g' => {}
            other => return Err(Error::compile(position, format!("unknown regex flag '{other}'"))),
        }
    }
    builder.build().map_err(|e| Error::compile(position, format!("invalid regex /{source}/: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_strings_unescape() {
        let mut c = Cursor::new(r#"'it\'s' rest"#);
        assert_eq!(c.read_quoted().unwrap(), "it's");
        assert_eq!(c.rest(), " rest");
        assert!(Cursor::new("'open").read_quoted().is_err());
    }

    #[test]
    fn delimited_bodies_stay_raw() {
        let mut c = Cursor::new(r"/a\/b/i");
        assert_eq!(c.read_delimited().unwrap(), r"a\/b");
        assert_eq!(c.read_flags(), "i");
    }

    #[test]
    fn quote_round_trips() {
        let original = "it's a \\ test";
        let quoted = quote(original);
        assert_eq!(Cursor::new(&quoted).read_quoted().unwrap(), original);
    }

    #[test]
    fn numbers_and_names() {
        let mut c = Cursor::new("12.5e1x PRP$ rest");
        assert_eq!(c.read_number().unwrap(), 125.0);
        assert_eq!(c.read_name(""), "x");
        c.skip_whitespace();
        assert_eq!(c.read_name("$"), "PRP$");
    }

    #[test]
    fn overflowing_numbers_are_rejected() {
        let err = Cursor::new("1e999").read_number().unwrap_err();
        assert!(err.is_compile());
        assert_eq!(Cursor::new("1e308").read_number().unwrap(), 1e308);
    }

    #[test]
    fn anchored_regexes_match_whole_text() {
        let re = build_regex("ca.", "i", true, 0).unwrap();
        assert!(re.is_match("CAR"));
        assert!(!re.is_match("cars"));
        assert!(build_regex("x", "z", false, 0).is_err());
    }
}
