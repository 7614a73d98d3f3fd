// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

use std::fmt::{Display, Formatter};
use std::path::Path;
use regex::Regex;
use crate::location::{PointLocation, SegmentLocation};
use crate::{TokenId, EOF, UNDEFINED};

pub(crate) mod tests;

/// Token produced by a [Lexer].
#[derive(Clone, PartialEq, Debug)]
pub struct Token {
    pub name: TokenId,
    pub text: String,
    pub location: SegmentLocation,
}

impl Token {
    pub fn new<T: Into<String>>(name: TokenId, text: T, location: SegmentLocation) -> Self {
        Token { name, text: text.into(), location }
    }

    /// Token synthesized by the parser, without text.
    pub fn synthetic(name: TokenId, at: PointLocation) -> Self {
        Token { name, text: String::new(), location: SegmentLocation::new(at, at) }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, ":{} '{}' at {}", self.name, self.text, self.location.start)
    }
}

/// Token source consumed by the token stream. The lexer must end the input with an [EOF] token
/// and repeat it if it's called again.
pub trait Lexer {
    fn set_source_text(&mut self, text: &str);

    fn set_source_file(&mut self, path: &Path) -> std::io::Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.set_source_text(&text);
        Ok(())
    }

    fn next_token(&mut self) -> Token;

    /// Creates a token that doesn't come from the text, like [ANY](crate::ANY) or
    /// [ERROR](crate::ERROR).
    fn create_token(&self, name: TokenId) -> Token {
        Token::synthetic(name, PointLocation::default())
    }
}

// ---------------------------------------------------------------------------------------------

/// Lexer based on a list of regular expressions. At each position, the longest match wins; on
/// equal length, the first declared rule wins and tokens win over skipped patterns. A character
/// that matches nothing produces an [UNDEFINED] token.
#[derive(Clone, Debug)]
pub struct RegexLexer {
    rules: Vec<(TokenId, Regex)>,
    skip: Vec<Regex>,
    ignore_case: bool,
    text: String,
    pos: PointLocation,
}

impl RegexLexer {
    pub fn new() -> Self {
        RegexLexer {
            rules: Vec::new(),
            skip: Vec::new(),
            ignore_case: false,
            text: String::new(),
            pos: PointLocation::new(1, 1, 0),
        }
    }

    /// Patterns added afterwards are case-insensitive.
    pub fn set_ignore_case(&mut self, ignore_case: bool) {
        self.ignore_case = ignore_case;
    }

    fn compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        let flags = if self.ignore_case { "(?i)" } else { "" };
        Regex::new(&format!("^{flags}(?:{pattern})"))
    }

    pub fn add_token(&mut self, name: TokenId, pattern: &str) -> Result<(), regex::Error> {
        let re = self.compile(pattern)?;
        self.rules.push((name, re));
        Ok(())
    }

    /// Adds a token matching `literal` exactly.
    pub fn add_literal(&mut self, name: TokenId, literal: &str) -> Result<(), regex::Error> {
        self.add_token(name, &regex::escape(literal))
    }

    pub fn add_skip(&mut self, pattern: &str) -> Result<(), regex::Error> {
        let re = self.compile(pattern)?;
        self.skip.push(re);
        Ok(())
    }

    fn longest<'a, I: Iterator<Item = &'a Regex>>(patterns: I, rest: &str) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for (i, re) in patterns.enumerate() {
            if let Some(m) = re.find(rest) {
                let len = m.end();
                if len > 0 && best.map(|(_, l)| len > l).unwrap_or(true) {
                    best = Some((i, len));
                }
            }
        }
        best
    }
}

impl Default for RegexLexer {
    fn default() -> Self {
        RegexLexer::new()
    }
}

impl Lexer for RegexLexer {
    fn set_source_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.pos = PointLocation::new(1, 1, 0);
    }

    fn next_token(&mut self) -> Token {
        loop {
            let rest = &self.text[self.pos.offset..];
            if rest.is_empty() {
                return Token::synthetic(EOF, self.pos);
            }
            let token = RegexLexer::longest(self.rules.iter().map(|(_, re)| re), rest);
            let skip = RegexLexer::longest(self.skip.iter(), rest);
            let (name, len) = match (token, skip) {
                (Some((_, t_len)), Some((_, s_len))) if s_len > t_len => {
                    self.pos = self.pos.advance(&rest[..s_len]);
                    continue;
                }
                (None, Some((_, s_len))) => {
                    self.pos = self.pos.advance(&rest[..s_len]);
                    continue;
                }
                (Some((i, t_len)), _) => (self.rules[i].0, t_len),
                (None, None) => (UNDEFINED, rest.chars().next().map(|c| c.len_utf8()).unwrap_or(1)),
            };
            let lexeme = &rest[..len];
            let start = self.pos;
            self.pos = self.pos.advance(lexeme);
            return Token::new(name, lexeme, SegmentLocation::new(start, self.pos));
        }
    }

    fn create_token(&self, name: TokenId) -> Token {
        Token::synthetic(name, self.pos)
    }
}
