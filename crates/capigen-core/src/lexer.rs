//! Tokenizer for native-surface headers.
//!
//! Produces significant tokens only. Comments are folded into the
//! `comment` field of the token that follows them (a blank line in between
//! detaches them), preprocessor lines are dropped, and `/*--cef(...)--*/`
//! attribute comments become [`TokenKind::Attribute`] tokens.

use crate::error::{Location, ParseError, Result};

const ATTR_OPEN: &str = "/*--cef(";
const ATTR_CLOSE: &str = ")--*/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Number(String),
    Str(String),
    Punct(char),
    /// `::`
    Scope,
    /// `...`
    Ellipsis,
    /// Inner text of a `/*--cef(...)--*/` comment.
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
    /// Comment lines directly preceding this token.
    pub comment: Vec<String>,
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn is_ident(&self, s: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(i) if i == s)
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(i) => Some(i),
            _ => None,
        }
    }

    /// Source-like rendering, used in error messages.
    pub fn text(&self) -> String {
        match &self.kind {
            TokenKind::Ident(s) | TokenKind::Number(s) => s.clone(),
            TokenKind::Str(s) => format!("\"{s}\""),
            TokenKind::Punct(c) => c.to_string(),
            TokenKind::Scope => "::".to_string(),
            TokenKind::Ellipsis => "...".to_string(),
            TokenKind::Attribute(a) => format!("{ATTR_OPEN}{a}{ATTR_CLOSE}"),
        }
    }
}

/// Position-tracking reader over a token slice.
#[derive(Debug, Clone)]
pub struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Cursor { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_at(&self, offset: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + offset)
    }

    pub fn next(&mut self) -> Option<&'t Token> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Location of the next token, or of the last one at end of input.
    pub fn location(&self) -> Location {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.location)
            .unwrap_or_default()
    }

    pub fn eat_punct(&mut self, c: char) -> bool {
        if self.peek().is_some_and(|t| t.is_punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn eat_ident(&mut self, s: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_ident(s)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn eat_scope(&mut self) -> bool {
        if self.peek().is_some_and(|t| t.kind == TokenKind::Scope) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_punct(&mut self, c: char, construct: &str) -> Result<()> {
        if self.eat_punct(c) {
            return Ok(());
        }
        Err(self.unexpected(construct, &format!("'{c}'")))
    }

    pub fn expect_ident(&mut self, construct: &str) -> Result<String> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(self.unexpected(construct, "identifier")),
        }
    }

    /// Error naming what was expected and what was found instead.
    pub fn unexpected(&self, construct: &str, expected: &str) -> ParseError {
        let found = match self.peek() {
            Some(tok) => format!("'{}'", tok.text()),
            None => "end of input".to_string(),
        };
        ParseError::new(
            construct,
            self.location(),
            format!("expected {expected}, found {found}"),
        )
    }

    /// Skip past the token that closes the group opened just before the
    /// cursor. `(`/`{`/`[` nest; `<` is only tracked when `open` is `<`.
    pub fn skip_group(&mut self, open: char, close: char, construct: &str) -> Result<()> {
        let start = self.location();
        let mut depth = 1usize;
        while let Some(tok) = self.next() {
            if tok.is_punct(open) {
                depth += 1;
            } else if tok.is_punct(close) {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        Err(ParseError::new(
            construct,
            start,
            format!("missing closing '{close}'"),
        ))
    }
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    line: u32,
    column: u32,
    /// Whether a significant token was already seen on the current line.
    line_has_token: bool,
    pending_comment: Vec<String>,
    /// Newlines seen since the last comment or token.
    newlines_since_comment: u32,
    tokens: Vec<Token>,
}

/// Split header source into tokens.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        src,
        chars: src.char_indices().collect(),
        pos: 0,
        line: 1,
        column: 1,
        line_has_token: false,
        pending_comment: Vec::new(),
        newlines_since_comment: 0,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|&(_, c)| c)
    }

    fn byte_offset(&self) -> usize {
        self.chars.get(self.pos).map(|&(i, _)| i).unwrap_or(self.src.len())
    }

    fn rest(&self) -> &'a str {
        &self.src[self.byte_offset()..]
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.line_has_token = false;
            self.newlines_since_comment += 1;
            if self.newlines_since_comment > 1 {
                self.pending_comment.clear();
            }
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, location: Location) {
        self.line_has_token = true;
        self.newlines_since_comment = 0;
        let comment = std::mem::take(&mut self.pending_comment);
        self.tokens.push(Token {
            kind,
            location,
            comment,
        });
    }

    fn run(&mut self) -> Result<()> {
        while let Some(c) = self.peek() {
            let location = self.location();
            match c {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '#' if !self.line_has_token => self.skip_preprocessor(),
                '/' if self.rest().starts_with(ATTR_OPEN) => self.attribute(location)?,
                '/' if self.peek_at(1) == Some('/') => self.line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.block_comment(location)?,
                '"' => self.string(location)?,
                '\'' => self.char_literal(location)?,
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let ident = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                    self.push(TokenKind::Ident(ident), location);
                }
                c if c.is_ascii_digit() => {
                    let number = self.take_while(|c| c.is_ascii_alphanumeric() || c == '.');
                    self.push(TokenKind::Number(number), location);
                }
                ':' if self.peek_at(1) == Some(':') => {
                    self.bump();
                    self.bump();
                    self.push(TokenKind::Scope, location);
                }
                '.' if self.rest().starts_with("...") => {
                    for _ in 0..3 {
                        self.bump();
                    }
                    self.push(TokenKind::Ellipsis, location);
                }
                c if c.is_ascii_punctuation() => {
                    self.bump();
                    self.push(TokenKind::Punct(c), location);
                }
                other => {
                    return Err(ParseError::new(
                        "token",
                        location,
                        format!("unexpected character '{other}'"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    fn skip_preprocessor(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\\' && self.peek_at(1) == Some('\n') {
                self.bump();
                self.bump();
                continue;
            }
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn line_comment(&mut self) {
        let text = self.take_while(|c| c != '\n');
        self.add_comment_line(text.trim_start_matches('/'));
    }

    fn block_comment(&mut self, location: Location) -> Result<()> {
        let rest = self.rest();
        let end = rest[2..]
            .find("*/")
            .ok_or_else(|| ParseError::new("comment", location, "unterminated block comment"))?;
        let body = rest[2..2 + end].to_string();
        let len = body.chars().count() + 4;
        let kept = std::mem::take(&mut self.pending_comment);
        for _ in 0..len {
            self.bump();
        }
        self.pending_comment = kept;
        for line in body.lines() {
            let line = line.trim_start();
            let line = line.strip_prefix('*').unwrap_or(line);
            self.add_comment_line(line);
        }
        Ok(())
    }

    fn add_comment_line(&mut self, line: &str) {
        let line = line.strip_prefix(' ').unwrap_or(line).trim_end();
        self.pending_comment.push(line.to_string());
        self.newlines_since_comment = 0;
    }

    fn attribute(&mut self, location: Location) -> Result<()> {
        let rest = self.rest();
        let comment_end = rest[2..].find("*/").map(|i| i + 2);
        let close = rest.find(ATTR_CLOSE);
        let inner = match (close, comment_end) {
            (Some(c), Some(e)) if c + ATTR_CLOSE.len() - 2 == e => rest[ATTR_OPEN.len()..c].to_string(),
            _ => {
                return Err(ParseError::new(
                    "attribute",
                    location,
                    format!("attribute comment must be closed with '{ATTR_CLOSE}'"),
                ));
            }
        };
        let len = ATTR_OPEN.len() + inner.chars().count() + ATTR_CLOSE.len();
        for _ in 0..len {
            self.bump();
        }
        self.push(TokenKind::Attribute(inner.trim().to_string()), location);
        Ok(())
    }

    fn string(&mut self, location: Location) -> Result<()> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => {
                    if let Some(c) = self.bump() {
                        out.push('\\');
                        out.push(c);
                    }
                }
                Some('\n') | None => {
                    return Err(ParseError::new("string literal", location, "unterminated string"));
                }
                Some(c) => out.push(c),
            }
        }
        self.push(TokenKind::Str(out), location);
        Ok(())
    }

    fn char_literal(&mut self, location: Location) -> Result<()> {
        let mut out = String::from("'");
        self.bump();
        loop {
            match self.bump() {
                Some('\'') => break,
                Some('\\') => {
                    out.push('\\');
                    if let Some(c) = self.bump() {
                        out.push(c);
                    }
                }
                Some('\n') | None => {
                    return Err(ParseError::new("character literal", location, "unterminated literal"));
                }
                Some(c) => out.push(c),
            }
        }
        out.push('\'');
        self.push(TokenKind::Number(out), location);
        Ok(())
    }
}
