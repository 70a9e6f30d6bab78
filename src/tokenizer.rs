//! Lexical analysis: an incremental scanner over an immutable source buffer.
//!
//! The lexer hands out one token per call instead of materialising the whole
//! stream up front; the parser owns the pacing. Two cursor positions are
//! tracked explicitly – the current byte and a one-byte lookahead – and both
//! move together on every advance, so identifier and number accumulation can
//! never skip or double-read a character.

use snafu::OptionExt;

use crate::error::{LexError, NumberTooLargeSnafu};

/// The reserved word introducing a function definition.
pub const KEYWORD_DEF: &str = "def";

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  /// The `def` keyword.
  Def,
  Ident,
  Num,
  Punctuator,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  /// Convenience constructor to keep the scanning loops readable.
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<i64>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
    }
  }
}

/// Forward-only scanner with an index cursor into an immutable buffer.
pub struct Lexer<'a> {
  source: &'a str,
  bytes: &'a [u8],
  /// Byte offset of the current character.
  pos: usize,
  /// Byte offset one past `pos`; kept in lockstep with it.
  lookahead: usize,
}

impl<'a> Lexer<'a> {
  pub fn new(source: &'a str) -> Self {
    Self {
      source,
      bytes: source.as_bytes(),
      pos: 0,
      lookahead: 1,
    }
  }

  fn current(&self) -> Option<u8> {
    self.bytes.get(self.pos).copied()
  }

  fn peek(&self) -> Option<u8> {
    self.bytes.get(self.lookahead).copied()
  }

  /// Advance both cursor positions together.
  fn bump(&mut self) {
    self.pos += 1;
    self.lookahead = self.pos + 1;
  }

  /// Scan and return the next token, advancing exactly past its characters.
  /// Past the end of the buffer this keeps returning `Eof`.
  pub fn next_token(&mut self) -> Result<Token, LexError> {
    while let Some(c) = self.current() {
      if c.is_ascii_whitespace() {
        self.bump();
      } else {
        break;
      }
    }

    let Some(c) = self.current() else {
      return Ok(Token::new(TokenKind::Eof, self.source.len(), 0, None));
    };

    if c.is_ascii_alphabetic() {
      return Ok(self.lex_ident());
    }
    if c.is_ascii_digit() {
      return self.lex_number();
    }

    // Any other byte becomes its own punctuator token; the parser decides
    // whether it is meaningful.
    let loc = self.pos;
    self.bump();
    Ok(Token::new(TokenKind::Punctuator, loc, 1, None))
  }

  fn lex_ident(&mut self) -> Token {
    let start = self.pos;
    // The current byte is part of the token; the lookahead decides whether
    // to extend, so no byte is ever read twice.
    while let Some(next) = self.peek() {
      if next.is_ascii_alphanumeric() {
        self.bump();
      } else {
        break;
      }
    }
    self.bump();
    let text = &self.source[start..self.pos];
    let kind = if text == KEYWORD_DEF {
      TokenKind::Def
    } else {
      TokenKind::Ident
    };
    Token::new(kind, start, self.pos - start, None)
  }

  fn lex_number(&mut self) -> Result<Token, LexError> {
    let start = self.pos;
    while let Some(next) = self.peek() {
      if next.is_ascii_digit() {
        self.bump();
      } else {
        break;
      }
    }
    self.bump();
    let text = &self.source[start..self.pos];
    let value = text
      .parse::<i64>()
      .ok()
      .context(NumberTooLargeSnafu { text, loc: start })?;
    Ok(Token::new(TokenKind::Num, start, self.pos - start, Some(value)))
  }
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  &source[token.loc..token.loc + token.len]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: &Token, source: &str) -> String {
  match token.kind {
    TokenKind::Eof => "EOF".to_string(),
    _ => token_text(token, source).to_string(),
  }
}
