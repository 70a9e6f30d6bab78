//! Recursive-descent parser producing the function AST.
//!
//! The parser keeps one token of lookahead and pulls the next one from the
//! lexer only when it commits to the current – no buffering of the whole
//! stream and no backtracking. Syntax errors abort the parse immediately;
//! nothing is silently discarded.

use crate::error::{CompileResult, ParseError};
use crate::tokenizer::{Lexer, Token, TokenKind, describe_token, token_text};

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Num {
    value: i64,
  },
  Call {
    callee: String,
    args: Vec<Expr>,
  },
}

impl Expr {
  pub fn number(value: i64) -> Self {
    Self::Num { value }
  }

  pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Self {
    Self::Call {
      callee: callee.into(),
      args,
    }
  }
}

/// Name and parameter list of a function, independent of its body. Every
/// parameter is an integer, so names are all that is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
  pub name: String,
  pub params: Vec<String>,
}

/// A parsed `def`: prototype plus an ordered body of expression statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
  pub proto: Prototype,
  pub body: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
  pub functions: Vec<Function>,
}

/// Parse a whole source buffer into a program.
pub fn parse(source: &str) -> CompileResult<Program> {
  let mut stream = TokenStream::new(source)?;
  let mut functions = Vec::new();
  while !stream.is_eof() {
    functions.push(parse_definition(&mut stream)?);
  }
  Ok(Program { functions })
}

/// definition := "def" identifier "(" identifier* ")" expression+
///
/// The body runs until the next `def` or the end of input.
fn parse_definition(stream: &mut TokenStream) -> CompileResult<Function> {
  stream.expect_kind(TokenKind::Def, "expected \"def\"")?;
  let name = stream.expect_ident("expected a function name after \"def\"")?;
  stream.skip("(")?;

  let mut params = Vec::new();
  while stream.at_kind(TokenKind::Ident) {
    params.push(stream.expect_ident("expected a parameter name")?);
  }
  stream.skip(")")?;

  let mut body = Vec::new();
  while !stream.is_eof() && !stream.at_kind(TokenKind::Def) {
    body.push(parse_expr(stream)?);
  }
  if body.is_empty() {
    return Err(
      stream
        .error_here("function body must contain at least one expression")
        .into(),
    );
  }

  Ok(Function {
    proto: Prototype { name, params },
    body,
  })
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_primary(stream)
}

/// expression := number | identifier "(" (expression ("," expression)*)? ")"
///             | "(" expression ")"
fn parse_primary(stream: &mut TokenStream) -> CompileResult<Expr> {
  if stream.at_kind(TokenKind::Num) {
    let value = stream.expect_number()?;
    return Ok(Expr::number(value));
  }

  if stream.at_kind(TokenKind::Ident) {
    let loc = stream.loc();
    let callee = stream.expect_ident("expected an identifier")?;
    if !stream.equal("(")? {
      // The language has no variable references; an identifier only ever
      // names a callee.
      return Err(
        ParseError::at(
          stream.source,
          loc,
          format!("expected \"(\" after \"{callee}\"; bare identifiers are not expressions"),
        )
        .into(),
      );
    }
    let args = parse_call_arguments(stream)?;
    return Ok(Expr::call(callee, args));
  }

  if stream.equal("(")? {
    let inner = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(inner);
  }

  let got = stream.describe_current();
  Err(
    stream
      .error_here(format!("unexpected token \"{got}\" in expression"))
      .into(),
  )
}

/// Parse a comma-separated argument list; the opening parenthesis has
/// already been consumed. Zero arguments are fine.
fn parse_call_arguments(stream: &mut TokenStream) -> CompileResult<Vec<Expr>> {
  let mut args = Vec::new();
  if stream.equal(")")? {
    return Ok(args);
  }
  loop {
    args.push(parse_expr(stream)?);
    if stream.equal(",")? {
      continue;
    }
    stream.skip(")")?;
    break;
  }
  Ok(args)
}

/// Pull-based cursor over the lexer with exactly one token of lookahead.
struct TokenStream<'a> {
  lexer: Lexer<'a>,
  source: &'a str,
  current: Token,
}

impl<'a> TokenStream<'a> {
  fn new(source: &'a str) -> CompileResult<Self> {
    let mut lexer = Lexer::new(source);
    let current = lexer.next_token()?;
    Ok(Self {
      lexer,
      source,
      current,
    })
  }

  /// Consume the current token and pull the next one from the lexer.
  fn advance(&mut self) -> CompileResult<Token> {
    let next = self.lexer.next_token()?;
    Ok(std::mem::replace(&mut self.current, next))
  }

  fn at_kind(&self, kind: TokenKind) -> bool {
    self.current.kind == kind
  }

  fn is_eof(&self) -> bool {
    self.at_kind(TokenKind::Eof)
  }

  fn loc(&self) -> usize {
    self.current.loc
  }

  fn describe_current(&self) -> String {
    describe_token(&self.current, self.source)
  }

  fn error_here(&self, message: impl Into<String>) -> ParseError {
    ParseError::at(self.source, self.current.loc, message)
  }

  /// Consume the current token if it is the given punctuator.
  fn equal(&mut self, op: &str) -> CompileResult<bool> {
    if self.current.kind == TokenKind::Punctuator
      && token_text(&self.current, self.source) == op
    {
      self.advance()?;
      return Ok(true);
    }
    Ok(false)
  }

  fn skip(&mut self, op: &str) -> CompileResult<()> {
    if self.equal(op)? {
      Ok(())
    } else {
      let got = self.describe_current();
      Err(
        self
          .error_here(format!("expected \"{op}\", but got \"{got}\""))
          .into(),
      )
    }
  }

  fn expect_kind(&mut self, kind: TokenKind, message: &str) -> CompileResult<Token> {
    if self.current.kind == kind {
      self.advance()
    } else {
      let got = self.describe_current();
      Err(
        self
          .error_here(format!("{message}, but got \"{got}\""))
          .into(),
      )
    }
  }

  fn expect_ident(&mut self, message: &str) -> CompileResult<String> {
    let token = self.expect_kind(TokenKind::Ident, message)?;
    Ok(token_text(&token, self.source).to_string())
  }

  fn expect_number(&mut self) -> CompileResult<i64> {
    let token = self.expect_kind(TokenKind::Num, "expected a number")?;
    token.value.ok_or_else(|| {
      ParseError::at(
        self.source,
        token.loc,
        "internal error: numeric token missing value",
      )
      .into()
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CompileError;

  fn parse_one(source: &str) -> Function {
    let mut program = parse(source).expect("parse failed");
    assert_eq!(program.functions.len(), 1);
    program.functions.remove(0)
  }

  #[test]
  fn test_parses_definition_with_print_call() {
    let func = parse_one("def main()\nprint(123)");
    assert_eq!(func.proto.name, "main");
    assert!(func.proto.params.is_empty());
    assert_eq!(func.body, vec![Expr::call("print", vec![Expr::number(123)])]);
  }

  #[test]
  fn test_body_is_a_sequence_of_expressions() {
    let func = parse_one("def main()\nprint(1)\nprint(2)");
    assert_eq!(func.body.len(), 2);
  }

  #[test]
  fn test_parameter_names_are_comma_free() {
    let func = parse_one("def add(a b)\nprint(1)");
    assert_eq!(func.proto.params, vec!["a".to_string(), "b".to_string()]);
  }

  #[test]
  fn test_call_arguments_are_comma_separated() {
    let func = parse_one("def main()\nwrap(1, other(), 3)");
    assert_eq!(
      func.body,
      vec![Expr::call(
        "wrap",
        vec![
          Expr::number(1),
          Expr::call("other", vec![]),
          Expr::number(3),
        ],
      )]
    );
  }

  #[test]
  fn test_next_def_terminates_the_body() {
    let program = parse("def one()\nprint(1)\ndef two()\nprint(2)").unwrap();
    assert_eq!(program.functions.len(), 2);
    assert_eq!(program.functions[0].body.len(), 1);
    assert_eq!(program.functions[1].proto.name, "two");
  }

  #[test]
  fn test_parenthesized_expression_is_its_inner_node() {
    let func = parse_one("def main()\n(7)");
    assert_eq!(func.body, vec![Expr::number(7)]);
  }

  #[test]
  fn test_empty_source_is_an_empty_program() {
    let program = parse("").unwrap();
    assert!(program.functions.is_empty());
  }

  fn parse_error(source: &str) -> ParseError {
    match parse(source) {
      Err(CompileError::Parse { source }) => source,
      other => panic!("expected a parse error, got {other:?}"),
    }
  }

  #[test]
  fn test_missing_function_name_is_rejected() {
    let err = parse_error("def ()\nprint(1)");
    assert!(err.to_string().contains("function name"), "got: {err}");
  }

  #[test]
  fn test_bare_identifier_is_rejected() {
    let err = parse_error("def main()\nx");
    assert!(
      err.to_string().contains("bare identifiers"),
      "got: {err}"
    );
  }

  #[test]
  fn test_unmatched_parenthesis_is_rejected() {
    let err = parse_error("def main()\nprint(1");
    assert!(err.to_string().contains("expected \")\""), "got: {err}");
  }

  #[test]
  fn test_empty_body_is_rejected() {
    let err = parse_error("def main()");
    assert!(
      err.to_string().contains("at least one expression"),
      "got: {err}"
    );
  }

  #[test]
  fn test_stray_punctuation_in_body_is_rejected() {
    let err = parse_error("def main()\n,");
    assert!(err.to_string().contains("unexpected token"), "got: {err}");
  }
}
