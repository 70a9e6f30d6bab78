//! Shared error types for the compilation pipeline.
//!
//! Each stage owns its own taxonomy and the crate-level `CompileError`
//! wraps them transparently, so `?` crosses stage boundaries without losing
//! which stage failed. Syntax diagnostics are kept lightweight on purpose –
//! the offending line is rendered with a caret pointing at the byte that
//! broke the parse.

use snafu::Snafu;
use std::path::PathBuf;

pub type CompileResult<T> = Result<T, CompileError>;

/// Umbrella error covering every stage of the pipeline.
#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(context(false), display("{source}"))]
  Lex { source: LexError },

  #[snafu(context(false), display("{source}"))]
  Parse { source: ParseError },

  #[snafu(context(false), display("{source}"))]
  Codegen { source: CodegenError },

  #[snafu(context(false), display("{source}"))]
  Backend { source: BackendError },
}

/// Lexical failures. The grammar classifies every byte, so the only way the
/// scanner itself can fail today is a decimal literal overflowing `i64`;
/// further variants belong here once string or comment literals exist.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LexError {
  #[snafu(display("integer literal \"{text}\" does not fit in 64 bits"))]
  NumberTooLarge { text: String, loc: usize },
}

/// Syntax errors raised by the recursive-descent parser.
#[derive(Debug, Snafu)]
pub enum ParseError {
  #[snafu(display("{rendered}\n{marker} {message}"))]
  Syntax {
    rendered: String,
    marker: String,
    message: String,
    loc: usize,
  },
}

impl ParseError {
  /// Construct an error anchored at a byte offset, rendering the offending
  /// source line with a caret underneath the position.
  pub fn at(source: &str, loc: usize, message: impl Into<String>) -> Self {
    let safe_loc = loc.min(source.len());
    let mut line_start = 0;
    let mut line_num = 1;
    for (i, c) in source.char_indices() {
      if i >= safe_loc {
        break;
      }
      if c == '\n' {
        line_start = i + 1;
        line_num += 1;
      }
    }
    let line_end = source[line_start..]
      .find('\n')
      .map(|i| line_start + i)
      .unwrap_or(source.len());
    let prefix = format!("line {line_num}: ");
    let rendered = format!("{prefix}{}", &source[line_start..line_end]);
    let col = source[line_start..safe_loc].chars().count();
    let marker = format!("{}^", " ".repeat(prefix.len() + col));
    Self::Syntax {
      rendered,
      marker,
      message: message.into(),
      loc,
    }
  }

  /// Byte offset of the offending token.
  pub fn location(&self) -> usize {
    match self {
      Self::Syntax { loc, .. } => *loc,
    }
  }
}

/// Failures while lowering the AST.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CodegenError {
  #[snafu(display("call to undeclared function \"{name}\""))]
  UnresolvedSymbol { name: String },

  #[snafu(display("code generation attempted after the generator was finalized"))]
  GeneratorFinalized,

  #[snafu(display("builtin \"{name}\" takes {expected} argument(s), but {found} were supplied"))]
  BadIntrinsicCall {
    name: String,
    expected: usize,
    found: usize,
  },
}

/// Failures at the object-emission boundary.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
  #[snafu(display("unknown target \"{target}\""))]
  UnknownTarget { target: String },

  #[snafu(display("failed to write object file {}: {source}", path.display()))]
  WriteObject {
    path: PathBuf,
    source: std::io::Error,
  },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_error_points_at_offending_line() {
    let source = "def main()\nprint(123)";
    let err = ParseError::at(source, 11, "unexpected token");
    let text = err.to_string();
    assert!(text.contains("line 2: print(123)"), "got: {text}");
    assert!(text.contains("^ unexpected token"), "got: {text}");
    assert_eq!(err.location(), 11);
  }

  #[test]
  fn test_parse_error_clamps_out_of_range_offset() {
    let err = ParseError::at("def", 99, "ran out of input");
    assert!(err.to_string().contains("ran out of input"));
  }

  #[test]
  fn test_stage_errors_convert_into_compile_error() {
    let err: CompileError = CodegenError::UnresolvedSymbol {
      name: "foo".to_string(),
    }
    .into();
    assert_eq!(err.to_string(), "call to undeclared function \"foo\"");
  }
}
