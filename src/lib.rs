//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be evolved
//! independently:
//! - `tokenizer` performs lexical analysis, one token per pull.
//! - `parser` owns all syntactic knowledge and returns the function AST.
//! - `codegen` walks the AST and drives the backend selected for the unit.
//! - `asm` lowers into segment-based assembly text; `ir` builds an
//!   SSA-style module instead.
//! - `emit` is the narrow boundary to native object emission.
//! - `error` centralises the per-stage error taxonomy.

pub mod asm;
pub mod codegen;
pub mod emit;
pub mod error;
pub mod ir;
pub mod parser;
pub mod tokenizer;

pub use codegen::{BackendKind, Lowered};
pub use error::{CompileError, CompileResult};

/// Compile a source string with the selected backend.
pub fn compile(source: &str, backend: BackendKind) -> CompileResult<Lowered> {
  let program = parser::parse(source)?;
  let lowered = codegen::generate(&program, backend)?;
  Ok(lowered)
}

/// Compile a source string straight to assembly text.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  match compile(source, BackendKind::Assembly)? {
    Lowered::Assembly(asm) => Ok(asm),
    Lowered::Ir(_) => unreachable!("assembly backend produced an IR module"),
  }
}

/// Compile a source string to a lowered IR module.
pub fn generate_ir(source: &str) -> CompileResult<ir::IrModule> {
  match compile(source, BackendKind::Ir)? {
    Lowered::Ir(module) => Ok(module),
    Lowered::Assembly(_) => unreachable!("IR backend produced assembly text"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CodegenError;

  #[test]
  fn test_compiles_print_of_a_literal() {
    let asm = generate_assembly("def main()\nprint(123)").unwrap();
    let handle = asm.find("INVOKE GetStdHandle").unwrap();
    let write = asm.find("INVOKE WriteConsoleA").unwrap();
    let exit = asm.find("INVOKE ExitProcess, 0").unwrap();
    assert!(handle < write && write < exit);
    assert!(asm.contains("lit_0 DWORD 123"));
    assert!(asm.contains("ADDR lit_0"));
  }

  #[test]
  fn test_two_prints_share_one_declaration_block() {
    let asm = generate_assembly("def main()\nprint(1)\nprint(2)").unwrap();
    assert_eq!(asm.matches("GetStdHandle PROTO").count(), 1);
    assert_eq!(asm.matches("WriteConsoleA PROTO").count(), 1);
    assert_eq!(asm.matches("ExitProcess PROTO").count(), 1);
    assert_eq!(asm.matches("INVOKE WriteConsoleA").count(), 2);
  }

  #[test]
  fn test_malformed_prototype_fails_to_parse() {
    let err = compile("def ()\nprint(1)", BackendKind::Assembly).unwrap_err();
    assert!(matches!(err, CompileError::Parse { .. }));
  }

  #[test]
  fn test_undeclared_call_fails_codegen() {
    let err = compile("def main()\nfoo(1)", BackendKind::Assembly).unwrap_err();
    match err {
      CompileError::Codegen {
        source: CodegenError::UnresolvedSymbol { name },
      } => assert_eq!(name, "foo"),
      other => panic!("expected UnresolvedSymbol, got {other:?}"),
    }
  }

  #[test]
  fn test_ir_pipeline_produces_a_module() {
    let module = generate_ir("def main()\nprint(123)").unwrap();
    let listing = module.to_string();
    assert!(listing.contains("declare i32 @print(i32)"));
    assert!(listing.contains("%0 = call i32 @print(i32 123)"));
    assert!(listing.contains("ret i32 0"));
  }

  #[test]
  fn test_user_functions_lower_before_their_callers() {
    let asm =
      generate_assembly("def shout(x)\nprint(1)\ndef main()\nshout(7)").unwrap();
    assert!(asm.contains("shout PROC"));
    assert!(asm.contains("INVOKE shout, 7"));
    assert!(asm.contains("END main"));
  }
}
