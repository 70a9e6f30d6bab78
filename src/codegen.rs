//! Code generation: walk the AST and drive one of the two backends.
//!
//! The walk is generic over a `Backend`, so the assembly emitter and the IR
//! builder share one contract: numbers and calls produce backend value
//! references, definitions bracket a function scope, and the symbol table
//! travels through every call explicitly instead of living in a global.
//! Which backend runs is fixed once per compilation unit.

use std::collections::HashMap;

use snafu::ensure;

use crate::asm::Generator;
use crate::error::{BadIntrinsicCallSnafu, CodegenError, UnresolvedSymbolSnafu};
use crate::ir::{IrBuilder, IrModule};
use crate::parser::{Expr, Function, Program, Prototype};

/// The one callee lowered specially instead of being resolved as a symbol.
pub const PRINT_INTRINSIC: &str = "print";

/// Which lowering strategy a compilation unit uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
  /// Segment-based assembly text.
  Assembly,
  /// SSA-style IR module.
  Ir,
}

/// Finalized output of a compilation unit, ready for object emission.
#[derive(Debug, Clone, PartialEq)]
pub enum Lowered {
  Assembly(String),
  Ir(IrModule),
}

/// Function name → prototype map consulted before lowering any call.
/// Entries come from definitions and from external declarations.
#[derive(Debug, Default)]
pub struct SymbolTable {
  functions: HashMap<String, Prototype>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a definition or an external declaration.
  pub fn declare(&mut self, proto: &Prototype) {
    self.functions.insert(proto.name.clone(), proto.clone());
  }

  pub fn lookup(&self, name: &str) -> Option<&Prototype> {
    self.functions.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.functions.contains_key(name)
  }
}

/// Contract between the AST walk and a lowering strategy.
pub trait Backend {
  /// Backend-specific reference to a lowered expression's value.
  type Value;

  fn begin_function(&mut self, proto: &Prototype) -> Result<(), CodegenError>;

  /// Close the open function, emitting its implicit return of zero.
  fn finish_function(&mut self, proto: &Prototype) -> Result<(), CodegenError>;

  fn lower_number(&mut self, value: i64) -> Result<Self::Value, CodegenError>;

  fn lower_call(
    &mut self,
    callee: &str,
    args: Vec<Self::Value>,
  ) -> Result<Self::Value, CodegenError>;

  /// Fixed lowering of the `print` builtin.
  fn lower_print(&mut self, value: Self::Value) -> Result<Self::Value, CodegenError>;
}

/// Lower a whole program with the selected backend.
pub fn generate(program: &Program, backend: BackendKind) -> Result<Lowered, CodegenError> {
  let mut symbols = SymbolTable::new();
  generate_with(program, backend, &mut symbols)
}

/// Lower against a caller-provided symbol table, letting the driver
/// pre-register external declarations before any user code is seen.
pub fn generate_with(
  program: &Program,
  backend: BackendKind,
  symbols: &mut SymbolTable,
) -> Result<Lowered, CodegenError> {
  match backend {
    BackendKind::Assembly => {
      let mut generator = Generator::new();
      for function in &program.functions {
        lower_function(function, symbols, &mut generator)?;
      }
      Ok(Lowered::Assembly(generator.output_all_asm()))
    }
    BackendKind::Ir => {
      let mut builder = IrBuilder::new();
      for function in &program.functions {
        lower_function(function, symbols, &mut builder)?;
      }
      Ok(Lowered::Ir(builder.finish()))
    }
  }
}

/// Lower one definition. The prototype is registered before the body, so a
/// function can call itself; calls to later definitions stay unresolved
/// because lowering is a single pass.
pub fn lower_function<B: Backend>(
  function: &Function,
  symbols: &mut SymbolTable,
  backend: &mut B,
) -> Result<(), CodegenError> {
  symbols.declare(&function.proto);
  backend.begin_function(&function.proto)?;
  for expr in &function.body {
    lower_expr(expr, symbols, backend)?;
  }
  backend.finish_function(&function.proto)
}

/// Lower one expression to a backend value reference.
pub fn lower_expr<B: Backend>(
  expr: &Expr,
  symbols: &SymbolTable,
  backend: &mut B,
) -> Result<B::Value, CodegenError> {
  match expr {
    Expr::Num { value } => backend.lower_number(*value),
    Expr::Call { callee, args } => {
      if callee == PRINT_INTRINSIC {
        ensure!(
          args.len() == 1,
          BadIntrinsicCallSnafu {
            name: PRINT_INTRINSIC,
            expected: 1usize,
            found: args.len(),
          }
        );
        let value = lower_expr(&args[0], symbols, backend)?;
        return backend.lower_print(value);
      }

      ensure!(
        symbols.contains(callee),
        UnresolvedSymbolSnafu { name: callee.clone() }
      );

      // Arguments lower left to right before the call itself is emitted.
      let mut lowered = Vec::with_capacity(args.len());
      for arg in args {
        lowered.push(lower_expr(arg, symbols, backend)?);
      }
      backend.lower_call(callee, lowered)
    }
  }
}
