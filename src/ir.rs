//! IR backend: builds a small SSA-style module instead of raw text.
//!
//! Every function gets a single entry block; call results land in fresh
//! temporaries and constants stay immediate. The module renders to an
//! LLVM-flavoured listing for inspection and for the emission boundary.

use std::fmt;

use crate::codegen::{Backend, PRINT_INTRINSIC};
use crate::error::CodegenError;
use crate::parser::Prototype;

/// Value reference inside a function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Val {
  Const(i64),
  Temp(usize),
}

/// Instructions of a function's entry block.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
  Call {
    dest: Val,
    func: String,
    args: Vec<Val>,
  },
  Ret(Val),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrFunction {
  pub name: String,
  pub params: Vec<String>,
  pub instrs: Vec<Instr>,
  pub temp_count: usize,
}

/// A lowered compilation unit: extern prototypes plus function bodies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IrModule {
  pub externs: Vec<Prototype>,
  pub functions: Vec<IrFunction>,
}

/// Builds an `IrModule` one function at a time. Finalization is enforced by
/// ownership: `finish` consumes the builder, so nothing can be emitted into
/// a finished module.
pub struct IrBuilder {
  module: IrModule,
  current: Option<IrFunction>,
}

impl IrBuilder {
  pub fn new() -> Self {
    Self {
      module: IrModule::default(),
      current: None,
    }
  }

  /// Record an external prototype at most once per unit.
  pub fn declare_extern(&mut self, proto: Prototype) {
    if !self.module.externs.iter().any(|p| p.name == proto.name) {
      self.module.externs.push(proto);
    }
  }

  fn fresh_temp(&mut self) -> Val {
    let func = self
      .current
      .as_mut()
      .expect("temporary requested outside a function");
    let temp = Val::Temp(func.temp_count);
    func.temp_count += 1;
    temp
  }

  fn push(&mut self, instr: Instr) {
    let func = self
      .current
      .as_mut()
      .expect("instruction emitted outside a function");
    func.instrs.push(instr);
  }

  pub fn finish(self) -> IrModule {
    debug_assert!(self.current.is_none(), "finish with an open function");
    self.module
  }
}

impl Default for IrBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl Backend for IrBuilder {
  type Value = Val;

  fn begin_function(&mut self, proto: &Prototype) -> Result<(), CodegenError> {
    self.current = Some(IrFunction {
      name: proto.name.clone(),
      params: proto.params.clone(),
      instrs: Vec::new(),
      temp_count: 0,
    });
    Ok(())
  }

  fn finish_function(&mut self, _proto: &Prototype) -> Result<(), CodegenError> {
    self.push(Instr::Ret(Val::Const(0)));
    let func = self
      .current
      .take()
      .expect("finish without an open function");
    self.module.functions.push(func);
    Ok(())
  }

  fn lower_number(&mut self, value: i64) -> Result<Val, CodegenError> {
    Ok(Val::Const(value))
  }

  fn lower_call(&mut self, callee: &str, args: Vec<Val>) -> Result<Val, CodegenError> {
    let dest = self.fresh_temp();
    self.push(Instr::Call {
      dest,
      func: callee.to_string(),
      args,
    });
    Ok(dest)
  }

  fn lower_print(&mut self, value: Val) -> Result<Val, CodegenError> {
    self.declare_extern(Prototype {
      name: PRINT_INTRINSIC.to_string(),
      params: vec!["value".to_string()],
    });
    self.lower_call(PRINT_INTRINSIC, vec![value])
  }
}

impl fmt::Display for Val {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Val::Const(value) => write!(f, "{value}"),
      Val::Temp(index) => write!(f, "%{index}"),
    }
  }
}

impl fmt::Display for IrModule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for proto in &self.externs {
      let params = vec!["i32"; proto.params.len()];
      writeln!(f, "declare i32 @{}({})", proto.name, params.join(", "))?;
    }
    for func in &self.functions {
      let params: Vec<String> = func
        .params
        .iter()
        .map(|param| format!("i32 %{param}"))
        .collect();
      writeln!(f, "define i32 @{}({}) {{", func.name, params.join(", "))?;
      writeln!(f, "entry:")?;
      for instr in &func.instrs {
        match instr {
          Instr::Call {
            dest,
            func: callee,
            args,
          } => {
            let rendered: Vec<String> =
              args.iter().map(|arg| format!("i32 {arg}")).collect();
            writeln!(f, "  {dest} = call i32 @{callee}({})", rendered.join(", "))?;
          }
          Instr::Ret(value) => writeln!(f, "  ret i32 {value}")?,
        }
      }
      writeln!(f, "}}")?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn proto(name: &str, params: &[&str]) -> Prototype {
    Prototype {
      name: name.to_string(),
      params: params.iter().map(|p| p.to_string()).collect(),
    }
  }

  #[test]
  fn test_every_function_ends_in_ret_zero() {
    let mut builder = IrBuilder::new();
    builder.begin_function(&proto("main", &[])).unwrap();
    let value = builder.lower_number(123).unwrap();
    builder.lower_print(value).unwrap();
    builder.finish_function(&proto("main", &[])).unwrap();
    let module = builder.finish();
    let main = &module.functions[0];
    assert_eq!(main.instrs.last(), Some(&Instr::Ret(Val::Const(0))));
  }

  #[test]
  fn test_print_declares_its_extern_once() {
    let mut builder = IrBuilder::new();
    builder.begin_function(&proto("main", &[])).unwrap();
    for value in [1, 2, 3] {
      let lowered = builder.lower_number(value).unwrap();
      builder.lower_print(lowered).unwrap();
    }
    builder.finish_function(&proto("main", &[])).unwrap();
    let module = builder.finish();
    assert_eq!(module.externs.len(), 1);
    assert_eq!(module.externs[0].name, "print");
    assert_eq!(module.functions[0].temp_count, 3);
  }

  #[test]
  fn test_call_results_are_fresh_temporaries() {
    let mut builder = IrBuilder::new();
    builder.begin_function(&proto("main", &[])).unwrap();
    let a = builder.lower_call("helper", vec![]).unwrap();
    let b = builder.lower_call("helper", vec![]).unwrap();
    assert_eq!(a, Val::Temp(0));
    assert_eq!(b, Val::Temp(1));
    builder.finish_function(&proto("main", &[])).unwrap();
  }

  #[test]
  fn test_module_renders_an_llvm_flavoured_listing() {
    let mut builder = IrBuilder::new();
    builder.begin_function(&proto("main", &[])).unwrap();
    let value = builder.lower_number(123).unwrap();
    builder.lower_print(value).unwrap();
    builder.finish_function(&proto("main", &[])).unwrap();
    let listing = builder.finish().to_string();
    assert_eq!(
      listing,
      "declare i32 @print(i32)\n\
       define i32 @main() {\n\
       entry:\n\
       \x20\x20%0 = call i32 @print(i32 123)\n\
       \x20\x20ret i32 0\n\
       }\n"
    );
  }

  #[test]
  fn test_parameters_render_by_name() {
    let mut builder = IrBuilder::new();
    builder.begin_function(&proto("add", &["a", "b"])).unwrap();
    let value = builder.lower_number(0).unwrap();
    builder.lower_print(value).unwrap();
    builder.finish_function(&proto("add", &["a", "b"])).unwrap();
    let listing = builder.finish().to_string();
    assert!(listing.contains("define i32 @add(i32 %a, i32 %b) {"));
  }
}
