//! Assembly backend: lowers functions into MASM-flavoured text with
//! explicit data and code segments.
//!
//! The generator accumulates append-only state per compilation unit.
//! External declarations render into the headers, literal storage and
//! runtime slots into the data segment, and the instruction stream into
//! per-procedure bodies. `output_all_asm` concatenates everything and
//! freezes the unit; emission attempts afterwards fail.

use std::collections::HashSet;
use std::fmt;

use snafu::ensure;

use crate::codegen::Backend;
use crate::error::{CodegenError, GeneratorFinalizedSnafu};
use crate::parser::Prototype;

/// Console handle id passed to the handle lookup for standard output.
pub const STD_OUTPUT_HANDLE: i64 = -11;

/// Register that carries a call's result.
pub const RETURN_REGISTER: &str = "eax";

/// Runtime entry points backing the `print` builtin.
pub const GET_HANDLE: &str = "GetStdHandle";
pub const WRITE_CONSOLE: &str = "WriteConsoleA";
pub const EXIT_PROCESS: &str = "ExitProcess";

/// Procedure whose return path terminates the process.
const ENTRY_POINT: &str = "main";

const STDOUT_SLOT: &str = "stdout_handle";
const WRITTEN_SLOT: &str = "bytes_written";

/// Value reference in the assembly backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
  /// Immediate integer.
  Imm(i64),
  /// Memory operand addressed by a data-segment label.
  Mem(String),
  /// Address of a data-segment label.
  Addr(String),
  /// Register operand.
  Reg(&'static str),
}

impl fmt::Display for Operand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Operand::Imm(value) => write!(f, "{value}"),
      Operand::Mem(label) => write!(f, "{label}"),
      Operand::Addr(label) => write!(f, "ADDR {label}"),
      Operand::Reg(name) => write!(f, "{name}"),
    }
  }
}

/// One machine-level operation of the code segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
  Move { dest: Operand, src: Operand },
  PushAll,
  PopAll,
  Invoke { target: String, args: Vec<Operand> },
  ExternDeclaration { label: String },
  Return,
}

impl Instruction {
  /// Textual form placed in the finalized listing.
  pub fn render(&self) -> String {
    match self {
      Instruction::Move { dest, src } => format!("MOV {dest}, {src}"),
      Instruction::PushAll => "PUSHAD".to_string(),
      Instruction::PopAll => "POPAD".to_string(),
      Instruction::Invoke { target, args } => {
        if args.is_empty() {
          format!("INVOKE {target}")
        } else {
          let rendered: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
          format!("INVOKE {target}, {}", rendered.join(", "))
        }
      }
      Instruction::ExternDeclaration { label } => format!("{label} PROTO"),
      Instruction::Return => "RET".to_string(),
    }
  }
}

/// One emitted procedure: a name plus its ordered instruction body.
#[derive(Debug, Clone)]
struct Proc {
  name: String,
  body: Vec<Instruction>,
}

/// Accumulates the segments of one compilation unit.
pub struct Generator {
  /// Processor and model directives; empty means the assembler's default.
  processor: String,
  model: String,
  headers: String,
  data_segment: String,
  procs: Vec<Proc>,
  declared: HashSet<String>,
  slots: HashSet<String>,
  next_literal: usize,
  next_scratch: usize,
  finalized: bool,
}

impl Generator {
  pub fn new() -> Self {
    Self {
      processor: String::new(),
      model: String::new(),
      headers: String::new(),
      data_segment: String::from(".data\n"),
      procs: Vec::new(),
      declared: HashSet::new(),
      slots: HashSet::new(),
      next_literal: 0,
      next_scratch: 0,
      finalized: false,
    }
  }

  pub fn is_finalized(&self) -> bool {
    self.finalized
  }

  /// Override the processor and model directives placed ahead of the
  /// segments. Both default to empty, leaving the choice to the assembler.
  pub fn set_directives(
    &mut self,
    processor: impl Into<String>,
    model: impl Into<String>,
  ) -> Result<(), CodegenError> {
    self.check_open()?;
    self.processor = processor.into();
    self.model = model.into();
    Ok(())
  }

  fn check_open(&self) -> Result<(), CodegenError> {
    ensure!(!self.finalized, GeneratorFinalizedSnafu);
    Ok(())
  }

  /// Append an instruction to the currently open procedure.
  fn push(&mut self, instruction: Instruction) -> Result<(), CodegenError> {
    self.check_open()?;
    let proc = self
      .procs
      .last_mut()
      .expect("instruction emitted outside an open procedure");
    proc.body.push(instruction);
    Ok(())
  }

  /// Declare an external runtime entry point at most once per unit.
  pub fn declare_extern(&mut self, label: &str) -> Result<(), CodegenError> {
    self.check_open()?;
    if self.declared.insert(label.to_string()) {
      let decl = Instruction::ExternDeclaration {
        label: label.to_string(),
      };
      self.headers.push_str(&decl.render());
      self.headers.push('\n');
    }
    Ok(())
  }

  /// Reserve an uninitialised data slot, once per label.
  fn reserve_slot(&mut self, label: &str) -> Result<(), CodegenError> {
    self.check_open()?;
    if self.slots.insert(label.to_string()) {
      self.data_segment.push_str(&format!("{label} DWORD ?\n"));
    }
    Ok(())
  }

  /// Store a literal in a fresh uniquely-named data slot.
  fn literal_slot(&mut self, value: i64) -> Result<String, CodegenError> {
    self.check_open()?;
    let label = format!("lit_{}", self.next_literal);
    self.next_literal += 1;
    self
      .data_segment
      .push_str(&format!("{label} DWORD {value}\n"));
    Ok(label)
  }

  /// Rewrite a value into a data-segment label usable as a memory operand.
  /// Immediates spill into fresh literal slots; register values are saved
  /// through a scratch slot before anything can clobber them.
  fn memory_operand(&mut self, value: Operand) -> Result<String, CodegenError> {
    match value {
      Operand::Imm(v) => self.literal_slot(v),
      Operand::Mem(label) | Operand::Addr(label) => Ok(label),
      Operand::Reg(reg) => {
        let label = format!("tmp_{}", self.next_scratch);
        self.next_scratch += 1;
        self.reserve_slot(&label)?;
        self.push(Instruction::Move {
          dest: Operand::Mem(label.clone()),
          src: Operand::Reg(reg),
        })?;
        Ok(label)
      }
    }
  }

  /// Concatenate the finalized listing: directives, headers, then the data
  /// and code segments. Idempotent – but the first call freezes the unit,
  /// so any later emission fails with `GeneratorFinalized`.
  pub fn output_all_asm(&mut self) -> String {
    self.finalized = true;

    let mut asm = String::new();
    if !self.processor.is_empty() {
      asm.push_str(&self.processor);
      asm.push('\n');
    }
    if !self.model.is_empty() {
      asm.push_str(&self.model);
      asm.push('\n');
    }
    asm.push_str(&self.headers);
    asm.push_str(&self.data_segment);
    asm.push_str(".code\n");
    for proc in &self.procs {
      asm.push_str(&format!("{} PROC\n", proc.name));
      for instruction in &proc.body {
        asm.push_str("    ");
        asm.push_str(&instruction.render());
        asm.push('\n');
      }
      asm.push_str(&format!("{} ENDP\n", proc.name));
    }
    if self.procs.iter().any(|proc| proc.name == ENTRY_POINT) {
      asm.push_str(&format!("END {ENTRY_POINT}\n"));
    } else {
      asm.push_str("END\n");
    }
    asm
  }
}

impl Default for Generator {
  fn default() -> Self {
    Self::new()
  }
}

impl Backend for Generator {
  type Value = Operand;

  fn begin_function(&mut self, proto: &Prototype) -> Result<(), CodegenError> {
    self.check_open()?;
    self.procs.push(Proc {
      name: proto.name.clone(),
      body: Vec::new(),
    });
    Ok(())
  }

  fn finish_function(&mut self, proto: &Prototype) -> Result<(), CodegenError> {
    // Termination belongs to the entry point's return path, not to the
    // builtins that ran before it.
    if proto.name == ENTRY_POINT {
      self.declare_extern(EXIT_PROCESS)?;
      self.push(Instruction::Invoke {
        target: EXIT_PROCESS.to_string(),
        args: vec![Operand::Imm(0)],
      })
    } else {
      self.push(Instruction::Move {
        dest: Operand::Reg(RETURN_REGISTER),
        src: Operand::Imm(0),
      })?;
      self.push(Instruction::Return)
    }
  }

  fn lower_number(&mut self, value: i64) -> Result<Operand, CodegenError> {
    self.check_open()?;
    // Immediates by default; positions that need a memory operand spill
    // through `memory_operand` instead.
    Ok(Operand::Imm(value))
  }

  fn lower_call(&mut self, callee: &str, args: Vec<Operand>) -> Result<Operand, CodegenError> {
    self.push(Instruction::Invoke {
      target: callee.to_string(),
      args,
    })?;
    Ok(Operand::Reg(RETURN_REGISTER))
  }

  fn lower_print(&mut self, value: Operand) -> Result<Operand, CodegenError> {
    self.declare_extern(GET_HANDLE)?;
    self.declare_extern(WRITE_CONSOLE)?;
    self.declare_extern(EXIT_PROCESS)?;
    self.reserve_slot(STDOUT_SLOT)?;
    self.reserve_slot(WRITTEN_SLOT)?;

    // The value must reach a memory slot before the handle call can
    // clobber the result register.
    let buffer = self.memory_operand(value)?;

    self.push(Instruction::Invoke {
      target: GET_HANDLE.to_string(),
      args: vec![Operand::Imm(STD_OUTPUT_HANDLE)],
    })?;
    self.push(Instruction::Move {
      dest: Operand::Mem(STDOUT_SLOT.to_string()),
      src: Operand::Reg(RETURN_REGISTER),
    })?;

    // Caller-saved registers survive the runtime call inside the
    // push/pop bracket.
    self.push(Instruction::PushAll)?;
    self.push(Instruction::Invoke {
      target: WRITE_CONSOLE.to_string(),
      args: vec![
        Operand::Mem(STDOUT_SLOT.to_string()),
        Operand::Addr(buffer),
        Operand::Imm(4),
        Operand::Addr(WRITTEN_SLOT.to_string()),
        Operand::Imm(0),
      ],
    })?;
    self.push(Instruction::PopAll)?;

    Ok(Operand::Reg(RETURN_REGISTER))
  }
}
