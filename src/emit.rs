//! Object emission boundary.
//!
//! The core only produces a lowered form and a target string; turning that
//! into a real native artifact belongs to an external toolchain. This
//! module keeps the contract narrow: validate the target, serialize the
//! lowered unit to bytes, and write the single output artifact only after
//! compilation fully succeeded – a failed run never leaves a partial file.

use std::fs;
use std::path::Path;

use snafu::{ResultExt, ensure};

use crate::codegen::Lowered;
use crate::error::{BackendError, UnknownTargetSnafu, WriteObjectSnafu};

/// Targets the runtime lowering is valid for. The `print` builtin leans on
/// Win32 console entry points, so only Windows triples are accepted.
pub const SUPPORTED_TARGETS: &[&str] = &[
  "x86_64-pc-windows",
  "x86_64-pc-windows-msvc",
  "i686-pc-windows",
  "i686-pc-windows-msvc",
];

/// Target assumed when the caller does not name one.
pub const DEFAULT_TARGET: &str = "x86_64-pc-windows";

/// Serialize a finalized unit for the named target.
pub fn emit(lowered: &Lowered, target: &str) -> Result<Vec<u8>, BackendError> {
  ensure!(
    SUPPORTED_TARGETS.contains(&target),
    UnknownTargetSnafu { target }
  );
  let text = match lowered {
    Lowered::Assembly(asm) => asm.clone(),
    Lowered::Ir(module) => module.to_string(),
  };
  Ok(text.into_bytes())
}

/// Emit and write the single output artifact.
pub fn write_object(lowered: &Lowered, target: &str, path: &Path) -> Result<(), BackendError> {
  let bytes = emit(lowered, target)?;
  fs::write(path, bytes).context(WriteObjectSnafu { path })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unknown_target_is_rejected() {
    let lowered = Lowered::Assembly(".code\nEND\n".to_string());
    let err = emit(&lowered, "mips-unknown-linux").unwrap_err();
    match err {
      BackendError::UnknownTarget { target } => {
        assert_eq!(target, "mips-unknown-linux");
      }
      other => panic!("expected UnknownTarget, got {other:?}"),
    }
  }

  #[test]
  fn test_emit_round_trips_the_lowered_text() {
    let lowered = Lowered::Assembly("main PROC\nmain ENDP\n".to_string());
    let bytes = emit(&lowered, DEFAULT_TARGET).unwrap();
    assert_eq!(bytes, b"main PROC\nmain ENDP\n");
  }

  #[test]
  fn test_every_supported_target_is_accepted() {
    let lowered = Lowered::Assembly(String::new());
    for target in SUPPORTED_TARGETS {
      assert!(emit(&lowered, target).is_ok(), "rejected {target}");
    }
  }

  #[test]
  fn test_nothing_is_written_for_an_unknown_target() {
    let lowered = Lowered::Assembly("main PROC\n".to_string());
    let path = std::env::temp_dir().join("defc_emit_test_unknown.o");
    let _ = fs::remove_file(&path);
    assert!(write_object(&lowered, "powerpc-ibm-aix", &path).is_err());
    assert!(!path.exists());
  }

  #[test]
  fn test_write_object_produces_the_artifact() {
    let lowered = Lowered::Assembly("main PROC\n".to_string());
    let path = std::env::temp_dir().join("defc_emit_test_artifact.o");
    write_object(&lowered, DEFAULT_TARGET, &path).unwrap();
    let written = fs::read(&path).unwrap();
    assert_eq!(written, b"main PROC\n");
    let _ = fs::remove_file(&path);
  }
}
