use std::env;
use std::path::PathBuf;
use std::process;

use defc::codegen::BackendKind;
use defc::emit;

struct Options {
  input: PathBuf,
  output: PathBuf,
  target: String,
  backend: BackendKind,
}

fn usage(program: &str) -> ! {
  eprintln!("usage: {program} [-o <artifact>] [--target <triple>] [--emit asm|ir] <input>");
  process::exit(1);
}

fn parse_args() -> Options {
  let args: Vec<String> = env::args().collect();
  let program = args
    .first()
    .map(String::as_str)
    .unwrap_or("defc")
    .to_string();

  let mut input = None;
  let mut output = PathBuf::from("a.o");
  let mut target = emit::DEFAULT_TARGET.to_string();
  let mut backend = BackendKind::Assembly;

  let mut iter = args.iter().skip(1);
  while let Some(arg) = iter.next() {
    match arg.as_str() {
      "-o" => match iter.next() {
        Some(path) => output = PathBuf::from(path),
        None => usage(&program),
      },
      "--target" => match iter.next() {
        Some(triple) => target = triple.clone(),
        None => usage(&program),
      },
      "--emit" => match iter.next().map(String::as_str) {
        Some("asm") => backend = BackendKind::Assembly,
        Some("ir") => backend = BackendKind::Ir,
        _ => usage(&program),
      },
      _ if input.is_none() && !arg.starts_with('-') => input = Some(PathBuf::from(arg)),
      _ => usage(&program),
    }
  }

  let Some(input) = input else { usage(&program) };
  Options {
    input,
    output,
    target,
    backend,
  }
}

fn main() {
  let options = parse_args();

  let source = match std::fs::read_to_string(&options.input) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("failed to read {}: {err}", options.input.display());
      process::exit(1);
    }
  };

  let lowered = match defc::compile(&source, options.backend) {
    Ok(lowered) => lowered,
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  };

  if let Err(err) = emit::write_object(&lowered, &options.target, &options.output) {
    eprintln!("{err}");
    process::exit(1);
  }
}
