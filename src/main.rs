use std::error::Error;

use tracing::info;
use tracing_subscriber::EnvFilter;

use wordcode::{assemble, disassemble, CodeObject, Constant, Revision};

const USAGE: &str = "usage: wordcode [3.8|3.9|3.10|3.11] [listing]";

/// Disassembled when no listing is given.
const SAMPLE: &str = "
  # def f(a): b = a; print; return None
  LOAD_FAST 0
  STORE_FAST 1
  LOAD_GLOBAL 0
  POP_TOP
  LOAD_CONST 0
  RETURN_VALUE
";

/// A listing names no side tables, so every operand gets a made up entry.
const PLACEHOLDER_ENTRIES: usize = 256;

fn parse_revision(text: &str) -> Result<Revision, Box<dyn Error>> {
  let mut parts = text.splitn(2, '.');
  let major = parts.next().unwrap_or_default().parse::<u8>()?;
  let minor = parts.next().ok_or(USAGE)?.parse::<u8>()?;
  Ok(Revision::from_version(major, minor)?)
}

fn placeholder_code(revision: Revision, bytes: Vec<u8>) -> CodeObject {
  let names = |prefix: &str| -> Vec<String> {
    (0..PLACEHOLDER_ENTRIES).map(|i| format!("{}{}", prefix, i)).collect()
  };

  CodeObject::new(revision.version(), bytes)
    .with_consts((0..PLACEHOLDER_ENTRIES as i64).map(Constant::Int).collect())
    .with_names(names("name"))
    .with_varnames(names("var"))
    .with_cellvars(names("cell"))
    .with_localsplusnames(names("local"))
}

fn main() -> Result<(), Box<dyn Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .init();

  #[cfg(feature = "trace_disassembly")]
  tracing::debug!("Disassembly tracing ENABLED");

  let args: Vec<String> = std::env::args().skip(1).collect();
  if args.len() > 2 {
    return Err(USAGE.into());
  }

  let revision = match args.first() {
    Some(text) => parse_revision(text)?,
    None       => Revision::Py38,
  };
  let listing = match args.get(1) {
    Some(path) => std::fs::read_to_string(path)?,
    None       => SAMPLE.to_string(),
  };

  let bytes = assemble(revision, &listing)?;
  info!(%revision, bytes = bytes.len(), "assembled listing");

  let code = placeholder_code(revision, bytes);
  println!("{}", disassemble(&code)?);

  Ok(())
}
