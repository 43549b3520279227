//! Translate binary patterns to Rust, or decode a data file with one.
//!
//! Usage:
//!   binpat translate <INPUT> <OUTPUT> [-I DIR]... [--indent N] [--runtime PATH] [--big-endian]
//!   binpat dump <PATTERN> <DATA> [--type NAME] [--offset N] [-I DIR]... [--big-endian]
//!
//! `dump` decodes the placements of the pattern (`Type name @ offset;`) unless
//! `--type` names a struct or union to decode at `--offset` (default 0).
//!
//! Set `RUST_LOG=binpat=debug` to trace loading, generation and decoding.

use anyhow::{anyhow, bail, Context};
use binpat::runtime::{Buffer, Cursor, Endianness};
use binpat::{compile_file, dump_instance, translate_with, Codec, TranslateOptions};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  binpat translate <INPUT> <OUTPUT> [-I DIR]... [--indent N] [--runtime PATH] [--big-endian]
  binpat dump <PATTERN> <DATA> [--type NAME] [--offset N] [-I DIR]... [--big-endian]";

/// Remove `flag` and its value from `args`.
fn take_value(args: &mut Vec<String>, flag: &str) -> anyhow::Result<Option<String>> {
    match args.iter().position(|a| a == flag) {
        Some(pos) => {
            args.remove(pos);
            if pos >= args.len() {
                bail!("{} needs a value", flag);
            }
            Ok(Some(args.remove(pos)))
        }
        None => Ok(None),
    }
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    match args.iter().position(|a| a == flag) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn parse_offset(text: &str) -> anyhow::Result<usize> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.with_context(|| format!("invalid offset `{}`", text))
}

/// Options shared by both commands.
fn take_options(args: &mut Vec<String>) -> anyhow::Result<TranslateOptions> {
    let mut options = TranslateOptions::default();
    while let Some(dir) = take_value(args, "-I")? {
        options.include_paths.push(PathBuf::from(dir));
    }
    if take_flag(args, "--big-endian") {
        options.default_endianness = Endianness::Big;
    }
    if let Some(n) = take_value(args, "--indent")? {
        let width: usize = n.parse().with_context(|| format!("invalid indent `{}`", n))?;
        options.indentation = " ".repeat(width);
    }
    if let Some(path) = take_value(args, "--runtime")? {
        options.runtime_path = path;
    }
    Ok(options)
}

fn run_translate(mut args: Vec<String>) -> anyhow::Result<()> {
    let options = take_options(&mut args)?;
    let [input, output] = <[String; 2]>::try_from(args).map_err(|_| anyhow!(USAGE))?;
    translate_with(&input, &output, &options)
        .with_context(|| format!("failed to translate {}", input))?;
    eprintln!("{} -> {}", input, output);
    Ok(())
}

fn run_dump(mut args: Vec<String>) -> anyhow::Result<()> {
    let type_name = take_value(&mut args, "--type")?;
    let offset = take_value(&mut args, "--offset")?
        .map(|o| parse_offset(&o))
        .transpose()?
        .unwrap_or(0);
    let options = take_options(&mut args)?;
    let [pattern, data] = <[String; 2]>::try_from(args).map_err(|_| anyhow!(USAGE))?;

    let program = compile_file(Path::new(&pattern), &options)
        .with_context(|| format!("failed to compile {}", pattern))?;
    let bytes = std::fs::read(&data).with_context(|| format!("failed to read {}", data))?;
    let buffer: Buffer = bytes.into();
    let codec = Codec::new(program);

    let instance = match type_name {
        Some(name) => codec.decode_struct(&name, &mut Cursor::new(buffer, offset)),
        None => codec.decode_placements(&buffer),
    }
    .with_context(|| format!("failed to decode {}", data))?;
    print!("{}", dump_instance(&instance));
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || take_flag(&mut args, "--help") || take_flag(&mut args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }
    let command = args.remove(0);
    let result = match command.as_str() {
        "translate" => run_translate(args),
        "dump" => run_dump(args),
        other => Err(anyhow!("unknown command `{}`\n{}", other, USAGE)),
    };
    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
