//! Translation entry points: pattern file in, Rust source file out.

use crate::ast::{Include, Item, Pattern};
use crate::codegen::{generate, Program};
use crate::emit::{emit, EmitOptions};
use crate::error::CompileError;
use crate::parser::parse;
use crate::runtime::Endianness;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Settings for compiling and rendering a pattern.
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// One indentation level in the emitted source.
    pub indentation: String,
    /// Directories searched for `#include`, after the including file's own directory.
    pub include_paths: Vec<PathBuf>,
    /// Module path the emitted source imports as `rt`.
    pub runtime_path: String,
    /// Byte order of scalars without a `be`/`le` qualifier, unless the
    /// pattern sets `#pragma endian`.
    pub default_endianness: Endianness,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        TranslateOptions {
            indentation: "    ".to_string(),
            include_paths: Vec::new(),
            runtime_path: "binpat::runtime".to_string(),
            default_endianness: Endianness::Little,
        }
    }
}

impl TranslateOptions {
    fn emit_options(&self, source_name: Option<String>) -> EmitOptions {
        EmitOptions {
            indent: self.indentation.clone(),
            runtime_path: self.runtime_path.clone(),
            source_name,
        }
    }
}

/// Compile pattern source with default options.
pub fn compile(source: &str) -> Result<Program, CompileError> {
    compile_with(source, &TranslateOptions::default())
}

/// Compile pattern source. `#include` is looked up in the include paths only.
pub fn compile_with(source: &str, options: &TranslateOptions) -> Result<Program, CompileError> {
    let mut loader = Loader::new(options);
    loader.splice(parse(source)?, None, None)?;
    generate(&loader.finish(), options.default_endianness)
}

/// Compile a pattern file and everything it includes.
pub fn compile_file(path: &Path, options: &TranslateOptions) -> Result<Program, CompileError> {
    let mut loader = Loader::new(options);
    loader.load_file(path)?;
    generate(&loader.finish(), options.default_endianness)
}

/// Rust source for a pattern file.
pub fn render_file(path: &Path, options: &TranslateOptions) -> Result<String, CompileError> {
    let program = compile_file(path, options)?;
    let source_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
    Ok(emit(&program, &options.emit_options(source_name)))
}

/// Translate the pattern at `input` into Rust source at `output`.
pub fn translate(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<(), CompileError> {
    translate_with(input, output, &TranslateOptions::default())
}

/// Translate with explicit options. `output` is only touched once the whole
/// translation succeeded, and is replaced in one step.
pub fn translate_with(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &TranslateOptions,
) -> Result<(), CompileError> {
    let (input, output) = (input.as_ref(), output.as_ref());
    debug!(input = %input.display(), output = %output.display(), "translating");
    let source = render_file(input, options)?;
    write_atomically(output, &source)?;
    debug!(bytes = source.len(), output = %output.display(), "wrote generated source");
    Ok(())
}

fn write_atomically(output: &Path, contents: &str) -> Result<(), CompileError> {
    let io = |source: std::io::Error| CompileError::Io {
        path: output.to_path_buf(),
        source,
    };
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(io)?;
    tmp.write_all(contents.as_bytes()).map_err(io)?;
    tmp.persist(output).map_err(|e| io(e.error))?;
    Ok(())
}

/// Splices included files into one pattern, each file at most once.
struct Loader<'o> {
    options: &'o TranslateOptions,
    seen: HashSet<PathBuf>,
    items: Vec<Item>,
}

impl<'o> Loader<'o> {
    fn new(options: &'o TranslateOptions) -> Self {
        Loader {
            options,
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }

    fn finish(self) -> Pattern {
        Pattern { items: self.items }
    }

    fn load_file(&mut self, path: &Path) -> Result<(), CompileError> {
        let io = |source: std::io::Error| CompileError::Io {
            path: path.to_path_buf(),
            source,
        };
        let canonical = path.canonicalize().map_err(io)?;
        if !self.seen.insert(canonical) {
            debug!(path = %path.display(), "skipping already included file");
            return Ok(());
        }
        let source = fs::read_to_string(path).map_err(io)?;
        let pattern = parse(&source).map_err(|e| e.in_file(path))?;
        debug!(path = %path.display(), items = pattern.items.len(), "loaded pattern file");
        self.splice(pattern, path.parent(), Some(path))
    }

    /// Append `pattern`, replacing each `#include` by the included file's items.
    fn splice(&mut self, pattern: Pattern, dir: Option<&Path>, file: Option<&Path>) -> Result<(), CompileError> {
        for item in pattern.items {
            if let Item::Include(include) = &item {
                let found = self.resolve(include, dir).map_err(|e| match file {
                    Some(file) => e.in_file(file),
                    None => e,
                })?;
                self.load_file(&found)?;
            }
            self.items.push(item);
        }
        Ok(())
    }

    fn resolve(&self, include: &Include, dir: Option<&Path>) -> Result<PathBuf, CompileError> {
        let local = dir.filter(|_| !include.system);
        local
            .into_iter()
            .chain(self.options.include_paths.iter().map(PathBuf::as_path))
            .map(|base| base.join(&include.path))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| CompileError::Include {
                path: include.path.clone(),
                at: include.location,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::TypeDef;

    #[test]
    fn default_options() {
        let o = TranslateOptions::default();
        assert_eq!(o.indentation, "    ");
        assert_eq!(o.runtime_path, "binpat::runtime");
        assert_eq!(o.default_endianness, Endianness::Little);
    }

    #[test]
    fn compile_resolves_forward_types() {
        let program = compile("struct A { B b; }; bitfield B { x : 4; };").unwrap();
        assert!(matches!(program.by_name("B"), Some(TypeDef::Bitfield(_))));
    }

    #[test]
    fn missing_include_in_source_string() {
        let err = compile("#include \"nowhere.hexpat\"\nstruct A { u8 b; };").unwrap_err();
        assert!(matches!(err, CompileError::Include { ref path, .. } if path == "nowhere.hexpat"));
    }
}
