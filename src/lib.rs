//! # binpat: binary pattern compiler and decoding runtime
//!
//! A pattern describes the byte layout of a binary file: structs, unions,
//! enums, bit-fields, arrays, padding, pointers and fixed-width scalars. binpat parses
//! a pattern with a PEST grammar, resolves it into a [`Program`], and then
//! either renders it as Rust source ([`translate`]) or decodes a buffer with
//! it directly ([`Codec`]).
//!
//! ## Pattern language
//!
//! ```text
//! #include "common.hexpat"
//! #pragma endian little
//!
//! enum Kind : u8 { Empty, Data = 4, Tail };
//! bitfield Flags : u16 { compressed : 1; level : 3; padding : 4; id : 8; };
//!
//! struct Entry { u16 x; u16 y; };
//!
//! using Offset = be u32;
//! union Magic { u32 id; char text[4]; };
//!
//! struct Header {
//!     u32 magic;
//!     be u24 version;
//!     Kind kind;
//!     Flags flags;
//!     u16 count;
//!     padding[2];
//!     Entry entries[count];
//!     Entry *first : u32;
//!     char name[8];
//! };
//!
//! Header header @ 0x00;
//! ```
//!
//! Scalars: `u8 u16 u24 u32 u48 u64 u96 u128`, `s8` to `s128` at the same
//! widths, `float double bool char char16`. Scalars are little-endian unless
//! qualified with `be`, or the pattern says `#pragma endian big`. Every member
//! of a union starts at the union's offset, and `using` names an existing type.
//!
//! ## Decoding
//!
//! Bytes are only ever consumed through a [`runtime::Cursor`]. Generated
//! types implement [`runtime::Decode`] and [`runtime::Extent`], so `sizeof`
//! and `addressof` work the same for primitives and structs:
//!
//! ```
//! use binpat::runtime::Cursor;
//! use binpat::{compile, Codec};
//!
//! let codec = Codec::new(compile("struct A { u8 b; };").unwrap());
//! let a = codec.decode_struct("A", &mut Cursor::new(&b"\x05"[..], 0)).unwrap();
//! assert_eq!(a.get("b").and_then(|v| v.as_u64()), Some(5));
//! assert_eq!(a.sizeof(), 1);
//! ```

pub mod ast;
pub mod codec;
pub mod codegen;
pub mod dump;
pub mod emit;
pub mod error;
pub mod parser;
pub mod runtime;
pub mod translate;
pub mod value;

pub use ast::Pattern;
pub use codec::Codec;
pub use codegen::{generate, Program};
pub use dump::dump_instance;
pub use emit::{emit, EmitOptions};
pub use error::{CompileError, DecodeError, Location};
pub use parser::parse;
pub use translate::{
    compile, compile_file, compile_with, render_file, translate, translate_with, TranslateOptions,
};
pub use value::{Field, Instance, Value};
