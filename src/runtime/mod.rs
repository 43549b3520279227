//! Decoding runtime: the cursor, the primitive type library and the struct
//! contract that generated code is written against.
//!
//! Generated sources refer to this module through a single alias
//! (`use binpat::runtime as rt;`), so everything they touch is re-exported here.

mod compound;
mod cursor;
mod primitives;
mod structs;

pub use compound::{extract_bits, Array, Enum, Overlay, Pointer, Symbols};
pub use cursor::{Buffer, Cursor};
pub use primitives::{
    read_f32, read_f64, read_signed, read_unsigned, sign_extend, Bool, Char, Char16, Double,
    Endianness, Float, Padding, S128, S16, S24, S32, S48, S64, S8, S96, U128, U16, U24, U32, U48,
    U64, U8, U96,
};
pub use structs::{addressof, array_len, sizeof, Decode, Extent, Integer, Operand, Span};

pub(crate) use compound::check_empty_element;
pub(crate) use structs::detached_cursor;

pub use crate::error::DecodeError;
pub use byteorder::{BigEndian, LittleEndian};
