//! Fixed-width scalar primitives.
//!
//! Integers come in every byte width the pattern language knows (1, 2, 3, 4,
//! 6, 8, 12 and 16 bytes). Odd widths are assembled byte by byte in the
//! declared order, and signed values are sign-extended from the top bit of the
//! declared width, so a 3-byte `FF FF FF` is -1 rather than 16777215.

use super::cursor::Cursor;
use super::structs::{Decode, Extent, Integer, Span};
use crate::error::DecodeError;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::marker::PhantomData;

/// Byte order of a multi-byte scalar. Patterns default to little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    pub fn keyword(self) -> &'static str {
        match self {
            Endianness::Little => "le",
            Endianness::Big => "be",
        }
    }

    pub fn read_unsigned(self, cursor: &mut Cursor, width: usize) -> Result<u128, DecodeError> {
        match self {
            Endianness::Little => read_unsigned::<LittleEndian>(cursor, width),
            Endianness::Big => read_unsigned::<BigEndian>(cursor, width),
        }
    }

    pub fn read_signed(self, cursor: &mut Cursor, width: usize) -> Result<i128, DecodeError> {
        match self {
            Endianness::Little => read_signed::<LittleEndian>(cursor, width),
            Endianness::Big => read_signed::<BigEndian>(cursor, width),
        }
    }

    pub fn read_f32(self, cursor: &mut Cursor) -> Result<f32, DecodeError> {
        match self {
            Endianness::Little => read_f32::<LittleEndian>(cursor),
            Endianness::Big => read_f32::<BigEndian>(cursor),
        }
    }

    pub fn read_f64(self, cursor: &mut Cursor) -> Result<f64, DecodeError> {
        match self {
            Endianness::Little => read_f64::<LittleEndian>(cursor),
            Endianness::Big => read_f64::<BigEndian>(cursor),
        }
    }
}

/// Read an unsigned integer of `width` bytes (1..=16).
pub fn read_unsigned<E: ByteOrder>(cursor: &mut Cursor, width: usize) -> Result<u128, DecodeError> {
    if !(1..=16).contains(&width) {
        return Err(DecodeError::UnsupportedWidth { width });
    }
    let bytes = cursor.read(width)?;
    Ok(match width {
        1 => bytes[0] as u128,
        2 => E::read_u16(bytes) as u128,
        4 => E::read_u32(bytes) as u128,
        8 => E::read_u64(bytes) as u128,
        16 => E::read_u128(bytes),
        n => E::read_uint128(bytes, n),
    })
}

/// Read a two's-complement integer of `width` bytes (1..=16).
pub fn read_signed<E: ByteOrder>(cursor: &mut Cursor, width: usize) -> Result<i128, DecodeError> {
    read_unsigned::<E>(cursor, width).map(|raw| sign_extend(raw, width))
}

/// Interpret the low `width` bytes of `raw` as two's complement.
pub fn sign_extend(raw: u128, width: usize) -> i128 {
    let bits = (width * 8) as u32;
    if bits == 0 || bits >= 128 {
        return raw as i128;
    }
    let shift = 128 - bits;
    ((raw << shift) as i128) >> shift
}

pub fn read_f32<E: ByteOrder>(cursor: &mut Cursor) -> Result<f32, DecodeError> {
    Ok(E::read_f32(cursor.read(4)?))
}

pub fn read_f64<E: ByteOrder>(cursor: &mut Cursor) -> Result<f64, DecodeError> {
    Ok(E::read_f64(cursor.read(8)?))
}

macro_rules! int_primitive {
    ($(#[$doc:meta])* $name:ident, $keyword:literal, $width:literal, $native:ty, $read:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name<E = LittleEndian> {
            value: $native,
            span: Span,
            order: PhantomData<E>,
        }

        impl<E> $name<E> {
            pub const WIDTH: usize = $width;

            pub fn value(&self) -> $native {
                self.value
            }
        }

        impl<E: ByteOrder> Decode for $name<E> {
            fn decode(cursor: &mut Cursor) -> Result<Self, DecodeError> {
                let start = cursor.offset();
                let value = $read::<E>(cursor, $width)? as $native;
                Ok($name {
                    value,
                    span: Span::new(start, cursor.offset()),
                    order: PhantomData,
                })
            }
        }

        impl<E> Extent for $name<E> {
            fn span(&self) -> Span {
                self.span
            }
        }

        impl<E> Integer for $name<E> {
            const TYPE_NAME: &'static str = $keyword;

            fn as_i128(&self) -> i128 {
                self.value as i128
            }

            fn as_u128(&self) -> u128 {
                self.value as u128
            }
        }
    };
}

int_primitive!(U8, "u8", 1, u8, read_unsigned);
int_primitive!(U16, "u16", 2, u16, read_unsigned);
int_primitive!(
    /// 3-byte unsigned integer.
    U24, "u24", 3, u32, read_unsigned
);
int_primitive!(U32, "u32", 4, u32, read_unsigned);
int_primitive!(
    /// 6-byte unsigned integer.
    U48, "u48", 6, u64, read_unsigned
);
int_primitive!(U64, "u64", 8, u64, read_unsigned);
int_primitive!(
    /// 12-byte unsigned integer.
    U96, "u96", 12, u128, read_unsigned
);
int_primitive!(U128, "u128", 16, u128, read_unsigned);
int_primitive!(S8, "s8", 1, i8, read_signed);
int_primitive!(S16, "s16", 2, i16, read_signed);
int_primitive!(
    /// 3-byte signed integer, sign-extended from bit 23.
    S24, "s24", 3, i32, read_signed
);
int_primitive!(S32, "s32", 4, i32, read_signed);
int_primitive!(
    /// 6-byte signed integer, sign-extended from bit 47.
    S48, "s48", 6, i64, read_signed
);
int_primitive!(S64, "s64", 8, i64, read_signed);
int_primitive!(
    /// 12-byte signed integer, sign-extended from bit 95.
    S96, "s96", 12, i128, read_signed
);
int_primitive!(S128, "s128", 16, i128, read_signed);

/// 4-byte IEEE-754 float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Float<E = LittleEndian> {
    value: f32,
    span: Span,
    order: PhantomData<E>,
}

impl<E> Float<E> {
    pub fn value(&self) -> f32 {
        self.value
    }
}

impl<E: ByteOrder> Decode for Float<E> {
    fn decode(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        let start = cursor.offset();
        let value = read_f32::<E>(cursor)?;
        Ok(Float {
            value,
            span: Span::new(start, cursor.offset()),
            order: PhantomData,
        })
    }
}

impl<E> Extent for Float<E> {
    fn span(&self) -> Span {
        self.span
    }
}

/// 8-byte IEEE-754 double.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Double<E = LittleEndian> {
    value: f64,
    span: Span,
    order: PhantomData<E>,
}

impl<E> Double<E> {
    pub fn value(&self) -> f64 {
        self.value
    }
}

impl<E: ByteOrder> Decode for Double<E> {
    fn decode(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        let start = cursor.offset();
        let value = read_f64::<E>(cursor)?;
        Ok(Double {
            value,
            span: Span::new(start, cursor.offset()),
            order: PhantomData,
        })
    }
}

impl<E> Extent for Double<E> {
    fn span(&self) -> Span {
        self.span
    }
}

/// One byte; anything but zero is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bool {
    value: bool,
    span: Span,
}

impl Bool {
    pub fn value(&self) -> bool {
        self.value
    }
}

impl Decode for Bool {
    fn decode(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        let start = cursor.offset();
        let value = cursor.read(1)?[0] != 0;
        Ok(Bool {
            value,
            span: Span::new(start, cursor.offset()),
        })
    }
}

impl Extent for Bool {
    fn span(&self) -> Span {
        self.span
    }
}

/// Narrow (1-byte) character code unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Char {
    value: u8,
    span: Span,
}

impl Char {
    pub fn value(&self) -> u8 {
        self.value
    }

    /// The code unit read as Latin-1.
    pub fn as_char(&self) -> char {
        self.value as char
    }
}

impl Decode for Char {
    fn decode(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        let start = cursor.offset();
        let value = cursor.read(1)?[0];
        Ok(Char {
            value,
            span: Span::new(start, cursor.offset()),
        })
    }
}

impl Extent for Char {
    fn span(&self) -> Span {
        self.span
    }
}

/// Wide (2-byte) character code unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Char16<E = LittleEndian> {
    value: u16,
    span: Span,
    order: PhantomData<E>,
}

impl<E> Char16<E> {
    pub fn value(&self) -> u16 {
        self.value
    }

    /// `None` for unpaired surrogates.
    pub fn as_char(&self) -> Option<char> {
        char::from_u32(self.value as u32)
    }
}

impl<E: ByteOrder> Decode for Char16<E> {
    fn decode(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        let start = cursor.offset();
        let value = read_unsigned::<E>(cursor, 2)? as u16;
        Ok(Char16 {
            value,
            span: Span::new(start, cursor.offset()),
            order: PhantomData,
        })
    }
}

impl<E> Extent for Char16<E> {
    fn span(&self) -> Span {
        self.span
    }
}

/// `N` skipped bytes. Generated structs decode it but keep no field for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Padding<const N: usize> {
    span: Span,
}

impl<const N: usize> Decode for Padding<N> {
    fn decode(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        let start = cursor.offset();
        cursor.skip(N)?;
        Ok(Padding {
            span: Span::new(start, cursor.offset()),
        })
    }
}

impl<const N: usize> Extent for Padding<N> {
    fn span(&self) -> Span {
        self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::structs::sizeof;

    fn cursor(bytes: &[u8]) -> Cursor {
        Cursor::new(bytes, 0)
    }

    #[test]
    fn odd_width_little_endian() {
        let mut c = cursor(&[0x01, 0x02, 0x03]);
        assert_eq!(read_unsigned::<LittleEndian>(&mut c, 3).unwrap(), 0x030201);
    }

    #[test]
    fn odd_width_big_endian() {
        let mut c = cursor(&[0x01, 0x02, 0x03]);
        assert_eq!(read_unsigned::<BigEndian>(&mut c, 3).unwrap(), 0x010203);
    }

    #[test]
    fn sign_extends_from_declared_width() {
        assert_eq!(sign_extend(0xFF_FFFF, 3), -1);
        assert_eq!(sign_extend(0x80_0000, 3), -8_388_608);
        assert_eq!(sign_extend(0x7F_FFFF, 3), 8_388_607);
        assert_eq!(sign_extend(0xFFFF_FFFF_FFFF, 6), -1);
        assert_eq!(sign_extend(0x8000_0000_0000_0000_0000_0000, 12), -(1i128 << 95));
        assert_eq!(sign_extend(u128::MAX, 16), -1);
    }

    #[test]
    fn s24_all_ones_is_minus_one() {
        let v = S24::<LittleEndian>::decode(&mut cursor(&[0xFF, 0xFF, 0xFF])).unwrap();
        assert_eq!(v.value(), -1);
        assert_eq!(sizeof(&v), 3);
    }

    #[test]
    fn s48_and_u48() {
        let bytes = [0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(S48::<LittleEndian>::decode(&mut cursor(&bytes)).unwrap().value(), -2);
        assert_eq!(
            U48::<LittleEndian>::decode(&mut cursor(&bytes)).unwrap().value(),
            0xFFFF_FFFF_FFFE
        );
    }

    #[test]
    fn u96_big_endian() {
        let mut bytes = [0u8; 12];
        bytes[11] = 7;
        let v = U96::<BigEndian>::decode(&mut cursor(&bytes)).unwrap();
        assert_eq!(v.value(), 7);
    }

    #[test]
    fn underrun_on_short_buffer() {
        let err = U32::<LittleEndian>::decode(&mut cursor(&[1, 2, 3])).unwrap_err();
        assert!(matches!(err, DecodeError::BufferUnderrun { wanted: 4, available: 3, .. }));
    }

    #[test]
    fn unsupported_width_rejected() {
        assert_eq!(
            read_unsigned::<LittleEndian>(&mut cursor(&[0; 32]), 17),
            Err(DecodeError::UnsupportedWidth { width: 17 })
        );
    }

    #[test]
    fn bool_is_any_non_zero() {
        let mut c = cursor(&[0, 1, 0x80]);
        assert!(!Bool::decode(&mut c).unwrap().value());
        assert!(Bool::decode(&mut c).unwrap().value());
        assert!(Bool::decode(&mut c).unwrap().value());
    }

    #[test]
    fn floats_decode() {
        let mut bytes = 1.5f32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(-2.25f64).to_be_bytes());
        let mut c = cursor(&bytes);
        assert_eq!(Float::<LittleEndian>::decode(&mut c).unwrap().value(), 1.5);
        assert_eq!(Double::<BigEndian>::decode(&mut c).unwrap().value(), -2.25);
        assert!(c.is_eof());
    }

    #[test]
    fn chars_decode() {
        let mut c = cursor(&[b'A', 0x3A, 0x26]);
        assert_eq!(Char::decode(&mut c).unwrap().as_char(), 'A');
        assert_eq!(Char16::<LittleEndian>::decode(&mut c).unwrap().as_char(), Some('\u{263A}'));
    }

    #[test]
    fn padding_skips_bytes() {
        let mut c = cursor(&[0; 6]);
        let p = Padding::<4>::decode(&mut c).unwrap();
        assert_eq!(sizeof(&p), 4);
        assert_eq!(c.offset(), 4);
    }

    #[test]
    fn endianness_dispatch_matches_generic_reads() {
        let bytes = [0x00, 0x01];
        assert_eq!(Endianness::Big.read_unsigned(&mut cursor(&bytes), 2).unwrap(), 1);
        assert_eq!(Endianness::Little.read_unsigned(&mut cursor(&bytes), 2).unwrap(), 256);
        assert_eq!(Endianness::Little.read_signed(&mut cursor(&[0xFF, 0x7F]), 2).unwrap(), 0x7FFF);
    }
}
