//! Arrays, unions, enums, bit-fields and pointers.

use super::cursor::{Buffer, Cursor};
use super::structs::{Decode, Extent, Integer, Operand, Span};
use crate::error::DecodeError;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

/// `len` consecutive elements decoded from one cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Array<T> {
    items: Vec<T>,
    span: Span,
}

impl<T: Decode> Array<T> {
    /// Decode `len` elements of the array field `field`.
    ///
    /// Elements that consume no bytes cannot underrun, so a length larger than
    /// the bytes left fails with [`DecodeError::InvalidLength`] instead.
    pub fn decode_n(cursor: &mut Cursor, len: usize, field: &str) -> Result<Self, DecodeError> {
        let start = cursor.offset();
        // Cap the preallocation: a corrupt length must fail on underrun, not on allocation.
        let mut items = Vec::with_capacity(len.min(cursor.remaining()));
        for _ in 0..len {
            let before = cursor.offset();
            items.push(T::decode(cursor)?);
            if cursor.offset() == before {
                check_empty_element(len, cursor, field)?;
            }
        }
        Ok(Array {
            items,
            span: Span::new(start, cursor.offset()),
        })
    }
}

/// Length check for an array whose last element consumed nothing.
pub(crate) fn check_empty_element(len: usize, cursor: &Cursor, field: &str) -> Result<(), DecodeError> {
    if len > cursor.remaining() {
        return Err(DecodeError::InvalidLength {
            field: field.to_string(),
            value: len as i128,
        });
    }
    Ok(())
}

impl<T> Array<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> Deref for Array<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> Extent for Array<T> {
    fn span(&self) -> Span {
        self.span
    }
}

/// Decodes the members of a union, each from the union's start offset.
///
/// The union ends after its widest member; [`Overlay::finish`] moves the
/// caller's cursor there once every member is decoded.
#[derive(Debug, Clone)]
pub struct Overlay {
    start: Cursor,
    end: usize,
}

impl Overlay {
    pub fn new(cursor: &Cursor) -> Self {
        Overlay {
            start: cursor.snapshot(),
            end: cursor.offset(),
        }
    }

    /// Decode one member through a fresh cursor at the start offset.
    pub fn member<T>(
        &mut self,
        decode: impl FnOnce(&mut Cursor) -> Result<T, DecodeError>,
    ) -> Result<T, DecodeError> {
        let mut cursor = self.start.snapshot();
        let value = decode(&mut cursor)?;
        self.end = self.end.max(cursor.offset());
        Ok(value)
    }

    /// Bytes covered by the widest member so far.
    pub fn width(&self) -> usize {
        self.end - self.start.offset()
    }

    /// Advance `cursor` to the end of the widest member. An empty union leaves
    /// it in place.
    pub fn finish(&self, cursor: &mut Cursor) -> Result<(), DecodeError> {
        match self.end.checked_sub(cursor.offset()) {
            Some(width) if width > 0 => cursor.skip(width),
            _ => Ok(()),
        }
    }
}

/// Symbol table of a generated enum.
pub trait Symbols: Sized + Copy {
    /// Integer type the enum is stored as.
    type Backing: Decode + Integer + Extent;

    fn from_raw(raw: i128) -> Option<Self>;

    fn symbol(&self) -> &'static str;
}

/// An enum field. Values missing from the symbol table are kept as the raw
/// backing integer instead of failing the decode.
pub struct Enum<S> {
    raw: i128,
    known: Option<S>,
    span: Span,
}

impl<S: Symbols> Enum<S> {
    pub fn raw(&self) -> i128 {
        self.raw
    }

    /// The matching symbol, `None` if the value is unrecognized.
    pub fn known(&self) -> Option<S> {
        self.known
    }

    pub fn is_recognized(&self) -> bool {
        self.known.is_some()
    }

    pub fn symbol(&self) -> Option<&'static str> {
        self.known.map(|s| s.symbol())
    }
}

impl<S: Symbols> Decode for Enum<S> {
    fn decode(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        let backing = S::Backing::decode(cursor)?;
        let raw = backing.as_i128();
        Ok(Enum {
            raw,
            known: S::from_raw(raw),
            span: backing.span(),
        })
    }
}

impl<S> Extent for Enum<S> {
    fn span(&self) -> Span {
        self.span
    }
}

impl<S: Copy> Clone for Enum<S> {
    fn clone(&self) -> Self {
        Enum {
            raw: self.raw,
            known: self.known,
            span: self.span,
        }
    }
}

impl<S: Symbols> fmt::Debug for Enum<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.symbol() {
            Some(symbol) => write!(f, "{}({})", symbol, self.raw),
            None => write!(f, "<unrecognized {}>", self.raw),
        }
    }
}

/// Bits `[shift, shift + width)` of `raw`, counted from the least significant bit.
pub fn extract_bits(raw: u128, shift: u32, width: u32) -> u128 {
    if width == 0 || shift >= 128 {
        return 0;
    }
    let shifted = raw >> shift;
    if width >= 128 {
        shifted
    } else {
        shifted & ((1u128 << width) - 1)
    }
}

/// An integer field read as an offset into the buffer it was decoded from.
///
/// Decoding reads only the address. The target is decoded on [`Pointer::deref`]
/// through a fresh cursor, so an address outside the buffer is harmless until
/// it is followed.
pub struct Pointer<P, T> {
    address: P,
    buffer: Buffer,
    target: PhantomData<fn() -> T>,
}

impl<P: Integer, T> Pointer<P, T> {
    pub fn address(&self) -> &P {
        &self.address
    }

    /// Cursor positioned at the address. Negative addresses are rejected.
    pub fn to_cursor(&self) -> Result<Cursor, DecodeError> {
        super::structs::detached_cursor(Arc::clone(&self.buffer), self.address.as_i128(), P::TYPE_NAME)
    }

    pub fn deref(&self) -> Result<T, DecodeError>
    where
        T: Decode,
    {
        T::decode_from(self)
    }
}

impl<P: Decode, T> Decode for Pointer<P, T> {
    fn decode(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        let buffer = Arc::clone(cursor.buffer());
        let address = P::decode(cursor)?;
        Ok(Pointer {
            address,
            buffer,
            target: PhantomData,
        })
    }
}

impl<P: Extent, T> Extent for Pointer<P, T> {
    fn span(&self) -> Span {
        self.address.span()
    }
}

impl<'a, P: Integer, T> From<&'a Pointer<P, T>> for Operand<'a> {
    fn from(pointer: &'a Pointer<P, T>) -> Self {
        Operand::Detached {
            buffer: Arc::clone(&pointer.buffer),
            offset: pointer.address.as_i128(),
            source: P::TYPE_NAME,
        }
    }
}

impl<P: Clone, T> Clone for Pointer<P, T> {
    fn clone(&self) -> Self {
        Pointer {
            address: self.address.clone(),
            buffer: Arc::clone(&self.buffer),
            target: PhantomData,
        }
    }
}

impl<P: Integer, T> fmt::Debug for Pointer<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer({:#x})", self.address.as_i128())
    }
}
