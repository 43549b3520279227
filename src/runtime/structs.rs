//! The decode contract shared by every primitive and generated struct.

use super::cursor::{Buffer, Cursor};
use crate::error::DecodeError;

/// Byte range `[start, end)` a decoded item occupies in its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(end >= start);
        Span { start, end }
    }

    /// Span covered between a start marker and the cursor's current offset.
    pub fn between(start: &Cursor, end: &Cursor) -> Self {
        Span::new(start.offset(), end.offset())
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Address and size of a decoded item.
pub trait Extent {
    fn span(&self) -> Span;
}

/// Number of bytes the item consumed.
pub fn sizeof(item: &impl Extent) -> usize {
    item.span().len()
}

/// Offset at which the item started.
pub fn addressof(item: &impl Extent) -> usize {
    item.span().start
}

/// What a decode can be driven by: a live cursor that the decode advances, or
/// a detached position (from a pointer or a caller) that gets its own cursor.
#[derive(Debug)]
pub enum Operand<'a> {
    Cursor(&'a mut Cursor),
    Detached {
        buffer: Buffer,
        offset: i128,
        /// Type of the value the position came from, for error reporting.
        source: &'static str,
    },
}

impl Operand<'static> {
    /// A detached position given directly by the caller.
    pub fn at(buffer: &Buffer, offset: usize) -> Self {
        Operand::Detached {
            buffer: buffer.clone(),
            offset: offset as i128,
            source: "offset",
        }
    }
}

impl<'a> From<&'a mut Cursor> for Operand<'a> {
    fn from(cursor: &'a mut Cursor) -> Self {
        Operand::Cursor(cursor)
    }
}

/// Resolve a detached offset into a fresh cursor. Only negative offsets are
/// rejected here; an offset past the end fails later, on read.
pub(crate) fn detached_cursor(
    buffer: Buffer,
    offset: i128,
    source: &str,
) -> Result<Cursor, DecodeError> {
    let offset = usize::try_from(offset).map_err(|_| DecodeError::InvalidCursorOperand {
        operand: format!("{} with value {}", source, offset),
    })?;
    Ok(Cursor::new(buffer, offset))
}

/// A type that can be decoded from a cursor.
///
/// `decode` must consume bytes only through the cursor and leave it right
/// after the last byte it used. Structs snapshot the cursor before their
/// first field and after their last one to record their [`Span`].
pub trait Decode: Sized {
    fn decode(cursor: &mut Cursor) -> Result<Self, DecodeError>;

    fn decode_from<'a>(operand: impl Into<Operand<'a>>) -> Result<Self, DecodeError> {
        match operand.into() {
            Operand::Cursor(cursor) => Self::decode(cursor),
            Operand::Detached {
                buffer,
                offset,
                source,
            } => Self::decode(&mut detached_cursor(buffer, offset, source)?),
        }
    }
}

/// Integer-valued decoded items: usable as array lengths and pointer targets.
pub trait Integer {
    /// DSL spelling of the type, e.g. `u24`.
    const TYPE_NAME: &'static str;

    fn as_i128(&self) -> i128;

    /// Two's-complement bit pattern, for bit extraction.
    fn as_u128(&self) -> u128;
}

/// Array length taken from an earlier integer field.
pub fn array_len<I: Integer>(len: &I, field: &str) -> Result<usize, DecodeError> {
    let value = len.as_i128();
    usize::try_from(value).map_err(|_| DecodeError::InvalidLength {
        field: field.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_len() {
        let s = Span::new(3, 7);
        assert_eq!(s.len(), 4);
        assert!(!s.is_empty());
        assert!(Span::new(2, 2).is_empty());
    }

    #[test]
    fn negative_detached_offset_is_invalid_operand() {
        let buffer: Buffer = vec![0u8; 4].into();
        let err = detached_cursor(buffer, -8, "s32").unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidCursorOperand {
                operand: "s32 with value -8".to_string()
            }
        );
    }
}
