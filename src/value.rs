//! Dynamic decoded values (codec representation).

use crate::error::DecodeError;
use crate::runtime::{detached_cursor, Buffer, Cursor, Extent, Span};
use indexmap::IndexMap;

/// A single decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unsigned { value: u128, ty: &'static str },
    Signed { value: i128, ty: &'static str },
    Float(f32),
    Double(f64),
    Bool(bool),
    Char(u8),
    Char16(u16),
    /// `symbol` is `None` when the value is not in the enum's table.
    Enum {
        ty: String,
        raw: i128,
        symbol: Option<String>,
    },
    /// Named entries in declaration order; padding bits are left out.
    Bitfield {
        ty: String,
        raw: u128,
        entries: Vec<(String, u128)>,
    },
    /// Address only. [`crate::Codec::deref`] decodes the target.
    Pointer {
        address: i128,
        address_ty: &'static str,
        target: String,
    },
    Array(Vec<Field>),
    Struct(Instance),
}

impl Value {
    /// DSL name of the value's type.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Unsigned { ty, .. } | Value::Signed { ty, .. } => ty,
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Char16(_) => "char16",
            Value::Enum { ty, .. } | Value::Bitfield { ty, .. } => ty,
            Value::Pointer { address_ty, .. } => address_ty,
            Value::Array(_) => "array",
            Value::Struct(instance) => &instance.type_name,
        }
    }

    /// Integer value of scalars, enums and pointer addresses.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Unsigned { value, .. } => i128::try_from(*value).ok(),
            Value::Signed { value, .. } => Some(*value),
            Value::Enum { raw, .. } => Some(*raw),
            Value::Pointer { address, .. } => Some(*address),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i128().and_then(|v| u64::try_from(v).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x as f64),
            Value::Double(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Instance> {
        match self {
            Value::Struct(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Field]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Symbol of an enum value, if it has one.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Value::Enum { symbol, .. } => symbol.as_deref(),
            _ => None,
        }
    }

    /// Named entry of a bit-field value.
    pub fn bits(&self, name: &str) -> Option<u128> {
        match self {
            Value::Bitfield { entries, .. } => entries
                .iter()
                .find(|(entry, _)| entry == name)
                .map(|(_, bits)| *bits),
            _ => None,
        }
    }

    /// Reinterpret an integer value as a position in `buffer`.
    ///
    /// Fails with [`DecodeError::InvalidCursorOperand`] for non-integer values
    /// and negative integers. Positions past the end are accepted and fail on
    /// the first read.
    pub fn to_cursor(&self, buffer: &Buffer) -> Result<Cursor, DecodeError> {
        match (self, self.as_i128()) {
            (Value::Unsigned { .. } | Value::Signed { .. } | Value::Pointer { .. }, Some(offset)) => {
                detached_cursor(buffer.clone(), offset, self.type_name())
            }
            _ => Err(DecodeError::InvalidCursorOperand {
                operand: format!("value of type `{}`", self.type_name()),
            }),
        }
    }
}

/// A value and the bytes it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub span: Span,
    pub value: Value,
}

impl Extent for Field {
    fn span(&self) -> Span {
        self.span
    }
}

/// A fully decoded struct. Only [`InstanceBuilder::finish`] creates one, so an
/// instance always has every field its type declares.
#[derive(Debug, Clone)]
pub struct Instance {
    type_name: String,
    fields: IndexMap<String, Field>,
    span: Span,
    buffer: Buffer,
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.fields == other.fields && self.span == other.span
    }
}

impl Instance {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).map(|f| &f.value)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The buffer the instance was decoded from.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn sizeof(&self) -> usize {
        self.span.len()
    }

    pub fn addressof(&self) -> usize {
        self.span.start
    }
}

impl Extent for Instance {
    fn span(&self) -> Span {
        self.span
    }
}

/// Collects fields while a struct decodes.
#[derive(Debug)]
pub struct InstanceBuilder {
    type_name: String,
    start: Cursor,
    fields: IndexMap<String, Field>,
}

impl InstanceBuilder {
    /// Starts at the cursor's current offset.
    pub fn new(type_name: impl Into<String>, start: &Cursor) -> Self {
        InstanceBuilder {
            type_name: type_name.into(),
            start: start.snapshot(),
            fields: IndexMap::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, field: Field) {
        self.fields.insert(name.into(), field);
    }

    /// A field decoded so far.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).map(|f| &f.value)
    }

    pub fn finish(self, end: &Cursor) -> Instance {
        Instance {
            type_name: self.type_name,
            fields: self.fields,
            span: Span::between(&self.start, end),
            buffer: self.start.buffer().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_become_cursors() {
        let buffer: Buffer = vec![0u8; 16].into();
        let v = Value::Unsigned { value: 12, ty: "u32" };
        assert_eq!(v.to_cursor(&buffer).unwrap().offset(), 12);
    }

    #[test]
    fn non_integers_are_invalid_operands() {
        let buffer: Buffer = vec![0u8; 4].into();
        let err = Value::Float(1.0).to_cursor(&buffer).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidCursorOperand {
                operand: "value of type `float`".to_string()
            }
        );
        let e = Value::Enum {
            ty: "Kind".into(),
            raw: 1,
            symbol: None,
        };
        assert!(e.to_cursor(&buffer).is_err());
    }

    #[test]
    fn negative_integer_is_invalid_operand() {
        let buffer: Buffer = vec![0u8; 4].into();
        let v = Value::Signed { value: -1, ty: "s8" };
        assert!(matches!(
            v.to_cursor(&buffer),
            Err(DecodeError::InvalidCursorOperand { .. })
        ));
    }

    #[test]
    fn builder_records_span() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3], 1);
        let mut b = InstanceBuilder::new("A", &cursor);
        cursor.skip(2).unwrap();
        b.push(
            "x",
            Field {
                span: Span::new(1, 3),
                value: Value::Unsigned { value: 0x0302, ty: "u16" },
            },
        );
        let i = b.finish(&cursor);
        assert_eq!(i.addressof(), 1);
        assert_eq!(i.sizeof(), 2);
        assert_eq!(i.get("x").and_then(Value::as_u64), Some(0x0302));
    }
}
