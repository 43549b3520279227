//! Decode buffers directly from a resolved [`Program`].
//!
//! The codec walks the same field plans the emitter renders, in the same
//! order, so a dynamic decode and the generated Rust types agree on every
//! value and span. Bytes are only consumed through the runtime [`Cursor`].

use crate::codegen::{FieldPlan, Layout, Length, Program, Scalar, Shape, StructType, TypeDef};
use crate::ast::ScalarKind;
use crate::error::DecodeError;
use crate::runtime::{check_empty_element, extract_bits, Buffer, Cursor, Operand, Span};
use crate::value::{Field, Instance, InstanceBuilder, Value};
use tracing::debug;

#[derive(Debug)]
pub struct Codec {
    program: Program,
}

impl Codec {
    pub fn new(program: Program) -> Self {
        Codec { program }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Decode struct or union `name` at the cursor, advancing it past the
    /// struct.
    pub fn decode_struct(&self, name: &str, cursor: &mut Cursor) -> Result<Instance, DecodeError> {
        match self.program.by_name(name) {
            Some(TypeDef::Struct(def)) => self.decode_struct_def(def, cursor),
            Some(TypeDef::Union(def)) => self.decode_union_def(def, cursor),
            _ => Err(DecodeError::UnknownType {
                name: name.to_string(),
            }),
        }
    }

    /// Decode any named type, alias or scalar keyword from a cursor or a
    /// detached position.
    pub fn decode<'a>(&self, name: &str, operand: impl Into<Operand<'a>>) -> Result<Field, DecodeError> {
        let layout = self.layout(name)?;
        match operand.into() {
            Operand::Cursor(cursor) => self.decode_layout(layout, cursor),
            Operand::Detached {
                buffer,
                offset,
                source,
            } => {
                let mut cursor = crate::runtime::detached_cursor(buffer, offset, source)?;
                self.decode_layout(layout, &mut cursor)
            }
        }
    }

    /// Follow a pointer value into `buffer`.
    pub fn deref(&self, pointer: &Value, buffer: &Buffer) -> Result<Field, DecodeError> {
        let target = match pointer {
            Value::Pointer { target, .. } => target,
            other => {
                return Err(DecodeError::InvalidCursorOperand {
                    operand: format!("value of type `{}`", other.type_name()),
                })
            }
        };
        let layout = self.layout(target)?;
        let mut cursor = pointer.to_cursor(buffer)?;
        self.decode_layout(layout, &mut cursor)
    }

    /// Decode every top-level placement, each at its own offset. The result
    /// spans from offset 0 to the furthest byte any placement covered.
    pub fn decode_placements(&self, buffer: &Buffer) -> Result<Instance, DecodeError> {
        let origin = Cursor::new(buffer.clone(), 0);
        let mut builder = InstanceBuilder::new("Placements", &origin);
        let mut end = origin.snapshot();
        for placed in self.program.placements() {
            let mut cursor = origin.at(placed.offset as usize);
            let field = match placed.len {
                Some(len) => self.decode_array(placed.layout, len as usize, &placed.name, &mut cursor),
                None => self.decode_layout(placed.layout, &mut cursor),
            }
            .map_err(|e| {
                debug!(placement = %placed.name, offset = placed.offset, error = %e, "placement decode failed");
                e
            })?;
            if cursor.offset() > end.offset() {
                end = cursor;
            }
            builder.push(placed.name.clone(), field);
        }
        Ok(builder.finish(&end))
    }

    fn layout(&self, name: &str) -> Result<Layout, DecodeError> {
        if let Some(kind) = ScalarKind::from_keyword(name) {
            return Ok(Layout::Scalar(Scalar {
                kind,
                endian: self.program.default_endianness(),
            }));
        }
        self.program
            .lookup(name)
            .map(Layout::Type)
            .or_else(|| self.program.alias(name))
            .ok_or_else(|| DecodeError::UnknownType {
                name: name.to_string(),
            })
    }

    fn decode_struct_def(&self, def: &StructType, cursor: &mut Cursor) -> Result<Instance, DecodeError> {
        let mut builder = InstanceBuilder::new(def.name.as_str(), cursor);
        for plan in &def.fields {
            if let Some((name, field)) = self.decode_member(def, plan, &builder, cursor)? {
                builder.push(name, field);
            }
        }
        Ok(builder.finish(cursor))
    }

    /// Every member decodes from the union's start; the union ends where its
    /// widest member does.
    fn decode_union_def(&self, def: &StructType, cursor: &mut Cursor) -> Result<Instance, DecodeError> {
        let mut builder = InstanceBuilder::new(def.name.as_str(), cursor);
        let mut end = cursor.offset();
        for plan in &def.fields {
            let mut member = cursor.snapshot();
            let decoded = self.decode_member(def, plan, &builder, &mut member)?;
            end = end.max(member.offset());
            if let Some((name, field)) = decoded {
                builder.push(name, field);
            }
        }
        if end > cursor.offset() {
            cursor.skip(end - cursor.offset())?;
        }
        Ok(builder.finish(cursor))
    }

    /// One field of a struct or union. Padding decodes to `None`.
    fn decode_member(
        &self,
        def: &StructType,
        plan: &FieldPlan,
        builder: &InstanceBuilder,
        cursor: &mut Cursor,
    ) -> Result<Option<(String, Field)>, DecodeError> {
        let decoded = match &plan.shape {
            Shape::Padding(size) => cursor.skip(*size as usize).map(|_| None),
            Shape::Value(layout) => self.decode_layout(*layout, cursor).map(Some),
            Shape::Array { element, len } => self
                .array_len(builder, len)
                .and_then(|n| {
                    let field = plan.name.as_deref().unwrap_or_default();
                    self.decode_array(*element, n, field, cursor)
                })
                .map(Some),
            Shape::Pointer { address, target } => {
                let start = cursor.offset();
                self.read_integer(*address, cursor).map(|value| {
                    Some(Field {
                        span: Span::new(start, cursor.offset()),
                        value: Value::Pointer {
                            address: value,
                            address_ty: address.kind.keyword(),
                            target: self.program.layout_name(*target).to_string(),
                        },
                    })
                })
            }
        };
        let decoded = decoded.map_err(|e| {
            debug!(
                type_name = %def.name,
                field = plan.name.as_deref().unwrap_or("padding"),
                error = %e,
                "decode failed"
            );
            e
        })?;
        Ok(plan.name.clone().zip(decoded))
    }

    fn array_len(&self, builder: &InstanceBuilder, len: &Length) -> Result<usize, DecodeError> {
        match len {
            Length::Fixed(n) => Ok(*n as usize),
            Length::Field { name, .. } => {
                let value = builder.get(name).and_then(Value::as_i128).unwrap_or(-1);
                usize::try_from(value).map_err(|_| DecodeError::InvalidLength {
                    field: name.clone(),
                    value,
                })
            }
        }
    }

    fn decode_array(
        &self,
        element: Layout,
        len: usize,
        field: &str,
        cursor: &mut Cursor,
    ) -> Result<Field, DecodeError> {
        let start = cursor.offset();
        let mut items = Vec::with_capacity(len.min(cursor.remaining()));
        for _ in 0..len {
            let before = cursor.offset();
            items.push(self.decode_layout(element, cursor)?);
            if cursor.offset() == before {
                check_empty_element(len, cursor, field)?;
            }
        }
        Ok(Field {
            span: Span::new(start, cursor.offset()),
            value: Value::Array(items),
        })
    }

    /// Integer scalar as `i128`; `u128` values above `i128::MAX` wrap.
    fn read_integer(&self, scalar: Scalar, cursor: &mut Cursor) -> Result<i128, DecodeError> {
        let width = scalar.kind.width();
        if scalar.kind.is_signed() {
            scalar.endian.read_signed(cursor, width)
        } else {
            Ok(scalar.endian.read_unsigned(cursor, width)? as i128)
        }
    }

    fn decode_layout(&self, layout: Layout, cursor: &mut Cursor) -> Result<Field, DecodeError> {
        let start = cursor.offset();
        let value = match layout {
            Layout::Scalar(scalar) => self.decode_scalar(scalar, cursor)?,
            Layout::Type(id) => match self.program.get(id) {
                TypeDef::Struct(def) => Value::Struct(self.decode_struct_def(def, cursor)?),
                TypeDef::Union(def) => Value::Struct(self.decode_union_def(def, cursor)?),
                TypeDef::Enum(def) => {
                    let raw = self.read_integer(def.backing, cursor)?;
                    Value::Enum {
                        ty: def.name.clone(),
                        raw,
                        symbol: def.symbol(raw).map(str::to_string),
                    }
                }
                TypeDef::Bitfield(def) => {
                    let raw = def
                        .backing
                        .endian
                        .read_unsigned(cursor, def.backing.kind.width())?;
                    let entries = def
                        .slots
                        .iter()
                        .filter_map(|slot| {
                            slot.name
                                .as_ref()
                                .map(|name| (name.clone(), extract_bits(raw, slot.shift, slot.width)))
                        })
                        .collect();
                    Value::Bitfield {
                        ty: def.name.clone(),
                        raw,
                        entries,
                    }
                }
            },
        };
        Ok(Field {
            span: Span::new(start, cursor.offset()),
            value,
        })
    }

    fn decode_scalar(&self, scalar: Scalar, cursor: &mut Cursor) -> Result<Value, DecodeError> {
        let endian = scalar.endian;
        let ty = scalar.kind.keyword();
        Ok(match scalar.kind {
            ScalarKind::Unsigned(width) => Value::Unsigned {
                value: endian.read_unsigned(cursor, width as usize)?,
                ty,
            },
            ScalarKind::Signed(width) => Value::Signed {
                value: endian.read_signed(cursor, width as usize)?,
                ty,
            },
            ScalarKind::Float => Value::Float(endian.read_f32(cursor)?),
            ScalarKind::Double => Value::Double(endian.read_f64(cursor)?),
            ScalarKind::Bool => Value::Bool(cursor.read(1)?[0] != 0),
            ScalarKind::Char => Value::Char(cursor.read(1)?[0]),
            ScalarKind::Char16 => Value::Char16(endian.read_unsigned(cursor, 2)? as u16),
        })
    }
}
