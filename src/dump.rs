//! Format decoded instances as an indented text tree.

use crate::value::{Field, Instance, Value};

/// One line per field: name, type, address, size and value. Nested structs,
/// arrays and bit-field entries are indented below their parent.
pub fn dump_instance(instance: &Instance) -> String {
    let mut out = format!(
        "{} @ {:#x} [{} bytes]\n",
        instance.type_name(),
        instance.addressof(),
        instance.sizeof()
    );
    dump_fields(instance, 1, &mut out);
    out
}

fn dump_fields(instance: &Instance, depth: usize, out: &mut String) {
    for (name, field) in instance.fields() {
        dump_field(name, field, depth, out);
    }
}

fn dump_field(name: &str, field: &Field, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let head = format!(
        "{}{}: {} @ {:#x} [{}]",
        indent,
        name,
        type_label(&field.value),
        field.span.start,
        field.span.len()
    );
    match &field.value {
        Value::Struct(inner) => {
            out.push_str(&head);
            out.push('\n');
            dump_fields(inner, depth + 1, out);
        }
        Value::Array(items) => match char_string(items) {
            Some(text) => out.push_str(&format!("{} = {:?}\n", head, text)),
            None => {
                out.push_str(&head);
                out.push('\n');
                for (i, item) in items.iter().enumerate() {
                    dump_field(&format!("[{}]", i), item, depth + 1, out);
                }
            }
        },
        Value::Bitfield { raw, entries, .. } => {
            out.push_str(&format!("{} = {:#x}\n", head, raw));
            for (entry, bits) in entries {
                out.push_str(&format!("{}  {} = {}\n", indent, entry, bits));
            }
        }
        value => out.push_str(&format!("{} = {}\n", head, format_value(value))),
    }
}

fn type_label(value: &Value) -> String {
    match value {
        Value::Array(items) => match items.first() {
            Some(first) => format!("{}[{}]", type_label(&first.value), items.len()),
            None => "[0]".to_string(),
        },
        Value::Pointer {
            address_ty, target, ..
        } => format!("{} *{}", target, address_ty),
        other => other.type_name().to_string(),
    }
}

/// Text of an all-`char` array, stopping at the first NUL.
fn char_string(items: &[Field]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let mut text = String::new();
    for item in items {
        match item.value {
            Value::Char(0) => break,
            Value::Char(c) => text.push(c as char),
            _ => return None,
        }
    }
    Some(text)
}

/// Single-line rendering of a scalar, enum or pointer value.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Unsigned { value, .. } => value.to_string(),
        Value::Signed { value, .. } => value.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Double(x) => x.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Char(c) => format!("{:?}", *c as char),
        Value::Char16(c) => match char::from_u32(*c as u32) {
            Some(ch) => format!("{:?}", ch),
            None => format!("\\u{{{:04x}}}", c),
        },
        Value::Enum {
            ty, raw, symbol, ..
        } => match symbol {
            Some(symbol) => format!("{}::{} ({})", ty, symbol, raw),
            None => format!("<unrecognized {}>", raw),
        },
        Value::Bitfield { raw, .. } => format!("{:#x}", raw),
        Value::Pointer {
            address, target, ..
        } => format!("-> {} @ {:#x}", target, address),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Struct(instance) => format!("{} {{ .. }}", instance.type_name()),
    }
}
