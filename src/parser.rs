//! Parse pattern source into AST using PEST.
//!
//! Besides the grammar itself, the builders enforce the rules that only need
//! one declaration to check: unique names inside a struct, enum or bit-field,
//! array lengths naming an earlier sibling, endianness only on scalars, and no
//! float or character pointer addresses. Anything that needs the whole program
//! (type and alias resolution, backing widths) is left to the code generator.

use crate::ast::*;
use crate::error::{CompileError, Location};
use crate::runtime::Endianness;
use pest::error::LineColLocation;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::collections::HashSet;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct PatternParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Parse pattern source into AST.
pub fn parse(source: &str) -> Result<Pattern, CompileError> {
    let mut pairs = PatternParser::parse(Rule::pattern, source).map_err(syntax_error)?;
    let pair = pairs
        .next()
        .ok_or_else(|| CompileError::syntax(Location::new(1, 1), "empty parse"))?;
    build_pattern(pair)
}

fn syntax_error(e: pest::error::Error<Rule>) -> CompileError {
    let (line, column) = match e.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    let e = e.renamed_rules(|rule| match rule {
        Rule::ident => "identifier".to_string(),
        Rule::number => "number".to_string(),
        Rule::struct_def => "struct".to_string(),
        Rule::union_def => "union".to_string(),
        Rule::using_def => "using".to_string(),
        Rule::enum_def => "enum".to_string(),
        Rule::bitfield_def => "bitfield".to_string(),
        Rule::data_field | Rule::pointer_field | Rule::padding_field => "field".to_string(),
        Rule::placement => "placement".to_string(),
        Rule::EOI => "end of input".to_string(),
        other => format!("{:?}", other),
    });
    CompileError::syntax(Location::new(line, column), e.variant.message())
}

fn location(pair: &Pair) -> Location {
    let (line, column) = pair.as_span().start_pos().line_col();
    Location::new(line, column)
}

fn next<'i>(
    it: &mut impl Iterator<Item = Pair<'i>>,
    at: Location,
    what: &str,
) -> Result<Pair<'i>, CompileError> {
    it.next()
        .ok_or_else(|| CompileError::syntax(at, format!("missing {}", what)))
}

fn build_pattern(pair: Pair) -> Result<Pattern, CompileError> {
    let mut items = Vec::new();
    for inner in pair.into_inner() {
        let item = match inner.as_rule() {
            Rule::include => Item::Include(build_include(inner)?),
            Rule::pragma => Item::Pragma(build_pragma(inner)?),
            Rule::using_def => Item::Alias(build_alias(inner)?),
            Rule::struct_def => Item::Struct(build_struct(inner)?),
            Rule::union_def => Item::Union(build_struct(inner)?),
            Rule::enum_def => Item::Enum(build_enum(inner)?),
            Rule::bitfield_def => Item::Bitfield(build_bitfield(inner)?),
            Rule::placement => Item::Placement(build_placement(inner)?),
            _ => continue,
        };
        items.push(item);
    }
    Ok(Pattern { items })
}

fn build_include(pair: Pair) -> Result<Include, CompileError> {
    let at = location(&pair);
    let path_pair = next(&mut pair.into_inner(), at, "include path")?;
    let system = path_pair.as_rule() == Rule::angled_path;
    let text = next(&mut path_pair.into_inner(), at, "include path")?;
    Ok(Include {
        path: text.as_str().to_string(),
        system,
        location: at,
    })
}

fn build_pragma(pair: Pair) -> Result<Pragma, CompileError> {
    let at = location(&pair);
    let mut it = pair.into_inner();
    let name = next(&mut it, at, "pragma name")?.as_str().to_string();
    let value = it
        .next()
        .map(|v| v.as_str().trim().to_string())
        .filter(|v| !v.is_empty());
    if name == "endian" && !matches!(value.as_deref(), Some("little") | Some("big")) {
        return Err(CompileError::syntax(
            at,
            "`#pragma endian` expects `little` or `big`",
        ));
    }
    Ok(Pragma {
        name,
        value,
        location: at,
    })
}

/// Name of a user-defined type. Scalar keywords are taken.
fn type_name(pair: Pair) -> Result<String, CompileError> {
    let name = pair.as_str();
    if ScalarKind::from_keyword(name).is_some() {
        return Err(CompileError::syntax(
            location(&pair),
            format!("type name `{}` shadows a built-in scalar type", name),
        ));
    }
    Ok(name.to_string())
}

fn type_ref(pair: Pair, endian: Option<Endianness>) -> Result<TypeRef, CompileError> {
    let at = location(&pair);
    match ScalarKind::from_keyword(pair.as_str()) {
        Some(kind) => Ok(TypeRef::Scalar { kind, endian }),
        None if endian.is_some() => Err(CompileError::syntax(
            at,
            format!(
                "endianness qualifier on non-scalar type `{}`",
                pair.as_str()
            ),
        )),
        None => Ok(TypeRef::Named {
            name: pair.as_str().to_string(),
            at,
        }),
    }
}

fn endian(pair: &Pair) -> Endianness {
    match pair.as_str() {
        "be" => Endianness::Big,
        _ => Endianness::Little,
    }
}

/// Leading `be`/`le` qualifier, if present, then the type identifier.
fn qualified_type<'i>(
    it: &mut impl Iterator<Item = Pair<'i>>,
    at: Location,
) -> Result<TypeRef, CompileError> {
    let mut first = next(it, at, "type")?;
    let mut order = None;
    if first.as_rule() == Rule::endian {
        order = Some(endian(&first));
        first = next(it, at, "type")?;
    }
    type_ref(first, order)
}

fn parse_number(pair: &Pair) -> Result<i128, CompileError> {
    let text = pair.as_str();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u128::from_str_radix(hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        u128::from_str_radix(bin, 2)
    } else {
        digits.parse::<u128>()
    };
    let magnitude = parsed
        .ok()
        .and_then(|m| i128::try_from(m).ok())
        .ok_or_else(|| CompileError::syntax(location(pair), format!("number `{}` out of range", text)))?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_count(pair: &Pair, what: &str) -> Result<u64, CompileError> {
    let value = parse_number(pair)?;
    u64::try_from(value)
        .map_err(|_| CompileError::syntax(location(pair), format!("{} must not be negative", what)))
}

fn build_alias(pair: Pair) -> Result<AliasDef, CompileError> {
    let at = location(&pair);
    let mut it = pair.into_inner();
    let name = type_name(next(&mut it, at, "alias name")?)?;
    let target = qualified_type(&mut it, at)?;
    Ok(AliasDef {
        name,
        target,
        location: at,
    })
}

/// Body of a struct or a union.
fn build_struct(pair: Pair) -> Result<StructDef, CompileError> {
    let at = location(&pair);
    let keyword = match pair.as_rule() {
        Rule::union_def => "union",
        _ => "struct",
    };
    let mut it = pair.into_inner();
    let name = type_name(next(&mut it, at, &format!("{} name", keyword))?)?;
    let mut fields: Vec<Field> = Vec::new();
    let mut seen = HashSet::new();
    for inner in it {
        let field = build_field(inner)?;
        if let FieldKind::Data {
            len: Some(ArrayLen::Field(len_field)),
            ..
        } = &field.kind
        {
            let earlier = fields.iter().any(|f| match &f.kind {
                FieldKind::Data { name, len: None, .. } => name == len_field,
                _ => false,
            });
            if !earlier {
                return Err(CompileError::syntax(
                    field.location,
                    format!(
                        "array length `{}` must name an earlier scalar field of `{}`",
                        len_field, name
                    ),
                ));
            }
        }
        if let Some(field_name) = field.name() {
            if !seen.insert(field_name.to_string()) {
                return Err(CompileError::syntax(
                    field.location,
                    format!("duplicate field `{}` in {} `{}`", field_name, keyword, name),
                ));
            }
        }
        fields.push(field);
    }
    Ok(StructDef {
        name,
        fields,
        location: at,
    })
}

fn build_field(pair: Pair) -> Result<Field, CompileError> {
    let at = location(&pair);
    let rule = pair.as_rule();
    let mut it = pair.into_inner();
    let kind = match rule {
        Rule::padding_field => FieldKind::Padding {
            size: parse_count(&next(&mut it, at, "padding size")?, "padding size")?,
        },
        Rule::pointer_field => {
            let target = type_ref(next(&mut it, at, "pointer target")?, None)?;
            let name = next(&mut it, at, "pointer name")?.as_str().to_string();
            let address_pair = next(&mut it, at, "pointer address type")?;
            let address_at = location(&address_pair);
            let address = qualified_type(&mut address_pair.into_inner(), address_at)?;
            if address.as_scalar().is_some_and(|kind| !kind.is_integer()) {
                return Err(CompileError::syntax(
                    address_at,
                    format!(
                        "pointer `{}` needs an integer address type, found `{}`",
                        name,
                        address.display_name()
                    ),
                ));
            }
            FieldKind::Pointer {
                name,
                target,
                address,
            }
        }
        Rule::data_field => {
            let ty = qualified_type(&mut it, at)?;
            let name = next(&mut it, at, "field name")?.as_str().to_string();
            let len = it.next().map(|p| build_array_len(p)).transpose()?;
            FieldKind::Data { name, ty, len }
        }
        other => {
            return Err(CompileError::syntax(
                at,
                format!("unexpected {:?} in struct body", other),
            ))
        }
    };
    Ok(Field { kind, location: at })
}

fn build_array_len(pair: Pair) -> Result<ArrayLen, CompileError> {
    let at = location(&pair);
    let inner = next(&mut pair.into_inner(), at, "array length")?;
    match inner.as_rule() {
        Rule::number => Ok(ArrayLen::Fixed(parse_count(&inner, "array length")?)),
        _ => Ok(ArrayLen::Field(inner.as_str().to_string())),
    }
}

fn build_enum(pair: Pair) -> Result<EnumDef, CompileError> {
    let at = location(&pair);
    let mut it = pair.into_inner();
    let name = type_name(next(&mut it, at, "enum name")?)?;
    let backing_pair = next(&mut it, at, "enum backing type")?;
    let backing = type_ref(next(&mut backing_pair.into_inner(), at, "enum backing type")?, None)?;
    let mut entries: Vec<EnumEntry> = Vec::new();
    for entry in it {
        let entry_at = location(&entry);
        let mut parts = entry.into_inner();
        let symbol = next(&mut parts, entry_at, "enum symbol")?.as_str().to_string();
        let value = parts.next().map(|v| parse_number(&v)).transpose()?;
        if entries.iter().any(|e| e.name == symbol) {
            return Err(CompileError::syntax(
                entry_at,
                format!("duplicate symbol `{}` in enum `{}`", symbol, name),
            ));
        }
        entries.push(EnumEntry {
            name: symbol,
            value,
            location: entry_at,
        });
    }
    Ok(EnumDef {
        name,
        backing,
        entries,
        location: at,
    })
}

fn build_bitfield(pair: Pair) -> Result<BitfieldDef, CompileError> {
    let at = location(&pair);
    let mut it = pair.into_inner().peekable();
    let name = type_name(next(&mut it, at, "bitfield name")?)?;
    let mut backing = None;
    if let Some(p) = it.next_if(|p| p.as_rule() == Rule::backing) {
        backing = Some(type_ref(next(&mut p.into_inner(), at, "bitfield backing type")?, None)?);
    }
    let mut entries: Vec<BitEntry> = Vec::new();
    for entry in it {
        let entry_at = location(&entry);
        let mut parts = entry.into_inner();
        let head = next(&mut parts, entry_at, "bit entry name")?;
        let entry_name = match head.as_rule() {
            Rule::padding_bits => None,
            _ => Some(head.as_str().to_string()),
        };
        let width_pair = next(&mut parts, entry_at, "bit width")?;
        let width = parse_count(&width_pair, "bit width")?;
        if width == 0 {
            return Err(CompileError::syntax(
                entry_at,
                format!("zero-width entry in bitfield `{}`", name),
            ));
        }
        let width = u32::try_from(width).map_err(|_| {
            CompileError::syntax(entry_at, format!("bit width {} too large", width))
        })?;
        if let Some(n) = &entry_name {
            if entries.iter().any(|e| e.name.as_deref() == Some(n.as_str())) {
                return Err(CompileError::syntax(
                    entry_at,
                    format!("duplicate entry `{}` in bitfield `{}`", n, name),
                ));
            }
        }
        entries.push(BitEntry {
            name: entry_name,
            width,
            location: entry_at,
        });
    }
    Ok(BitfieldDef {
        name,
        backing,
        entries,
        location: at,
    })
}

fn build_placement(pair: Pair) -> Result<Placement, CompileError> {
    let at = location(&pair);
    let mut it = pair.into_inner();
    let ty = qualified_type(&mut it, at)?;
    let name = next(&mut it, at, "placement name")?.as_str().to_string();
    let mut tail = next(&mut it, at, "placement offset")?;
    let mut len = None;
    if tail.as_rule() == Rule::array_len {
        len = match build_array_len(tail)? {
            ArrayLen::Fixed(n) => Some(n),
            ArrayLen::Field(f) => {
                return Err(CompileError::syntax(
                    at,
                    format!("placement `{}` needs a literal array length, found `{}`", name, f),
                ))
            }
        };
        tail = next(&mut it, at, "placement offset")?;
    }
    let offset = parse_count(&tail, "placement offset")?;
    Ok(Placement {
        name,
        ty,
        len,
        offset,
        location: at,
    })
}
