//! Render a [`Program`] as Rust source written against [`crate::runtime`].
//!
//! Every pattern struct becomes a Rust struct whose `rt::Decode` impl reads
//! the fields in declaration order through one cursor. A union is rendered the
//! same way, except that its members are read through an `rt::Overlay` from
//! one start offset. Enums become Rust enums implementing `rt::Symbols`,
//! bit-fields become structs of native integers, aliases become `type` items,
//! and top-level placements are gathered in a `Placements` struct.

use crate::ast::ScalarKind;
use crate::codegen::{
    AliasType, BitfieldType, EnumType, FieldPlan, Layout, Length, PlacedField, Program, Scalar,
    Shape, StructType, TypeDef,
};
use crate::runtime::Endianness;
use std::collections::HashSet;

const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do", "dyn",
    "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return",
    "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use",
    "virtual", "where", "while", "yield",
];

/// Rendering settings.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// One indentation level.
    pub indent: String,
    /// Path the output imports as `rt`.
    pub runtime_path: String,
    /// Name of the pattern file, quoted in the header comment.
    pub source_name: Option<String>,
}

impl Default for EmitOptions {
    fn default() -> Self {
        EmitOptions {
            indent: "    ".to_string(),
            runtime_path: "binpat::runtime".to_string(),
            source_name: None,
        }
    }
}

/// Rust source for `program`. The same program and options always give the
/// same text.
pub fn emit(program: &Program, options: &EmitOptions) -> String {
    let mut e = Emitter {
        program,
        indent: &options.indent,
        out: String::new(),
    };
    match &options.source_name {
        Some(name) => e.line(0, &format!("// Generated by binpat from `{}`. Do not edit.", name)),
        None => e.line(0, "// Generated by binpat. Do not edit."),
    }
    e.blank();
    e.line(0, &format!("use {} as rt;", options.runtime_path));
    for def in program.types() {
        e.blank();
        match def {
            TypeDef::Struct(s) => e.emit_struct(s, false),
            TypeDef::Union(u) => e.emit_struct(u, true),
            TypeDef::Enum(en) => e.emit_enum(en),
            TypeDef::Bitfield(b) => e.emit_bitfield(b),
        }
    }
    for alias in program.aliases() {
        e.blank();
        e.emit_alias(alias);
    }
    if !program.placements().is_empty() {
        e.blank();
        e.emit_placements(program.placements());
    }
    e.out
}

/// `name`, as a raw identifier when it is a Rust keyword.
pub fn ident(name: &str) -> String {
    if RUST_KEYWORDS.contains(&name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}

fn is_camel_case(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) && !name.contains('_')
}

fn is_snake_case(name: &str) -> bool {
    !name.chars().any(|c| c.is_ascii_uppercase())
}

/// Smallest native unsigned integer holding `bits`.
fn native_uint(bits: u32) -> &'static str {
    match bits {
        0..=8 => "u8",
        9..=16 => "u16",
        17..=32 => "u32",
        33..=64 => "u64",
        _ => "u128",
    }
}

struct Emitter<'a> {
    program: &'a Program,
    indent: &'a str,
    out: String,
}

impl Emitter<'_> {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str(self.indent);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn allow(&mut self, depth: usize, type_name: &str, members: &[&str]) {
        let mut lints = Vec::new();
        if !is_camel_case(type_name) {
            lints.push("non_camel_case_types");
        }
        if members.iter().any(|m| !is_snake_case(m)) {
            lints.push("non_snake_case");
        }
        if !lints.is_empty() {
            self.line(depth, &format!("#[allow({})]", lints.join(", ")));
        }
    }

    fn scalar_type(&self, scalar: Scalar) -> String {
        let order = match scalar.endian {
            Endianness::Little => "rt::LittleEndian",
            Endianness::Big => "rt::BigEndian",
        };
        match scalar.kind {
            ScalarKind::Unsigned(1) => "rt::U8".to_string(),
            ScalarKind::Signed(1) => "rt::S8".to_string(),
            ScalarKind::Bool => "rt::Bool".to_string(),
            ScalarKind::Char => "rt::Char".to_string(),
            ScalarKind::Char16 => format!("rt::Char16<{}>", order),
            ScalarKind::Float => format!("rt::Float<{}>", order),
            ScalarKind::Double => format!("rt::Double<{}>", order),
            kind => format!("rt::{}<{}>", kind.keyword().to_ascii_uppercase(), order),
        }
    }

    /// Runtime type decoding one value of `layout`.
    fn value_type(&self, layout: Layout) -> String {
        match layout {
            Layout::Scalar(s) => self.scalar_type(s),
            Layout::Type(id) => match self.program.get(id) {
                TypeDef::Enum(e) => format!("rt::Enum<{}>", ident(&e.name)),
                def => ident(def.name()),
            },
        }
    }

    fn field_type(&self, shape: &Shape) -> Option<String> {
        match shape {
            Shape::Value(layout) => Some(self.value_type(*layout)),
            Shape::Array { element, .. } => Some(format!("rt::Array<{}>", self.value_type(*element))),
            Shape::Pointer { address, target } => Some(format!(
                "rt::Pointer<{}, {}>",
                self.scalar_type(*address),
                self.value_type(*target)
            )),
            Shape::Padding(_) => None,
        }
    }

    fn emit_struct(&mut self, def: &StructType, union: bool) {
        let name = ident(&def.name);
        let members: Vec<&str> = def.fields.iter().filter_map(|f| f.name.as_deref()).collect();
        let keyword = if union { "union" } else { "struct" };
        self.line(0, &format!("/// `{} {}`", keyword, def.name));
        self.line(0, "#[derive(Debug, Clone)]");
        self.allow(0, &def.name, &members);
        self.line(0, &format!("pub struct {} {{", name));
        for field in &def.fields {
            if let (Some(field_name), Some(ty)) = (&field.name, self.field_type(&field.shape)) {
                self.line(1, &format!("pub {}: {},", ident(field_name), ty));
            }
        }
        self.line(1, "__span: rt::Span,");
        self.line(0, "}");
        self.blank();

        self.line(0, &format!("impl rt::Decode for {} {{", name));
        self.allow(1, "Decode", &members);
        self.line(
            1,
            "fn decode(__cursor: &mut rt::Cursor) -> Result<Self, rt::DecodeError> {",
        );
        self.line(2, "let __start = __cursor.snapshot();");
        if union {
            let binding = if def.fields.is_empty() { "let" } else { "let mut" };
            self.line(2, &format!("{} __union = rt::Overlay::new(__cursor);", binding));
        }
        for field in &def.fields {
            if let Some(statement) = self.decode_field(field, union) {
                self.line(2, &statement);
            }
        }
        if union {
            self.line(2, "__union.finish(__cursor)?;");
        }
        self.line(2, &format!("Ok({} {{", name));
        for field_name in &members {
            self.line(3, &format!("{},", ident(field_name)));
        }
        self.line(3, "__span: rt::Span::between(&__start, __cursor),");
        self.line(2, "})");
        self.line(1, "}");
        self.line(0, "}");
        self.blank();
        self.emit_extent(&name);
    }

    /// `let` statement decoding one field, from `__cursor` or, for union
    /// members, from the start of `__union`.
    fn decode_field(&self, field: &FieldPlan, union: bool) -> Option<String> {
        let (binding, ty) = match (&field.shape, &field.name) {
            (Shape::Padding(size), _) => ("_".to_string(), format!("rt::Padding<{}>", size)),
            (shape, Some(name)) => (ident(name), self.field_type(shape)?),
            (_, None) => return None,
        };
        let call = match &field.shape {
            Shape::Array { len, .. } => {
                let count = match len {
                    Length::Fixed(n) => n.to_string(),
                    Length::Field { name } => format!("rt::array_len(&{}, {:?})?", ident(name), name),
                };
                let field_name = field.name.as_deref().unwrap_or_default();
                if union {
                    format!(
                        "__union.member(|__member| rt::Array::decode_n(__member, {}, {:?}))",
                        count, field_name
                    )
                } else {
                    format!("rt::Array::decode_n(__cursor, {}, {:?})", count, field_name)
                }
            }
            _ if union => "__union.member(rt::Decode::decode)".to_string(),
            _ => "rt::Decode::decode(__cursor)".to_string(),
        };
        Some(format!("let {}: {} = {}?;", binding, ty, call))
    }

    fn emit_alias(&mut self, alias: &AliasType) {
        self.line(
            0,
            &format!(
                "/// `using {} = {}`",
                alias.name,
                self.program.layout_name(alias.layout)
            ),
        );
        self.allow(0, &alias.name, &[]);
        self.line(
            0,
            &format!("pub type {} = {};", ident(&alias.name), self.value_type(alias.layout)),
        );
    }

    fn emit_extent(&mut self, name: &str) {
        self.line(0, &format!("impl rt::Extent for {} {{", name));
        self.line(1, "fn span(&self) -> rt::Span {");
        self.line(2, "self.__span");
        self.line(1, "}");
        self.line(0, "}");
    }

    fn emit_enum(&mut self, def: &EnumType) {
        let name = ident(&def.name);
        self.line(0, &format!("/// `enum {} : {}`", def.name, def.backing.kind.keyword()));
        self.line(0, "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]");
        if !is_camel_case(&def.name) || def.symbols.iter().any(|(s, _)| !is_camel_case(s)) {
            self.line(0, "#[allow(non_camel_case_types)]");
        }
        self.line(0, &format!("pub enum {} {{", name));
        for (symbol, _) in &def.symbols {
            self.line(1, &format!("{},", ident(symbol)));
        }
        self.line(0, "}");
        self.blank();

        self.line(0, &format!("impl rt::Symbols for {} {{", name));
        self.line(1, &format!("type Backing = {};", self.scalar_type(def.backing)));
        self.blank();
        self.line(1, "fn from_raw(raw: i128) -> Option<Self> {");
        self.line(2, "match raw {");
        let mut seen = HashSet::new();
        for (symbol, value) in &def.symbols {
            // Aliased values resolve to the first symbol declared with them.
            if seen.insert(*value) {
                self.line(3, &format!("{} => Some({}::{}),", value, name, ident(symbol)));
            }
        }
        self.line(3, "_ => None,");
        self.line(2, "}");
        self.line(1, "}");
        self.blank();
        self.line(1, "fn symbol(&self) -> &'static str {");
        self.line(2, "match self {");
        for (symbol, _) in &def.symbols {
            self.line(3, &format!("{}::{} => {:?},", name, ident(symbol), symbol));
        }
        self.line(2, "}");
        self.line(1, "}");
        self.line(0, "}");
    }

    fn emit_bitfield(&mut self, def: &BitfieldType) {
        let name = ident(&def.name);
        let named: Vec<(&str, u32, u32)> = def
            .slots
            .iter()
            .filter_map(|s| s.name.as_deref().map(|n| (n, s.shift, s.width)))
            .collect();
        let members: Vec<&str> = named.iter().map(|(n, _, _)| *n).collect();
        self.line(
            0,
            &format!("/// `bitfield {} : {}`", def.name, def.backing.kind.keyword()),
        );
        self.line(0, "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]");
        self.allow(0, &def.name, &members);
        self.line(0, &format!("pub struct {} {{", name));
        for (entry, _, width) in &named {
            self.line(1, &format!("pub {}: {},", ident(entry), native_uint(*width)));
        }
        self.line(1, "__span: rt::Span,");
        self.line(0, "}");
        self.blank();

        self.line(0, &format!("impl rt::Decode for {} {{", name));
        self.line(
            1,
            "fn decode(__cursor: &mut rt::Cursor) -> Result<Self, rt::DecodeError> {",
        );
        self.line(
            2,
            &format!(
                "let __backing: {} = rt::Decode::decode(__cursor)?;",
                self.scalar_type(def.backing)
            ),
        );
        if !named.is_empty() {
            self.line(2, "let __raw = rt::Integer::as_u128(&__backing);");
        }
        self.line(2, &format!("Ok({} {{", name));
        for (entry, shift, width) in &named {
            self.line(
                3,
                &format!(
                    "{}: rt::extract_bits(__raw, {}, {}) as {},",
                    ident(entry),
                    shift,
                    width,
                    native_uint(*width)
                ),
            );
        }
        self.line(3, "__span: rt::Extent::span(&__backing),");
        self.line(2, "})");
        self.line(1, "}");
        self.line(0, "}");
        self.blank();
        self.emit_extent(&name);
    }

    fn emit_placements(&mut self, placements: &[PlacedField]) {
        let members: Vec<&str> = placements.iter().map(|p| p.name.as_str()).collect();
        self.line(0, "/// Top-level placements, each decoded at its own offset.");
        self.line(0, "#[derive(Debug, Clone)]");
        self.allow(0, "Placements", &members);
        self.line(0, "pub struct Placements {");
        let types: Vec<String> = placements
            .iter()
            .map(|p| match p.len {
                Some(_) => format!("rt::Array<{}>", self.value_type(p.layout)),
                None => self.value_type(p.layout),
            })
            .collect();
        for (p, ty) in placements.iter().zip(&types) {
            self.line(1, &format!("pub {}: {},", ident(&p.name), ty));
        }
        self.line(0, "}");
        self.blank();

        self.line(0, "impl Placements {");
        self.allow(1, "Placements", &members);
        self.line(
            1,
            "pub fn decode(__buffer: &rt::Buffer) -> Result<Self, rt::DecodeError> {",
        );
        for (p, ty) in placements.iter().zip(&types) {
            let cursor = format!("&mut rt::Cursor::new(__buffer.clone(), {:#x})", p.offset);
            let call = match p.len {
                Some(n) => format!("rt::Array::decode_n({}, {}, {:?})?", cursor, n, p.name),
                None => format!("rt::Decode::decode({})?", cursor),
            };
            self.line(2, &format!("let {}: {} = {};", ident(&p.name), ty, call));
        }
        self.line(2, "Ok(Placements {");
        for p in placements {
            self.line(3, &format!("{},", ident(&p.name)));
        }
        self.line(2, "})");
        self.line(1, "}");
        self.line(0, "}");
    }
}
