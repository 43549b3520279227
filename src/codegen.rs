//! Lower a parsed pattern into a resolved [`Program`].
//!
//! Generation runs in two passes. The first registers every type name so that
//! structs may refer to types declared later (or in an included file); the
//! second resolves each declaration against that table. Every check that needs
//! the whole program lives here: unknown type names, alias cycles, bit-field
//! capacity, backing types, enum value ranges and by-value recursion.
//!
//! `using` aliases never become types of their own: every use of an alias is
//! replaced by the layout it finally names.

use crate::ast::*;
use crate::error::{CompileError, Location};
use crate::runtime::Endianness;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Names the emitted Rust source uses unqualified (prelude items and native
/// primitives), the runtime alias, and path keywords that cannot be raw
/// identifiers.
pub const RESERVED_TYPE_NAMES: &[&str] = &[
    "Result", "Ok", "Err", "Option", "Some", "None", "Self", "Vec", "Box", "String", "rt",
    "Placements", "self", "super", "crate", "_", "u8", "u16", "u32", "u64", "u128", "usize",
    "i8", "i16", "i32", "i64", "i128", "isize", "f32", "f64", "bool", "char", "str",
];

/// Field, symbol and placement names the emitted code cannot bind. Names
/// starting with `__` are kept for the emitter's own locals.
const RESERVED_MEMBER_NAMES: &[&str] = &[
    "self", "Self", "super", "crate", "_", "Some", "None", "Ok", "Err",
];

/// Index of a type in its [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(usize);

/// A scalar with its byte order settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub endian: Endianness,
}

/// What a single value of a field is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Scalar(Scalar),
    Type(TypeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Length {
    Fixed(u64),
    /// Value of an earlier integer field of the same struct.
    Field { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Value(Layout),
    Array { element: Layout, len: Length },
    Padding(u64),
    Pointer { address: Scalar, target: Layout },
}

#[derive(Debug, Clone)]
pub struct FieldPlan {
    /// `None` for padding.
    pub name: Option<String>,
    pub shape: Shape,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<FieldPlan>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub backing: Scalar,
    pub symbols: Vec<(String, i128)>,
    pub location: Location,
}

impl EnumType {
    /// First symbol declared with `value`.
    pub fn symbol(&self, value: i128) -> Option<&str> {
        self.symbols
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSlot {
    /// `None` for padding bits.
    pub name: Option<String>,
    pub shift: u32,
    pub width: u32,
}

#[derive(Debug, Clone)]
pub struct BitfieldType {
    pub name: String,
    pub backing: Scalar,
    pub slots: Vec<BitSlot>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub enum TypeDef {
    Struct(StructType),
    /// Members all start at the union's offset; it is as wide as its widest member.
    Union(StructType),
    Enum(EnumType),
    Bitfield(BitfieldType),
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            TypeDef::Struct(s) | TypeDef::Union(s) => &s.name,
            TypeDef::Enum(e) => &e.name,
            TypeDef::Bitfield(b) => &b.name,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            TypeDef::Struct(s) | TypeDef::Union(s) => s.location,
            TypeDef::Enum(e) => e.location,
            TypeDef::Bitfield(b) => b.location,
        }
    }
}

/// `using name = ...;` with its target resolved through any chain of aliases.
#[derive(Debug, Clone)]
pub struct AliasType {
    pub name: String,
    pub layout: Layout,
    pub location: Location,
}

/// A top-level `Type name @ offset;`.
#[derive(Debug, Clone)]
pub struct PlacedField {
    pub name: String,
    pub layout: Layout,
    pub len: Option<u64>,
    pub offset: u64,
    pub location: Location,
}

/// Resolved pattern: every type reference points at a known declaration.
#[derive(Debug, Clone, Default)]
pub struct Program {
    types: Vec<TypeDef>,
    by_name: HashMap<String, TypeId>,
    aliases: Vec<AliasType>,
    placements: Vec<PlacedField>,
    endian: Endianness,
}

impl Program {
    /// Types in declaration order.
    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    pub fn ids(&self) -> impl Iterator<Item = TypeId> {
        (0..self.types.len()).map(TypeId)
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: TypeId) -> &TypeDef {
        &self.types[id.0]
    }

    pub fn by_name(&self, name: &str) -> Option<&TypeDef> {
        self.lookup(name).map(|id| self.get(id))
    }

    /// Aliases in declaration order.
    pub fn aliases(&self) -> &[AliasType] {
        &self.aliases
    }

    /// Layout named by alias `name`.
    pub fn alias(&self, name: &str) -> Option<Layout> {
        self.aliases
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.layout)
    }

    pub fn placements(&self) -> &[PlacedField] {
        &self.placements
    }

    /// Byte order applied to scalars without a qualifier.
    pub fn default_endianness(&self) -> Endianness {
        self.endian
    }

    /// DSL spelling of a layout, e.g. `u24` or `Header`.
    pub fn layout_name(&self, layout: Layout) -> &str {
        match layout {
            Layout::Scalar(s) => s.kind.keyword(),
            Layout::Type(id) => self.get(id).name(),
        }
    }
}

/// Lower `pattern` with `default_endian` for unqualified scalars. A
/// `#pragma endian` in the pattern overrides `default_endian`.
pub fn generate(pattern: &Pattern, default_endian: Endianness) -> Result<Program, CompileError> {
    let endian = pattern.pragma_endian().unwrap_or(default_endian);
    let mut generator = Generator {
        by_name: HashMap::new(),
        aliases: HashMap::new(),
        endian,
    };

    let mut decls = Vec::new();
    for item in &pattern.items {
        let (name, at) = match item {
            Item::Pragma(p) if p.name != "endian" => {
                warn!(pragma = %p.name, line = p.location.line, "ignoring unknown pragma");
                continue;
            }
            Item::Alias(a) => (&a.name, a.location),
            Item::Struct(s) | Item::Union(s) => (&s.name, s.location),
            Item::Enum(e) => (&e.name, e.location),
            Item::Bitfield(b) => (&b.name, b.location),
            _ => continue,
        };
        if RESERVED_TYPE_NAMES.contains(&name.as_str()) {
            return Err(CompileError::invalid(
                at,
                format!("type name `{}` is reserved", name),
            ));
        }
        if generator.by_name.contains_key(name) || generator.aliases.contains_key(name) {
            return Err(CompileError::invalid(
                at,
                format!("type `{}` is declared more than once", name),
            ));
        }
        match item {
            Item::Alias(a) => {
                generator.aliases.insert(name.clone(), a.clone());
            }
            _ => {
                generator.by_name.insert(name.clone(), TypeId(decls.len()));
                decls.push(item);
            }
        }
    }

    let mut types = Vec::with_capacity(decls.len());
    for item in decls {
        let def = match item {
            Item::Struct(s) => TypeDef::Struct(generator.lower_struct(s)?),
            Item::Union(u) => TypeDef::Union(generator.lower_struct(u)?),
            Item::Enum(e) => TypeDef::Enum(generator.lower_enum(e)?),
            Item::Bitfield(b) => TypeDef::Bitfield(generator.lower_bitfield(b)?),
            _ => continue,
        };
        types.push(def);
    }

    let mut aliases = Vec::with_capacity(generator.aliases.len());
    for item in &pattern.items {
        if let Item::Alias(a) = item {
            aliases.push(AliasType {
                name: a.name.clone(),
                layout: generator.resolve(&a.target)?,
                location: a.location,
            });
        }
    }

    let mut placements = Vec::new();
    for item in &pattern.items {
        if let Item::Placement(p) = item {
            check_member_name(&p.name, p.location)?;
            if placements.iter().any(|q: &PlacedField| q.name == p.name) {
                return Err(CompileError::invalid(
                    p.location,
                    format!("duplicate placement `{}`", p.name),
                ));
            }
            placements.push(PlacedField {
                name: p.name.clone(),
                layout: generator.resolve(&p.ty)?,
                len: p.len,
                offset: p.offset,
                location: p.location,
            });
        }
    }

    let program = Program {
        types,
        by_name: generator.by_name,
        aliases,
        placements,
        endian,
    };
    check_recursion(&program)?;
    debug!(
        types = program.types.len(),
        aliases = program.aliases.len(),
        placements = program.placements.len(),
        endian = endian.keyword(),
        "generated program"
    );
    Ok(program)
}

struct Generator {
    by_name: HashMap<String, TypeId>,
    aliases: HashMap<String, AliasDef>,
    endian: Endianness,
}

impl Generator {
    fn scalar(&self, kind: ScalarKind, endian: Option<Endianness>) -> Scalar {
        Scalar {
            kind,
            endian: endian.unwrap_or(self.endian),
        }
    }

    /// Layout of `ty`, following aliases until a scalar or a declared type.
    fn resolve<'a>(&'a self, ty: &'a TypeRef) -> Result<Layout, CompileError> {
        let mut ty = ty;
        let mut chain: Vec<&str> = Vec::new();
        loop {
            let (name, at) = match ty {
                TypeRef::Scalar { kind, endian } => {
                    return Ok(Layout::Scalar(self.scalar(*kind, *endian)))
                }
                TypeRef::Named { name, at } => (name, *at),
            };
            if let Some(id) = self.by_name.get(name) {
                return Ok(Layout::Type(*id));
            }
            let alias = self
                .aliases
                .get(name)
                .ok_or_else(|| CompileError::UnresolvedTypeReference {
                    name: name.clone(),
                    at,
                })?;
            if chain.contains(&name.as_str()) {
                return Err(CompileError::invalid(
                    alias.location,
                    format!("alias `{}` refers back to itself", name),
                ));
            }
            chain.push(name);
            ty = &alias.target;
        }
    }

    /// Backing types of enums and bit-fields must be integer scalars.
    fn integer_backing(&self, ty: &TypeRef, owner: &str, at: Location) -> Result<Scalar, CompileError> {
        match self.resolve(ty)? {
            Layout::Scalar(s) if s.kind.is_integer() => Ok(s),
            _ => Err(CompileError::invalid(
                at,
                format!(
                    "`{}` needs an integer backing type, found `{}`",
                    owner,
                    ty.display_name()
                ),
            )),
        }
    }

    fn lower_struct(&self, def: &StructDef) -> Result<StructType, CompileError> {
        let mut fields: Vec<FieldPlan> = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            if let Some(name) = field.name() {
                check_member_name(name, field.location)?;
            }
            let shape = match &field.kind {
                FieldKind::Padding { size } => Shape::Padding(*size),
                FieldKind::Data { ty, len: None, .. } => Shape::Value(self.resolve(ty)?),
                FieldKind::Data {
                    ty, len: Some(len), ..
                } => Shape::Array {
                    element: self.resolve(ty)?,
                    len: self.array_len(&fields, len, def, field.location)?,
                },
                FieldKind::Pointer {
                    target, address, ..
                } => {
                    let address = match self.resolve(address)? {
                        Layout::Scalar(s) if s.kind.is_integer() => s,
                        _ => {
                            return Err(CompileError::invalid(
                                field.location,
                                "pointer address type must be an integer",
                            ))
                        }
                    };
                    Shape::Pointer {
                        address,
                        target: self.resolve(target)?,
                    }
                }
            };
            fields.push(FieldPlan {
                name: field.name().map(str::to_string),
                shape,
                location: field.location,
            });
        }
        Ok(StructType {
            name: def.name.clone(),
            fields,
            location: def.location,
        })
    }

    fn array_len(
        &self,
        earlier: &[FieldPlan],
        len: &ArrayLen,
        def: &StructDef,
        at: Location,
    ) -> Result<Length, CompileError> {
        let name = match len {
            ArrayLen::Fixed(n) => return Ok(Length::Fixed(*n)),
            ArrayLen::Field(name) => name,
        };
        let sibling = earlier
            .iter()
            .find(|f| f.name.as_deref() == Some(name.as_str()))
            .ok_or_else(|| {
                CompileError::syntax(
                    at,
                    format!("array length `{}` is not an earlier field of `{}`", name, def.name),
                )
            })?;
        match sibling.shape {
            Shape::Value(Layout::Scalar(s)) if s.kind.is_integer() => Ok(Length::Field {
                name: name.clone(),
            }),
            _ => Err(CompileError::invalid(
                at,
                format!("array length `{}` in `{}` is not an integer field", name, def.name),
            )),
        }
    }

    fn lower_enum(&self, def: &EnumDef) -> Result<EnumType, CompileError> {
        let backing = self.integer_backing(&def.backing, &def.name, def.location)?;
        if def.entries.is_empty() {
            return Err(CompileError::invalid(
                def.location,
                format!("enum `{}` has no symbols", def.name),
            ));
        }
        let (min, max) = backing.kind.range().unwrap_or((i128::MIN, i128::MAX));
        let mut symbols = Vec::with_capacity(def.entries.len());
        let mut next = Some(0i128);
        for entry in &def.entries {
            check_member_name(&entry.name, entry.location)?;
            let value = match entry.value.or(next) {
                Some(v) => v,
                None => {
                    return Err(CompileError::invalid(
                        entry.location,
                        format!("value of `{}::{}` overflows", def.name, entry.name),
                    ))
                }
            };
            if value < min || value > max {
                return Err(CompileError::invalid(
                    entry.location,
                    format!(
                        "value {} of `{}::{}` does not fit in `{}`",
                        value,
                        def.name,
                        entry.name,
                        backing.kind.keyword()
                    ),
                ));
            }
            symbols.push((entry.name.clone(), value));
            next = value.checked_add(1);
        }
        Ok(EnumType {
            name: def.name.clone(),
            backing,
            symbols,
            location: def.location,
        })
    }

    fn lower_bitfield(&self, def: &BitfieldDef) -> Result<BitfieldType, CompileError> {
        let declared = def.total_bits();
        let backing = match &def.backing {
            Some(ty) => self.integer_backing(ty, &def.name, def.location)?,
            None => {
                let width = [1u8, 2, 4, 8, 16]
                    .into_iter()
                    .find(|w| u32::from(*w) * 8 >= declared)
                    .unwrap_or(16);
                self.scalar(ScalarKind::Unsigned(width), None)
            }
        };
        let capacity = backing.kind.width() as u32 * 8;
        if declared > capacity {
            return Err(CompileError::BitFieldOverflow {
                name: def.name.clone(),
                declared,
                capacity,
                at: def.location,
            });
        }
        let mut shift = 0;
        let mut slots = Vec::with_capacity(def.entries.len());
        for entry in &def.entries {
            if let Some(name) = &entry.name {
                check_member_name(name, entry.location)?;
            }
            slots.push(BitSlot {
                name: entry.name.clone(),
                shift,
                width: entry.width,
            });
            shift += entry.width;
        }
        Ok(BitfieldType {
            name: def.name.clone(),
            backing,
            slots,
            location: def.location,
        })
    }
}

fn check_member_name(name: &str, at: Location) -> Result<(), CompileError> {
    if RESERVED_MEMBER_NAMES.contains(&name) || name.starts_with("__") {
        return Err(CompileError::invalid(at, format!("`{}` cannot be used as a name", name)));
    }
    Ok(())
}

/// Structs and unions may refer to themselves through pointers only.
fn check_recursion(program: &Program) -> Result<(), CompileError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn visit(program: &Program, id: TypeId, marks: &mut [Mark]) -> Result<(), CompileError> {
        match marks[id.0] {
            Mark::Done => return Ok(()),
            Mark::Active => {
                let def = program.get(id);
                return Err(CompileError::invalid(
                    def.location(),
                    format!("`{}` contains itself by value", def.name()),
                ));
            }
            Mark::New => {}
        }
        marks[id.0] = Mark::Active;
        if let TypeDef::Struct(s) | TypeDef::Union(s) = program.get(id) {
            for field in &s.fields {
                let inner = match field.shape {
                    Shape::Value(Layout::Type(inner)) => inner,
                    Shape::Array {
                        element: Layout::Type(inner),
                        ..
                    } => inner,
                    _ => continue,
                };
                visit(program, inner, marks)?;
            }
        }
        marks[id.0] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::New; program.types.len()];
    for id in program.ids() {
        visit(program, id, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn compile(src: &str) -> Result<Program, CompileError> {
        generate(&parse(src)?, Endianness::Little)
    }

    #[test]
    fn forward_references_resolve() {
        let p = compile("struct A { B b; }; struct B { u8 x; };").unwrap();
        let TypeDef::Struct(a) = p.by_name("A").unwrap() else { panic!() };
        assert_eq!(a.fields[0].shape, Shape::Value(Layout::Type(p.lookup("B").unwrap())));
    }

    #[test]
    fn unknown_type_is_unresolved() {
        let err = compile("struct A {\n  Missing m;\n};").unwrap_err();
        match err {
            CompileError::UnresolvedTypeReference { name, at } => {
                assert_eq!(name, "Missing");
                assert_eq!(at, Location::new(2, 3));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn enum_values_auto_increment() {
        let p = compile("enum K : u8 { A, B = 4, C };").unwrap();
        let TypeDef::Enum(k) = p.by_name("K").unwrap() else { panic!() };
        assert_eq!(
            k.symbols,
            vec![("A".to_string(), 0), ("B".to_string(), 4), ("C".to_string(), 5)]
        );
    }

    #[test]
    fn enum_value_out_of_backing_range() {
        assert!(matches!(
            compile("enum K : u8 { A = 256 };"),
            Err(CompileError::InvalidDeclaration { .. })
        ));
        assert!(compile("enum K : s8 { A = -128 };").is_ok());
    }

    #[test]
    fn bitfield_overflow() {
        let err = compile("bitfield F : u8 { a : 5; b : 4; };").unwrap_err();
        match err {
            CompileError::BitFieldOverflow {
                name,
                declared,
                capacity,
                ..
            } => {
                assert_eq!(name, "F");
                assert_eq!(declared, 9);
                assert_eq!(capacity, 8);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn bitfield_default_backing_is_smallest_fit() {
        let p = compile("bitfield F { a : 9; };").unwrap();
        let TypeDef::Bitfield(f) = p.by_name("F").unwrap() else { panic!() };
        assert_eq!(f.backing.kind, ScalarKind::Unsigned(2));
        let p = compile("bitfield G { a : 4; padding : 2; b : 2; };").unwrap();
        let TypeDef::Bitfield(g) = p.by_name("G").unwrap() else { panic!() };
        assert_eq!(g.backing.kind, ScalarKind::Unsigned(1));
        assert_eq!(g.slots[2].shift, 6);
    }

    #[test]
    fn by_value_recursion_rejected_pointer_allowed() {
        assert!(matches!(
            compile("struct A { B b; }; struct B { A a; };"),
            Err(CompileError::InvalidDeclaration { .. })
        ));
        assert!(compile("struct Node { u8 v; Node *next : u16; };").is_ok());
    }

    #[test]
    fn duplicate_and_reserved_type_names() {
        assert!(compile("struct A { u8 x; }; enum A : u8 { X };").is_err());
        assert!(compile("struct Result { u8 x; };").is_err());
    }

    #[test]
    fn array_length_must_be_integer() {
        assert!(matches!(
            compile("struct A { float n; u8 data[n]; };"),
            Err(CompileError::InvalidDeclaration { .. })
        ));
    }

    #[test]
    fn aliases_resolve_through_chains() {
        let p = compile(
            "using Word = be u16; using Count = Word; using P = Point;\n\
             struct Point { Count x; }; struct A { Count n; P items[n]; };",
        )
        .unwrap();
        let word = Layout::Scalar(Scalar {
            kind: ScalarKind::Unsigned(2),
            endian: Endianness::Big,
        });
        assert_eq!(p.alias("Count"), Some(word));
        assert_eq!(p.alias("P"), Some(Layout::Type(p.lookup("Point").unwrap())));
        assert!(p.lookup("Word").is_none());
        let TypeDef::Struct(a) = p.by_name("A").unwrap() else { panic!() };
        assert_eq!(a.fields[0].shape, Shape::Value(word));
        assert_eq!(p.aliases().len(), 3);
    }

    #[test]
    fn alias_cycles_are_invalid() {
        assert!(matches!(
            compile("using A = B; using B = A; struct S { A a; };"),
            Err(CompileError::InvalidDeclaration { .. })
        ));
        assert!(matches!(
            compile("using A = A;"),
            Err(CompileError::InvalidDeclaration { .. })
        ));
    }

    #[test]
    fn alias_as_backing_and_address() {
        let p = compile(
            "using Byte = u8; enum K : Byte { A }; struct T { u8 v; }; struct S { T *t : Byte; };",
        )
        .unwrap();
        let TypeDef::Enum(k) = p.by_name("K").unwrap() else { panic!() };
        assert_eq!(k.backing.kind, ScalarKind::Unsigned(1));
        assert!(matches!(
            compile("using F = float; enum K : F { A };"),
            Err(CompileError::InvalidDeclaration { .. })
        ));
    }

    #[test]
    fn union_lowering_and_recursion() {
        let p = compile("union U { u32 word; u8 bytes[4]; };").unwrap();
        let TypeDef::Union(u) = p.by_name("U").unwrap() else { panic!() };
        assert_eq!(u.fields.len(), 2);
        assert!(matches!(
            compile("union U { S s; }; struct S { U u; };"),
            Err(CompileError::InvalidDeclaration { .. })
        ));
    }

    #[test]
    fn alias_names_share_the_type_namespace() {
        assert!(compile("struct A { u8 x; }; using A = u8;").is_err());
        assert!(compile("using Option = u8;").is_err());
    }

    #[test]
    fn native_rust_names_are_reserved() {
        for name in ["i128", "str", "usize", "f32"] {
            assert!(matches!(
                compile(&format!("struct {} {{ u8 x; }};", name)),
                Err(CompileError::InvalidDeclaration { .. })
            ));
        }
    }

    #[test]
    fn pragma_sets_default_endianness() {
        let p = compile("#pragma endian big\nstruct A { u16 x; le u16 y; };").unwrap();
        let TypeDef::Struct(a) = p.by_name("A").unwrap() else { panic!() };
        let endians: Vec<_> = a
            .fields
            .iter()
            .map(|f| match f.shape {
                Shape::Value(Layout::Scalar(s)) => s.endian,
                _ => panic!(),
            })
            .collect();
        assert_eq!(endians, vec![Endianness::Big, Endianness::Little]);
    }
}
