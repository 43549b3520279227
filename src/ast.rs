//! Abstract Syntax Tree for the pattern language.

use crate::error::Location;
use crate::runtime::Endianness;

/// One parsed pattern file, declarations in source order.
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    pub items: Vec<Item>,
}

impl Pattern {
    pub fn includes(&self) -> impl Iterator<Item = &Include> {
        self.items.iter().filter_map(|item| match item {
            Item::Include(include) => Some(include),
            _ => None,
        })
    }

    /// Endianness selected by `#pragma endian`, last one wins.
    pub fn pragma_endian(&self) -> Option<Endianness> {
        self.items
            .iter()
            .filter_map(|item| match item {
                Item::Pragma(p) if p.name == "endian" => match p.value.as_deref() {
                    Some("little") => Some(Endianness::Little),
                    Some("big") => Some(Endianness::Big),
                    _ => None,
                },
                _ => None,
            })
            .last()
    }
}

#[derive(Debug, Clone)]
pub enum Item {
    Include(Include),
    Pragma(Pragma),
    Alias(AliasDef),
    Struct(StructDef),
    /// Same body as a struct; every member starts at the union's offset.
    Union(StructDef),
    Enum(EnumDef),
    Bitfield(BitfieldDef),
    Placement(Placement),
}

#[derive(Debug, Clone)]
pub struct Include {
    pub path: String,
    /// `<path>` form: searched only in the include directories.
    pub system: bool,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct Pragma {
    pub name: String,
    pub value: Option<String>,
    pub location: Location,
}

/// `using Name = Type;`
#[derive(Debug, Clone)]
pub struct AliasDef {
    pub name: String,
    pub target: TypeRef,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<Field>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub kind: FieldKind,
    pub location: Location,
}

impl Field {
    /// `None` for padding.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Data { name, .. } | FieldKind::Pointer { name, .. } => Some(name),
            FieldKind::Padding { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    /// A value of `ty`, or `len` of them.
    Data {
        name: String,
        ty: TypeRef,
        len: Option<ArrayLen>,
    },
    /// `size` skipped bytes.
    Padding { size: u64 },
    /// `Target *name : u32;`: an integer address, decoded target on demand.
    Pointer {
        name: String,
        target: TypeRef,
        address: TypeRef,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayLen {
    Fixed(u64),
    /// Value of an earlier sibling field.
    Field(String),
}

/// A type as written at a use site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Scalar {
        kind: ScalarKind,
        endian: Option<Endianness>,
    },
    Named { name: String, at: Location },
}

impl TypeRef {
    pub fn as_scalar(&self) -> Option<ScalarKind> {
        match self {
            TypeRef::Scalar { kind, .. } => Some(*kind),
            TypeRef::Named { .. } => None,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            TypeRef::Scalar { kind, .. } => kind.keyword().to_string(),
            TypeRef::Named { name, .. } => name.clone(),
        }
    }
}

/// Built-in scalar types. Integer widths are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Unsigned(u8),
    Signed(u8),
    Float,
    Double,
    Bool,
    Char,
    Char16,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 21] = [
        ScalarKind::Unsigned(1),
        ScalarKind::Unsigned(2),
        ScalarKind::Unsigned(3),
        ScalarKind::Unsigned(4),
        ScalarKind::Unsigned(6),
        ScalarKind::Unsigned(8),
        ScalarKind::Unsigned(12),
        ScalarKind::Unsigned(16),
        ScalarKind::Signed(1),
        ScalarKind::Signed(2),
        ScalarKind::Signed(3),
        ScalarKind::Signed(4),
        ScalarKind::Signed(6),
        ScalarKind::Signed(8),
        ScalarKind::Signed(12),
        ScalarKind::Signed(16),
        ScalarKind::Float,
        ScalarKind::Double,
        ScalarKind::Bool,
        ScalarKind::Char,
        ScalarKind::Char16,
    ];

    pub fn from_keyword(word: &str) -> Option<ScalarKind> {
        ScalarKind::ALL.into_iter().find(|k| k.keyword() == word)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            ScalarKind::Unsigned(1) => "u8",
            ScalarKind::Unsigned(2) => "u16",
            ScalarKind::Unsigned(3) => "u24",
            ScalarKind::Unsigned(4) => "u32",
            ScalarKind::Unsigned(6) => "u48",
            ScalarKind::Unsigned(8) => "u64",
            ScalarKind::Unsigned(12) => "u96",
            ScalarKind::Unsigned(_) => "u128",
            ScalarKind::Signed(1) => "s8",
            ScalarKind::Signed(2) => "s16",
            ScalarKind::Signed(3) => "s24",
            ScalarKind::Signed(4) => "s32",
            ScalarKind::Signed(6) => "s48",
            ScalarKind::Signed(8) => "s64",
            ScalarKind::Signed(12) => "s96",
            ScalarKind::Signed(_) => "s128",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Bool => "bool",
            ScalarKind::Char => "char",
            ScalarKind::Char16 => "char16",
        }
    }

    /// Size in bytes.
    pub fn width(self) -> usize {
        match self {
            ScalarKind::Unsigned(w) | ScalarKind::Signed(w) => w as usize,
            ScalarKind::Float => 4,
            ScalarKind::Double => 8,
            ScalarKind::Bool | ScalarKind::Char => 1,
            ScalarKind::Char16 => 2,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, ScalarKind::Unsigned(_) | ScalarKind::Signed(_))
    }

    pub fn is_signed(self) -> bool {
        matches!(self, ScalarKind::Signed(_))
    }

    /// Inclusive value range of an integer kind.
    pub fn range(self) -> Option<(i128, i128)> {
        match self {
            ScalarKind::Unsigned(16) => Some((0, i128::MAX)),
            ScalarKind::Signed(16) => Some((i128::MIN, i128::MAX)),
            ScalarKind::Unsigned(w) => Some((0, (1i128 << (w as u32 * 8)) - 1)),
            ScalarKind::Signed(w) => {
                let half = 1i128 << (w as u32 * 8 - 1);
                Some((-half, half - 1))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub backing: TypeRef,
    pub entries: Vec<EnumEntry>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct EnumEntry {
    pub name: String,
    /// `None` continues from the previous value.
    pub value: Option<i128>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct BitfieldDef {
    pub name: String,
    /// `None` picks the smallest unsigned type holding every bit.
    pub backing: Option<TypeRef>,
    pub entries: Vec<BitEntry>,
    pub location: Location,
}

impl BitfieldDef {
    /// Sum of the entry widths, saturating at `u32::MAX`.
    pub fn total_bits(&self) -> u32 {
        self.entries
            .iter()
            .fold(0u32, |acc, e| acc.saturating_add(e.width))
    }
}

#[derive(Debug, Clone)]
pub struct BitEntry {
    /// `None` for `padding : n;`.
    pub name: Option<String>,
    pub width: u32,
    pub location: Location,
}

/// `Type name @ offset;` at the top level of a pattern.
#[derive(Debug, Clone)]
pub struct Placement {
    pub name: String,
    pub ty: TypeRef,
    pub len: Option<u64>,
    pub offset: u64,
    pub location: Location,
}
