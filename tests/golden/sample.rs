// Generated by binpat from `sample.hexpat`. Do not edit.

use binpat::runtime as rt;

/// `enum Kind : u8`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Empty,
    Data,
    Tail,
}

impl rt::Symbols for Kind {
    type Backing = rt::U8;

    fn from_raw(raw: i128) -> Option<Self> {
        match raw {
            0 => Some(Kind::Empty),
            4 => Some(Kind::Data),
            5 => Some(Kind::Tail),
            _ => None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Kind::Empty => "Empty",
            Kind::Data => "Data",
            Kind::Tail => "Tail",
        }
    }
}

/// `bitfield Flags : u16`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flags {
    pub compressed: u8,
    pub level: u8,
    pub id: u8,
    __span: rt::Span,
}

impl rt::Decode for Flags {
    fn decode(__cursor: &mut rt::Cursor) -> Result<Self, rt::DecodeError> {
        let __backing: rt::U16<rt::LittleEndian> = rt::Decode::decode(__cursor)?;
        let __raw = rt::Integer::as_u128(&__backing);
        Ok(Flags {
            compressed: rt::extract_bits(__raw, 0, 1) as u8,
            level: rt::extract_bits(__raw, 1, 3) as u8,
            id: rt::extract_bits(__raw, 8, 8) as u8,
            __span: rt::Extent::span(&__backing),
        })
    }
}

impl rt::Extent for Flags {
    fn span(&self) -> rt::Span {
        self.__span
    }
}

/// `struct Point`
#[derive(Debug, Clone)]
pub struct Point {
    pub x: rt::U16<rt::LittleEndian>,
    pub y: rt::U16<rt::LittleEndian>,
    __span: rt::Span,
}

impl rt::Decode for Point {
    fn decode(__cursor: &mut rt::Cursor) -> Result<Self, rt::DecodeError> {
        let __start = __cursor.snapshot();
        let x: rt::U16<rt::LittleEndian> = rt::Decode::decode(__cursor)?;
        let y: rt::U16<rt::LittleEndian> = rt::Decode::decode(__cursor)?;
        Ok(Point {
            x,
            y,
            __span: rt::Span::between(&__start, __cursor),
        })
    }
}

impl rt::Extent for Point {
    fn span(&self) -> rt::Span {
        self.__span
    }
}

/// `struct Line`
#[derive(Debug, Clone)]
pub struct Line {
    pub a: Point,
    pub b: Point,
    __span: rt::Span,
}

impl rt::Decode for Line {
    fn decode(__cursor: &mut rt::Cursor) -> Result<Self, rt::DecodeError> {
        let __start = __cursor.snapshot();
        let a: Point = rt::Decode::decode(__cursor)?;
        let b: Point = rt::Decode::decode(__cursor)?;
        Ok(Line {
            a,
            b,
            __span: rt::Span::between(&__start, __cursor),
        })
    }
}

impl rt::Extent for Line {
    fn span(&self) -> rt::Span {
        self.__span
    }
}

/// `union Tag`
#[derive(Debug, Clone)]
pub struct Tag {
    pub id: rt::U32<rt::LittleEndian>,
    pub text: rt::Array<rt::Char>,
    pub high: rt::U16<rt::BigEndian>,
    __span: rt::Span,
}

impl rt::Decode for Tag {
    fn decode(__cursor: &mut rt::Cursor) -> Result<Self, rt::DecodeError> {
        let __start = __cursor.snapshot();
        let mut __union = rt::Overlay::new(__cursor);
        let id: rt::U32<rt::LittleEndian> = __union.member(rt::Decode::decode)?;
        let text: rt::Array<rt::Char> = __union.member(|__member| rt::Array::decode_n(__member, 4, "text"))?;
        let high: rt::U16<rt::BigEndian> = __union.member(rt::Decode::decode)?;
        __union.finish(__cursor)?;
        Ok(Tag {
            id,
            text,
            high,
            __span: rt::Span::between(&__start, __cursor),
        })
    }
}

impl rt::Extent for Tag {
    fn span(&self) -> rt::Span {
        self.__span
    }
}

/// `struct Header`
#[derive(Debug, Clone)]
pub struct Header {
    pub magic: rt::U32<rt::LittleEndian>,
    pub version: rt::U24<rt::BigEndian>,
    pub delta: rt::S24<rt::LittleEndian>,
    pub kind: rt::Enum<Kind>,
    pub flags: Flags,
    pub count: rt::U8,
    pub points: rt::Array<Point>,
    pub line: rt::Pointer<rt::U8, Line>,
    pub name: rt::Array<rt::Char>,
    __span: rt::Span,
}

impl rt::Decode for Header {
    fn decode(__cursor: &mut rt::Cursor) -> Result<Self, rt::DecodeError> {
        let __start = __cursor.snapshot();
        let magic: rt::U32<rt::LittleEndian> = rt::Decode::decode(__cursor)?;
        let version: rt::U24<rt::BigEndian> = rt::Decode::decode(__cursor)?;
        let delta: rt::S24<rt::LittleEndian> = rt::Decode::decode(__cursor)?;
        let kind: rt::Enum<Kind> = rt::Decode::decode(__cursor)?;
        let flags: Flags = rt::Decode::decode(__cursor)?;
        let count: rt::U8 = rt::Decode::decode(__cursor)?;
        let _: rt::Padding<2> = rt::Decode::decode(__cursor)?;
        let points: rt::Array<Point> = rt::Array::decode_n(__cursor, rt::array_len(&count, "count")?, "points")?;
        let line: rt::Pointer<rt::U8, Line> = rt::Decode::decode(__cursor)?;
        let name: rt::Array<rt::Char> = rt::Array::decode_n(__cursor, 4, "name")?;
        Ok(Header {
            magic,
            version,
            delta,
            kind,
            flags,
            count,
            points,
            line,
            name,
            __span: rt::Span::between(&__start, __cursor),
        })
    }
}

impl rt::Extent for Header {
    fn span(&self) -> rt::Span {
        self.__span
    }
}

/// `using Word = u16`
pub type Word = rt::U16<rt::BigEndian>;

/// Top-level placements, each decoded at its own offset.
#[derive(Debug, Clone)]
pub struct Placements {
    pub header: Header,
    pub tag: Tag,
}

impl Placements {
    pub fn decode(__buffer: &rt::Buffer) -> Result<Self, rt::DecodeError> {
        let header: Header = rt::Decode::decode(&mut rt::Cursor::new(__buffer.clone(), 0x0))?;
        let tag: Tag = rt::Decode::decode(&mut rt::Cursor::new(__buffer.clone(), 0x0))?;
        Ok(Placements {
            header,
            tag,
        })
    }
}
