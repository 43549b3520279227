//! Generated code: the emitter's output matches the checked-in golden file, and
//! the golden file itself compiles against the runtime and decodes correctly.

use binpat::runtime::{addressof, sizeof, Buffer, Cursor, Decode, DecodeError, Extent, Span};
use binpat::{render_file, translate, Codec, Instance, TranslateOptions};
use std::path::PathBuf;

#[allow(dead_code)]
mod sample {
    include!("golden/sample.rs");
}

use sample::{Header, Kind, Line, Placements, Tag, Word};

fn golden_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/golden")
}

/// Compare by content, ignoring how whitespace is laid out.
fn normalized(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Header bytes: magic, be u24 version, s24 delta, kind, flags, count,
/// 2 bytes padding, 2 points, pointer to a Line at 0x1D, name, then the Line.
fn header_bytes() -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(b"PAT!");
    b.extend_from_slice(&[0x01, 0x02, 0x03]);
    b.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
    b.push(0x04);
    b.extend_from_slice(&[0x0B, 0x2A]);
    b.push(2);
    b.extend_from_slice(&[0xEE, 0xEE]);
    b.extend_from_slice(&[1, 0, 2, 0, 3, 0, 4, 0]);
    b.push(0x1D);
    b.extend_from_slice(b"PAT\0");
    assert_eq!(b.len(), 0x1D);
    b.extend_from_slice(&[1, 0, 2, 0, 3, 0, 4, 0]);
    b
}

#[test]
fn emitted_source_matches_golden() {
    let expected = std::fs::read_to_string(golden_dir().join("sample.rs")).expect("golden");
    let actual = render_file(&golden_dir().join("sample.hexpat"), &TranslateOptions::default())
        .expect("render");
    assert_eq!(normalized(&actual), normalized(&expected));
}

#[test]
fn translate_writes_golden_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("sample.rs");
    translate(golden_dir().join("sample.hexpat"), &out).expect("translate");
    let written = std::fs::read_to_string(&out).expect("read output");
    let expected = std::fs::read_to_string(golden_dir().join("sample.rs")).expect("golden");
    assert_eq!(normalized(&written), normalized(&expected));
}

#[test]
fn generated_header_decodes() {
    let bytes = header_bytes();
    let mut cursor = Cursor::new(bytes, 0);
    let h = Header::decode(&mut cursor).expect("decode");

    assert_eq!(h.magic.value(), u32::from_le_bytes(*b"PAT!"));
    assert_eq!(h.version.value(), 0x010203);
    assert_eq!(h.delta.value(), -1);
    assert_eq!(h.kind.known(), Some(Kind::Data));
    assert_eq!(h.flags.compressed, 1);
    assert_eq!(h.flags.level, 5);
    assert_eq!(h.flags.id, 42);
    assert_eq!(h.count.value(), 2);
    let xs: Vec<u16> = h.points.iter().map(|p| p.x.value()).collect();
    assert_eq!(xs, vec![1, 3]);
    let name: String = h.name.iter().map(|c| c.as_char()).collect();
    assert_eq!(name, "PAT\0");

    assert_eq!(sizeof(&h), 0x1D);
    assert_eq!(addressof(&h), 0);
    assert_eq!(addressof(&h.points[1]), 20);
    assert_eq!(sizeof(&h.flags), 2);
    assert_eq!(cursor.offset(), 0x1D);
}

#[test]
fn generated_pointer_is_followed_lazily() {
    let h = Header::decode(&mut Cursor::new(header_bytes(), 0)).expect("decode");
    let line: Line = h.line.deref().expect("deref");
    assert_eq!(
        (line.a.x.value(), line.a.y.value(), line.b.x.value(), line.b.y.value()),
        (1, 2, 3, 4)
    );
    assert_eq!(addressof(&line), 0x1D);
    assert_eq!(sizeof(&line), 8);
}

#[test]
fn generated_pointer_past_end_fails_on_deref() {
    let mut bytes = header_bytes();
    bytes[24] = 0xF0;
    let h = Header::decode(&mut Cursor::new(bytes, 0)).expect("pointer itself decodes");
    assert!(matches!(
        h.line.deref(),
        Err(DecodeError::BufferUnderrun { offset: 0xF0, .. })
    ));
}

#[test]
fn generated_enum_keeps_unknown_values() {
    let mut bytes = header_bytes();
    bytes[10] = 0x63;
    let h = Header::decode(&mut Cursor::new(bytes, 0)).expect("decode");
    assert!(!h.kind.is_recognized());
    assert_eq!(h.kind.raw(), 0x63);
}

#[test]
fn generated_struct_fails_whole_on_underrun() {
    let bytes = header_bytes();
    let truncated = &bytes[..20];
    let err = Header::decode(&mut Cursor::new(truncated, 0)).unwrap_err();
    assert!(matches!(err, DecodeError::BufferUnderrun { offset: 20, .. }));
}

#[test]
fn generated_placements_decode_from_buffer() {
    let buffer: Buffer = header_bytes().into();
    let p = Placements::decode(&buffer).expect("placements");
    assert_eq!(p.header.count.value(), 2);
    assert_eq!(addressof(&p.header), 0);
    assert_eq!(p.tag.id.value(), p.header.magic.value());
    assert_eq!(addressof(&p.tag), 0);
}

#[test]
fn generated_union_members_overlap() {
    let mut cursor = Cursor::new(header_bytes(), 0);
    let tag = Tag::decode(&mut cursor).expect("decode");
    assert_eq!(tag.id.value(), u32::from_le_bytes(*b"PAT!"));
    let text: String = tag.text.iter().map(|c| c.as_char()).collect();
    assert_eq!(text, "PAT!");
    assert_eq!(tag.high.value(), u16::from_be_bytes(*b"PA"));
    assert_eq!(addressof(&tag.high), 0);
    assert_eq!(sizeof(&tag), 4);
    assert_eq!(cursor.offset(), 4);
}

#[test]
fn generated_union_fails_when_a_member_underruns() {
    let err = Tag::decode(&mut Cursor::new(vec![1u8, 2, 3], 0)).unwrap_err();
    assert!(matches!(
        err,
        DecodeError::BufferUnderrun { offset: 0, wanted: 4, .. }
    ));
}

#[test]
fn generated_alias_is_the_target_type() {
    let word: Word = Decode::decode(&mut Cursor::new(vec![0x12u8, 0x34], 0)).expect("decode");
    assert_eq!(word.value(), 0x1234);
}

#[test]
fn generated_and_dynamic_decode_agree() {
    let program = binpat::compile_file(&golden_dir().join("sample.hexpat"), &TranslateOptions::default())
        .expect("compile");
    let codec = binpat::Codec::new(program);
    let bytes = header_bytes();
    let dynamic = codec
        .decode_struct("Header", &mut Cursor::new(bytes.clone(), 0))
        .expect("dynamic");
    let typed = Header::decode(&mut Cursor::new(bytes, 0)).expect("typed");

    assert_eq!(dynamic.sizeof(), sizeof(&typed));
    assert_eq!(
        dynamic.get("delta").and_then(|v| v.as_i128()),
        Some(typed.delta.value() as i128)
    );
    assert_eq!(dynamic.get("kind").and_then(|v| v.symbol()), typed.kind.symbol());
    assert_eq!(
        dynamic.get("flags").and_then(|v| v.bits("id")),
        Some(typed.flags.id as u128)
    );
    let points = dynamic.field("points").expect("points");
    assert_eq!(points.span.start, addressof(&typed.points));
    assert_eq!(points.span.len(), sizeof(&typed.points));
}

fn field_spans(instance: &Instance) -> Vec<(String, Span)> {
    instance
        .fields()
        .map(|(name, field)| (name.to_string(), field.span))
        .collect()
}

#[test]
fn repeated_decodes_of_one_buffer_are_identical() {
    let program = binpat::compile_file(&golden_dir().join("sample.hexpat"), &TranslateOptions::default())
        .expect("compile");
    let codec = Codec::new(program);
    let buffer: Buffer = header_bytes().into();

    let first = codec
        .decode_struct("Header", &mut Cursor::new(buffer.clone(), 0))
        .expect("first dynamic decode");
    let second = codec
        .decode_struct("Header", &mut Cursor::new(buffer.clone(), 0))
        .expect("second dynamic decode");
    assert_eq!(first, second);
    assert_eq!(field_spans(&first), field_spans(&second));

    let a = Header::decode(&mut Cursor::new(buffer.clone(), 0)).expect("first typed decode");
    let b = Header::decode(&mut Cursor::new(buffer.clone(), 0)).expect("second typed decode");
    assert_eq!(format!("{:?}", a), format!("{:?}", b));
    assert_eq!(a.span(), b.span());

    let typed = vec![
        ("magic".to_string(), a.magic.span()),
        ("version".to_string(), a.version.span()),
        ("delta".to_string(), a.delta.span()),
        ("kind".to_string(), a.kind.span()),
        ("flags".to_string(), a.flags.span()),
        ("count".to_string(), a.count.span()),
        ("points".to_string(), a.points.span()),
        ("line".to_string(), a.line.span()),
        ("name".to_string(), a.name.span()),
    ];
    assert_eq!(field_spans(&first), typed);
    assert_eq!(first.sizeof(), sizeof(&a));

    let union = codec
        .decode_struct("Tag", &mut Cursor::new(buffer.clone(), 0))
        .expect("dynamic union");
    let tag = Tag::decode(&mut Cursor::new(buffer, 0)).expect("typed union");
    assert_eq!(
        field_spans(&union),
        vec![
            ("id".to_string(), tag.id.span()),
            ("text".to_string(), tag.text.span()),
            ("high".to_string(), tag.high.span()),
        ]
    );
    assert_eq!(union.sizeof(), sizeof(&tag));
}
