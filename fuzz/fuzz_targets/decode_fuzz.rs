//! Decode fuzz target: a fixed pattern with sibling lengths, pointers, unions
//! and odd widths against arbitrary bytes. Decoding must fail cleanly, never panic.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const PATTERN: &str = r#"
enum Kind : u8 { A, B, C };
bitfield Flags { lo : 3; padding : 1; hi : 4; };
struct Item { s24 delta; Kind kind; Flags flags; };
struct Empty { };
using Count = be u16;
union Head { Count word; u8 n; u8 raw[n]; };
struct Root {
    Count count;
    Item items[count];
    Item *first : u32;
    char name[4];
    Head head;
    Empty marks[count];
};
"#;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let codec = match binpat::compile(PATTERN) {
        Ok(program) => binpat::Codec::new(program),
        Err(_) => return,
    };
    let buffer: binpat::runtime::Buffer = data.into();
    if let Ok(root) = codec.decode_struct("Root", &mut binpat::runtime::Cursor::new(buffer.clone(), 0)) {
        if let Some(first) = root.get("first") {
            let _ = codec.deref(first, &buffer);
        }
        let _ = binpat::dump_instance(&root);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
