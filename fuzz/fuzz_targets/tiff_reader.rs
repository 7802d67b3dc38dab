#![no_main]

//! Fuzz target for TIFF header and directory parsing.
//!
//! Feeds arbitrary bytes to the reader and pulls rows from whatever
//! directory it accepts.

use libfuzzer_sys::fuzz_target;
use arbitrary::Arbitrary;
use retile_tiff::TiffReader;
use std::io::Cursor;

#[derive(Arbitrary, Debug)]
struct ReaderInput {
    data: Vec<u8>,
    rows: Vec<u32>,
}

fuzz_target!(|input: ReaderInput| {
    if input.data.len() > 1024 * 1024 {
        return;
    }

    let Ok(mut reader) = TiffReader::new(Cursor::new(input.data)) else {
        return;
    };
    let info = reader.info().clone();
    let _ = info.to_string();

    // Skip geometries whose rows would not fit in a sane buffer
    let row_bytes = info.bytes_per_row();
    if row_bytes == 0 || row_bytes > 1 << 20 {
        return;
    }

    let mut buf = vec![0u8; row_bytes];
    for row in input.rows.iter().take(64) {
        let _ = reader.read_row(*row, &mut buf);
    }
});
