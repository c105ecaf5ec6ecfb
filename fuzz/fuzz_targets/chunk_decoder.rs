#![no_main]

use arcsift::ChunkDecoder;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

const MAX_CHUNK: usize = 4096;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let chunk_size = (u16::from_le_bytes([data[0], data[1]]) as usize % MAX_CHUNK) + 1;
    let payload = &data[2..];

    let mut chunked = ChunkDecoder::with_chunk_size(Cursor::new(payload), chunk_size);
    let chunked_lines: Vec<String> = chunked.by_ref().filter_map(Result::ok).collect();

    let mut whole = ChunkDecoder::with_chunk_size(Cursor::new(payload), payload.len().max(1));
    let whole_lines: Vec<String> = whole.by_ref().filter_map(Result::ok).collect();

    // The chunk size must never change what comes out
    assert_eq!(chunked_lines, whole_lines);
    assert_eq!(chunked.invalid_sequences(), whole.invalid_sequences());
});
