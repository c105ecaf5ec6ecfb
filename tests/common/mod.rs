// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::process::Command;

/// Run the arcsift binary with the given arguments.
pub fn run_arcsift(args: &[&str]) -> (String, String, i32) {
    // Use the built binary directly instead of cargo run to avoid compilation output
    let binary_path = if cfg!(debug_assertions) {
        "./target/debug/arcsift"
    } else {
        "./target/release/arcsift"
    };

    let output = Command::new(binary_path)
        .args(args)
        .output()
        .expect("Failed to execute arcsift");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Write a plain NDJSON fixture file.
pub fn write_plain(path: &Path, content: &str) {
    let mut file = File::create(path).expect("Failed to create fixture");
    file.write_all(content.as_bytes())
        .expect("Failed to write fixture");
}

/// Write a gzip-compressed fixture file.
pub fn write_gzip(path: &Path, content: &str) {
    let file = File::create(path).expect("Failed to create fixture");
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder
        .write_all(content.as_bytes())
        .expect("Failed to write gzip fixture");
    encoder.finish().expect("Failed to finish gzip fixture");
}

/// Write a zstd-compressed fixture file.
pub fn write_zstd(path: &Path, content: &str) {
    let compressed =
        zstd::stream::encode_all(content.as_bytes(), 3).expect("Failed to compress fixture");
    let mut file = File::create(path).expect("Failed to create fixture");
    file.write_all(&compressed)
        .expect("Failed to write zstd fixture");
}

/// Read an output file back as text, decompressing by extension.
pub fn read_output(path: &Path) -> String {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "gz" => {
            let file = File::open(path).expect("Failed to open output");
            let mut decoder = MultiGzDecoder::new(file);
            let mut content = String::new();
            decoder
                .read_to_string(&mut content)
                .expect("Failed to decompress gzip output");
            content
        }
        "zst" => {
            let file = File::open(path).expect("Failed to open output");
            let decompressed = zstd::stream::decode_all(file).expect("Failed to decompress zstd");
            String::from_utf8(decompressed).expect("Output was not UTF-8")
        }
        _ => std::fs::read_to_string(path).expect("Failed to read output"),
    }
}

/// Sorted lines of an output file, for order-independent comparisons.
pub fn sorted_lines(path: &Path) -> Vec<String> {
    let mut lines: Vec<String> = read_output(path).lines().map(|l| l.to_string()).collect();
    lines.sort();
    lines
}
