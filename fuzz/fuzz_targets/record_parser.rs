#![no_main]

use arcsift::Record;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parse errors are fine; we only care about panics.
        let _ = Record::parse(input);
    }
});
