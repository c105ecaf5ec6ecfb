#![no_main]

use arcsift::{template_classifier, Record};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Some((template, value)) = input.split_once('\u{0}') else {
        return;
    };

    // Template errors are fine; we only care about panics.
    let Ok(classify) = template_classifier(template) else {
        return;
    };

    let mut record = Record::new();
    record.insert("f", value.into());
    for path in classify(&record) {
        // The substituted value must never add a traversal step. The
        // template itself may contain one, so only clean templates are
        // checked.
        if !template.contains("..") {
            assert!(!path.to_string_lossy().contains("/../"));
        }
    }
});
