#![no_main]

use intercept_errors::{format::interpolate, format::MAX_FIELD_OUTPUT_LEN, LogContext};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (&str, &str)| {
    let (template, value) = input;
    let context = LogContext::new()
        .with("message", value.to_owned())
        .with("file", "f.rs")
        .with("line", 1u32);

    let rendered = interpolate(template, &context);
    let placeholders = template.matches("{message}").count();
    assert!(rendered.len() <= template.len() + placeholders * MAX_FIELD_OUTPUT_LEN);
});
