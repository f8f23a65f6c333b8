// SPDX-License-Identifier: MIT
#![no_main]

use libfuzzer_sys::fuzz_target;
use librarian::oracle::parser::{align, parse_suggestions};
use librarian::resolver::sanitize_label;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let parsed = parse_suggestions(text);
    let files: Vec<String> = text.lines().take(16).map(str::to_string).collect();
    assert_eq!(align(&files, &parsed).len(), files.len());

    if let Some(label) = sanitize_label(text) {
        assert!(!label.contains('/') && !label.contains('\\'));
        assert!(!label.starts_with('.'));
        assert!(!label.trim().is_empty());
    }
});
