// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use libfuzzer_sys::fuzz_target;
use treeaudit::workbook::links::{parse_hyperlink_formula, parse_native_target, LocationReference};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = parse_hyperlink_formula(text);
    let _ = parse_native_target(text);

    // A written formula must read back to the target it was built from
    let reference = LocationReference::new(std::path::Path::new(text), "Open File");
    if let Some(target) = parse_hyperlink_formula(&reference.to_formula()) {
        assert_eq!(std::path::PathBuf::from(target), reference.target);
    }
});
