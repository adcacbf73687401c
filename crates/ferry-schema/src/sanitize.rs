//! Deterministic name sanitization shared by volume capture and image matching.

use crate::types::CaptureId;

/// Delimiter substituted for separators and whitespace.
pub const DELIMITER: char = '_';

/// Replace every character outside `[A-Za-z0-9.-]` with `_`, collapse runs of
/// `_`, and strip leading and trailing `_`.
///
/// `sanitize("api_/app/storage") == "api_app_storage"`
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        let keep = c.is_ascii_alphanumeric() || c == '-' || c == '.';
        let next = if keep { c } else { DELIMITER };
        if next == DELIMITER && out.ends_with(DELIMITER) {
            continue;
        }
        out.push(next);
    }
    out.trim_matches(DELIMITER).to_owned()
}

/// Capture identifier of a mount: `sanitize("{service}_{destination}")`.
pub fn capture_id(service: &str, destination: &str) -> CaptureId {
    CaptureId::new(sanitize(&format!("{service}_{destination}")))
}

/// Map `-`, `.` and `/` to `_` so naming conventions compare equal.
pub fn normalize_separators(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '-' | '.' | '/' => DELIMITER,
            other => other,
        })
        .collect()
}
