//! Best-effort JSON object extraction from free-form text
//!
//! Task executors wrap their structured output in prose or markdown fences.
//! [`extract_json_object`] finds the first balanced `{...}` block, tracking
//! string literals so braces inside strings do not affect the depth count.

/// Opening braces tried before giving up
///
/// Every failed attempt scans to the end of the text, so the cap keeps
/// brace-heavy garbage linear in its length.
pub const MAX_OBJECT_STARTS: usize = 64;

/// Return the first balanced JSON object embedded in `text`
///
/// Scanning starts at each `{` in turn. If the object opened there never
/// closes, the next `{` is tried, up to [`MAX_OBJECT_STARTS`] of them.
/// Returns `None` when no balanced object is found.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut start = 0;

    for _ in 0..MAX_OBJECT_STARTS {
        let offset = text[start..].find('{')?;
        let open = start + offset;
        if let Some(close) = matching_brace(bytes, open) {
            return Some(&text[open..=close]);
        }
        start = open + 1;
    }

    None
}

/// Index of the `}` closing the `{` at `open`
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}
