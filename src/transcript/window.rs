//! Bounding the transcript to the span between the seed and teardown dumps.

use memchr::memmem;

use crate::stats::permutation::ElementSet;

/// Dump printed once the list has been freed.
pub const TEARDOWN_MARKER: &str = "l = NULL";

/// Exact dump lines that open and close the extraction window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub seed: String,
    pub teardown: String,
}

impl Markers {
    /// Seed marker is the dump of the baseline ordering, e.g. `l = [1 2 3 4]`.
    #[must_use]
    pub fn for_elements(elements: &ElementSet) -> Self {
        Self {
            seed: format!("l = [{}]", elements.tokens().join(" ")),
            teardown: TEARDOWN_MARKER.to_string(),
        }
    }
}

/// Slice of the transcript holding the per-shuffle dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionWindow<'a> {
    /// Text strictly between the seed line and the teardown line. Empty when
    /// either marker is missing.
    pub text: &'a str,
    /// Byte offset of the seed line, if found.
    pub seed_offset: Option<usize>,
    /// Byte offset of the first teardown line after the seed, if found.
    pub teardown_offset: Option<usize>,
}

impl ExtractionWindow<'_> {
    #[must_use]
    pub fn seed_found(&self) -> bool {
        self.seed_offset.is_some()
    }

    #[must_use]
    pub fn teardown_found(&self) -> bool {
        self.teardown_offset.is_some()
    }
}

/// Locate the first seed line, then the first teardown line after it.
///
/// Markers match whole lines only (surrounding whitespace and `\r` are
/// ignored), so `l = [1 2 3 4]` does not match inside `l = [1 2 3 4 5]`.
#[must_use]
pub fn extraction_window<'a>(transcript: &'a str, markers: &Markers) -> ExtractionWindow<'a> {
    let Some((seed_offset, body_start)) = find_line(transcript, &markers.seed, 0) else {
        return ExtractionWindow {
            text: "",
            seed_offset: None,
            teardown_offset: None,
        };
    };
    let Some((teardown_offset, _)) = find_line(transcript, &markers.teardown, body_start) else {
        return ExtractionWindow {
            text: "",
            seed_offset: Some(seed_offset),
            teardown_offset: None,
        };
    };
    ExtractionWindow {
        text: &transcript[body_start..teardown_offset],
        seed_offset: Some(seed_offset),
        teardown_offset: Some(teardown_offset),
    }
}

/// Find the first line at or after `from` whose trimmed content equals
/// `needle`. Returns `(line_start, next_line_start)`.
fn find_line(haystack: &str, needle: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = haystack.as_bytes();
    let needle = needle.trim();
    if needle.is_empty() || from > bytes.len() {
        return None;
    }
    for hit in memmem::find_iter(&bytes[from..], needle.as_bytes()) {
        let at = from + hit;
        let line_start = memchr::memrchr(b'\n', &bytes[..at]).map_or(0, |nl| nl + 1);
        let after = at + needle.len();
        let line_end = memchr::memchr(b'\n', &bytes[after..]).map_or(bytes.len(), |nl| after + nl);

        let blank_before = bytes[line_start..at].iter().all(u8::is_ascii_whitespace);
        let blank_after = bytes[after..line_end].iter().all(u8::is_ascii_whitespace);
        if blank_before && blank_after {
            let next_line = (line_end + 1).min(bytes.len());
            return Some((line_start, next_line));
        }
    }
    None
}
