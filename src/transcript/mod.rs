//! Transcript parsing: bound the window, then match each line.

pub mod dump;
pub mod window;

use crate::stats::permutation::Permutation;
use crate::transcript::dump::{DumpLine, match_dump_line};
use crate::transcript::window::{Markers, extraction_window};

/// Everything the parser recovered from one transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptExtraction {
    /// Observed permutations in order of appearance.
    pub observations: Vec<Permutation>,
    pub seed_found: bool,
    pub teardown_found: bool,
    /// Dump lines inside the window whose token count did not match.
    pub malformed_dumps: usize,
    /// Bytes inside the extraction window.
    pub window_bytes: usize,
}

/// Extract one permutation per well-formed dump between the markers.
#[must_use]
pub fn extract_observations(
    transcript: &str,
    markers: &Markers,
    arity: usize,
) -> TranscriptExtraction {
    let window = extraction_window(transcript, markers);
    let mut extraction = TranscriptExtraction {
        seed_found: window.seed_found(),
        teardown_found: window.teardown_found(),
        window_bytes: window.text.len(),
        ..TranscriptExtraction::default()
    };

    for line in window.text.lines() {
        match match_dump_line(line, arity) {
            DumpLine::Observation(permutation) => extraction.observations.push(permutation),
            DumpLine::Malformed { .. } => extraction.malformed_dumps += 1,
            DumpLine::Other => {}
        }
    }
    extraction
}
