//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use shuffle_uniformity::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{ErrorCategory, Result, SuvError};

// Logging
pub use crate::logger::jsonl::JsonlWriter;

// Pipeline
pub use crate::pipeline::report::{ValidationReport, Verdict};
pub use crate::pipeline::{AnalysisPlan, analyze_transcript, run_validation};

// Script + session
pub use crate::script::builder::{TrialPlan, TrialScript};
pub use crate::session::runner::{ProcessSession, SessionTranscript, TranscriptSource};

// Stats + transcript
pub use crate::stats::chi_squared::{Evaluation, ExpectationMode, evaluate};
pub use crate::stats::frequency::FrequencyTable;
pub use crate::stats::permutation::{ElementSet, Permutation, PermutationSpace};
pub use crate::transcript::window::Markers;
pub use crate::transcript::{TranscriptExtraction, extract_observations};
