//! Serializable outcome of one validation run.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::stats::chi_squared::Evaluation;
use crate::stats::frequency::FrequencyTable;

/// Caller-threshold outcome. Only present when `max_statistic` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    #[must_use]
    pub fn judge(statistic: f64, max_statistic: f64) -> Self {
        if statistic <= max_statistic {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

/// Observed count for one permutation class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCount {
    /// Canonical key, unique within one run.
    pub permutation: String,
    pub tokens: Vec<String>,
    pub count: u64,
}

/// Facts about the subprocess session, when one was run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub program: String,
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
    pub stdin_truncated: bool,
}

/// Everything a caller needs to judge one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub elements: Vec<String>,
    pub trials_requested: u64,
    pub observations: u64,
    /// `trials_requested − observations`; negative when the transcript held
    /// more dumps than shuffles were requested.
    pub shortfall: i64,
    /// Every requested trial produced exactly one observation.
    pub complete: bool,
    pub malformed_dumps: usize,
    pub evaluation: Evaluation,
    /// Per-class counts in enumeration order, zero-count classes included.
    pub classes: Vec<ClassCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_statistic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    pub transcript_bytes: u64,
    pub transcript_sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSummary>,
}

impl ValidationReport {
    pub(crate) fn class_counts(table: &FrequencyTable) -> Vec<ClassCount> {
        table
            .iter()
            .map(|(permutation, count)| ClassCount {
                permutation: permutation.canonical(),
                tokens: permutation.tokens().to_vec(),
                count,
            })
            .collect()
    }

    /// Count for a canonical permutation key such as `"1234"` or `"12 1 2"`.
    #[must_use]
    pub fn count_of(&self, permutation: &str) -> Option<u64> {
        self.classes
            .iter()
            .find(|c| c.permutation == permutation)
            .map(|c| c.count)
    }

    /// Whether this run should be treated as a failure by the caller.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.verdict == Some(Verdict::Fail)
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest
        .iter()
        .fold(String::with_capacity(digest.len() * 2), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
}
