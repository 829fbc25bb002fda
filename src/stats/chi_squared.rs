//! Pearson chi-squared goodness-of-fit against a uniform distribution.

#![allow(clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SuvError};
use crate::stats::frequency::FrequencyTable;

/// How the per-class expected count is derived from the observation total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectationMode {
    /// `observations / classes` as a real number.
    #[default]
    Exact,
    /// `observations / classes` rounded down, as the historical harness did.
    /// Only unbiased when the observation count is a multiple of k!.
    Floor,
}

impl ExpectationMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Floor => "floor",
        }
    }

    /// Expected count per class. `None` when it would be zero.
    #[must_use]
    pub fn expected(self, observations: u64, classes: usize) -> Option<f64> {
        if observations == 0 || classes == 0 {
            return None;
        }
        let value = match self {
            Self::Exact => observations as f64 / classes as f64,
            Self::Floor => (observations / classes as u64) as f64,
        };
        (value > 0.0).then_some(value)
    }
}

impl std::str::FromStr for ExpectationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "floor" => Ok(Self::Floor),
            other => Err(format!("unknown expectation mode {other:?} (exact|floor)")),
        }
    }
}

/// Result of the goodness-of-fit computation.
///
/// The statistic is reported raw together with its degrees of freedom;
/// choosing a critical value is left to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub mode: ExpectationMode,
    pub observations: u64,
    pub classes: usize,
    pub expected: f64,
    pub statistic: f64,
    pub degrees_of_freedom: u64,
}

/// Compute Σ (observed − expected)² / expected over every class.
///
/// The expectation comes from the number of observations actually tallied,
/// not from the number of trials requested.
pub fn evaluate(table: &FrequencyTable, mode: ExpectationMode) -> Result<Evaluation> {
    let observations = table.total();
    let classes = table.counts().len();
    if observations == 0 {
        return Err(SuvError::NoObservations);
    }
    let expected = mode
        .expected(observations, classes)
        .ok_or(SuvError::InsufficientObservations {
            observed: observations,
            classes,
        })?;

    let statistic = table
        .counts()
        .iter()
        .map(|&observed| {
            let deviation = observed as f64 - expected;
            deviation * deviation / expected
        })
        .sum();

    Ok(Evaluation {
        mode,
        observations,
        classes,
        expected,
        statistic,
        degrees_of_freedom: classes.saturating_sub(1) as u64,
    })
}
