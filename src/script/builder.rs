//! Deterministic command script for one validation session.

use std::fmt::Write as _;

use crate::core::errors::{Result, SuvError};
use crate::stats::permutation::ElementSet;

/// Create an empty list.
pub const CMD_NEW: &str = "new";
/// Insert a token at the tail.
pub const CMD_INSERT_TAIL: &str = "it";
/// Permute the list in place.
pub const CMD_SHUFFLE: &str = "shuffle";
/// Destroy the list.
pub const CMD_FREE: &str = "free";
/// Terminate the program.
pub const CMD_QUIT: &str = "quit";

/// Upper bound on the up-front allocation for a script's text.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// Element set plus the number of shuffle trials to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialPlan {
    elements: ElementSet,
    trials: u64,
}

impl TrialPlan {
    pub fn new(elements: ElementSet, trials: u64) -> Result<Self> {
        if trials == 0 {
            return Err(SuvError::InvalidTrialPlan {
                details: "trial count must be positive".to_string(),
            });
        }
        Ok(Self { elements, trials })
    }

    #[must_use]
    pub fn elements(&self) -> &ElementSet {
        &self.elements
    }

    #[must_use]
    pub fn trials(&self) -> u64 {
        self.trials
    }

    /// `new`, one `it` per element, the shuffles, `free`, `quit`.
    #[must_use]
    pub fn command_count(&self) -> u64 {
        self.trials
            .saturating_add(self.elements.len() as u64)
            .saturating_add(3)
    }

    fn capacity_hint(&self) -> usize {
        usize::try_from(self.trials)
            .unwrap_or(usize::MAX)
            .saturating_mul(CMD_SHUFFLE.len() + 1)
            .saturating_add(64)
            .min(MAX_PREALLOC)
    }

    /// Build the script: `new`, one `it` per element, `trials` × `shuffle`,
    /// `free`, `quit`.
    #[must_use]
    pub fn script(&self) -> TrialScript {
        let mut text = String::with_capacity(self.capacity_hint());
        text.push_str(CMD_NEW);
        text.push('\n');
        for token in self.elements.tokens() {
            let _ = writeln!(text, "{CMD_INSERT_TAIL} {token}");
        }
        for _ in 0..self.trials {
            text.push_str(CMD_SHUFFLE);
            text.push('\n');
        }
        text.push_str(CMD_FREE);
        text.push('\n');
        text.push_str(CMD_QUIT);
        text.push('\n');

        TrialScript {
            commands: self.command_count(),
            text,
        }
    }
}

/// Composed stdin blob for the program under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialScript {
    text: String,
    commands: u64,
}

impl TrialScript {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Number of command lines.
    #[must_use]
    pub fn commands(&self) -> u64 {
        self.commands
    }

    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_script_shape() {
        let plan = TrialPlan::new(ElementSet::default(), 3).unwrap();
        let script = plan.script();
        assert_eq!(
            script.as_str(),
            "new\nit 1\nit 2\nit 3\nit 4\nshuffle\nshuffle\nshuffle\nfree\nquit\n"
        );
        assert_eq!(script.commands(), 10);
        assert_eq!(script.as_str().lines().count() as u64, script.commands());
    }

    #[test]
    fn shuffle_count_matches_trials_exactly() {
        let plan = TrialPlan::new(ElementSet::new(["a", "b"]).unwrap(), 10_000).unwrap();
        let script = plan.script();
        let shuffles = script.as_str().lines().filter(|l| *l == CMD_SHUFFLE).count();
        assert_eq!(shuffles, 10_000);
        assert!(script.as_str().ends_with("free\nquit\n"));
        assert!(script.as_str().starts_with("new\nit a\nit b\nshuffle\n"));
    }

    #[test]
    fn zero_trials_rejected() {
        let err = TrialPlan::new(ElementSet::default(), 0).unwrap_err();
        assert_eq!(err.code(), "SUV-1101");
    }

    #[test]
    fn huge_trial_counts_do_not_overflow_sizing() {
        let plan = TrialPlan::new(ElementSet::default(), u64::MAX).unwrap();
        assert_eq!(plan.capacity_hint(), MAX_PREALLOC);
        assert_eq!(plan.command_count(), u64::MAX);

        let small = TrialPlan::new(ElementSet::default(), 3).unwrap();
        assert_eq!(small.capacity_hint(), 3 * 8 + 64);
        assert_eq!(small.command_count(), small.script().commands());
    }

    #[test]
    fn script_is_deterministic() {
        let plan = TrialPlan::new(ElementSet::default(), 50).unwrap();
        assert_eq!(plan.script(), plan.script());
    }
}
