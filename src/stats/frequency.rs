//! Per-permutation observation counts.

use crate::core::errors::{Result, SuvError};
use crate::stats::permutation::{Permutation, PermutationSpace};

/// Observed count for every member of a permutation space, zero included.
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    space: PermutationSpace,
    counts: Vec<u64>,
    total: u64,
}

impl FrequencyTable {
    /// All-zero table over `space`.
    #[must_use]
    pub fn empty(space: PermutationSpace) -> Self {
        let counts = vec![0; space.len()];
        Self {
            space,
            counts,
            total: 0,
        }
    }

    /// Count `observations` against `space`.
    ///
    /// An observation that is not a member of the space aborts the tally:
    /// it means the parser or the program under test is broken, and filing it
    /// under some other class would corrupt the statistic.
    pub fn tally(space: &PermutationSpace, observations: &[Permutation]) -> Result<Self> {
        let mut table = Self::empty(space.clone());
        for (index, observation) in observations.iter().enumerate() {
            let Some(slot) = table.space.position(observation) else {
                return Err(SuvError::Integrity {
                    index,
                    observation: observation.tokens().join(" "),
                });
            };
            table.counts[slot] += 1;
            table.total += 1;
        }
        Ok(table)
    }

    #[must_use]
    pub fn space(&self) -> &PermutationSpace {
        &self.space
    }

    /// Counts in enumeration order.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of observations tallied.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn count_of(&self, permutation: &Permutation) -> Option<u64> {
        self.space.position(permutation).map(|i| self.counts[i])
    }

    /// `(permutation, count)` pairs in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Permutation, u64)> {
        self.space
            .members()
            .iter()
            .zip(self.counts.iter().copied())
    }
}
