//! Permutation space, frequency tally, and the chi-squared evaluator.

pub mod chi_squared;
pub mod frequency;
pub mod permutation;
