//! Structured run logging.

pub mod jsonl;
