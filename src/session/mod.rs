//! Session runner: launch preflight and single-process transcript capture.

pub mod program;
pub mod runner;
