#![forbid(unsafe_code)]

//! Shuffle-uniformity validator: drives a queue program through a scripted
//! session and checks whether its `shuffle` is fair.
//!
//! Pipeline:
//! 1. **Script**: `new`, seed the baseline with `it`, N × `shuffle`, `free`, `quit`
//! 2. **Session**: one `<program> -v 3` subprocess, stdout captured in full
//! 3. **Transcript**: list dumps between the seed and teardown markers
//! 4. **Stats**: per-permutation counts and Pearson's chi-squared statistic
//!
//! # Library usage
//!
//! ```rust,no_run
//! use shuffle_uniformity::prelude::*;
//!
//! let config = Config::load(None)?;
//! let session = ProcessSession::from_config(&config)?;
//! let report = run_validation(&config, &session, &mut JsonlWriter::disabled())?;
//! println!("chi2 = {:.3} (df {})", report.evaluation.statistic, report.evaluation.degrees_of_freedom);
//! # Ok::<(), SuvError>(())
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod pipeline;
pub mod script;
pub mod session;
pub mod stats;
pub mod transcript;
