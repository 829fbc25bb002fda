//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SuvError};
use crate::stats::chi_squared::ExpectationMode;
use crate::stats::permutation::ElementSet;

/// Lowest `-v` level at which the program dumps the list after each command.
pub const MIN_DUMP_VERBOSITY: u8 = 3;

/// Full validator configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub program: ProgramConfig,
    pub trial: TrialConfig,
    pub session: SessionConfig,
    pub evaluation: EvaluationConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
}

/// The external program under test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProgramConfig {
    pub path: PathBuf,
    /// Passed as `-v <verbosity>`; at least [`MIN_DUMP_VERBOSITY`].
    pub verbosity: u8,
}

/// What to shuffle and how often.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrialConfig {
    pub elements: ElementSet,
    pub count: u64,
}

/// Subprocess limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub timeout_secs: u64,
    pub allow_nonzero_exit: bool,
    /// Keep a copy of the raw transcript here when set.
    pub save_transcript: Option<PathBuf>,
}

/// Goodness-of-fit knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluationConfig {
    pub expectation: ExpectationMode,
    /// Caller-chosen pass threshold on the raw statistic. No verdict is
    /// produced when unset.
    pub max_statistic: Option<f64>,
}

/// Event log controls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub jsonl_enabled: bool,
}

/// Filesystem paths used by shufv.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./qtest"),
            verbosity: MIN_DUMP_VERBOSITY,
        }
    }
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            elements: ElementSet::default(),
            count: 1_000_000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            allow_nonzero_exit: false,
            save_transcript: None,
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            expectation: ExpectationMode::Exact,
            max_statistic: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            jsonl_enabled: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[SUV-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("shufv").join("config.toml"),
            jsonl_log: home_dir
                .join(".local")
                .join("share")
                .join("shufv")
                .join("runs.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| SuvError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(SuvError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the event log.
    ///
    /// FNV-1a over canonical JSON, stable across processes and releases.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // program
        if let Some(raw) = lookup("SUV_PROGRAM_PATH") {
            self.program.path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("SUV_PROGRAM_VERBOSITY") {
            self.program.verbosity = parse_env("SUV_PROGRAM_VERBOSITY", &raw)?;
        }

        // trial
        if let Some(raw) = lookup("SUV_TRIAL_COUNT") {
            self.trial.count = parse_env("SUV_TRIAL_COUNT", &raw)?;
        }
        if let Some(raw) = lookup("SUV_TRIAL_ELEMENTS") {
            self.trial.elements =
                ElementSet::parse_list(&raw).map_err(|error| SuvError::ConfigParse {
                    context: "env",
                    details: format!("SUV_TRIAL_ELEMENTS={raw:?}: {error}"),
                })?;
        }

        // session
        if let Some(raw) = lookup("SUV_SESSION_TIMEOUT_SECS") {
            self.session.timeout_secs = parse_env("SUV_SESSION_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("SUV_SESSION_ALLOW_NONZERO_EXIT") {
            self.session.allow_nonzero_exit = parse_env("SUV_SESSION_ALLOW_NONZERO_EXIT", &raw)?;
        }
        if let Some(raw) = lookup("SUV_SESSION_SAVE_TRANSCRIPT") {
            self.session.save_transcript = Some(PathBuf::from(raw));
        }

        // evaluation
        if let Some(raw) = lookup("SUV_EVALUATION_EXPECTATION") {
            self.evaluation.expectation = parse_env("SUV_EVALUATION_EXPECTATION", &raw)?;
        }
        if let Some(raw) = lookup("SUV_EVALUATION_MAX_STATISTIC") {
            self.evaluation.max_statistic = Some(parse_env("SUV_EVALUATION_MAX_STATISTIC", &raw)?);
        }

        // logging
        if let Some(raw) = lookup("SUV_LOG_JSONL_ENABLED") {
            self.logging.jsonl_enabled = parse_env("SUV_LOG_JSONL_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("SUV_LOG_JSONL_PATH") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }

        Ok(())
    }

    /// Check cross-field constraints. Called by [`Config::load`]; call again
    /// after applying CLI overrides.
    pub fn validate(&self) -> Result<()> {
        if self.program.path.as_os_str().is_empty() {
            return Err(SuvError::InvalidConfig {
                details: "program.path must not be empty".to_string(),
            });
        }
        if self.program.verbosity < MIN_DUMP_VERBOSITY {
            return Err(SuvError::InvalidConfig {
                details: format!(
                    "program.verbosity must be >= {MIN_DUMP_VERBOSITY} for list dumps to appear (got {})",
                    self.program.verbosity
                ),
            });
        }

        if self.trial.count == 0 {
            return Err(SuvError::InvalidConfig {
                details: "trial.count must be > 0".to_string(),
            });
        }

        let classes = self.trial.elements.permutation_count() as u64;
        if self.evaluation.expectation == ExpectationMode::Floor && self.trial.count < classes {
            return Err(SuvError::InvalidConfig {
                details: format!(
                    "trial.count ({}) must be >= {classes} permutations under floor expectation",
                    self.trial.count
                ),
            });
        }

        if self.session.timeout_secs == 0 {
            return Err(SuvError::InvalidConfig {
                details: "session.timeout_secs must be > 0".to_string(),
            });
        }

        if let Some(max) = self.evaluation.max_statistic
            && !(max.is_finite() && max >= 0.0)
        {
            return Err(SuvError::InvalidConfig {
                details: format!("evaluation.max_statistic must be finite and >= 0, got {max}"),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| SuvError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
