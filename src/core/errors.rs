//! SUV-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SuvError>;

/// Coarse failure class, used by the CLI and the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Launch,
    Session,
    Parse,
    Integrity,
    Io,
}

impl ErrorCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Launch => "launch",
            Self::Session => "session",
            Self::Parse => "parse",
            Self::Integrity => "integrity",
            Self::Io => "io",
        }
    }
}

/// Top-level error type for the shuffle-uniformity validator.
#[derive(Debug, Error)]
pub enum SuvError {
    #[error("[SUV-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SUV-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SUV-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SUV-1101] invalid trial plan: {details}")]
    InvalidTrialPlan { details: String },

    #[error("[SUV-2001] program not found: {path}")]
    ProgramNotFound { path: PathBuf },

    #[error("[SUV-2002] program is not executable: {path}")]
    ProgramNotExecutable { path: PathBuf },

    #[error("[SUV-2101] failed to spawn {program}: {source}")]
    SessionSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SUV-2102] session I/O failure on {stream}: {details}")]
    SessionIo {
        stream: &'static str,
        details: String,
    },

    #[error("[SUV-2103] session did not terminate within {timeout_secs}s; program killed")]
    SessionTimeout { timeout_secs: u64 },

    #[error("[SUV-2104] session crashed: {status}")]
    SessionCrashed { status: String },

    #[error("[SUV-2105] session exited with status {code}")]
    SessionExit { code: i32 },

    #[error("[SUV-3001] seed marker {marker:?} not found in transcript")]
    SeedMarkerMissing { marker: String },

    #[error("[SUV-3002] teardown marker {marker:?} not found after seed; session incomplete")]
    TeardownMarkerMissing { marker: String },

    #[error("[SUV-3003] no observations extracted from transcript")]
    NoObservations,

    #[error("[SUV-4001] observation #{index} ({observation}) is not a permutation of the element set")]
    Integrity { index: usize, observation: String },

    #[error(
        "[SUV-4002] {observed} observations cannot cover {classes} classes under floor expectation"
    )]
    InsufficientObservations { observed: u64, classes: usize },

    #[error("[SUV-5001] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SUV-5002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SuvError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SUV-1001",
            Self::MissingConfig { .. } => "SUV-1002",
            Self::ConfigParse { .. } => "SUV-1003",
            Self::InvalidTrialPlan { .. } => "SUV-1101",
            Self::ProgramNotFound { .. } => "SUV-2001",
            Self::ProgramNotExecutable { .. } => "SUV-2002",
            Self::SessionSpawn { .. } => "SUV-2101",
            Self::SessionIo { .. } => "SUV-2102",
            Self::SessionTimeout { .. } => "SUV-2103",
            Self::SessionCrashed { .. } => "SUV-2104",
            Self::SessionExit { .. } => "SUV-2105",
            Self::SeedMarkerMissing { .. } => "SUV-3001",
            Self::TeardownMarkerMissing { .. } => "SUV-3002",
            Self::NoObservations => "SUV-3003",
            Self::Integrity { .. } => "SUV-4001",
            Self::InsufficientObservations { .. } => "SUV-4002",
            Self::Serialization { .. } => "SUV-5001",
            Self::Io { .. } => "SUV-5002",
        }
    }

    /// Failure class. None of these are retried: a retry that happens to
    /// succeed would hide a biased shuffle.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig { .. }
            | Self::MissingConfig { .. }
            | Self::ConfigParse { .. }
            | Self::InvalidTrialPlan { .. } => ErrorCategory::Config,
            Self::ProgramNotFound { .. } | Self::ProgramNotExecutable { .. } => {
                ErrorCategory::Launch
            }
            Self::SessionSpawn { .. }
            | Self::SessionIo { .. }
            | Self::SessionTimeout { .. }
            | Self::SessionCrashed { .. }
            | Self::SessionExit { .. }
            | Self::TeardownMarkerMissing { .. } => ErrorCategory::Session,
            Self::SeedMarkerMissing { .. } | Self::NoObservations => ErrorCategory::Parse,
            Self::Integrity { .. } | Self::InsufficientObservations { .. } => {
                ErrorCategory::Integrity
            }
            Self::Serialization { .. } | Self::Io { .. } => ErrorCategory::Io,
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for SuvError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SuvError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
