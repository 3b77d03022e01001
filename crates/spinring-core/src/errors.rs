//! Structured error types shared across spinring crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code, message and context carried by every [`SpinError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Kebab-case code, stable across releases.
    pub code: String,
    /// What went wrong, in prose.
    pub message: String,
    /// Particle id, element name, position and similar context.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// What the caller can change to avoid the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Records the particle the failure belongs to.
    pub fn with_particle(self, particle: u32) -> Self {
        self.with_context("particle", particle)
    }

    /// Sets a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the spinring engine.
///
/// `Config` and `Aggregation` errors abort a run. `Particle` errors are caught
/// at the task boundary and recorded in the scheduler's error ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum SpinError {
    /// Invalid or incomplete configuration detected before a run starts.
    #[error("configuration: {0}")]
    Config(ErrorInfo),
    /// Failure confined to a single particle simulation.
    #[error("particle: {0}")]
    Particle(ErrorInfo),
    /// Failure while reducing per-particle results.
    #[error("aggregation: {0}")]
    Aggregation(ErrorInfo),
    /// Resonance strength cache misuse.
    #[error("resonance cache: {0}")]
    Cache(ErrorInfo),
    /// Worker pool construction failures.
    #[error("scheduler: {0}")]
    Scheduler(ErrorInfo),
    /// File system errors in adapters and output sinks.
    #[error("io: {0}")]
    Io(ErrorInfo),
    /// Table or document (de)serialization failed.
    #[error("serialization: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    /// Renders `code: message [key=value, ...] (hint: ...)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        let mut entries = self.context.iter();
        if let Some((key, value)) = entries.next() {
            write!(f, " [{key}={value}")?;
            for (key, value) in entries {
                write!(f, ", {key}={value}")?;
            }
            f.write_str("]")?;
        }
        match &self.hint {
            Some(hint) => write!(f, " (hint: {hint})"),
            None => Ok(()),
        }
    }
}

impl SpinError {
    /// Shorthand for a [`SpinError::Config`] without context.
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        SpinError::Config(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`SpinError::Particle`] without context.
    pub fn particle(code: impl Into<String>, message: impl Into<String>) -> Self {
        SpinError::Particle(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`SpinError::Aggregation`] without context.
    pub fn aggregation(code: impl Into<String>, message: impl Into<String>) -> Self {
        SpinError::Aggregation(ErrorInfo::new(code, message))
    }

    /// Payload shared by every family.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SpinError::Config(info)
            | SpinError::Particle(info)
            | SpinError::Aggregation(info)
            | SpinError::Cache(info)
            | SpinError::Scheduler(info)
            | SpinError::Io(info)
            | SpinError::Serde(info) => info,
        }
    }

    /// Returns true for errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SpinError::Particle(_))
    }
}
