//! Structured error types shared across the circular weighing crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`CwError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (scheme entry, run id, paths, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the circular weighing engine.
///
/// Gate closures, operator aborts and rejected runs are outcomes rather than
/// errors and never surface through this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum CwError {
    /// Invalid scheme, missing acceptance criteria or unknown equipment.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// Singular design matrix or inconsistent reading counts.
    #[error("numerical error: {0}")]
    Numerical(ErrorInfo),
    /// Document read, backup or write failures.
    #[error("persistence error: {0}")]
    Persistence(ErrorInfo),
    /// An operation was invoked on data that is not in the required state.
    #[error("precondition error: {0}")]
    Precondition(ErrorInfo),
    /// Failures reported by balance, loader or logger collaborators.
    #[error("instrument error: {0}")]
    Instrument(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl CwError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            CwError::Configuration(info)
            | CwError::Numerical(info)
            | CwError::Persistence(info)
            | CwError::Precondition(info)
            | CwError::Instrument(info)
            | CwError::Serde(info) => info,
        }
    }

    /// Adds a context entry, keeping the error family.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            CwError::Configuration(info) => CwError::Configuration(info.with_context(key, value)),
            CwError::Numerical(info) => CwError::Numerical(info.with_context(key, value)),
            CwError::Persistence(info) => CwError::Persistence(info.with_context(key, value)),
            CwError::Precondition(info) => CwError::Precondition(info.with_context(key, value)),
            CwError::Instrument(info) => CwError::Instrument(info.with_context(key, value)),
            CwError::Serde(info) => CwError::Serde(info.with_context(key, value)),
        }
    }

    /// Shorthand for a configuration error without context.
    pub fn configuration(code: &str, message: impl Into<String>) -> Self {
        CwError::Configuration(ErrorInfo::new(code, message))
    }

    /// Shorthand for a numerical error without context.
    pub fn numerical(code: &str, message: impl Into<String>) -> Self {
        CwError::Numerical(ErrorInfo::new(code, message))
    }

    /// Shorthand for a precondition error without context.
    pub fn precondition(code: &str, message: impl Into<String>) -> Self {
        CwError::Precondition(ErrorInfo::new(code, message))
    }

    /// Returns true for the configuration family.
    pub fn is_configuration(&self) -> bool {
        matches!(self, CwError::Configuration(_))
    }
}
