//! The error taxonomy surfaced by every core component.
//!
//! `LaneError` is deliberately a flat enum rather than a tree of per-module
//! error types: the dispatcher needs to pattern-match on `kind()` to decide
//! how a failure is reported to the executor, and a single type makes that
//! match exhaustive instead of hoping every subsystem's error converts the
//! same way.

use std::fmt;

/// One of the seven failure kinds the core ever surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Schema,
    Reference,
    Argument,
    Terminal,
    NotStarted,
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::Schema => "schema",
            ErrorKind::Reference => "reference",
            ErrorKind::Argument => "argument",
            ErrorKind::Terminal => "terminal",
            ErrorKind::NotStarted => "not_started",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct LaneError {
    pub kind: ErrorKind,
    pub message: String,
}

impl LaneError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, message)
    }

    pub fn reference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Reference, message)
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Argument, message)
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Terminal, message)
    }

    pub fn not_started(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotStarted, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<std::io::Error> for LaneError {
    fn from(err: std::io::Error) -> Self {
        LaneError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for LaneError {
    fn from(err: serde_yaml::Error) -> Self {
        LaneError::parse(err.to_string())
    }
}

impl From<serde_json::Error> for LaneError {
    fn from(err: serde_json::Error) -> Self {
        LaneError::parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_as_str_matches_taxonomy_names() {
        assert_eq!(ErrorKind::Parse.as_str(), "parse");
        assert_eq!(ErrorKind::Schema.as_str(), "schema");
        assert_eq!(ErrorKind::Reference.as_str(), "reference");
        assert_eq!(ErrorKind::Argument.as_str(), "argument");
        assert_eq!(ErrorKind::Terminal.as_str(), "terminal");
        assert_eq!(ErrorKind::NotStarted.as_str(), "not_started");
        assert_eq!(ErrorKind::Io.as_str(), "io");
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = LaneError::reference("unknown loop id 'impl'");
        assert_eq!(err.to_string(), "reference: unknown loop id 'impl'");
    }

    #[test]
    fn io_error_converts_with_io_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let lane_err: LaneError = io_err.into();
        assert_eq!(lane_err.kind(), ErrorKind::Io);
    }
}
