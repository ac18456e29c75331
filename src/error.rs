use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Why a snapshot fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Transport failure, timeout, or the body could not be read.
    Network,
    /// The provider answered with a non-success status.
    BadStatus,
    /// The body was not the expected market list.
    MalformedPayload,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::BadStatus => write!(f, "bad_status"),
            Self::MalformedPayload => write!(f, "malformed_payload"),
        }
    }
}

/// Failure of a single provider round trip. Shared by every caller that
/// joined the same attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Network, message)
    }

    pub fn bad_status(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::BadStatus, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::MalformedPayload, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("unknown instrument id: {0}")]
    UnknownId(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeriesError {
    #[error("instrument {id}: expected {expected} price samples, got {actual}")]
    WrongLength {
        id: String,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_display_carries_kind_and_message() {
        let err = FetchError::bad_status("HTTP 429 Too Many Requests");
        assert_eq!(err.to_string(), "bad_status: HTTP 429 Too Many Requests");
    }

    #[test]
    fn series_error_names_the_instrument() {
        let err = SeriesError::WrongLength {
            id: "btc".to_string(),
            expected: 169,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "instrument btc: expected 169 price samples, got 12"
        );
    }
}
