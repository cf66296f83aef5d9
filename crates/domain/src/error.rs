use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid driver configuration: {0}")]
    InvalidDriverConfig(String),

    #[error("Driver error: {0}")]
    DriverError(String),

    #[error("No completion handler registered; call init_async first")]
    HandlerMissing,

    #[error("Exchange cycle is running; stop it first")]
    CycleRunning,
}

/// Category of a failed exchange, shared by the blocking and event-driven paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeErrorKind {
    /// The meter answered with something other than the response marker
    Response,
    /// The stream ended before a complete message element arrived
    Truncated,
    /// The transport itself failed
    Io,
}

/// Why a request/response exchange did not produce a measurement.
///
/// Every variant is terminal for the attempt that produced it. Nothing in the
/// driver retries on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("Unexpected response marker: {found:#04x}")]
    UnexpectedResponse { found: u8 },

    #[error("Stream ended after {received} of {expected} bytes")]
    Truncated { expected: usize, received: usize },

    #[error("I/O failure: {kind}{}", os_error_suffix(.raw_os_error))]
    Io {
        kind: io::ErrorKind,
        raw_os_error: Option<i32>,
    },
}

impl ExchangeError {
    pub fn kind(&self) -> ExchangeErrorKind {
        match self {
            Self::UnexpectedResponse { .. } => ExchangeErrorKind::Response,
            Self::Truncated { .. } => ExchangeErrorKind::Truncated,
            Self::Io { .. } => ExchangeErrorKind::Io,
        }
    }

    /// Numeric code compatible with the classic C API (`1` response, `2` truncated, `3` system).
    /// `0` is reserved for success.
    pub fn code(&self) -> i32 {
        match self.kind() {
            ExchangeErrorKind::Response => 1,
            ExchangeErrorKind::Truncated => 2,
            ExchangeErrorKind::Io => 3,
        }
    }

    /// Platform error number, when the failure came from the operating system
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Io { raw_os_error, .. } => *raw_os_error,
            _ => None,
        }
    }
}

fn os_error_suffix(raw_os_error: &Option<i32>) -> String {
    match raw_os_error {
        Some(code) => format!(" (os error {})", code),
        None => String::new(),
    }
}

impl From<io::Error> for ExchangeError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            raw_os_error: err.raw_os_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_match_c_api() {
        assert_eq!(ExchangeError::UnexpectedResponse { found: 0 }.code(), 1);
        assert_eq!(
            ExchangeError::Truncated {
                expected: 20,
                received: 3
            }
            .code(),
            2
        );
        let io_err: ExchangeError = io::Error::from(io::ErrorKind::BrokenPipe).into();
        assert_eq!(io_err.code(), 3);
    }

    #[test]
    fn test_io_error_keeps_os_code() {
        let err: ExchangeError = io::Error::from_raw_os_error(5).into();
        assert_eq!(err.kind(), ExchangeErrorKind::Io);
        assert_eq!(err.raw_os_error(), Some(5));
    }

    #[test]
    fn test_non_io_errors_have_no_os_code() {
        let err = ExchangeError::UnexpectedResponse { found: 0x00 };
        assert_eq!(err.raw_os_error(), None);
        assert_eq!(err.to_string(), "Unexpected response marker: 0x00");
    }

    #[test]
    fn test_io_display_includes_os_code() {
        let err: ExchangeError = io::Error::from_raw_os_error(5).into();
        assert!(err.to_string().ends_with("(os error 5)"));

        let err: ExchangeError = io::Error::from(io::ErrorKind::WouldBlock).into();
        assert!(!err.to_string().contains("os error"));
    }

    #[test]
    fn test_truncated_display() {
        let err = ExchangeError::Truncated {
            expected: 20,
            received: 10,
        };
        assert_eq!(err.to_string(), "Stream ended after 10 of 20 bytes");
        assert_eq!(err.kind(), ExchangeErrorKind::Truncated);
    }
}
