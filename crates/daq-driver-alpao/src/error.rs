//! Error types and the error channel for ALPAO operations.
//!
//! Every failure reported by the ASDK layer is surfaced together with the
//! record popped from the SDK's error stack. If that pop fails the error
//! carries [`ErrorDetail::Unavailable`] instead of a second error.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use crate::native::NativeApi;

/// Result type alias for ALPAO operations.
pub type Result<T> = std::result::Result<T, AlpaoError>;

/// One `(code, message)` record popped from the ASDK error stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// SDK error number (0 means "no error")
    pub code: u32,
    /// SDK error text, truncated to the query buffer capacity
    pub message: String,
}

impl ErrorRecord {
    /// Create a record from its parts.
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// True when the SDK reported an actual error rather than an empty stack.
    pub fn is_error(&self) -> bool {
        self.code != 0
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Detail attached to an error surfaced from the native layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDetail {
    /// Record popped from the ASDK error stack
    Native(ErrorRecord),
    /// The error stack could not be queried
    Unavailable,
}

impl ErrorDetail {
    /// Pop the most recent record from the native error stack.
    ///
    /// Never fails: a broken error query degrades to [`ErrorDetail::Unavailable`].
    pub fn pop<A: NativeApi>(api: &A) -> Self {
        match pop_last_error(api) {
            Ok(record) => Self::Native(record),
            Err(_) => {
                warn!("ASDK error query failed; surfacing error without detail");
                Self::Unavailable
            }
        }
    }

    /// The popped record, if one was available.
    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            Self::Native(record) => Some(record),
            Self::Unavailable => None,
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(record) => write!(f, "{}", record),
            Self::Unavailable => write!(f, "failed to retrieve error detail"),
        }
    }
}

/// Direction of a parameter round-trip, for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterOperation {
    /// Read through the numeric get entry point
    Get,
    /// Write through a set entry point
    Set,
}

impl fmt::Display for ParameterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::Set => write!(f, "set"),
        }
    }
}

/// Errors that can occur when working with an ALPAO deformable mirror.
#[derive(Error, Debug)]
pub enum AlpaoError {
    /// Mirror could not be reached or initialized
    #[error("Failed to open deformable mirror '{identifier}': {detail}")]
    Open {
        /// Identifier the mirror was opened with
        identifier: String,
        /// Record popped from the SDK error stack
        detail: ErrorDetail,
    },

    /// Mirror reported an actuator count that cannot size a command buffer
    #[error("Deformable mirror '{identifier}' reported invalid actuator count {value}")]
    InvalidActuatorCount {
        /// Identifier the mirror was opened with
        identifier: String,
        /// Raw `NbOfActuator` value
        value: f64,
    },

    /// Releasing the native handle failed
    #[error("Failed to release deformable mirror '{identifier}': {detail}")]
    Release {
        /// Identifier the mirror was opened with
        identifier: String,
        /// Record popped from the SDK error stack
        detail: ErrorDetail,
    },

    /// Native reset failed
    #[error("Failed to reset deformable mirror '{identifier}': {detail}")]
    Reset {
        /// Identifier the mirror was opened with
        identifier: String,
        /// Record popped from the SDK error stack
        detail: ErrorDetail,
    },

    /// Native stop failed
    #[error("Failed to stop deformable mirror '{identifier}': {detail}")]
    Stop {
        /// Identifier the mirror was opened with
        identifier: String,
        /// Record popped from the SDK error stack
        detail: ErrorDetail,
    },

    /// Native send failed
    #[error("Failed to send command to deformable mirror '{identifier}': {detail}")]
    Send {
        /// Identifier the mirror was opened with
        identifier: String,
        /// Record popped from the SDK error stack
        detail: ErrorDetail,
    },

    /// Parameter get/set failed
    #[error("Failed to {operation} parameter '{key}': {detail}")]
    Parameter {
        /// Parameter key as passed to the SDK
        key: String,
        /// Whether the failing call was a get or a set
        operation: ParameterOperation,
        /// Record popped from the SDK error stack
        detail: ErrorDetail,
    },

    /// Parameter value read back does not fit the typed accessor
    #[error("Parameter '{key}' has unexpected value {value}")]
    UnexpectedValue {
        /// Parameter key
        key: String,
        /// Raw value reported by the SDK
        value: f64,
    },

    /// The SDK could not report its own last error
    #[error("Failed to query last error from the ASDK layer")]
    ErrorQuery,

    /// Command length does not match the actuator count
    #[error("Command has {actual} values, mirror has {expected} actuators")]
    Dimension {
        /// Actuator count of the mirror
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// Pattern buffer is not a whole number of actuator frames
    #[error("Pattern buffer has {actual} values, not a positive multiple of {n_actuators} actuators")]
    PatternDimension {
        /// Actuator count of the mirror
        n_actuators: usize,
        /// Length of the pattern buffer
        actual: usize,
    },

    /// Operation attempted after the mirror was closed
    #[error("Deformable mirror '{identifier}' is closed")]
    DeviceClosed {
        /// Identifier the mirror was opened with
        identifier: String,
    },

    /// String cannot be passed across the C boundary
    #[error("Invalid {what}: {value:?}")]
    InvalidString {
        /// What the string was meant to be
        what: &'static str,
        /// The rejected string
        value: String,
    },

    /// Switching to the configuration directory for open failed
    #[error("Cannot change working directory to '{}': {source}", .path.display())]
    WorkingDirectory {
        /// Directory that could not be entered
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be read or parsed
    #[error("Invalid configuration: {message}")]
    Config {
        /// Parser or I/O error text
        message: String,
    },
}

impl AlpaoError {
    /// Check if this is a command-length error (programmer error, no native call made).
    pub fn is_dimension_error(&self) -> bool {
        matches!(self, Self::Dimension { .. } | Self::PatternDimension { .. })
    }

    /// Check if this error was raised because the mirror is already closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::DeviceClosed { .. })
    }

    /// Native detail carried by this error, if any.
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            Self::Open { detail, .. }
            | Self::Release { detail, .. }
            | Self::Reset { detail, .. }
            | Self::Stop { detail, .. }
            | Self::Send { detail, .. }
            | Self::Parameter { detail, .. } => Some(detail),
            _ => None,
        }
    }

    /// SDK error code carried by this error, if a record was popped.
    pub fn native_code(&self) -> Option<u32> {
        self.detail()
            .and_then(ErrorDetail::record)
            .map(|record| record.code)
    }
}

/// Pop one record from the native error stack.
///
/// Fails with [`AlpaoError::ErrorQuery`] if the SDK cannot report an error at all.
pub fn pop_last_error<A: NativeApi>(api: &A) -> Result<ErrorRecord> {
    api.last_error().ok_or(AlpaoError::ErrorQuery)
}

/// Ask the SDK to print its last error on its diagnostic stream.
pub fn print_last_error<A: NativeApi>(api: &A) {
    api.print_last_error();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSdk;

    #[test]
    fn test_error_display() {
        let err = AlpaoError::Dimension {
            expected: 97,
            actual: 3,
        };
        assert!(err.to_string().contains("97"));
        assert!(err.to_string().contains('3'));
        assert!(err.is_dimension_error());
    }

    #[test]
    fn test_unavailable_detail_message() {
        let err = AlpaoError::Send {
            identifier: "BOL143".to_string(),
            detail: ErrorDetail::Unavailable,
        };
        assert!(err.to_string().contains("failed to retrieve error detail"));
        assert_eq!(err.native_code(), None);
    }

    #[test]
    fn test_native_code_from_record() {
        let err = AlpaoError::Parameter {
            key: "ItfState".to_string(),
            operation: ParameterOperation::Set,
            detail: ErrorDetail::Native(ErrorRecord::new(42, "read only")),
        };
        assert_eq!(err.native_code(), Some(42));
        assert_eq!(
            err.to_string(),
            "Failed to set parameter 'ItfState': read only (code 42)"
        );
    }

    #[test]
    fn test_pop_pops_one_record() {
        let sdk = MockSdk::new(97);
        sdk.push_error(ErrorRecord::new(1, "first"));
        sdk.push_error(ErrorRecord::new(2, "second"));

        assert_eq!(pop_last_error(&sdk).unwrap().code, 2);
        assert_eq!(pop_last_error(&sdk).unwrap().code, 1);
        assert!(!pop_last_error(&sdk).unwrap().is_error());
    }

    #[test]
    fn test_broken_error_query() {
        let sdk = MockSdk::new(97);
        sdk.break_error_query();

        assert!(matches!(pop_last_error(&sdk), Err(AlpaoError::ErrorQuery)));
        assert_eq!(ErrorDetail::pop(&sdk), ErrorDetail::Unavailable);
    }

    #[test]
    fn test_print_last_error_is_forwarded() {
        let sdk = MockSdk::new(97);
        print_last_error(&sdk);
        assert_eq!(sdk.printed_errors(), 1);
    }
}
