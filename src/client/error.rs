// ABOUTME: Engine-level error taxonomy: local validation, transport, protocol and decode failures
// ABOUTME: Provides structured error reporting with automatic conversion from I/O and codec errors

use crate::client::state::SessionState;
use crate::codec::CodecError;
use crate::datatypes::describe_status;
use std::io;
use thiserror::Error;

/// Errors surfaced by [`SmppEngine`](crate::client::SmppEngine) operations.
///
/// Validation errors (`NotAuthorized`, `FieldTooLong`, `InvalidOptions`) are
/// raised before anything is written and never consume a sequence number.
#[derive(Debug, Error)]
pub enum SmppError {
    /// Operation not permitted in the current session state
    #[error("{operation} not permitted while {state}")]
    NotAuthorized {
        operation: &'static str,
        state: SessionState,
    },

    /// A field exceeds its protocol limit
    #[error("{field} is {actual} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Option values outside their protocol range
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// No resolved address for the SMSC accepted a connection
    #[error("Connect to {host}:{port} failed: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// I/O error on an established connection
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// Connection closed by the peer or torn down locally
    #[error("Connection closed")]
    ConnectionClosed,

    /// Non-OK command_status in a response
    #[error("Protocol error on {command_id:#010x}: {}", status_text(.status))]
    Protocol { command_id: u32, status: u32 },

    /// The SMSC refused the bind
    #[error("Bind rejected: {}", status_text(.status))]
    BindRejected { status: u32 },

    /// Wire encoding or decoding failed
    #[error("Codec error: {0}")]
    Codec(CodecError),

    /// Operation timeout
    #[error("Operation timeout")]
    Timeout,

    /// No pending request under this sequence number
    #[error("No pending request for sequence {sequence}")]
    NotFound { sequence: u32 },
}

fn status_text(status: &u32) -> String {
    describe_status(*status)
}

/// Result type alias for SMPP operations
pub type SmppResult<T> = Result<T, SmppError>;

impl From<CodecError> for SmppError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::FieldTooLong { field, max, actual } => {
                SmppError::FieldTooLong { field, max, actual }
            }
            other => SmppError::Codec(other),
        }
    }
}

impl SmppError {
    /// Transport-level failures that leave the session unusable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SmppError::Connection(_) | SmppError::ConnectionClosed | SmppError::ConnectFailed { .. }
        )
    }

    /// Failures that say nothing about the message itself: the same request
    /// may succeed on another attempt or another SMSC.
    pub fn is_retryable(&self) -> bool {
        self.is_transport() || matches!(self, SmppError::NotAuthorized { .. } | SmppError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_length_errors_become_field_too_long() {
        let err: SmppError = CodecError::FieldTooLong {
            field: "password",
            max: 8,
            actual: 9,
        }
        .into();
        assert!(matches!(err, SmppError::FieldTooLong { field: "password", .. }));

        let err: SmppError = CodecError::Incomplete.into();
        assert!(matches!(err, SmppError::Codec(CodecError::Incomplete)));
    }

    #[test]
    fn only_link_failures_are_retryable() {
        assert!(SmppError::ConnectionClosed.is_retryable());
        assert!(SmppError::Timeout.is_retryable());
        assert!(
            SmppError::NotAuthorized {
                operation: "submit_sm",
                state: SessionState::Connected
            }
            .is_retryable()
        );

        let nul_in_address: SmppError = CodecError::FieldValidation {
            field: "destination_addr",
            reason: "contains NUL".to_string(),
        }
        .into();
        assert!(!nul_in_address.is_retryable());
        assert!(!SmppError::InvalidOptions("bad".to_string()).is_retryable());
    }

    #[test]
    fn protocol_error_names_status() {
        let err = SmppError::BindRejected { status: 0x0E };
        assert_eq!(err.to_string(), "Bind rejected: ESME_RINVPASWD (0x0000000E)");
    }
}
