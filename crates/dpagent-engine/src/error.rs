//! Engine error types and reply status handling.
//!
//! Every engine reply carries a signed `retval`; zero means success. This
//! module turns non-zero values into [`EngineError`]s.

use std::fmt;
use thiserror::Error;

/// Reply status codes reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineStatus {
    Success,
    Unspecified,
    InvalidSwIfIndex,
    NoSuchFib,
    NoSuchEntry,
    InvalidValue,
    Unimplemented,
    /// Any code without a dedicated variant
    Unknown,
}

impl EngineStatus {
    /// Creates a status from a raw reply `retval`.
    pub fn from_retval(retval: i32) -> Self {
        match retval {
            0 => EngineStatus::Success,
            -1 => EngineStatus::Unspecified,
            -2 => EngineStatus::InvalidSwIfIndex,
            -3 => EngineStatus::NoSuchFib,
            -6 => EngineStatus::NoSuchEntry,
            -7 => EngineStatus::InvalidValue,
            -9 => EngineStatus::Unimplemented,
            _ => EngineStatus::Unknown,
        }
    }

    /// Returns the canonical `retval` for this status.
    pub fn retval(&self) -> i32 {
        match self {
            EngineStatus::Success => 0,
            EngineStatus::Unspecified | EngineStatus::Unknown => -1,
            EngineStatus::InvalidSwIfIndex => -2,
            EngineStatus::NoSuchFib => -3,
            EngineStatus::NoSuchEntry => -6,
            EngineStatus::InvalidValue => -7,
            EngineStatus::Unimplemented => -9,
        }
    }

    /// Returns true if the status indicates success.
    pub fn is_success(&self) -> bool {
        *self == EngineStatus::Success
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineStatus::Success => "success",
            EngineStatus::Unspecified => "unspecified error",
            EngineStatus::InvalidSwIfIndex => "invalid sw_if_index",
            EngineStatus::NoSuchFib => "no such FIB",
            EngineStatus::NoSuchEntry => "no such entry",
            EngineStatus::InvalidValue => "invalid value",
            EngineStatus::Unimplemented => "unimplemented",
            EngineStatus::Unknown => "unknown error",
        };
        f.write_str(s)
    }
}

/// Error type for engine calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine replied with a non-zero status.
    #[error("engine returned {status} (retval {retval})")]
    Status { status: EngineStatus, retval: i32 },

    /// The channel failed to deliver the request or the reply.
    #[error("channel failure: {message}")]
    Transport { message: String },

    /// The reply does not belong to the request.
    #[error("unexpected reply: expected {expected}, received {received}")]
    UnexpectedReply {
        expected: &'static str,
        received: String,
    },
}

impl EngineError {
    /// Creates an error from a raw non-zero `retval`.
    pub fn from_retval(retval: i32) -> Self {
        EngineError::Status {
            status: EngineStatus::from_retval(retval),
            retval,
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        EngineError::Transport {
            message: message.into(),
        }
    }

    /// Returns the engine status if this is a Status error.
    pub fn status(&self) -> Option<EngineStatus> {
        match self {
            EngineError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Converts a raw reply `retval` into a result.
pub fn check_retval(retval: i32) -> EngineResult<()> {
    if retval == 0 {
        Ok(())
    } else {
        Err(EngineError::from_retval(retval))
    }
}
