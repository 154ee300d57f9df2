//! Unified error type for kerilog operations
//!
//! Hard failures only. Anything a malformed event can cause is reported as a
//! [`crate::Diagnostic`] instead, so one bad event never aborts a parse.

use serde::{Deserialize, Serialize};

/// Unified error type for kerilog operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum KerilogError {
    /// Fewer bytes remain in the stream than a primitive declared
    #[error("truncated stream at offset {offset}: {message}")]
    Truncated {
        /// What was being read when the stream ran out
        message: String,
        /// Byte offset of the primitive that could not be completed
        offset: usize,
    },

    /// A code prefix matched no entry of the primitive code table
    #[error("unknown code at offset {offset}: {message}")]
    UnknownCode {
        /// The unrecognized prefix
        message: String,
        /// Byte offset of the unrecognized code
        offset: usize,
    },

    /// A declared size did not match the bytes actually consumed
    #[error("framing mismatch at offset {offset}: {message}")]
    Framing {
        /// Declared vs consumed description
        message: String,
        /// Byte offset of the mis-framed unit
        offset: usize,
    },

    /// The stream could not be tokenized at all
    #[error("unreadable stream: {message}")]
    Unreadable {
        /// Why the first unit could not be recognized
        message: String,
    },

    /// Reading from a byte source failed
    #[error("source error: {message}")]
    Source {
        /// Description of the source failure
        message: String,
    },

    /// Internal invariant violation
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant
        message: String,
    },
}

impl KerilogError {
    /// Create a truncated-stream error
    pub fn truncated(message: impl Into<String>, offset: usize) -> Self {
        Self::Truncated {
            message: message.into(),
            offset,
        }
    }

    /// Create an unknown-code error
    pub fn unknown_code(message: impl Into<String>, offset: usize) -> Self {
        Self::UnknownCode {
            message: message.into(),
            offset,
        }
    }

    /// Create a framing-mismatch error
    pub fn framing(message: impl Into<String>, offset: usize) -> Self {
        Self::Framing {
            message: message.into(),
            offset,
        }
    }

    /// Create an unreadable-stream error
    pub fn unreadable(message: impl Into<String>) -> Self {
        Self::Unreadable {
            message: message.into(),
        }
    }

    /// Create a source error
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Byte offset the error points at, where one exists
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Truncated { offset, .. }
            | Self::UnknownCode { offset, .. }
            | Self::Framing { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/// Result alias used across the kerilog crates
pub type Result<T> = std::result::Result<T, KerilogError>;
