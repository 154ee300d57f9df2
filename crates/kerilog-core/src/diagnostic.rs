//! Per-event and stream-level diagnostics
//!
//! A [`Diagnostic`] annotates a decoded event without altering it. The
//! validator and decoder record diagnostics and keep going; only the
//! hard errors in [`crate::errors`] abort a parse.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How bad a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The event is untrustworthy as recorded
    Error,
    /// The event is acceptable but something about it deserves attention
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// Stable diagnostic codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// A kind-specific required field is absent or has the wrong shape
    MalformedEvent,
    /// Sequence number is not last accepted + 1
    SequenceGap,
    /// Prior digest does not match the last accepted event
    ChainFork,
    /// Attached signatures do not satisfy the current signing threshold
    ThresholdNotMet,
    /// A rotation's new keys are not covered by the prior next-key commitment
    CommitmentMismatch,
    /// A second inception for an identifier that already has one
    DuplicateInception,
    /// A well-formed counter group the decoder does not interpret
    UnknownAttachment,
    /// A receipt referencing a digest that does not match the accepted event
    ReceiptMismatch,
    /// The version string names a serialization other than JSON
    UnsupportedSerialization,
    /// A stream-level fault recovered by resyncing at the next event start
    StreamFault,
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MalformedEvent => "MalformedEvent",
            Self::SequenceGap => "SequenceGap",
            Self::ChainFork => "ChainFork",
            Self::ThresholdNotMet => "ThresholdNotMet",
            Self::CommitmentMismatch => "CommitmentMismatch",
            Self::DuplicateInception => "DuplicateInception",
            Self::UnknownAttachment => "UnknownAttachment",
            Self::ReceiptMismatch => "ReceiptMismatch",
            Self::UnsupportedSerialization => "UnsupportedSerialization",
            Self::StreamFault => "StreamFault",
        };
        write!(f, "{name}")
    }
}

/// One recorded observation about an event or the stream around it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity of the observation
    pub severity: Severity,
    /// Stable code for programmatic handling
    pub code: DiagnosticCode,
    /// Human-readable message
    pub message: String,
    /// Byte offset into the source stream
    pub offset: usize,
    /// Sequence number of the affected event, where one was decoded
    pub sn: Option<u64>,
}

impl Diagnostic {
    /// Record an error-severity diagnostic
    pub fn error(code: DiagnosticCode, message: impl Into<String>, offset: usize) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            offset,
            sn: None,
        }
    }

    /// Record a warning-severity diagnostic
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, offset: usize) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            offset,
            sn: None,
        }
    }

    /// Attach the sequence number of the affected event
    pub fn at_sn(mut self, sn: u64) -> Self {
        self.sn = Some(sn);
        self
    }

    /// True if this diagnostic is error severity
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sn {
            Some(sn) => write!(
                f,
                "{} {} (sn={}, offset={}): {}",
                self.severity, self.code, sn, self.offset, self.message
            ),
            None => write!(
                f,
                "{} {} (offset={}): {}",
                self.severity, self.code, self.offset, self.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_offset() {
        let diag = Diagnostic::error(DiagnosticCode::ChainFork, "prior digest mismatch", 120)
            .at_sn(3);
        let text = diag.to_string();
        assert!(text.contains("ChainFork"));
        assert!(text.contains("sn=3"));
        assert!(text.contains("offset=120"));
    }
}
