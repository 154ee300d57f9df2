//! Filter errors

/// Query-level failure, surfaced to the caller immediately so the prior
/// filtered view can stay on screen
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// The filter string does not parse
    #[error("invalid filter syntax at position {position}: {message}")]
    InvalidFilterSyntax {
        /// What went wrong
        message: String,
        /// Byte position of the offending token
        position: usize,
    },
}

impl FilterError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self::InvalidFilterSyntax {
            message: message.into(),
            position,
        }
    }

    /// Byte position of the offending token
    pub fn position(&self) -> usize {
        match self {
            Self::InvalidFilterSyntax { position, .. } => *position,
        }
    }
}
