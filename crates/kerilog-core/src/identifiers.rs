//! Identifier and digest newtypes
//!
//! All three types wrap the qb64 text-domain form verbatim: the code
//! character(s) stay attached so a value can be re-emitted byte-identically.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::KerilogError;

/// Identifier prefix (AID) controlling a key event log
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Prefix(String);

impl Prefix {
    /// Wrap a qb64 prefix
    pub fn new(qb64: impl Into<String>) -> Self {
        Self(qb64.into())
    }

    /// The qb64 text form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for prefixes that can never rotate (non-transferable code)
    pub fn is_nontransferable(&self) -> bool {
        self.0.starts_with('B')
    }

    /// Truncated display form
    pub fn short(&self) -> String {
        if self.0.len() > 16 {
            format!("{}...", &self.0[..16])
        } else {
            self.0.clone()
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Prefix {
    type Err = KerilogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KerilogError::internal("empty identifier prefix"));
        }
        Ok(Self(s.to_string()))
    }
}

/// Self-addressing digest (SAID) in qb64 form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelfAddress(String);

impl SelfAddress {
    /// Wrap a qb64 digest
    pub fn new(qb64: impl Into<String>) -> Self {
        Self(qb64.into())
    }

    /// The qb64 text form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The one-character digest code (`E` = Blake3-256, `I` = SHA2-256, ...)
    pub fn code(&self) -> Option<char> {
        self.0.chars().next()
    }

    /// Truncated display form
    pub fn short(&self) -> String {
        if self.0.len() > 12 {
            format!("{}...", &self.0[..12])
        } else {
            self.0.clone()
        }
    }
}

impl fmt::Display for SelfAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signing public key in qb64 form (`D`-coded Ed25519 for every fixture
/// this crate ships, other codes tolerated for display)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(String);

impl PublicKey {
    /// Wrap a qb64 verifying key
    pub fn new(qb64: impl Into<String>) -> Self {
        Self(qb64.into())
    }

    /// The qb64 text form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_forms_truncate() {
        let prefix = Prefix::new("EIaGMMWJFPmtXznY1IIiKDIrg-vIyge6mBl2QV8dDjI3");
        assert_eq!(prefix.short(), "EIaGMMWJFPmtXznY...");
        let said = SelfAddress::new("EIaGMMWJFPmtXznY1IIiKDIrg-vIyge6mBl2QV8dDjI3");
        assert_eq!(said.short(), "EIaGMMWJFPmt...");
    }

    #[test]
    fn short_prefix_passes_through() {
        assert_eq!(Prefix::new("Eshort").short(), "Eshort");
    }

    #[test]
    fn nontransferable_code_detected() {
        assert!(Prefix::new("BPmtXznY1IIiKDIrg").is_nontransferable());
        assert!(!Prefix::new("EIaGMMWJFPmtXznY1").is_nontransferable());
    }
}
