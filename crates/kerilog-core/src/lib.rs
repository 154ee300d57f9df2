//! Kerilog core: shared types for key event log parsing
//!
//! This crate defines the data model the rest of the workspace operates on:
//!
//! - **Identifiers**: qb64 newtypes for prefixes, self-addressing digests,
//!   and public keys
//! - **Events**: the decoded [`KeyEvent`] with kinds, thresholds, seals, and
//!   attached signatures
//! - **Key state**: the per-identifier [`KeyState`] snapshot, functionally
//!   updated during replay
//! - **Diagnostics**: the accept-but-annotate [`Diagnostic`] record and the
//!   hard [`KerilogError`] for streams that cannot be read at all

pub mod diagnostic;
pub mod errors;
pub mod event;
pub mod identifiers;
pub mod state;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use errors::{KerilogError, Result};
pub use event::{EventKind, IndexedSignature, KeyEvent, Seal, Threshold, Weight};
pub use identifiers::{Prefix, PublicKey, SelfAddress};
pub use state::KeyState;
