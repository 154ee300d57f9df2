//! Log model and pipeline glue
//!
//! Wires the tokenizer, decoder, and chain validator into one call and
//! exposes the result as plain structured data:
//!
//! - [`KeyEventLog`]: ordered validated events, diagnostics, final key
//!   state, filter evaluation
//! - [`ParseCache`]: read-through cache keyed by content hash for repeated
//!   uploads of identical bytes
//! - [`ByteSource`]/[`FileSource`]/[`MemorySource`]: where bytes come from
//!   (network fetch stays outside the core)

pub mod cache;
pub mod model;
pub mod source;

pub use cache::ParseCache;
pub use model::{EventRecord, KeyEventLog, LogEntry, LogSummary};
pub use source::{ByteSource, FileSource, MemorySource};
