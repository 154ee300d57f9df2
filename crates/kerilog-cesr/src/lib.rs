//! CESR text-domain tokenizer and key event decoder
//!
//! Turns a raw composable-encoding stream into typed events:
//!
//! - [`tokenize`]: splits the stream into self-framing primitives, tracking
//!   counter group scopes so attachments never bleed into the next event
//! - [`decode`]: walks bodies and attachments, producing [`DecodedEvent`]s
//!   with structural diagnostics attached
//! - [`encode`]: the inverse, used to compose fixtures and to prove framing
//!   round-trips
//! - [`said`]: self-addressing digest computation and verification
//!
//! Nothing here knows about key state; chain validation lives downstream in
//! `kerilog-validate`.

pub mod decode;
pub mod encode;
pub mod primitive;
pub mod qb64;
pub mod said;
pub mod tokenize;
pub mod version;

pub use decode::{decode_stream, decode_str, DecodeOutcome, DecodedEvent};
pub use encode::{BuiltEvent, EventBuilder};
pub use primitive::{CounterCode, IndexCode, MatterCode, Primitive, PrimitiveValue};
pub use tokenize::Tokenizer;
pub use version::{SerialKind, VersionInfo};
