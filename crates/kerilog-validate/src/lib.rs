//! Chain validation for key event logs
//!
//! Replays a decoded event stream, maintaining one [`kerilog_core::KeyState`]
//! per identifier and classifying every event as accepted or rejected with
//! diagnostics. State updates are functional; a rejected event leaves the
//! last known-good state untouched and validation continues, so one corrupt
//! event never aborts the rest of the log.

pub mod signing;
pub mod validator;

pub use validator::{ChainValidator, ValidatedEvent};
