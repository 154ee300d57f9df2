//! Key-state chain validation
//!
//! Replays decoded events in stream order, one state machine per
//! identifier. Every check failure becomes a diagnostic on that event and
//! the replay continues from the last known-good state, so a single corrupt
//! event never hides the rest of the log.

use indexmap::IndexMap;
use std::collections::HashMap;

use kerilog_cesr::primitive::MatterCode;
use kerilog_cesr::{said, DecodedEvent};
use kerilog_core::{
    Diagnostic, DiagnosticCode, EventKind, KeyEvent, KeyState, Prefix, PublicKey, SelfAddress,
    Threshold,
};

use crate::signing;

/// One event after chain validation
#[derive(Debug, Clone)]
pub struct ValidatedEvent {
    /// The decoded event, unchanged
    pub event: KeyEvent,
    /// Decode-time and validation diagnostics together
    pub diagnostics: Vec<Diagnostic>,
    /// Whether the event passed every applicable check
    pub accepted: bool,
    /// Snapshot of the identifier's key state after this event, where the
    /// identifier has one
    pub state: Option<KeyState>,
}

/// Replays one stream's events against evolving per-identifier key state
#[derive(Debug, Default)]
pub struct ChainValidator {
    states: IndexMap<Prefix, KeyState>,
    accepted_digests: HashMap<(Prefix, u64), SelfAddress>,
}

impl ChainValidator {
    /// A validator with no identifiers established
    pub fn new() -> Self {
        Self::default()
    }

    /// Final key state per identifier, in first-seen order
    pub fn states(&self) -> &IndexMap<Prefix, KeyState> {
        &self.states
    }

    /// Consume the validator, keeping the final states
    pub fn into_states(self) -> IndexMap<Prefix, KeyState> {
        self.states
    }

    /// Validate one event against the current state of its identifier
    pub fn validate(&mut self, decoded: DecodedEvent) -> ValidatedEvent {
        let DecodedEvent {
            event,
            mut diagnostics,
        } = decoded;

        // structurally broken events are listed but never applied
        if diagnostics.iter().any(Diagnostic::is_error) {
            let state = self.state_snapshot(&event);
            return ValidatedEvent {
                event,
                diagnostics,
                accepted: false,
                state,
            };
        }

        let accepted = match event.kind {
            kind if kind.is_chained() => self.validate_chained(&event, &mut diagnostics),
            EventKind::Receipt => self.validate_receipt(&event, &mut diagnostics),
            _ => true, // out-of-chain messages are listed as-is
        };

        for diag in &mut diagnostics {
            diag.sn.get_or_insert(event.sn);
        }
        if accepted {
            tracing::debug!(kind = %event.kind, sn = event.sn, "event accepted");
        } else {
            tracing::debug!(
                kind = %event.kind,
                sn = event.sn,
                diagnostics = diagnostics.len(),
                "event rejected"
            );
        }
        let state = self.state_snapshot(&event);
        ValidatedEvent {
            event,
            diagnostics,
            accepted,
            state,
        }
    }

    fn state_snapshot(&self, event: &KeyEvent) -> Option<KeyState> {
        event
            .prefix
            .as_ref()
            .and_then(|p| self.states.get(p))
            .cloned()
    }

    fn validate_chained(&mut self, event: &KeyEvent, diags: &mut Vec<Diagnostic>) -> bool {
        let Some(prefix) = event.prefix.clone() else {
            // unreachable for well-formed events; the decoder requires i
            diags.push(Diagnostic::error(
                DiagnosticCode::MalformedEvent,
                "key event has no identifier prefix",
                event.offset,
            ));
            return false;
        };

        let is_inception = matches!(
            event.kind,
            EventKind::Inception | EventKind::DelegatedInception
        );
        match self.states.get(&prefix) {
            None if is_inception => self.establish(prefix, event, diags),
            None => {
                diags.push(Diagnostic::error(
                    DiagnosticCode::SequenceGap,
                    format!("{} event precedes any inception", event.kind),
                    event.offset,
                ));
                false
            }
            Some(_) if is_inception => {
                diags.push(Diagnostic::error(
                    DiagnosticCode::DuplicateInception,
                    "identifier already has an accepted inception",
                    event.offset,
                ));
                false
            }
            Some(state) => {
                let state = state.clone();
                self.continue_chain(prefix, state, event, diags)
            }
        }
    }

    /// Uninitialized → Established: an inception seeds state from its own
    /// announced keys
    fn establish(&mut self, prefix: Prefix, event: &KeyEvent, diags: &mut Vec<Diagnostic>) -> bool {
        if event.sn != 0 {
            diags.push(Diagnostic::error(
                DiagnosticCode::SequenceGap,
                format!("inception carries sequence number {}, must be 0", event.sn),
                event.offset,
            ));
            return false;
        }
        let threshold = event
            .threshold
            .clone()
            .unwrap_or(Threshold::Count(event.keys.len() as u64));
        if !self.threshold_met(event, &event.keys, &threshold, diags) {
            return false;
        }
        let state = KeyState::incept(prefix.clone(), event);
        self.accepted_digests
            .insert((prefix.clone(), event.sn), event.digest.clone());
        self.states.insert(prefix, state);
        true
    }

    /// Established: sequence, prior digest, signatures, and (for rotation)
    /// the pre-rotation commitment, in that order
    fn continue_chain(
        &mut self,
        prefix: Prefix,
        state: KeyState,
        event: &KeyEvent,
        diags: &mut Vec<Diagnostic>,
    ) -> bool {
        if event.sn != state.last_sn + 1 {
            // an event at an already-accepted sequence number is a fork
            // sibling, not a gap
            if let Some(accepted) = self.accepted_digests.get(&(prefix.clone(), event.sn)) {
                diags.push(Diagnostic::error(
                    DiagnosticCode::ChainFork,
                    format!(
                        "conflicts with accepted event {} at sn {}",
                        accepted.short(),
                        event.sn
                    ),
                    event.offset,
                ));
            } else {
                diags.push(Diagnostic::error(
                    DiagnosticCode::SequenceGap,
                    format!(
                        "sequence number {} does not follow accepted {}",
                        event.sn, state.last_sn
                    ),
                    event.offset,
                ));
            }
            return false;
        }

        match &event.prior {
            Some(prior) if *prior == state.last_digest => {}
            Some(prior) => {
                // a fork sibling: recorded against the digest it conflicts
                // with, never silently dropped
                diags.push(Diagnostic::error(
                    DiagnosticCode::ChainFork,
                    format!(
                        "prior digest {} conflicts with accepted event {} at sn {}",
                        prior.short(),
                        state.last_digest.short(),
                        state.last_sn
                    ),
                    event.offset,
                ));
                return false;
            }
            None => {
                diags.push(Diagnostic::error(
                    DiagnosticCode::ChainFork,
                    "event carries no prior digest to chain on",
                    event.offset,
                ));
                return false;
            }
        }

        // rotations and interactions are signed by the current
        // (pre-rotation) keys
        if !self.threshold_met(event, &state.keys, &state.threshold, diags) {
            return false;
        }

        let is_rotation = matches!(
            event.kind,
            EventKind::Rotation | EventKind::DelegatedRotation
        );
        if is_rotation && !self.commitment_met(event, &state, diags) {
            return false;
        }

        let next = if is_rotation {
            state.rotated(event)
        } else {
            state.interacted(event)
        };
        self.accepted_digests
            .insert((prefix.clone(), event.sn), event.digest.clone());
        self.states.insert(prefix, next);
        true
    }

    fn threshold_met(
        &self,
        event: &KeyEvent,
        keys: &[PublicKey],
        threshold: &Threshold,
        diags: &mut Vec<Diagnostic>,
    ) -> bool {
        let verified = signing::verified_indices(event, keys);
        if threshold.is_satisfied(&verified, keys.len()) {
            return true;
        }
        diags.push(Diagnostic::error(
            DiagnosticCode::ThresholdNotMet,
            format!(
                "{} of {} signatures verified, threshold {} not met",
                verified.len(),
                event.signatures.len(),
                threshold
            ),
            event.offset,
        ));
        false
    }

    /// Every key a rotation announces must digest-match an entry of the
    /// prior commitment set
    fn commitment_met(
        &self,
        event: &KeyEvent,
        state: &KeyState,
        diags: &mut Vec<Diagnostic>,
    ) -> bool {
        if state.next_digests.is_empty() {
            diags.push(Diagnostic::error(
                DiagnosticCode::CommitmentMismatch,
                "no further rotation permitted: the commitment set is empty",
                event.offset,
            ));
            return false;
        }
        for key in &event.keys {
            if !self.commitment_covers(&state.next_digests, key) {
                diags.push(Diagnostic::error(
                    DiagnosticCode::CommitmentMismatch,
                    format!(
                        "rotated key {} was not committed to in advance",
                        key.as_str()
                    ),
                    event.offset,
                ));
                return false;
            }
        }
        true
    }

    fn commitment_covers(&self, commitments: &[SelfAddress], key: &PublicKey) -> bool {
        commitments.iter().any(|entry| {
            let code = match entry.code() {
                Some('E') => MatterCode::Blake3,
                Some('I') => MatterCode::Sha2,
                _ => return false,
            };
            said::digest_qb64(code, key.as_str().as_bytes())
                .is_some_and(|digest| digest == entry.as_str())
        })
    }

    /// Receipts reference an already-accepted event; a dangling or
    /// conflicting reference is worth a warning but never alters state
    fn validate_receipt(&mut self, event: &KeyEvent, diags: &mut Vec<Diagnostic>) -> bool {
        let Some(prefix) = event.prefix.clone() else {
            return true;
        };
        match self.accepted_digests.get(&(prefix, event.sn)) {
            Some(digest) if *digest == event.digest => {}
            Some(digest) => {
                diags.push(Diagnostic::warning(
                    DiagnosticCode::ReceiptMismatch,
                    format!(
                        "receipt digest {} does not match accepted event {} at sn {}",
                        event.digest.short(),
                        digest.short(),
                        event.sn
                    ),
                    event.offset,
                ));
            }
            None => {
                diags.push(Diagnostic::warning(
                    DiagnosticCode::ReceiptMismatch,
                    format!("receipt references sn {} with no accepted event", event.sn),
                    event.offset,
                ));
            }
        }
        true
    }
}
