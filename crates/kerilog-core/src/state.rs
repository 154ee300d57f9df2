//! Key state snapshots
//!
//! One [`KeyState`] exists per identifier during replay. Updates are
//! functional: applying an accepted event returns a fresh value, so a
//! rejected event can never leave state half-changed and any snapshot can
//! seed a replay in tests.

use serde::{Deserialize, Serialize};

use crate::event::{KeyEvent, Threshold};
use crate::identifiers::{Prefix, PublicKey, SelfAddress};

/// Authoritative key state for one identifier at one point in its log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyState {
    /// The identifier this state belongs to
    pub prefix: Prefix,
    /// Current signing keys
    pub keys: Vec<PublicKey>,
    /// Current signing threshold
    pub threshold: Threshold,
    /// Digest commitment to the next key set; empty means abandoned
    pub next_digests: Vec<SelfAddress>,
    /// Threshold committed for the next key set
    pub next_threshold: Option<Threshold>,
    /// Digest of the last accepted event
    pub last_digest: SelfAddress,
    /// Sequence number of the last accepted event
    pub last_sn: u64,
}

impl KeyState {
    /// Seed state from an accepted inception event
    ///
    /// The caller has already checked the event is a well-formed inception
    /// for `prefix`.
    pub fn incept(prefix: Prefix, event: &KeyEvent) -> Self {
        Self {
            prefix,
            keys: event.keys.clone(),
            threshold: event
                .threshold
                .clone()
                .unwrap_or(Threshold::Count(event.keys.len() as u64)),
            next_digests: event.next_digests.clone(),
            next_threshold: event.next_threshold.clone(),
            last_digest: event.digest.clone(),
            last_sn: event.sn,
        }
    }

    /// State after an accepted rotation: announced keys, threshold, and
    /// commitment replace the current ones
    pub fn rotated(&self, event: &KeyEvent) -> Self {
        Self {
            prefix: self.prefix.clone(),
            keys: event.keys.clone(),
            threshold: event
                .threshold
                .clone()
                .unwrap_or_else(|| self.threshold.clone()),
            next_digests: event.next_digests.clone(),
            next_threshold: event.next_threshold.clone(),
            last_digest: event.digest.clone(),
            last_sn: event.sn,
        }
    }

    /// State after an accepted interaction: only the chain head advances
    pub fn interacted(&self, event: &KeyEvent) -> Self {
        Self {
            last_digest: event.digest.clone(),
            last_sn: event.sn,
            ..self.clone()
        }
    }

    /// True when the commitment set is empty, i.e. no further rotation is
    /// permitted
    pub fn is_abandoned(&self) -> bool {
        self.next_digests.is_empty()
    }
}
