//! Decoded key event model
//!
//! A [`KeyEvent`] is one entry of a key event log: the structured fields of
//! one serialized event body plus the signature material attached after it.
//! Events are immutable once decoded; the chain validator annotates them
//! with diagnostics instead of changing them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::KerilogError;
use crate::identifiers::{Prefix, PublicKey, SelfAddress};

/// Event kind, from the `t` field of the body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Establishes an identifier and its first key set (`icp`)
    Inception,
    /// Transfers control to the pre-committed next key set (`rot`)
    Rotation,
    /// Anchors seals under the current key set (`ixn`)
    Interaction,
    /// A witness/validator receipt for an event already in the log (`rct`)
    Receipt,
    /// Delegated inception (`dip`)
    DelegatedInception,
    /// Delegated rotation (`drt`)
    DelegatedRotation,
    /// Query message (`qry`)
    Query,
    /// Reply message (`rpy`)
    Reply,
    /// Exchange message (`exn`)
    Exchange,
    /// Credential registry inception (`vcp`)
    RegistryInception,
    /// Credential registry rotation (`vrt`)
    RegistryRotation,
    /// Credential issuance (`iss`)
    Issuance,
    /// Credential revocation (`rev`)
    Revocation,
    /// Backer credential issuance (`bis`)
    BackerIssuance,
    /// Backer credential revocation (`brv`)
    BackerRevocation,
}

impl EventKind {
    /// Parse the three-letter wire code
    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "icp" => Self::Inception,
            "rot" => Self::Rotation,
            "ixn" => Self::Interaction,
            "rct" => Self::Receipt,
            "dip" => Self::DelegatedInception,
            "drt" => Self::DelegatedRotation,
            "qry" => Self::Query,
            "rpy" => Self::Reply,
            "exn" => Self::Exchange,
            "vcp" => Self::RegistryInception,
            "vrt" => Self::RegistryRotation,
            "iss" => Self::Issuance,
            "rev" => Self::Revocation,
            "bis" => Self::BackerIssuance,
            "brv" => Self::BackerRevocation,
            _ => return None,
        })
    }

    /// The three-letter wire code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Inception => "icp",
            Self::Rotation => "rot",
            Self::Interaction => "ixn",
            Self::Receipt => "rct",
            Self::DelegatedInception => "dip",
            Self::DelegatedRotation => "drt",
            Self::Query => "qry",
            Self::Reply => "rpy",
            Self::Exchange => "exn",
            Self::RegistryInception => "vcp",
            Self::RegistryRotation => "vrt",
            Self::Issuance => "iss",
            Self::Revocation => "rev",
            Self::BackerIssuance => "bis",
            Self::BackerRevocation => "brv",
        }
    }

    /// Human-readable label for display
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inception => "Inception",
            Self::Rotation => "Rotation",
            Self::Interaction => "Interaction",
            Self::Receipt => "Receipt",
            Self::DelegatedInception => "Delegated Inception",
            Self::DelegatedRotation => "Delegated Rotation",
            Self::Query => "Query",
            Self::Reply => "Reply",
            Self::Exchange => "Exchange",
            Self::RegistryInception => "VC Registry Inception",
            Self::RegistryRotation => "VC Registry Rotation",
            Self::Issuance => "VC Issuance",
            Self::Revocation => "VC Revocation",
            Self::BackerIssuance => "Backer VC Issuance",
            Self::BackerRevocation => "Backer VC Revocation",
        }
    }

    /// True for kinds that announce key material (inception and rotation
    /// variants)
    pub fn is_establishment(&self) -> bool {
        matches!(
            self,
            Self::Inception | Self::Rotation | Self::DelegatedInception | Self::DelegatedRotation
        )
    }

    /// True for the kinds the chain validator runs full state-machine
    /// checks on; everything else is listed but never touches key state
    pub fn is_chained(&self) -> bool {
        matches!(
            self,
            Self::Inception
                | Self::Rotation
                | Self::Interaction
                | Self::DelegatedInception
                | Self::DelegatedRotation
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One weight of a weighted signing threshold, e.g. `1/2`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Weight {
    /// Numerator
    pub num: u64,
    /// Denominator, never zero
    pub den: u64,
}

impl FromStr for Weight {
    type Err = KerilogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, den) = match s.split_once('/') {
            Some((n, d)) => (n, d),
            None => (s, "1"),
        };
        let num: u64 = num
            .parse()
            .map_err(|_| KerilogError::internal(format!("bad weight numerator: {s}")))?;
        let den: u64 = den
            .parse()
            .map_err(|_| KerilogError::internal(format!("bad weight denominator: {s}")))?;
        if den == 0 {
            return Err(KerilogError::internal(format!("zero weight denominator: {s}")));
        }
        Ok(Self { num, den })
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Signing threshold: a plain count or a list of per-key weights
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Threshold {
    /// At least this many valid signatures
    Count(u64),
    /// Weights of the valid signers must sum to at least one
    Weighted(Vec<Weight>),
}

impl Threshold {
    /// Parse the `kt`/`nt` field: a hex count string or a list of weight
    /// strings
    pub fn from_json(value: &Value) -> Result<Self, KerilogError> {
        match value {
            Value::String(s) => {
                let count = u64::from_str_radix(s, 16)
                    .map_err(|_| KerilogError::internal(format!("bad threshold count: {s}")))?;
                Ok(Self::Count(count))
            }
            Value::Array(items) => {
                let mut weights = Vec::with_capacity(items.len());
                for item in items {
                    let s = item.as_str().ok_or_else(|| {
                        KerilogError::internal("weighted threshold entries must be strings")
                    })?;
                    weights.push(s.parse()?);
                }
                Ok(Self::Weighted(weights))
            }
            other => Err(KerilogError::internal(format!(
                "threshold must be a string or list, got {other}"
            ))),
        }
    }

    /// Whether the signatures at `verified` key indices satisfy this
    /// threshold
    ///
    /// Indices are deduplicated; out-of-range indices never count.
    pub fn is_satisfied(&self, verified: &[usize], key_count: usize) -> bool {
        let mut seen = vec![false; key_count];
        for &index in verified {
            if index < key_count {
                seen[index] = true;
            }
        }
        match self {
            Self::Count(count) => {
                let valid = seen.iter().filter(|s| **s).count() as u64;
                valid >= *count
            }
            Self::Weighted(weights) => {
                // Rational accumulation: sum of num_i/den_i >= 1
                let mut acc_num: u128 = 0;
                let mut acc_den: u128 = 1;
                for (index, weight) in weights.iter().enumerate() {
                    if index < key_count && seen[index] {
                        acc_num = acc_num * u128::from(weight.den)
                            + u128::from(weight.num) * acc_den;
                        acc_den *= u128::from(weight.den);
                    }
                }
                acc_num >= acc_den
            }
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(count) => write!(f, "{count}"),
            Self::Weighted(weights) => {
                let parts: Vec<String> = weights.iter().map(Weight::to_string).collect();
                write!(f, "[{}]", parts.join(","))
            }
        }
    }
}

/// An anchored-data seal from an event's `a` field, kept opaque
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seal(pub Value);

impl Seal {
    /// The sealed digest, where the seal carries one
    pub fn digest(&self) -> Option<&str> {
        self.0.get("d").and_then(Value::as_str)
    }

    /// The sealed identifier, where the seal carries one
    pub fn identifier(&self) -> Option<&str> {
        self.0.get("i").and_then(Value::as_str)
    }
}

/// One indexed signature from an attachment group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedSignature {
    /// Index into the key list the event is validated against
    pub index: usize,
    /// Full qb64 form, code and index characters included
    pub qb64: String,
}

/// One decoded key event with its attached material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Event kind from the `t` field
    pub kind: EventKind,
    /// Identifier prefix (`i`); absent on prefix-less messages like replies
    pub prefix: Option<Prefix>,
    /// Sequence number (`s`, hex on the wire)
    pub sn: u64,
    /// Own self-addressing digest (`d`)
    pub digest: SelfAddress,
    /// Prior event digest (`p`); absent only at inception
    pub prior: Option<SelfAddress>,
    /// Current signing keys (`k`)
    pub keys: Vec<PublicKey>,
    /// Current signing threshold (`kt`)
    pub threshold: Option<Threshold>,
    /// Next-key digest commitment (`n`); empty means no further rotation
    pub next_digests: Vec<SelfAddress>,
    /// Threshold committed for the next key set (`nt`)
    pub next_threshold: Option<Threshold>,
    /// Anchored seals (`a`)
    pub seals: Vec<Seal>,
    /// Indexed signatures attached after the body
    pub signatures: Vec<IndexedSignature>,
    /// Verbatim body text as it appeared on the wire
    pub raw_body: String,
    /// Verbatim attachment text following the body
    pub raw_attachments: String,
    /// Byte offset of the body within the source stream
    pub offset: usize,
}

impl KeyEvent {
    /// The full verbatim text of this event, body plus attachments,
    /// exactly as it appeared in the stream
    pub fn raw_verbatim(&self) -> String {
        let mut raw = self.raw_body.clone();
        raw.push_str(&self.raw_attachments);
        raw
    }

    /// Identifier as a string, empty when the message has no prefix
    pub fn identifier_str(&self) -> &str {
        self.prefix.as_ref().map(Prefix::as_str).unwrap_or("")
    }
}
