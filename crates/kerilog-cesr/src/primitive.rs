//! Primitive code tables and the decoded primitive type
//!
//! The code space is small and fixed by the encoding, so every table here is
//! an exhaustive `match` the compiler checks, not a runtime lookup map.
//! Sizes are in qb64 characters; every primitive is a whole number of
//! four-character quadlets.

use std::fmt;

/// One-character and two-character qualified-value codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatterCode {
    /// `A` — Ed25519 seed
    Ed25519Seed,
    /// `B` — Ed25519 non-transferable prefix key
    Ed25519NonTrans,
    /// `C` — X25519 public key
    X25519,
    /// `D` — Ed25519 verifying key
    Ed25519,
    /// `E` — Blake3-256 digest
    Blake3,
    /// `F` — Blake2b-256 digest
    Blake2b,
    /// `G` — Blake2s-256 digest
    Blake2s,
    /// `H` — SHA3-256 digest
    Sha3,
    /// `I` — SHA2-256 digest
    Sha2,
    /// `J` — ECDSA secp256k1 seed
    EcdsaSeed,
    /// `M` — short number, two-byte payload
    ShortNumber,
    /// `0A` — sequence number / 128-bit number
    SequenceNumber,
    /// `0B` — Ed25519 signature
    Ed25519Sig,
    /// `0C` — ECDSA secp256k1 signature
    EcdsaSig,
    /// `1AAG` — ISO-8601 datetime
    DateTime,
}

impl MatterCode {
    /// Resolve a code from the bytes at a primitive boundary
    pub fn from_prefix(bytes: &[u8]) -> Option<Self> {
        Some(match *bytes.first()? {
            b'A' => Self::Ed25519Seed,
            b'B' => Self::Ed25519NonTrans,
            b'C' => Self::X25519,
            b'D' => Self::Ed25519,
            b'E' => Self::Blake3,
            b'F' => Self::Blake2b,
            b'G' => Self::Blake2s,
            b'H' => Self::Sha3,
            b'I' => Self::Sha2,
            b'J' => Self::EcdsaSeed,
            b'M' => Self::ShortNumber,
            b'0' => match *bytes.get(1)? {
                b'A' => Self::SequenceNumber,
                b'B' => Self::Ed25519Sig,
                b'C' => Self::EcdsaSig,
                _ => return None,
            },
            b'1' => match bytes.get(1..4)? {
                b"AAG" => Self::DateTime,
                _ => return None,
            },
            _ => return None,
        })
    }

    /// The code text
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ed25519Seed => "A",
            Self::Ed25519NonTrans => "B",
            Self::X25519 => "C",
            Self::Ed25519 => "D",
            Self::Blake3 => "E",
            Self::Blake2b => "F",
            Self::Blake2s => "G",
            Self::Sha3 => "H",
            Self::Sha2 => "I",
            Self::EcdsaSeed => "J",
            Self::ShortNumber => "M",
            Self::SequenceNumber => "0A",
            Self::Ed25519Sig => "0B",
            Self::EcdsaSig => "0C",
            Self::DateTime => "1AAG",
        }
    }

    /// (code size, full primitive size) in qb64 characters
    pub fn sizes(&self) -> (usize, usize) {
        match self {
            Self::Ed25519Seed
            | Self::Ed25519NonTrans
            | Self::X25519
            | Self::Ed25519
            | Self::Blake3
            | Self::Blake2b
            | Self::Blake2s
            | Self::Sha3
            | Self::Sha2
            | Self::EcdsaSeed => (1, 44),
            Self::ShortNumber => (1, 4),
            Self::SequenceNumber => (2, 24),
            Self::Ed25519Sig | Self::EcdsaSig => (2, 88),
            Self::DateTime => (4, 36),
        }
    }

    /// True for digest codes
    pub fn is_digest(&self) -> bool {
        matches!(
            self,
            Self::Blake3 | Self::Blake2b | Self::Blake2s | Self::Sha3 | Self::Sha2
        )
    }
}

impl fmt::Display for MatterCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Indexed-signature codes, valid only inside an indexed-signature group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexCode {
    /// `A#` — Ed25519 indexed signature
    Ed25519,
    /// `B#` — Ed25519 indexed signature, current key list only
    Ed25519CurrentOnly,
}

impl IndexCode {
    /// Resolve a code from its first character
    pub fn from_prefix(first: u8) -> Option<Self> {
        match first {
            b'A' => Some(Self::Ed25519),
            b'B' => Some(Self::Ed25519CurrentOnly),
            _ => None,
        }
    }

    /// The code character
    pub fn code_char(&self) -> char {
        match self {
            Self::Ed25519 => 'A',
            Self::Ed25519CurrentOnly => 'B',
        }
    }

    /// (code size, full primitive size); the second code character is the
    /// signer index
    pub fn sizes(&self) -> (usize, usize) {
        (2, 88)
    }
}

/// Count-group codes introduced by `-`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterCode {
    /// `-A` — controller indexed signatures
    ControllerIdxSigs,
    /// `-B` — witness indexed signatures
    WitnessIdxSigs,
    /// `-C` — nontransferable receipt couples (prefix + signature)
    NonTransReceiptCouples,
    /// `-D` — transferable receipt quadruples
    TransReceiptQuadruples,
    /// `-E` — first-seen replay couples (sequence number + datetime)
    FirstSeenReplayCouples,
    /// `-F` — transferable indexed signature groups
    TransIdxSigGroups,
    /// `-G` — seal source couples (sequence number + digest)
    SealSourceCouples,
    /// `-H` — transferable last indexed signature groups
    TransLastIdxSigGroups,
    /// `-I` — seal source triples
    SealSourceTriples,
    /// `-J` — SAD path signature groups
    SadPathSigGroups,
    /// `-K` — root SAD path signature groups
    RootSadPathSigGroups,
    /// `-L` — pathed material group, quadlet-counted
    PathedMaterialGroup,
    /// `-V` — attachment group, quadlet-counted
    AttachmentGroup,
    /// `-0V` — attachment group with a five-character count
    BigAttachmentGroup,
    /// `-W` — generic group, quadlet-counted
    GenericGroup,
    /// `-Z` — ESSR payload group, quadlet-counted
    EssrPayloadGroup,
}

impl CounterCode {
    /// Resolve a small-form counter from its code character (the one after
    /// `-`)
    pub fn from_char(c: u8) -> Option<Self> {
        Some(match c {
            b'A' => Self::ControllerIdxSigs,
            b'B' => Self::WitnessIdxSigs,
            b'C' => Self::NonTransReceiptCouples,
            b'D' => Self::TransReceiptQuadruples,
            b'E' => Self::FirstSeenReplayCouples,
            b'F' => Self::TransIdxSigGroups,
            b'G' => Self::SealSourceCouples,
            b'H' => Self::TransLastIdxSigGroups,
            b'I' => Self::SealSourceTriples,
            b'J' => Self::SadPathSigGroups,
            b'K' => Self::RootSadPathSigGroups,
            b'L' => Self::PathedMaterialGroup,
            b'V' => Self::AttachmentGroup,
            b'W' => Self::GenericGroup,
            b'Z' => Self::EssrPayloadGroup,
            _ => return None,
        })
    }

    /// Resolve a big-form counter (`-0` prefix) from its code character
    pub fn from_big_char(c: u8) -> Option<Self> {
        match c {
            b'V' => Some(Self::BigAttachmentGroup),
            _ => None,
        }
    }

    /// The full code text including the `-` sentinel
    pub fn code(&self) -> &'static str {
        match self {
            Self::ControllerIdxSigs => "-A",
            Self::WitnessIdxSigs => "-B",
            Self::NonTransReceiptCouples => "-C",
            Self::TransReceiptQuadruples => "-D",
            Self::FirstSeenReplayCouples => "-E",
            Self::TransIdxSigGroups => "-F",
            Self::SealSourceCouples => "-G",
            Self::TransLastIdxSigGroups => "-H",
            Self::SealSourceTriples => "-I",
            Self::SadPathSigGroups => "-J",
            Self::RootSadPathSigGroups => "-K",
            Self::PathedMaterialGroup => "-L",
            Self::AttachmentGroup => "-V",
            Self::BigAttachmentGroup => "-0V",
            Self::GenericGroup => "-W",
            Self::EssrPayloadGroup => "-Z",
        }
    }

    /// Human-readable group name for display
    pub fn name(&self) -> &'static str {
        match self {
            Self::ControllerIdxSigs => "Controller Indexed Sigs",
            Self::WitnessIdxSigs => "Witness Indexed Sigs",
            Self::NonTransReceiptCouples => "Nontransferable Receipt Couples",
            Self::TransReceiptQuadruples => "Transferable Receipt Quadruples",
            Self::FirstSeenReplayCouples => "First Seen Replay Couples",
            Self::TransIdxSigGroups => "Trans Indexed Sig Groups",
            Self::SealSourceCouples => "Seal Source Couples",
            Self::TransLastIdxSigGroups => "Trans Last Indexed Sig Groups",
            Self::SealSourceTriples => "Seal Source Triples",
            Self::SadPathSigGroups => "SAD Path Sig Groups",
            Self::RootSadPathSigGroups => "Root SAD Path Sig Groups",
            Self::PathedMaterialGroup => "Pathed Material Group",
            Self::AttachmentGroup | Self::BigAttachmentGroup => "Attachment Group",
            Self::GenericGroup => "Generic Group",
            Self::EssrPayloadGroup => "ESSR Payload Group",
        }
    }

    /// Full counter size in characters (code + count field)
    pub fn full_size(&self) -> usize {
        match self {
            Self::BigAttachmentGroup => 8,
            _ => 4,
        }
    }

    /// True when the count measures enclosed quadlets rather than items,
    /// i.e. the counter declares the total length of a nested scope
    pub fn counts_quadlets(&self) -> bool {
        matches!(
            self,
            Self::PathedMaterialGroup
                | Self::AttachmentGroup
                | Self::BigAttachmentGroup
                | Self::GenericGroup
                | Self::EssrPayloadGroup
        )
    }

    /// True for groups whose members are indexed signatures
    pub fn is_indexed_sig_group(&self) -> bool {
        matches!(self, Self::ControllerIdxSigs | Self::WitnessIdxSigs)
    }

    /// Number of matter primitives per counted item, for groups with a
    /// flat member shape; `None` for structured groups the decoder skips
    pub fn members_per_item(&self) -> Option<usize> {
        match self {
            Self::ControllerIdxSigs | Self::WitnessIdxSigs => Some(1),
            Self::NonTransReceiptCouples
            | Self::FirstSeenReplayCouples
            | Self::SealSourceCouples => Some(2),
            Self::SealSourceTriples => Some(3),
            Self::TransReceiptQuadruples => Some(4),
            Self::TransIdxSigGroups
            | Self::TransLastIdxSigGroups
            | Self::SadPathSigGroups
            | Self::RootSadPathSigGroups
            | Self::PathedMaterialGroup
            | Self::AttachmentGroup
            | Self::BigAttachmentGroup
            | Self::GenericGroup
            | Self::EssrPayloadGroup => None,
        }
    }
}

impl fmt::Display for CounterCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The decoded content of one primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveValue {
    /// A qualified value: code plus payload bytes
    Matter {
        /// The resolved code
        code: MatterCode,
        /// Decoded payload
        raw: Vec<u8>,
    },
    /// An indexed signature
    IndexedSignature {
        /// The resolved code
        code: IndexCode,
        /// Signer index from the second code character
        index: usize,
        /// Decoded signature bytes
        raw: Vec<u8>,
    },
    /// A count group header
    Counter {
        /// The resolved code
        code: CounterCode,
        /// Declared count (items or quadlets per the code)
        count: u64,
    },
}

/// One tokenized primitive: decoded value plus its exact source span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primitive {
    /// Decoded content
    pub value: PrimitiveValue,
    /// Byte offset of the span within the source stream
    pub offset: usize,
    /// The verbatim qb64 span
    pub qb64: String,
}

impl Primitive {
    /// Declared (and consumed) size in characters
    pub fn size(&self) -> usize {
        self.qb64.len()
    }

    /// The sequence number value, for `0A` primitives
    pub fn as_sequence_number(&self) -> Option<u64> {
        match &self.value {
            PrimitiveValue::Matter {
                code: MatterCode::SequenceNumber,
                raw,
            } => {
                let mut sn: u64 = 0;
                // 16-byte big-endian payload; the high eight bytes must be
                // zero for the value to fit
                let (high, low) = raw.split_at(raw.len().saturating_sub(8));
                if high.iter().any(|b| *b != 0) {
                    return None;
                }
                for b in low {
                    sn = sn << 8 | u64::from(*b);
                }
                Some(sn)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matter_table_round_trips_prefixes() {
        for code in [
            MatterCode::Ed25519Seed,
            MatterCode::Ed25519,
            MatterCode::Blake3,
            MatterCode::Sha2,
            MatterCode::SequenceNumber,
            MatterCode::Ed25519Sig,
            MatterCode::DateTime,
        ] {
            assert_eq!(MatterCode::from_prefix(code.code().as_bytes()), Some(code));
        }
        assert_eq!(MatterCode::from_prefix(b"z"), None);
        assert_eq!(MatterCode::from_prefix(b"0Z"), None);
    }

    #[test]
    fn counter_table_round_trips_codes() {
        for code in [
            CounterCode::ControllerIdxSigs,
            CounterCode::SealSourceCouples,
            CounterCode::AttachmentGroup,
            CounterCode::EssrPayloadGroup,
        ] {
            assert_eq!(CounterCode::from_char(code.code().as_bytes()[1]), Some(code));
        }
        assert_eq!(CounterCode::from_big_char(b'V'), Some(CounterCode::BigAttachmentGroup));
        assert_eq!(CounterCode::from_char(b'Y'), None);
    }

    #[test]
    fn sequence_number_primitive_decodes() {
        let mut raw = vec![0u8; 16];
        raw[15] = 0x2a;
        let prim = Primitive {
            value: PrimitiveValue::Matter {
                code: MatterCode::SequenceNumber,
                raw,
            },
            offset: 0,
            qb64: String::new(),
        };
        assert_eq!(prim.as_sequence_number(), Some(42));
    }

    #[test]
    fn oversized_sequence_number_is_rejected() {
        let prim = Primitive {
            value: PrimitiveValue::Matter {
                code: MatterCode::SequenceNumber,
                raw: vec![0xff; 16],
            },
            offset: 0,
            qb64: String::new(),
        };
        assert_eq!(prim.as_sequence_number(), None);
    }
}
