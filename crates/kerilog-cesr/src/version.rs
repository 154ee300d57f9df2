//! KERI version string framing
//!
//! Every event body opens with `{"v":"KERI10JSON00012b_",...}`: protocol,
//! major/minor version, serialization kind, and the body's total byte size
//! in hex. The size is what makes the body self-framing inside the CESR
//! stream.

use std::fmt;

use kerilog_core::{KerilogError, Result};

/// Serialization kind named by the version string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialKind {
    /// JSON body, the only kind this crate decodes
    Json,
    /// CBOR body, recognized but not decoded
    Cbor,
    /// MessagePack body, recognized but not decoded
    Mgpk,
}

impl fmt::Display for SerialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "JSON"),
            Self::Cbor => write!(f, "CBOR"),
            Self::Mgpk => write!(f, "MGPK"),
        }
    }
}

/// Parsed version string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    /// Protocol major version digit
    pub major: u8,
    /// Protocol minor version digit
    pub minor: u8,
    /// Serialization of the body
    pub kind: SerialKind,
    /// Declared byte size of the whole body
    pub size: usize,
}

/// The fixed length of a version string value: `KERI10JSON000000_`
pub const VERSION_STRING_LEN: usize = 17;

/// The prefix every body must open with for the stream to be self-framing
const BODY_PREFIX: &str = "{\"v\":\"";

/// Parse the version string of the body starting at `offset` in `source`
///
/// The `v` field must be the first field of the body; without that the
/// body's size cannot be discovered before parsing it.
pub fn sniff(source: &str, offset: usize) -> Result<VersionInfo> {
    let head = source.get(offset..).unwrap_or("");
    if !head.starts_with(BODY_PREFIX) {
        return Err(KerilogError::framing(
            "event body does not open with a version field",
            offset,
        ));
    }
    let vs_start = offset + BODY_PREFIX.len();
    let vs = source
        .get(vs_start..vs_start + VERSION_STRING_LEN)
        .ok_or_else(|| KerilogError::truncated("version string cut off", vs_start))?;
    parse_version_string(vs, vs_start)
}

fn parse_version_string(vs: &str, offset: usize) -> Result<VersionInfo> {
    let bytes = vs.as_bytes();
    if &bytes[..4] != b"KERI" {
        return Err(KerilogError::framing(
            format!("unrecognized protocol {:?}", &vs[..4]),
            offset,
        ));
    }
    if bytes[16] != b'_' {
        return Err(KerilogError::framing("version string missing terminator", offset));
    }
    let major = hex_digit(bytes[4], offset + 4)?;
    let minor = hex_digit(bytes[5], offset + 5)?;
    let kind = match &vs[6..10] {
        "JSON" => SerialKind::Json,
        "CBOR" => SerialKind::Cbor,
        "MGPK" => SerialKind::Mgpk,
        other => {
            return Err(KerilogError::framing(
                format!("unrecognized serialization {other:?}"),
                offset + 6,
            ))
        }
    };
    let size = usize::from_str_radix(&vs[10..16], 16).map_err(|_| {
        KerilogError::framing(format!("bad size field {:?}", &vs[10..16]), offset + 10)
    })?;
    Ok(VersionInfo {
        major,
        minor,
        kind,
        size,
    })
}

fn hex_digit(b: u8, offset: usize) -> Result<u8> {
    (b as char)
        .to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| KerilogError::framing("bad version digit", offset))
}

/// Render a version string with the given size
pub fn render(kind: SerialKind, size: usize) -> String {
    format!("KERI10{kind}{size:06x}_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn sniffs_a_json_body() {
        let body = "{\"v\":\"KERI10JSON00012b_\",\"t\":\"icp\"}";
        let info = sniff(body, 0).unwrap();
        assert_eq!(info.kind, SerialKind::Json);
        assert_eq!(info.size, 0x12b);
        assert_eq!((info.major, info.minor), (1, 0));
    }

    #[test]
    fn render_round_trips() {
        let vs = render(SerialKind::Json, 299);
        assert_eq!(vs, "KERI10JSON00012b_");
        let info = parse_version_string(&vs, 0).unwrap();
        assert_eq!(info.size, 299);
    }

    #[test]
    fn rejects_foreign_protocol() {
        let body = "{\"v\":\"ACDC10JSON00012b_\"}";
        assert_matches!(sniff(body, 0), Err(KerilogError::Framing { .. }));
    }

    #[test]
    fn rejects_missing_version_field() {
        assert_matches!(sniff("{\"t\":\"icp\"}", 0), Err(KerilogError::Framing { .. }));
    }
}
