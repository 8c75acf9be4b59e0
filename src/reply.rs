//! Parsing of the textual replies sent back by the supply.
//!
//! Replies arrive with the `\r` terminator already stripped by the transport. All functions here
//! are pure: they either return the decoded value or a [`MalformedReply`] holding a printable copy
//! of the offending bytes.

use core::fmt::Write;

use thiserror::Error;

use crate::status::{DeviceState, StatusBits};

/// Size of the printable copy kept for diagnostics.
pub const ESCAPED_REPLY_LEN: usize = 120;

const STATUS_PREFIX: &str = "#FDB:";
const VERSION_PREFIX: &[u8] = b"#MVER:";
const ACKNOWLEDGE: &[u8] = b"#AK";

/// The reply did not match the grammar expected for the command that was sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Bad reply string: \"{escaped}\"")]
pub struct MalformedReply {
    escaped: heapless::String<ESCAPED_REPLY_LEN>,
}

impl MalformedReply {
    pub fn new(raw: &[u8]) -> Self {
        Self {
            escaped: escape(raw),
        }
    }

    /// Printable rendering of the reply, truncated to [`ESCAPED_REPLY_LEN`].
    pub fn escaped(&self) -> &str {
        &self.escaped
    }
}

/// Render raw bytes with non-printable characters escaped, truncating when full.
pub fn escape<const N: usize>(raw: &[u8]) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in raw.escape_ascii() {
        if out.push(char::from(c)).is_err() {
            break;
        }
    }
    out
}

/// Parse a `#FDB:<status hex>:<setpoint>:<readback>` reply.
pub fn parse_status_reply(reply: &[u8]) -> Result<DeviceState, MalformedReply> {
    let bad = || MalformedReply::new(reply);

    let text = core::str::from_utf8(reply).map_err(|_| bad())?;
    let body = text.strip_prefix(STATUS_PREFIX).ok_or_else(bad)?;

    let mut fields = body.split(':');
    let status = fields
        .next()
        .and_then(|f| u32::from_str_radix(f.trim(), 16).ok())
        .ok_or_else(bad)?;
    let setpoint_current = fields.next().and_then(parse_float).ok_or_else(bad)?;
    let readback_current = fields.next().and_then(parse_float).ok_or_else(bad)?;
    if fields.next().is_some() {
        return Err(bad());
    }

    Ok(DeviceState {
        status: StatusBits::from(status),
        setpoint_current,
        readback_current,
    })
}

/// Parse a scalar reply: the text after the first `:`, or the whole reply when there is none.
pub fn parse_scalar_reply(reply: &[u8]) -> Result<f64, MalformedReply> {
    let bad = || MalformedReply::new(reply);

    let text = core::str::from_utf8(reply).map_err(|_| bad())?;
    let value = match text.split_once(':') {
        Some((_, rest)) => rest,
        None => text,
    };
    // Anything after the number (units, padding) is ignored.
    value
        .split_whitespace()
        .next()
        .and_then(parse_float)
        .ok_or_else(bad)
}

/// Strip the `#MVER:` prefix from an identification reply.
pub fn parse_version_reply(reply: &[u8]) -> Result<&[u8], MalformedReply> {
    reply
        .strip_prefix(VERSION_PREFIX)
        .ok_or_else(|| MalformedReply::new(reply))
}

/// Check that a reply is the `#AK` acknowledgement.
pub fn expect_acknowledge(reply: &[u8]) -> Result<(), MalformedReply> {
    if reply == ACKNOWLEDGE {
        Ok(())
    } else {
        Err(MalformedReply::new(reply))
    }
}

fn parse_float(field: &str) -> Option<f64> {
    field.trim().parse().ok().filter(|value: &f64| value.is_finite())
}

/// Format `value` with `digits` fractional digits into a fixed-size string.
pub(crate) fn format_fixed<const N: usize>(value: f64, digits: usize) -> Option<heapless::String<N>> {
    let mut out = heapless::String::new();
    write!(out, "{value:.digits$}").ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_reply() {
        let state = parse_status_reply(b"#FDB:41:2.5000:2.4980").unwrap();
        assert_eq!(u32::from(state.status), 0x41);
        assert!(state.status.on());
        assert!(state.status.bit(6));
        assert_eq!(state.setpoint_current, 2.5);
        assert_eq!(state.readback_current, 2.498);
    }

    #[test]
    fn test_parse_status_reply_signed_and_padded() {
        // The simulator pads fields with a space and an explicit sign.
        let state = parse_status_reply(b"#FDB:01: +0.0000: -0.0012").unwrap();
        assert_eq!(u32::from(state.status), 0x01);
        assert_eq!(state.setpoint_current, 0.0);
        assert_eq!(state.readback_current, -0.0012);

        let state = parse_status_reply(b"#FDB:0:-12.5000:-12.4990").unwrap();
        assert_eq!(state.setpoint_current, -12.5);
        assert_eq!(state.readback_current, -12.499);
        assert!(!state.is_on());
    }

    #[test]
    fn test_parse_status_reply_malformed() {
        let cases: [&[u8]; 10] = [
            b"",
            b"#AK",
            b"FDB:41:2.5:2.5",
            b"#FDX:41:2.5:2.5",
            b"#FDB:41:2.5",
            b"#FDB:ZZ:2.5:2.5",
            b"#FDB:41:abc:2.5",
            b"#FDB:41:2.5:2.5:9",
            b"#FDB:41:NaN:2.5",
            b"#FDB:41:2.5:-inf",
        ];
        for case in cases {
            let err = parse_status_reply(case).unwrap_err();
            assert_eq!(err, MalformedReply::new(case));
        }
    }

    #[test]
    fn test_parse_scalar_reply() {
        assert_eq!(parse_scalar_reply(b"#MRT:35.25").unwrap(), 35.25);
        assert_eq!(parse_scalar_reply(b"48.1").unwrap(), 48.1);
        assert_eq!(parse_scalar_reply(b"#MRG:13:1.5e-3").unwrap_err(), MalformedReply::new(b"#MRG:13:1.5e-3"));
        assert_eq!(parse_scalar_reply(b"#MRG: 1.5000e-03").unwrap(), 0.0015);
        assert_eq!(parse_scalar_reply(b"#MRV:-2.0 V").unwrap(), -2.0);
        assert!(parse_scalar_reply(b"#MRP:").is_err());
        assert!(parse_scalar_reply(b"#NAK").is_err());
        assert!(parse_scalar_reply(b"#MRV:inf").is_err());
        assert!(parse_scalar_reply(b"#MRV:NaN").is_err());
    }

    #[test]
    fn test_parse_version_reply() {
        assert_eq!(parse_version_reply(b"#MVER:1.03").unwrap(), b"1.03");
        assert_eq!(parse_version_reply(b"#MVER:").unwrap(), b"");
        assert!(parse_version_reply(b"#MVE").is_err());
    }

    #[test]
    fn test_expect_acknowledge() {
        assert!(expect_acknowledge(b"#AK").is_ok());
        assert!(expect_acknowledge(b"#AK ").is_err());
        assert!(expect_acknowledge(b"#NAK").is_err());
    }

    #[test]
    fn test_malformed_reply_is_escaped() {
        let err = MalformedReply::new(b"#FDB\x01:\"x\"\n");
        assert_eq!(err.escaped(), "#FDB\\x01:\\\"x\\\"\\n");
        assert_eq!(err.to_string(), "Bad reply string: \"#FDB\\x01:\\\"x\\\"\\n\"");
    }

    #[test]
    fn test_escape_truncates() {
        let long = [0xFFu8; 100];
        let escaped: heapless::String<ESCAPED_REPLY_LEN> = escape(&long);
        assert_eq!(escaped.len(), ESCAPED_REPLY_LEN);
    }

    #[test]
    fn test_format_fixed() {
        let s: heapless::String<16> = format_fixed(2.5, 4).unwrap();
        assert_eq!(s.as_str(), "2.5000");
        assert!(format_fixed::<4>(12345.0, 4).is_none());
    }
}
