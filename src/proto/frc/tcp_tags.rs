//! Decodes the roboRIO's TCP telemetry tags (disable/rail faults, version
//! info, error messages, stdout) into tracing events. Returns `None` on a
//! short or malformed tag rather than panicking, since a telemetry glitch
//! shouldn't be fatal to the link.
//!
//! Not wired into `ProtocolCore`'s event loop: `SocketManager` exposes only
//! the two UDP pairs, so a TCP tag channel has nowhere to plug in yet. The
//! decoder is kept and tested standalone so an adapter that does open a
//! persistent TCP telemetry connection can reuse it.

use std::str;
use tracing::{event, Level};

#[derive(Debug)]
pub enum TcpTag<'t> {
    RadioEvent(&'t str),
    UsageReport,
    DisableFaults { comms: u16, pwr12v: u16 },
    RailFaults { pwr6v: u16, pwr5v: u16, pwr3_3v: u16 },
    VersionInfo { ty: u8, id: u8, name: &'t str, version: &'t str },
    ErrorMessage { timestamp: f32, seqnum: u16, error_code: i32, is_error: bool, details: &'t str },
    Stdout { timestamp: f32, seqnum: u16, message: &'t str },
}

/// Logs the side effect of one decoded tag.
pub fn log_tag(tag: &TcpTag<'_>) {
    match tag {
        TcpTag::RadioEvent(message) => event!(Level::INFO, radio_message = message, "radio event"),
        TcpTag::UsageReport => event!(Level::DEBUG, "usage report received"),
        TcpTag::DisableFaults { comms, pwr12v } => {
            event!(Level::ERROR, comms, pwr12v, "a disable fault occurred")
        }
        TcpTag::RailFaults { pwr6v, pwr5v, pwr3_3v } => {
            event!(Level::ERROR, pwr6v, pwr5v, pwr3_3v, "a rail fault occurred")
        }
        TcpTag::VersionInfo { ty, id, name, version } => {
            event!(Level::INFO, r#type = ty, id, name, version, "version info")
        }
        TcpTag::ErrorMessage { timestamp, seqnum, error_code, is_error, details } => {
            if *is_error {
                event!(Level::ERROR, timestamp, seqnum, error_code, details, "robot error");
            } else {
                event!(Level::WARN, timestamp, seqnum, error_code, details, "robot warning");
            }
        }
        TcpTag::Stdout { timestamp, seqnum, message } => {
            event!(Level::INFO, timestamp, seqnum, stdout = message, "robot stdout")
        }
    }
}

/// Decodes every tag in `buf`, logging each one, and returns them for
/// callers that also want the structured values.
pub fn decode_tags(buf: &[u8]) -> Vec<TcpTag<'_>> {
    let mut tags = Vec::new();
    let mut pos = 0usize;

    while pos + 2 <= buf.len() {
        let size = u16::from_be_bytes([buf[pos], buf[pos + 1]]) as usize;
        pos += 2;
        if size == 0 || pos + size > buf.len() {
            break;
        }
        let id = buf[pos];
        let body = &buf[pos + 1..pos + size];
        pos += size;

        let Some(tag) = decode_one(id, body) else {
            continue;
        };
        log_tag(&tag);
        tags.push(tag);
    }

    tags
}

fn decode_one(id: u8, body: &[u8]) -> Option<TcpTag<'_>> {
    match id {
        0x00 => Some(TcpTag::RadioEvent(str::from_utf8(body).ok()?)),
        0x01 => Some(TcpTag::UsageReport),
        0x04 if body.len() >= 4 => Some(TcpTag::DisableFaults {
            comms: u16::from_be_bytes([body[0], body[1]]),
            pwr12v: u16::from_be_bytes([body[2], body[3]]),
        }),
        0x05 if body.len() >= 6 => Some(TcpTag::RailFaults {
            pwr6v: u16::from_be_bytes([body[0], body[1]]),
            pwr5v: u16::from_be_bytes([body[2], body[3]]),
            pwr3_3v: u16::from_be_bytes([body[4], body[5]]),
        }),
        0x0A if body.len() >= 5 => {
            let ty = body[0];
            let id = body[2];
            let name_len = body[3] as usize;
            if body.len() < 4 + name_len + 1 {
                return None;
            }
            let name = str::from_utf8(&body[4..4 + name_len]).ok()?;
            let version_len = body[4 + name_len] as usize;
            let version_start = 5 + name_len;
            if body.len() < version_start + version_len {
                return None;
            }
            let version = str::from_utf8(&body[version_start..version_start + version_len]).ok()?;
            Some(TcpTag::VersionInfo { ty, id, name, version })
        }
        0x0B if body.len() >= 13 => {
            let timestamp = f32::from_be_bytes([body[0], body[1], body[2], body[3]]);
            let seqnum = u16::from_be_bytes([body[4], body[5]]);
            let error_code = i32::from_be_bytes([body[7], body[8], body[9], body[10]]);
            let is_error = body[11] & 0x01 != 0;
            let details_len = u16::from_be_bytes([body[12], body.get(13).copied().unwrap_or(0)]) as usize;
            let details = body
                .get(14..14 + details_len)
                .and_then(|s| str::from_utf8(s).ok())
                .unwrap_or("");
            Some(TcpTag::ErrorMessage { timestamp, seqnum, error_code, is_error, details })
        }
        0x0C if body.len() >= 6 => {
            let timestamp = f32::from_be_bytes([body[0], body[1], body[2], body[3]]);
            let seqnum = u16::from_be_bytes([body[4], body[5]]);
            let message = str::from_utf8(&body[6..]).unwrap_or("");
            Some(TcpTag::Stdout { timestamp, seqnum, message })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_disable_fault_tag() {
        let mut buf = Vec::new();
        buf.extend(5u16.to_be_bytes()); // size = id byte + 4 data bytes
        buf.push(0x04);
        buf.extend(1u16.to_be_bytes());
        buf.extend(2u16.to_be_bytes());

        let tags = decode_tags(&buf);
        assert_eq!(tags.len(), 1);
        match &tags[0] {
            TcpTag::DisableFaults { comms, pwr12v } => {
                assert_eq!(*comms, 1);
                assert_eq!(*pwr12v, 2);
            }
            other => panic!("unexpected tag {other:?}"),
        }
    }

    #[test]
    fn stops_cleanly_on_a_truncated_tag() {
        let buf = [0x00, 0x05, 0x04, 0x00, 0x01];
        assert!(decode_tags(&buf).is_empty());
    }

    #[test]
    fn decodes_a_radio_event() {
        let mut buf = Vec::new();
        let message = b"link up";
        buf.extend(((message.len() + 1) as u16).to_be_bytes());
        buf.push(0x00);
        buf.extend_from_slice(message);

        let tags = decode_tags(&buf);
        assert_eq!(tags.len(), 1);
        match &tags[0] {
            TcpTag::RadioEvent(text) => assert_eq!(*text, "link up"),
            other => panic!("unexpected tag {other:?}"),
        }
    }
}
