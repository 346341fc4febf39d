//! Decodes the UDP status datagram the robot reports on the robot-input
//! socket, feeding the result into `ProtocolCore`'s setters.

use crate::core::{ControlMode, ProtocolCore};
use crate::input::InputAggregator;

use super::wire::{Status, Trace};

struct DecodedHeader {
    status: Status,
    trace: Trace,
    battery_whole: u8,
    battery_hundredths: u8,
    need_date: bool,
}

fn parse_header(buf: &[u8]) -> Option<DecodedHeader> {
    if buf.len() < 8 {
        return None;
    }
    let status = Status::from_bits(buf[3])?;
    let trace = Trace::from_bits(buf[4])?;
    // Whole volts in buf[5]; buf[6] is a fractional byte (0..=255) scaled
    // down to hundredths for `ProtocolCore::set_voltage`'s digit/decimal
    // contract.
    let battery_whole = buf[5];
    let battery_hundredths = ((buf[6] as u32 * 100) / 256) as u8;
    let need_date = buf[7] == 1;
    Some(DecodedHeader {
        status,
        trace,
        battery_whole,
        battery_hundredths,
        need_date,
    })
}

fn mode_of(status: Status) -> ControlMode {
    if status.is_in_auto() {
        ControlMode::Autonomous
    } else if status.is_in_test() {
        ControlMode::Test
    } else {
        ControlMode::Teleop
    }
}

/// Walks the tag section following the 8-byte fixed header, applying each
/// tag's side effect to `core`. Unknown tag ids are skipped, matching the
/// original decoder's tolerance of as-yet-unsupported tags.
fn apply_tags(core: &ProtocolCore, input: &dyn InputAggregator, buf: &[u8]) {
    let mut pos = 0usize;
    while pos + 2 <= buf.len() {
        let tag_size = buf[pos] as usize;
        let tag_id = buf[pos + 1];
        pos += 2;
        if tag_size == 0 || pos + tag_size - 1 > buf.len() {
            break;
        }
        let body = &buf[pos..pos + tag_size - 1];
        pos += tag_size - 1;

        match tag_id {
            // Joystick output (rumble passthrough): 4-byte output bitmap +
            // two u16 rumble magnitudes.
            0x01 if body.len() >= 8 => {
                let left_rumble = u16::from_be_bytes([body[4], body[5]]);
                let right_rumble = u16::from_be_bytes([body[6], body[7]]);
                input.rumble(0, left_rumble, right_rumble);
            }
            // CAN utilization tag.
            0x0E if body.len() >= 4 => {
                let utilization = f32::from_be_bytes([body[0], body[1], body[2], body[3]]);
                core.set_can_utilization(utilization);
            }
            _ => {}
        }
    }
}

/// Decodes one UDP status datagram and applies it to `core`. Returns
/// `false` on a malformed header, matching `Adapter::parse_robot_packet`'s
/// contract.
pub fn decode(core: &ProtocolCore, input: &dyn InputAggregator, buf: &[u8]) -> bool {
    let Some(header) = parse_header(buf) else {
        return false;
    };

    core.set_voltage(
        &header.battery_whole.to_string(),
        &header.battery_hundredths.to_string(),
    );
    core.set_robot_code(header.trace.has_robot_code());
    core.set_voltage_brownout(header.status.is_browned_out());
    core.set_send_datetime(header.need_date);
    if header.status.is_estopped() {
        core.set_emergency_stop(true);
    }
    core.set_enabled(header.status.is_enabled() && !header.status.is_estopped());
    core.set_control_mode(mode_of(header.status));

    apply_tags(core, input, &buf[8..]);
    true
}
