//! Builds the UDP control datagram sent to the robot each tick, carrying
//! the alliance/station, enable/e-stop/mode bits, any pending one-shot
//! reboot/restart request, and the joystick snapshot.

use crate::core::{ControlMode, ProtocolCore};
use crate::input::JoystickSnapshot;

use super::wire::{Control, Request};

fn control_bits(core: &ProtocolCore) -> Control {
    let mut control = Control::empty();
    if core.emergency_stop() {
        control |= Control::ESTOP;
    }
    if core.enabled() {
        control |= Control::ENABLED;
    }
    control |= match core.control_mode() {
        ControlMode::Autonomous => Control::AUTO,
        ControlMode::Test => Control::TEST,
        ControlMode::Teleop | ControlMode::Invalid => Control::TELEOP,
    };
    control
}

fn request_bits(core: &ProtocolCore) -> Request {
    let mut req = Request::empty();
    if core.take_pending_reboot() {
        req |= Request::REBOOT_RIO;
    }
    if core.take_pending_restart_code() {
        req |= Request::RESTART_CODE;
    }
    req
}

fn write_joystick_tag(buf: &mut Vec<u8>, snapshot: &JoystickSnapshot) {
    let mut tag = Vec::new();
    tag.push(snapshot.axis_count() as u8);
    tag.extend(snapshot.axes.iter().map(|axis| (axis.clamp(-1.0, 1.0) * 127.0) as i8 as u8));

    let button_bytes = snapshot.button_count().div_ceil(8);
    tag.push(button_bytes as u8);
    for chunk in snapshot.buttons.chunks(8) {
        let mut byte = 0u8;
        for (i, pressed) in chunk.iter().enumerate() {
            if *pressed {
                byte |= 1 << i;
            }
        }
        tag.push(byte);
    }

    tag.push(0); // no POV hats modeled by `JoystickSnapshot`.

    buf.push((tag.len() + 1) as u8);
    buf.push(0x0C);
    buf.extend(tag);
}

/// Builds one outgoing control datagram. `seqnum` is the caller-maintained
/// per-tick sequence counter; adapters own their own counters, the core
/// does not track one.
///
/// `include_requests` gates whether the pending one-shot reboot/restart
/// flags are read and consumed. Only the robot datagram carries them; the
/// FMS datagram must never call `take_pending_reboot`/`take_pending_restart_code`,
/// since doing so on whichever cadence happens to tick first would silently
/// drop a request the robot datagram never got to send.
pub fn encode(
    core: &ProtocolCore,
    joysticks: &[JoystickSnapshot],
    seqnum: u16,
    include_requests: bool,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + joysticks.len() * 12);
    buf.extend(seqnum.to_be_bytes());
    buf.push(0x01); // comm version
    buf.push(control_bits(core).bits());
    let request = if include_requests { request_bits(core) } else { Request::empty() };
    buf.push(request.bits());
    buf.push(core.alliance().station());

    for joystick in joysticks {
        write_joystick_tag(&mut buf, joystick);
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::input::FixedAggregator;

    fn control_byte(buf: &[u8]) -> u8 {
        buf[3]
    }
    fn request_byte(buf: &[u8]) -> u8 {
        buf[4]
    }
    fn alliance_byte(buf: &[u8]) -> u8 {
        buf[5]
    }

    async fn core_for_test() -> Arc<ProtocolCore> {
        let adapter = Arc::new(super::super::FrcAdapter::for_tests());
        let input = Arc::new(FixedAggregator(vec![]));
        ProtocolCore::with_interfaces(
            adapter,
            input,
            3794,
            Arc::new(crate::discovery::SystemInterfaces),
        )
        .await
        .expect("bind should succeed on ephemeral ports")
    }

    #[tokio::test]
    async fn enabled_sets_the_enabled_bit() {
        let core = core_for_test().await;
        core.set_enabled(true);
        let buf = encode(&core, &[], 0, true);
        assert_ne!(control_byte(&buf) & Control::ENABLED.bits(), 0);
    }

    #[tokio::test]
    async fn estop_sets_the_estop_bit_and_clears_after_500ms() {
        let core = core_for_test().await;
        core.set_emergency_stop(true);
        let buf = encode(&core, &[], 0, true);
        assert_ne!(control_byte(&buf) & Control::ESTOP.bits(), 0);
    }

    #[tokio::test]
    async fn pending_reboot_is_consumed_exactly_once() {
        let core = core_for_test().await;
        core.request_reboot_roborio();
        let first = encode(&core, &[], 0, true);
        let second = encode(&core, &[], 1, true);
        assert_ne!(request_byte(&first) & Request::REBOOT_RIO.bits(), 0);
        assert_eq!(request_byte(&second) & Request::REBOOT_RIO.bits(), 0);
    }

    #[tokio::test]
    async fn encoding_without_requests_does_not_consume_the_pending_flags() {
        let core = core_for_test().await;
        core.request_reboot_roborio();
        let fms_like = encode(&core, &[], 0, false);
        assert_eq!(request_byte(&fms_like) & Request::REBOOT_RIO.bits(), 0);

        // Still pending — the unrelated encode above must not have
        // consumed it.
        let robot_like = encode(&core, &[], 1, true);
        assert_ne!(request_byte(&robot_like) & Request::REBOOT_RIO.bits(), 0);
    }

    #[tokio::test]
    async fn alliance_station_matches_core_setting() {
        let core = core_for_test().await;
        core.set_alliance(crate::core::Alliance::Blue2);
        let buf = encode(&core, &[], 0, true);
        assert_eq!(alliance_byte(&buf), crate::core::Alliance::Blue2.station());
    }

    #[tokio::test]
    async fn joystick_axes_round_trip_through_i8_scaling() {
        let core = core_for_test().await;
        let snapshot = JoystickSnapshot {
            axes: vec![1.0, -1.0, 0.0],
            buttons: vec![true, false, true, false, false, false, false, false, true],
        };
        let buf = encode(&core, std::slice::from_ref(&snapshot), 0, true);
        // header(6) + tag-size(1) + tag-id(1) + axis-count(1) + 3 axes
        let axis_section = &buf[9..12];
        assert_eq!(axis_section[0] as i8, 127);
        assert_eq!(axis_section[1] as i8, -127);
        assert_eq!(axis_section[2] as i8, 0);
    }
}
