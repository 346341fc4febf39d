//! A minimal loopback adapter with a self-consistent binary format, used by
//! the integration tests in `tests/` to exercise the full connection
//! lifecycle without any real FRC hardware. Grounded on the simulated
//! connection task in `examples/other_examples/757ce93b_drakeerv-ds-rs` —
//! a background task standing in for the robot side of the link so the
//! core can be driven end-to-end in-process.

use std::net::IpAddr;

use crate::adapter::Adapter;
use crate::core::{ControlMode, ProtocolCore};
use crate::input::JoystickSnapshot;
use crate::socket_manager::AdapterPorts;

/// Robot packet layout: `[enabled, estop, mode, station, axis_count, axes...]`.
pub struct SimAdapter {
    ports: AdapterPorts,
}

impl SimAdapter {
    pub fn new(ports: AdapterPorts) -> Self {
        Self { ports }
    }

    /// Ephemeral-port variant for tests that don't care which ports get
    /// bound, only that the core can exchange loopback datagrams.
    pub fn ephemeral() -> Self {
        Self::new(AdapterPorts {
            fms_input_port: 0,
            fms_output_port: 0,
            robot_input_port: 0,
            robot_output_port: 0,
        })
    }
}

fn mode_byte(mode: ControlMode) -> u8 {
    match mode {
        ControlMode::Invalid => 0,
        ControlMode::Teleop => 1,
        ControlMode::Autonomous => 2,
        ControlMode::Test => 3,
    }
}

impl Adapter for SimAdapter {
    fn name(&self) -> &str {
        "sim"
    }

    fn fms_hz(&self) -> u32 {
        2
    }

    fn robot_hz(&self) -> u32 {
        20
    }

    fn tcp_probe_port(&self) -> u16 {
        self.ports.robot_output_port
    }

    fn ports(&self) -> AdapterPorts {
        AdapterPorts {
            fms_input_port: self.ports.fms_input_port,
            fms_output_port: self.ports.fms_output_port,
            robot_input_port: self.ports.robot_input_port,
            robot_output_port: self.ports.robot_output_port,
        }
    }

    fn fms_target(&self, _team: u32) -> Option<IpAddr> {
        None
    }

    fn build_fms_packet(&self, _core: &ProtocolCore, _joysticks: &[JoystickSnapshot]) -> Vec<u8> {
        vec![0x46, 0x4D, 0x53] // "FMS", opaque heartbeat payload
    }

    fn build_robot_packet(&self, core: &ProtocolCore, joysticks: &[JoystickSnapshot]) -> Vec<u8> {
        let mut buf = vec![
            core.enabled() as u8,
            core.emergency_stop() as u8,
            mode_byte(core.control_mode()),
            core.alliance().station(),
        ];
        if let Some(joystick) = joysticks.first() {
            buf.push(joystick.axis_count() as u8);
            buf.extend(joystick.axes.iter().map(|a| (a.clamp(-1.0, 1.0) * 127.0) as i8 as u8));
        } else {
            buf.push(0);
        }
        buf
    }

    fn parse_fms_packet(&self, _core: &ProtocolCore, bytes: &[u8]) -> bool {
        bytes.starts_with(b"FMS")
    }

    /// Decodes a loopback reply: `[battery_whole, battery_hundredths,
    /// robot_code, brownout]`. A simulated robot always reports its own
    /// code as present and never browns out.
    fn parse_robot_packet(&self, core: &ProtocolCore, bytes: &[u8]) -> bool {
        if bytes.len() < 4 {
            return false;
        }
        core.set_voltage(&bytes[0].to_string(), &bytes[1].to_string());
        core.set_robot_code(bytes[2] != 0);
        core.set_voltage_brownout(bytes[3] != 0);
        true
    }
}

/// Builds the reply a simulated robot would send back for a given request
/// datagram, used by integration tests to drive the watchdog/state machine
/// without a real network peer.
pub fn simulate_robot_reply(_request: &[u8], battery_whole: u8, battery_hundredths: u8) -> Vec<u8> {
    vec![battery_whole, battery_hundredths, true as u8, 0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::input::FixedAggregator;

    async fn core_for_test() -> Arc<ProtocolCore> {
        let adapter = Arc::new(SimAdapter::ephemeral());
        let input = Arc::new(FixedAggregator(vec![]));
        ProtocolCore::with_interfaces(
            adapter,
            input,
            118,
            Arc::new(crate::discovery::SystemInterfaces),
        )
        .await
        .expect("bind should succeed on ephemeral ports")
    }

    #[tokio::test]
    async fn robot_packet_reflects_enabled_and_mode() {
        let core = core_for_test().await;
        core.set_enabled(true);
        core.set_control_mode(ControlMode::Autonomous);
        let buf = SimAdapter::ephemeral().build_robot_packet(&core, &[]);
        assert_eq!(buf[0], 1);
        assert_eq!(buf[2], mode_byte(ControlMode::Autonomous));
    }

    #[tokio::test]
    async fn parsing_a_reply_updates_robot_code_and_voltage() {
        let core = core_for_test().await;
        let adapter = SimAdapter::ephemeral();
        let reply = simulate_robot_reply(&[0, 0, 1, 0], 12, 45);
        assert!(adapter.parse_robot_packet(&core, &reply));
        assert!(core.robot_code());
        assert_eq!(core.battery_voltage().0, "12.45");
    }

    #[tokio::test]
    async fn a_short_reply_is_rejected() {
        let core = core_for_test().await;
        let adapter = SimAdapter::ephemeral();
        assert!(!adapter.parse_robot_packet(&core, &[1, 2]));
    }
}
