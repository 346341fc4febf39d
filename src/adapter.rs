//! The pluggability seam: a concrete wire format plugs into the core by
//! implementing `Adapter`, a capability interface passed by value at
//! construction, with state-change observation through a subscribable
//! broadcast stream keyed by `ChangeKind`.

use crate::core::{CommStatus, ControlMode, ProtocolCore};
use crate::error::{ConfigError, Result};
use crate::input::JoystickSnapshot;
use crate::socket_manager::AdapterPorts;

/// Supplied by a protocol variant: encoders, decoders, ports, cadences, and
/// the two hooks the connection state machine calls on Partial→Full and
/// Full→Failing.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;

    fn fms_hz(&self) -> u32;
    fn robot_hz(&self) -> u32;

    fn tcp_probe_port(&self) -> u16;
    fn ports(&self) -> AdapterPorts;

    /// How many candidate robot IPs the sweep dwells on per output period.
    fn scanner_count(&self) -> u32 {
        1
    }

    fn extra_radio_ips(&self) -> Vec<String> {
        Vec::new()
    }
    fn extra_robot_ips(&self) -> Vec<String> {
        Vec::new()
    }

    /// FMS destination address for this team, if this adapter talks to an
    /// FMS at all. An adapter with no FMS link returns `None` and
    /// `on_fms_tick` becomes a no-op send.
    fn fms_target(&self, _team: u32) -> Option<std::net::IpAddr> {
        None
    }

    fn build_fms_packet(&self, core: &ProtocolCore, joysticks: &[JoystickSnapshot]) -> Vec<u8>;
    fn build_robot_packet(&self, core: &ProtocolCore, joysticks: &[JoystickSnapshot]) -> Vec<u8>;

    /// Returns `true` iff the bytes decoded successfully; may mutate `core`
    /// via its setters as a side effect (voltage, robot code, etc).
    fn parse_fms_packet(&self, core: &ProtocolCore, bytes: &[u8]) -> bool;
    fn parse_robot_packet(&self, core: &ProtocolCore, bytes: &[u8]) -> bool;

    /// Called once on the Partial→Full transition.
    fn request_robot_information(&self, _core: &ProtocolCore) {}

    /// Called once on the Full→Failing transition.
    fn reset_hook(&self, _core: &ProtocolCore) {}
}

/// Validates an adapter at installation time: non-positive Hz or a zero
/// scanner count are the only configuration conditions the core treats as
/// a hard error.
pub fn validate(adapter: &dyn Adapter) -> Result<()> {
    if adapter.fms_hz() == 0 {
        return Err(ConfigError::NonPositiveFmsHz(0));
    }
    if adapter.robot_hz() == 0 {
        return Err(ConfigError::NonPositiveRobotHz(0));
    }
    if adapter.scanner_count() == 0 {
        return Err(ConfigError::ZeroScannerCount(0));
    }
    Ok(())
}

/// A named change to `ProtocolCore`'s observable state, emitted onto the
/// subscribable event stream every time a setter or state-machine
/// transition updates a field. `kind()` lets subscribers filter by change
/// kind without matching the whole enum.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    Enabled(bool),
    EmergencyStop(bool),
    EStopFired,
    ControlMode(ControlMode),
    CommStatus(CommStatus),
    Team(u32),
    RobotCode(bool),
    RadioConnected(bool),
    VoltageBrownout(bool),
    Battery(f32),
    Operating(bool),
    SendDatetime(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Enabled,
    EmergencyStop,
    EStopFired,
    ControlMode,
    CommStatus,
    Team,
    RobotCode,
    RadioConnected,
    VoltageBrownout,
    Battery,
    Operating,
    SendDatetime,
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Enabled(_) => ChangeKind::Enabled,
            ChangeEvent::EmergencyStop(_) => ChangeKind::EmergencyStop,
            ChangeEvent::EStopFired => ChangeKind::EStopFired,
            ChangeEvent::ControlMode(_) => ChangeKind::ControlMode,
            ChangeEvent::CommStatus(_) => ChangeKind::CommStatus,
            ChangeEvent::Team(_) => ChangeKind::Team,
            ChangeEvent::RobotCode(_) => ChangeKind::RobotCode,
            ChangeEvent::RadioConnected(_) => ChangeKind::RadioConnected,
            ChangeEvent::VoltageBrownout(_) => ChangeKind::VoltageBrownout,
            ChangeEvent::Battery(_) => ChangeKind::Battery,
            ChangeEvent::Operating(_) => ChangeKind::Operating,
            ChangeEvent::SendDatetime(_) => ChangeKind::SendDatetime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_of_matches_variant() {
        assert_eq!(ChangeEvent::Enabled(true).kind(), ChangeKind::Enabled);
        assert_eq!(ChangeEvent::EStopFired.kind(), ChangeKind::EStopFired);
    }
}
