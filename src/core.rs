//! Protocol Core: orchestrates discovery, sockets, probers, the watchdog,
//! and the input aggregator behind a pluggable `Adapter`, exposing the
//! observable state and commands of the driver station link.
//!
//! Every public method takes `&self`; all mutable state lives behind
//! `crossbeam_utils::atomic::AtomicCell` (scalar fields) or `parking_lot`
//! locks (collections, never held across an `.await`). `ProtocolCore` is
//! always constructed behind an `Arc` so that
//! the one cooperative event-loop task (`run_event_loop`) and any number of
//! external callers can share it without the core itself juggling threads.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Weak};

use crossbeam_utils::atomic::AtomicCell;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::adapter::{Adapter, ChangeEvent};
use crate::clock::{spawn_after, PeriodicTimer};
use crate::discovery::{self, InterfaceSource, SystemInterfaces};
use crate::error::InstallError;
use crate::input::{InputAggregator, JoystickSnapshot};
use crate::prober::{ProbeState, Prober};
use crate::socket_manager::SocketManager;
use crate::watchdog::Watchdog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alliance {
    #[default]
    Red1,
    Red2,
    Red3,
    Blue1,
    Blue2,
    Blue3,
}

impl Alliance {
    /// Wire-format alliance/station index.
    pub const fn station(self) -> u8 {
        match self {
            Alliance::Red1 => 0,
            Alliance::Red2 => 1,
            Alliance::Red3 => 2,
            Alliance::Blue1 => 3,
            Alliance::Blue2 => 4,
            Alliance::Blue3 => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    #[default]
    Invalid,
    Teleop,
    Autonomous,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommStatus {
    #[default]
    Failing,
    Partial,
    Full,
}

/// Normalizes adapter-supplied voltage digit/decimal strings, returning the
/// canonical `"DD.dd"` form and its float mirror.
pub fn normalize_voltage(digit: &str, decimal: &str) -> (String, f32) {
    let digit = if digit.len() < 2 {
        format!("0{digit}")
    } else {
        digit.to_string()
    };
    let decimal = if decimal.len() < 2 {
        format!("0{decimal}")
    } else if decimal.len() > 2 {
        decimal[..2].to_string()
    } else {
        decimal.to_string()
    };
    let formatted = format!("{digit}.{decimal}");
    let value = formatted.parse::<f32>().unwrap_or(0.0);
    (formatted, value)
}

fn bump(cell: &AtomicCell<u64>) -> u64 {
    let next = cell.load() + 1;
    cell.store(next);
    next
}

pub struct ProtocolCore {
    team: AtomicCell<u32>,
    alliance: AtomicCell<Alliance>,
    control_mode: AtomicCell<ControlMode>,
    enabled: AtomicCell<bool>,
    emergency_stop: AtomicCell<bool>,
    estop_generation: AtomicCell<u64>,
    operating: AtomicCell<bool>,
    robot_code: AtomicCell<bool>,
    radio_connected: AtomicCell<bool>,
    voltage_brownout: AtomicCell<bool>,
    battery_value: AtomicCell<f32>,
    battery_formatted: Mutex<String>,
    comm_status: AtomicCell<CommStatus>,
    send_datetime: AtomicCell<bool>,
    sent_fms_packets: AtomicCell<u64>,
    sent_robot_packets: AtomicCell<u64>,
    robot_ips: RwLock<Vec<String>>,
    radio_ips: RwLock<Vec<String>>,
    interface_count: AtomicCell<u32>,
    can_utilization: AtomicCell<f32>,
    pending_reboot: AtomicCell<bool>,
    pending_restart_code: AtomicCell<bool>,

    events: broadcast::Sender<ChangeEvent>,
    adapter: Arc<dyn Adapter>,
    input: Arc<dyn InputAggregator>,
    interfaces: Arc<dyn InterfaceSource>,
    sockets: SocketManager,
    watchdog: Watchdog,
    radio_prober: Prober,
    robot_prober: Prober,

    self_weak: Weak<ProtocolCore>,
}

impl ProtocolCore {
    /// Validates the adapter, binds its sockets, and returns a core ready
    /// for `spawn_event_loop`. Uses `if-addrs` for interface enumeration;
    /// see `with_interfaces` to inject a test double.
    pub async fn new(
        adapter: Arc<dyn Adapter>,
        input: Arc<dyn InputAggregator>,
        team: u32,
    ) -> Result<Arc<Self>, InstallError> {
        Self::with_interfaces(adapter, input, team, Arc::new(SystemInterfaces)).await
    }

    pub async fn with_interfaces(
        adapter: Arc<dyn Adapter>,
        input: Arc<dyn InputAggregator>,
        team: u32,
        interfaces: Arc<dyn InterfaceSource>,
    ) -> Result<Arc<Self>, InstallError> {
        crate::adapter::validate(adapter.as_ref())?;

        let sockets = SocketManager::bind(adapter.ports(), adapter.scanner_count()).await?;
        let (events, _rx) = broadcast::channel(256);

        let discovered = discovery::regenerate(
            team,
            &adapter.extra_radio_ips(),
            &adapter.extra_robot_ips(),
            interfaces.as_ref(),
        );
        sockets.refresh_ips(discovered.robot_ips.clone());

        let radio_prober = Prober::new(discovery::radio_static_ip(team), 80);
        let robot_prober = Prober::new("127.0.0.1", adapter.tcp_probe_port());

        let core = Arc::new_cyclic(|weak| ProtocolCore {
            team: AtomicCell::new(team),
            alliance: AtomicCell::new(Alliance::default()),
            control_mode: AtomicCell::new(ControlMode::default()),
            enabled: AtomicCell::new(false),
            emergency_stop: AtomicCell::new(false),
            estop_generation: AtomicCell::new(0),
            operating: AtomicCell::new(false),
            robot_code: AtomicCell::new(false),
            radio_connected: AtomicCell::new(false),
            voltage_brownout: AtomicCell::new(false),
            battery_value: AtomicCell::new(0.0),
            battery_formatted: Mutex::new("00.00".to_string()),
            comm_status: AtomicCell::new(CommStatus::Failing),
            send_datetime: AtomicCell::new(false),
            sent_fms_packets: AtomicCell::new(0),
            sent_robot_packets: AtomicCell::new(0),
            robot_ips: RwLock::new(discovered.robot_ips),
            radio_ips: RwLock::new(discovered.radio_ips),
            interface_count: AtomicCell::new(discovered.interface_count),
            can_utilization: AtomicCell::new(0.0),
            pending_reboot: AtomicCell::new(false),
            pending_restart_code: AtomicCell::new(false),
            events,
            adapter,
            input,
            interfaces,
            sockets,
            watchdog: Watchdog::new(500),
            radio_prober,
            robot_prober,
            self_weak: weak.clone(),
        });

        // Initialization ceremony.
        let reset_handle = core.clone();
        spawn_after(200, async move {
            reset_handle.reset().await;
        });
        let init_handle = core.clone();
        spawn_after(800, async move {
            init_handle.initialize().await;
        });

        Ok(core)
    }

    fn emit(&self, event: ChangeEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    // ---- getters ------------------------------------------------------------

    pub fn team(&self) -> u32 {
        self.team.load()
    }
    pub fn alliance(&self) -> Alliance {
        self.alliance.load()
    }
    pub fn control_mode(&self) -> ControlMode {
        self.control_mode.load()
    }
    pub fn enabled(&self) -> bool {
        self.enabled.load()
    }
    pub fn emergency_stop(&self) -> bool {
        self.emergency_stop.load()
    }
    pub fn operating(&self) -> bool {
        self.operating.load()
    }
    pub fn robot_code(&self) -> bool {
        self.robot_code.load()
    }
    pub fn radio_connected(&self) -> bool {
        self.radio_connected.load()
    }
    pub fn voltage_brownout(&self) -> bool {
        self.voltage_brownout.load()
    }
    /// `("DD.dd", float mirror)`.
    pub fn battery_voltage(&self) -> (String, f32) {
        (self.battery_formatted.lock().clone(), self.battery_value.load())
    }
    pub fn comm_status(&self) -> CommStatus {
        self.comm_status.load()
    }
    pub fn send_datetime(&self) -> bool {
        self.send_datetime.load()
    }
    pub fn sent_fms_packets(&self) -> u64 {
        self.sent_fms_packets.load()
    }
    pub fn sent_robot_packets(&self) -> u64 {
        self.sent_robot_packets.load()
    }
    pub fn robot_ips(&self) -> Vec<String> {
        self.robot_ips.read().clone()
    }
    pub fn radio_ips(&self) -> Vec<String> {
        self.radio_ips.read().clone()
    }
    pub fn interface_count(&self) -> u32 {
        self.interface_count.load()
    }
    pub fn can_utilization(&self) -> f32 {
        self.can_utilization.load()
    }
    pub fn robot_address(&self) -> String {
        self.sockets.robot_address()
    }

    /// Locally bound robot-in address, for tests driving the core with real
    /// loopback datagrams against ephemeral ports.
    pub fn robot_in_local_addr(&self) -> std::io::Result<SocketAddr> {
        self.sockets.robot_in_local_addr()
    }

    pub fn fms_in_local_addr(&self) -> std::io::Result<SocketAddr> {
        self.sockets.fms_in_local_addr()
    }
    pub fn joysticks(&self) -> Vec<JoystickSnapshot> {
        self.input.snapshot()
    }

    /// Exposes the injected input aggregator for adapters that need to
    /// forward rumble passthrough during decode, without the `Adapter`
    /// trait itself threading an extra parameter through every call.
    pub fn input_handle(&self) -> &dyn InputAggregator {
        self.input.as_ref()
    }
    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    // ---- commands -------------------------------------------------------------

    pub fn start(&self) {
        self.operating.store(true);
        self.emit(ChangeEvent::Operating(true));
    }

    pub fn stop(&self) {
        self.operating.store(false);
        self.emit(ChangeEvent::Operating(false));
    }

    /// Idempotent; regenerates IP lists only if no robot address has been
    /// pinned or confirmed yet, and always restarts the sweep cursor.
    #[instrument(skip(self))]
    pub async fn reset(&self) {
        if !self.sockets.is_pinned() && self.sockets.robot_address().is_empty() {
            self.regenerate_ips().await;
        }
        self.sockets.restart_sweep();
    }

    /// Re-enumerates interfaces and rebuilds `robot_ips`/`radio_ips`.
    pub async fn regenerate_ips(&self) {
        let discovered = discovery::regenerate(
            self.team.load(),
            &self.adapter.extra_radio_ips(),
            &self.adapter.extra_robot_ips(),
            self.interfaces.as_ref(),
        );
        *self.radio_ips.write() = discovered.radio_ips;
        *self.robot_ips.write() = discovered.robot_ips.clone();
        self.interface_count.store(discovered.interface_count);
        self.sockets.refresh_ips(discovered.robot_ips);
        self.radio_prober
            .retarget(discovery::radio_static_ip(self.team.load()), 80);
    }

    pub async fn set_team(&self, team: u32) {
        if self.team.swap(team) != team {
            self.regenerate_ips().await;
            self.emit(ChangeEvent::Team(team));
        }
    }

    pub fn set_alliance(&self, alliance: Alliance) {
        self.alliance.store(alliance);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled);
        self.emit(ChangeEvent::Enabled(enabled));
    }

    /// Marks robot-code liveness. A `true → false` transition automatically
    /// demotes `enabled`, even though callers never observe that demotion
    /// as a distinct error.
    pub fn set_robot_code(&self, present: bool) {
        self.robot_code.store(present);
        self.emit(ChangeEvent::RobotCode(present));
        if !present && self.enabled.swap(false) {
            self.emit(ChangeEvent::Enabled(false));
        }
    }

    fn set_radio_connected(&self, connected: bool) {
        self.radio_connected.store(connected);
        self.emit(ChangeEvent::RadioConnected(connected));
    }

    pub fn set_voltage_brownout(&self, brownout: bool) {
        self.voltage_brownout.store(brownout);
        self.emit(ChangeEvent::VoltageBrownout(brownout));
    }

    pub fn set_send_datetime(&self, requested: bool) {
        self.send_datetime.store(requested);
        self.emit(ChangeEvent::SendDatetime(requested));
    }

    pub fn set_can_utilization(&self, value: f32) {
        self.can_utilization.store(value);
    }

    /// Normalizes and stores a voltage reading. Called by an adapter's
    /// decoder.
    pub fn set_voltage(&self, digit: &str, decimal: &str) {
        let (formatted, value) = normalize_voltage(digit, decimal);
        *self.battery_formatted.lock() = formatted;
        self.battery_value.store(value);
        self.emit(ChangeEvent::Battery(value));
    }

    fn zero_voltage(&self) {
        *self.battery_formatted.lock() = "00.00".to_string();
        self.battery_value.store(0.0);
        self.emit(ChangeEvent::Battery(0.0));
    }

    /// Stores `true`/`false` and, for `true`, re-arms a fresh 500ms one-shot
    /// auto-clear — each call supersedes any still-pending clear from a
    /// prior call.
    pub fn set_emergency_stop(&self, stop: bool) {
        self.emergency_stop.store(stop);
        let generation = self.estop_generation.load() + 1;
        self.estop_generation.store(generation);
        self.emit(ChangeEvent::EmergencyStop(stop));
        self.emit(ChangeEvent::EStopFired);

        if stop {
            let weak = self.self_weak.clone();
            spawn_after(500, async move {
                let Some(core) = weak.upgrade() else { return };
                if core.estop_generation.load() == generation {
                    core.emergency_stop.store(false);
                    core.emit(ChangeEvent::EmergencyStop(false));
                }
            });
        }
    }

    /// Rejected (silently) while e-stopped; otherwise stored and emitted.
    pub fn set_control_mode(&self, mode: ControlMode) {
        if self.emergency_stop.load() {
            return;
        }
        self.control_mode.store(mode);
        self.emit(ChangeEvent::ControlMode(mode));
    }

    /// Pins the robot endpoint, bypassing the sweep.
    pub fn set_robot_address(&self, addr: &str) -> bool {
        let Ok(ip) = addr.parse::<IpAddr>() else {
            return false;
        };
        let port = self.adapter.ports().robot_output_port;
        self.sockets.pin_address(SocketAddr::new(ip, port));
        true
    }

    pub fn request_reboot_roborio(&self) {
        self.pending_reboot.store(true);
    }

    pub fn request_restart_code(&self) {
        self.pending_restart_code.store(true);
    }

    /// Consumed by an adapter's `build_robot_packet` on the next tick.
    pub fn take_pending_reboot(&self) -> bool {
        self.pending_reboot.swap(false)
    }

    pub fn take_pending_restart_code(&self) -> bool {
        self.pending_restart_code.swap(false)
    }

    // ---- connection state machine --------------------------------------------

    async fn transition_to_partial(&self) {
        self.comm_status.store(CommStatus::Partial);
        self.emit(ChangeEvent::CommStatus(CommStatus::Partial));
        info!("comm status Failing -> Partial");
    }

    async fn transition_to_full(&self) {
        self.comm_status.store(CommStatus::Full);
        self.emit(ChangeEvent::CommStatus(CommStatus::Full));
        self.watchdog.set_timeout(1000);

        if self.control_mode.load() == ControlMode::Invalid {
            self.control_mode.store(ControlMode::Teleop);
        }
        self.emit(ChangeEvent::ControlMode(self.control_mode.load()));
        // Re-emit `enabled` unconditionally so downstream observers resync.
        self.emit(ChangeEvent::Enabled(self.enabled.load()));

        info!("comm status Partial -> Full");
        self.adapter.request_robot_information(self);
    }

    async fn transition_to_failing(&self) {
        self.comm_status.store(CommStatus::Failing);
        self.emit(ChangeEvent::CommStatus(CommStatus::Failing));
        self.watchdog.set_timeout(500);
        warn!("watchdog expired, comm status Full -> Failing");

        self.adapter.reset_hook(self);
        self.zero_voltage();
        self.set_robot_code(false);
        self.set_radio_connected(false);
        self.set_send_datetime(false);

        self.radio_prober.reset();
        self.robot_prober.reset();

        self.sockets.clear_confirmation();
        if !self.sockets.is_pinned() && self.sockets.robot_address().is_empty() {
            self.sockets.restart_sweep();
        }
    }

    /// Dispatches a datagram received on the robot-in socket.
    async fn on_robot_packet(&self, bytes: &[u8], addr: SocketAddr) {
        if !self.adapter.parse_robot_packet(self, bytes) {
            debug!("malformed robot datagram discarded");
            return;
        }

        self.sockets.confirm(addr);
        self.watchdog.restart();

        if self.comm_status.load() == CommStatus::Partial {
            self.transition_to_full().await;
        }
    }

    async fn on_fms_packet(&self, bytes: &[u8]) {
        let _ = self.adapter.parse_fms_packet(self, bytes);
    }

    async fn on_robot_prober_transition(&self, state: ProbeState) {
        if state == ProbeState::Connected && self.comm_status.load() == CommStatus::Failing {
            self.transition_to_partial().await;
        }
    }

    fn on_radio_prober_transition(&self, state: ProbeState) {
        self.set_radio_connected(state == ProbeState::Connected);
    }

    // ---- cadence loops --------------------------------------------------------

    async fn on_fms_tick(&self) {
        if !self.operating.load() {
            return;
        }
        bump(&self.sent_fms_packets);
        let joysticks = self.input.snapshot();
        let bytes = self.adapter.build_fms_packet(self, &joysticks);
        if let Some(ip) = self.adapter.fms_target(self.team.load()) {
            let port = self.adapter.ports().fms_output_port;
            self.sockets.send_fms(&bytes, SocketAddr::new(ip, port)).await;
        }
    }

    async fn on_robot_tick(&self) {
        if !self.operating.load() {
            return;
        }
        bump(&self.sent_robot_packets);
        let joysticks = self.input.snapshot();
        let bytes = self.adapter.build_robot_packet(self, &joysticks);
        let targets = self.sockets.targets_for_tick();
        self.sockets.send_robot(&bytes, &targets).await;
        if let Some(first) = targets.first() {
            self.robot_prober
                .retarget(first.ip().to_string(), self.adapter.tcp_probe_port());
        }
    }

    // ---- initialization ceremony ----------------------------------------------

    async fn initialize(&self) {
        let ip_count = self.robot_ips().len().max(1) as u64;
        let watchdog_t = self.watchdog.timeout_ms();
        let scanner = (self.adapter.scanner_count() as u64).max(1);
        let estimate_seconds = (((ip_count * watchdog_t) / scanner) as f64 / 1000.0 / 10.0).ceil() as u64 * 10;

        info!(adapter = self.adapter.name(), "driver station protocol core initialized");
        info!(estimate_seconds, "estimated robot detection window");
        info!(
            ip_count,
            interfaces = self.interface_count(),
            "candidate robot addresses across active interfaces"
        );

        if let Some(core) = self.self_weak.upgrade() {
            core.spawn_event_loop();
        }
    }

    /// Starts the single cooperative event loop (cadence ticks, watchdog,
    /// probers, socket receives) as a background task. Safe to call only
    /// once per core; `initialize()` calls it automatically.
    fn spawn_event_loop(self: Arc<Self>) {
        tokio::spawn(async move { self.run_event_loop().await });
    }

    async fn run_event_loop(self: Arc<Self>) {
        let mut fms_timer = PeriodicTimer::from_hz(self.adapter.fms_hz());
        let mut robot_timer = PeriodicTimer::from_hz(self.adapter.robot_hz());
        let mut prober_timer = PeriodicTimer::new(100);

        loop {
            tokio::select! {
                _ = fms_timer.tick() => {
                    self.on_fms_tick().await;
                }
                _ = robot_timer.tick() => {
                    self.on_robot_tick().await;
                }
                _ = prober_timer.tick() => {
                    if let Some(state) = self.robot_prober.poll().await {
                        self.on_robot_prober_transition(state).await;
                    }
                    if let Some(state) = self.radio_prober.poll().await {
                        self.on_radio_prober_transition(state);
                    }
                }
                _ = self.watchdog.wait_for_fire() => {
                    if self.comm_status.load() == CommStatus::Full {
                        self.transition_to_failing().await;
                    } else {
                        // Outside `Full` the watchdog has no observable
                        // effect (its expiry only drives the Full->Failing
                        // transition); restart it here so a deadline that
                        // elapsed before the event loop even started
                        // doesn't spin `wait_for_fire` every tick.
                        self.watchdog.restart();
                    }
                }
                Ok((bytes, addr)) = self.sockets.recv_robot() => {
                    self.on_robot_packet(&bytes, addr).await;
                }
                Ok((bytes, _addr)) = self.sockets.recv_fms() => {
                    self.on_fms_packet(&bytes).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voltage_normalization_pads_and_truncates() {
        assert_eq!(normalize_voltage("7", "5"), ("07.05".to_string(), 7.05_f32));
        assert_eq!(normalize_voltage("12", "345"), ("12.34".to_string(), 12.34_f32));
        assert_eq!(normalize_voltage("9", "9"), ("09.09".to_string(), 9.09_f32));
    }

    #[test]
    fn voltage_normalization_is_idempotent_for_already_formed_input() {
        let (once, _) = normalize_voltage("07", "05");
        let (twice, _) = normalize_voltage(&once[..2], &once[3..]);
        assert_eq!(once, twice);
    }

    #[test]
    fn voltage_truncation_does_not_round() {
        // "995" truncates to "99", it does not round to "100" (which
        // wouldn't even fit).
        let (formatted, _) = normalize_voltage("1", "995");
        assert_eq!(formatted, "01.99");
    }

    #[test]
    fn alliance_station_index() {
        assert_eq!(Alliance::Red1.station(), 0);
        assert_eq!(Alliance::Blue3.station(), 5);
    }
}
