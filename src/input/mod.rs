//! Input Aggregator: a stable, ordered snapshot of attached joysticks,
//! injected into `ProtocolCore` as an explicit collaborator handle rather
//! than consumed as a process-wide singleton, so tests can supply a fixed
//! snapshot in place of real hardware.

mod gilrs_source;

pub use gilrs_source::GilrsAggregator;

/// One joystick's axis and button state at a single instant.
#[derive(Debug, Clone, Default)]
pub struct JoystickSnapshot {
    /// Axis values, sign preserved, range `[-1.0, +1.0]` inclusive.
    pub axes: Vec<f32>,
    pub buttons: Vec<bool>,
}

impl JoystickSnapshot {
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    pub fn button_count(&self) -> usize {
        self.buttons.len()
    }
}

/// Read-only collaborator contract the adapter's robot-packet encoder reads
/// from. `ProtocolCore` guarantees the snapshot taken for a given cadence
/// tick is read-coherent with that tick's outgoing packet.
pub trait InputAggregator: Send + Sync {
    /// Ordered snapshot of every currently attached joystick, indexed by
    /// dynamic id (see `dynamic_id`).
    fn snapshot(&self) -> Vec<JoystickSnapshot>;

    /// Best-effort force-feedback passthrough. The core never calls this
    /// itself — rumble is explicitly delegated to a host process.
    fn rumble(&self, _id: usize, _left: u16, _right: u16) {}
}

/// The hot-plug dynamic-id formula, retained verbatim for wire-compatibility
/// with existing mappings.
///
/// `tracker` increments once per device-added event over the lifetime of
/// the aggregator (it never decreases, even across disconnects) so that
/// slot reuse after a disconnect still produces a LIFO-by-attachment id.
pub fn dynamic_id(tracker: i64, raw_index: i64, current_joystick_count: i64) -> usize {
    let mut id = tracker - (raw_index + 1);
    if id < 0 {
        id = id.abs();
    }
    if current_joystick_count > 0 && id >= current_joystick_count {
        id -= 1;
    }
    id.max(0) as usize
}

/// A fixed-snapshot test double, for core and adapter tests that need
/// deterministic joystick state without real hardware.
pub struct FixedAggregator(pub Vec<JoystickSnapshot>);

impl InputAggregator for FixedAggregator {
    fn snapshot(&self) -> Vec<JoystickSnapshot> {
        self.0.clone()
    }
}
