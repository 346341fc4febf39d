//! Bit-packed wire structures for the UDP status/control exchange, carried
//! over from the crate's original FRC codec (`bitflags`, matching the byte
//! layout WPILib's roboRIO image expects).

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        const ESTOP      = 0b1000_0000;
        const BROWNOUT   = 0b0001_0000;
        const CODE_START = 0b0000_1000;
        const ENABLED    = 0b0000_0100;

        const TELEOP = 0b00;
        const TEST   = 0b01;
        const AUTO   = 0b10;
    }
}

impl Status {
    #[inline(always)]
    pub const fn is_enabled(self) -> bool {
        self.contains(Status::ENABLED)
    }
    #[inline(always)]
    pub const fn is_browned_out(self) -> bool {
        self.contains(Status::BROWNOUT)
    }
    #[inline(always)]
    pub const fn is_estopped(self) -> bool {
        self.contains(Status::ESTOP)
    }
    #[inline(always)]
    pub const fn is_in_teleop(self) -> bool {
        self.contains(Self::TELEOP)
    }
    #[inline(always)]
    pub const fn is_in_auto(self) -> bool {
        self.contains(Self::AUTO)
    }
    #[inline(always)]
    pub const fn is_in_test(self) -> bool {
        self.contains(Self::TEST)
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Trace: u8 {
        const ROBOT_CODE = 0b0010_0000;
        const IS_ROBORIO = 0b0001_0000;
        const TEST_MODE  = 0b0000_1000;
        const AUTONOMOUS = 0b0000_0100;
        const TELEOP     = 0b0000_0010;
        const DISABLED   = 0b0000_0001;
    }
}

impl Trace {
    #[inline(always)]
    pub const fn has_robot_code(self) -> bool {
        self.contains(Self::ROBOT_CODE)
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u8 {
        const ESTOP         = 0b1000_0000;
        const FMS_CONNECTED = 0b0000_1000;
        const ENABLED       = 0b0000_0100;

        const TELEOP = 0b00;
        const AUTO   = 0b10;
        const TEST   = 0b01;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Request: u8 {
        const REBOOT_RIO   = 0b0000_1000;
        const RESTART_CODE = 0b0000_0100;
    }
}
