//! Opcode 定义
//!
//! One byte per command, placed right after the start sentinel.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Command opcodes understood by the smarticle firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Opcode {
    SetMode = 0x21,
    /// Enables/disables servo updates in the timer interrupt.
    ToggleServoUpdate = 0x22,
    SetTransmitPeriod = 0x23,
    SelectGait = 0x24,
    ToggleReadSensors = 0x25,
    ToggleTransmit = 0x26,
    /// Share of stream updates replaced by a random angle, in percent.
    SetPoseEpsilon = 0x27,
    SetPoseNoise = 0x28,
    SetDebugLevel = 0x2A,
    SetDeviceId = 0x2B,
    SetPose = 0x30,
    SetSyncNoise = 0x31,
    SetStreamTimingNoise = 0x32,
    SetSensorThreshold = 0x40,
    InitGait = 0x41,
    StreamPose = 0x42,
    SetPlank = 0x43,
}

impl Opcode {
    pub fn as_u8(self) -> u8 {
        self.into()
    }
}

/// Device operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Mode {
    /// Servos detached, nothing transmitted.
    #[default]
    Idle = 0,
    /// Servo angles streamed from the controller.
    Stream = 1,
    /// Step through the stored gait sequence.
    Interpolate = 2,
}

/// Firmware debug verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DebugLevel {
    #[default]
    Off = 0,
    Limited = 1,
    Full = 2,
}

impl DebugLevel {
    /// Unknown levels fall back to `Off`.
    pub fn from_level(level: u8) -> Self {
        Self::try_from(level).unwrap_or(Self::Off)
    }
}
