//! 协议常量定义
//!
//! Byte values and limits shared by the controller and the smarticle firmware.

/// Additive offset applied to every encoded payload byte.
///
/// Moves field values out of the control-character range so that a payload
/// byte can never be mistaken for the sync pulse, the stream marker, the
/// start sentinel or the terminator.
pub const ASCII_OFFSET: u8 = 32;

/// Largest value a single-byte field can carry without wrapping.
pub const SMALL_FIELD_MAX: u8 = u8::MAX - ASCII_OFFSET;

/// Largest value a two-byte (2 × 7 bit) field can carry.
pub const WIDE_FIELD_MAX: u16 = 0x3FFF;

/// Frame start sentinel (2 bytes).
pub const FRAME_START: [u8; 2] = [0x13, 0x13];

/// Frame terminator.
pub const FRAME_END: u8 = b'\n';

/// Stand-alone synchronization pulse, broadcast outside any frame.
pub const SYNC_PULSE: u8 = 0x11;

/// Trailing marker of the raw two-angle stream sub-frame.
pub const STREAM_MARKER: u8 = 0x12;

/// Bytes that must never appear inside an encoded payload.
pub const RESERVED_BYTES: [u8; 4] = [FRAME_END, SYNC_PULSE, STREAM_MARKER, FRAME_START[0]];

/// Firmware timer resolution: one tick is 128 µs.
pub const TICK_RESOLUTION_US: u32 = 128;

/// Maximum number of points per gait side stored on a device.
pub const MAX_GAIT_POINTS: usize = 15;

/// Angle written into unused gait slots.
pub const GAIT_FILLER_ANGLE: u8 = 0;

/// Largest servo angle in degrees.
pub const MAX_SERVO_ANGLE: u8 = 180;

/// Largest raw angle accepted by the stream sub-frame before clamping.
pub const MAX_STREAM_ANGLE: u8 = 254 - ASCII_OFFSET;

/// Radio payload limit of the underlying 802.15.4 modules.
pub const MAX_FRAME_LEN: usize = 108;

/// Firmware sensor sampling period, used to convert transmit periods to counts.
pub const SAMPLE_TIME_MS: u32 = 10;

/// Valid range of transmit counts (`period_ms / SAMPLE_TIME_MS`).
pub const TRANSMIT_COUNTS_MIN: u32 = 1;
pub const TRANSMIT_COUNTS_MAX: u32 = 200;

/// Convert a millisecond delay into firmware timer ticks (truncating).
///
/// The result is not range checked; values above [`WIDE_FIELD_MAX`] do not
/// fit a wide field. Every `u32` delay has an exact `u64` tick count.
pub fn ms_to_ticks(ms: u32) -> u64 {
    u64::from(ms) * 1000 / u64::from(TICK_RESOLUTION_US)
}
