//! # Smarticle Protocol
//!
//! 广播无线链路上的 smarticle 指令帧协议（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量（偏移量、保留字节、上限）
//! - `opcodes`: 指令码与枚举
//! - `gait`: 步态序列
//! - `control`: 指令帧构建
//! - `legacy`: 旧版冒号分隔文本帧（兼容层）
//!
//! ## 字段编码
//!
//! Every payload field is shifted by [`ASCII_OFFSET`] so the encoded span
//! never contains a reserved control byte:
//!
//! - small field: `byte = value + 32`
//! - wide field: `high = (value >> 7) + 32`, `low = (value & 0x7F) + 32`
//!
//! ```text
//! [0x13 0x13] [opcode] [payload ...] [0x0A]
//! ```

pub mod constants;
pub mod control;
pub mod gait;
pub mod legacy;
pub mod opcodes;

pub use constants::*;
pub use control::*;
pub use gait::GaitSequence;
pub use opcodes::*;

use smallvec::SmallVec;
use thiserror::Error;

/// 协议错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Gait sides differ in length: left {left}, right {right}")]
    GaitLengthMismatch { left: usize, right: usize },

    #[error("Gait has {len} points, capacity is {max}")]
    GaitTooLong { len: usize, max: usize },

    #[error("Value {value} out of range for {field} (max {max})")]
    ValueOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Frame of {len} bytes exceeds the {max} byte radio payload")]
    FrameTooLong { len: usize, max: usize },

    #[error("Malformed frame: {0}")]
    Malformed(&'static str),

    #[error("Unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),
}

/// Encode a small field (`value + 32`).
///
/// Values above [`SMALL_FIELD_MAX`] wrap; range checking is the caller's job.
#[inline]
pub fn encode_small(value: u8) -> u8 {
    value.wrapping_add(ASCII_OFFSET)
}

#[inline]
pub fn decode_small(byte: u8) -> u8 {
    byte.wrapping_sub(ASCII_OFFSET)
}

/// Encode a wide field as two offset 7-bit halves `[high, low]`.
///
/// Only the low 14 bits of `value` are kept.
#[inline]
pub fn encode_wide(value: u16) -> [u8; 2] {
    let value = value & WIDE_FIELD_MAX;
    [
        (value >> 7) as u8 + ASCII_OFFSET,
        (value & 0x7F) as u8 + ASCII_OFFSET,
    ]
}

#[inline]
pub fn decode_wide(bytes: [u8; 2]) -> u16 {
    let high = u16::from(decode_small(bytes[0]) & 0x7F);
    let low = u16::from(decode_small(bytes[1]) & 0x7F);
    (high << 7) | low
}

/// 编码后的帧（或独立控制字节）
///
/// Frames are built per call and handed to the transport as raw bytes. Most
/// frames fit inline; batched stream frames may spill to the heap.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    bytes: SmallVec<[u8; 64]>,
}

impl Frame {
    /// Wrap already-encoded bytes (legacy text frames, purge bytes).
    pub fn from_raw(bytes: &[u8]) -> Self {
        Self {
            bytes: SmallVec::from_slice(bytes),
        }
    }

    /// The stand-alone sync pulse.
    pub fn sync_pulse() -> Self {
        Self::from_raw(&[SYNC_PULSE])
    }

    /// A lone terminator, used to flush partially received input on devices.
    pub fn purge() -> Self {
        Self::from_raw(&[FRAME_END])
    }

    /// Raw stream sub-frame: two offset angles followed by [`STREAM_MARKER`].
    ///
    /// Angles are clamped to `0..=MAX_STREAM_ANGLE` so the offset never wraps.
    pub fn stream(left: u8, right: u8) -> Self {
        Self::from_raw(&[
            encode_small(left.min(MAX_STREAM_ANGLE)),
            encode_small(right.min(MAX_STREAM_ANGLE)),
            STREAM_MARKER,
        ])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Opcode of a framed command, `None` for control bytes and raw frames.
    pub fn opcode(&self) -> Option<Opcode> {
        match self.bytes.as_slice() {
            [a, b, op, ..] if [*a, *b] == FRAME_START => Opcode::try_from(*op).ok(),
            _ => None,
        }
    }

    /// Payload between opcode and terminator of a framed command.
    pub fn payload(&self) -> Option<&[u8]> {
        split_frame(&self.bytes).ok().map(|(_, payload)| payload)
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// 帧构建器
///
/// Appends fields in order and closes the frame with the terminator.
///
/// ```rust
/// use smarticle_protocol::{FrameBuilder, Opcode};
///
/// let frame = FrameBuilder::new(Opcode::SetPose).small(90).small(45).finish().unwrap();
/// assert_eq!(frame.as_bytes(), &[0x13, 0x13, 0x30, 122, 77, b'\n']);
/// ```
#[derive(Debug)]
pub struct FrameBuilder {
    bytes: SmallVec<[u8; 64]>,
}

impl FrameBuilder {
    pub fn new(opcode: Opcode) -> Self {
        let mut bytes = SmallVec::new();
        bytes.extend_from_slice(&FRAME_START);
        bytes.push(opcode.as_u8());
        Self { bytes }
    }

    pub fn small(mut self, value: u8) -> Self {
        self.bytes.push(encode_small(value));
        self
    }

    pub fn smalls(mut self, values: impl IntoIterator<Item = u8>) -> Self {
        self.bytes.extend(values.into_iter().map(encode_small));
        self
    }

    pub fn wide(mut self, value: u16) -> Self {
        self.bytes.extend_from_slice(&encode_wide(value));
        self
    }

    /// Close the frame, rejecting anything longer than the radio payload.
    pub fn finish(mut self) -> Result<Frame, ProtocolError> {
        self.bytes.push(FRAME_END);
        if self.bytes.len() > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLong {
                len: self.bytes.len(),
                max: MAX_FRAME_LEN,
            });
        }
        Ok(Frame { bytes: self.bytes })
    }
}

/// Split a framed command into opcode and still-encoded payload.
pub fn split_frame(bytes: &[u8]) -> Result<(Opcode, &[u8]), ProtocolError> {
    if bytes.len() < FRAME_START.len() + 2 {
        return Err(ProtocolError::Malformed("frame too short"));
    }
    if bytes[..2] != FRAME_START {
        return Err(ProtocolError::Malformed("missing start sentinel"));
    }
    if bytes[bytes.len() - 1] != FRAME_END {
        return Err(ProtocolError::Malformed("missing terminator"));
    }
    let opcode = Opcode::try_from(bytes[2]).map_err(|_| ProtocolError::UnknownOpcode(bytes[2]))?;
    Ok((opcode, &bytes[3..bytes.len() - 1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_small() {
        assert_eq!(encode_small(0), 32);
        assert_eq!(encode_small(180), 212);
        assert_eq!(decode_small(212), 180);
    }

    #[test]
    fn test_encode_wide() {
        // 3515 = 27 * 128 + 59
        assert_eq!(encode_wide(3515), [27 + 32, 59 + 32]);
        assert_eq!(decode_wide([59, 91]), 3515);
        assert_eq!(encode_wide(WIDE_FIELD_MAX), [127 + 32, 127 + 32]);
    }

    #[test]
    fn test_wide_masks_to_14_bits() {
        assert_eq!(encode_wide(0x4000), encode_wide(0));
    }

    #[test]
    fn test_stream_frame_clamps() {
        let frame = Frame::stream(250, 90);
        assert_eq!(frame.as_bytes(), &[254, 122, STREAM_MARKER]);
        assert_eq!(frame.opcode(), None);
    }

    #[test]
    fn test_builder_and_split() {
        let frame = FrameBuilder::new(Opcode::SetSyncNoise).wide(1000).finish().unwrap();
        let (op, payload) = split_frame(frame.as_bytes()).unwrap();
        assert_eq!(op, Opcode::SetSyncNoise);
        assert_eq!(decode_wide([payload[0], payload[1]]), 1000);
        assert_eq!(frame.opcode(), Some(Opcode::SetSyncNoise));
    }

    #[test]
    fn test_split_rejects_garbage() {
        assert!(matches!(
            split_frame(&[0x13, 0x13]),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            split_frame(&[0x13, 0x14, 0x21, b'\n']),
            Err(ProtocolError::Malformed("missing start sentinel"))
        ));
        assert_eq!(
            split_frame(&[0x13, 0x13, 0x01, b'\n']),
            Err(ProtocolError::UnknownOpcode(0x01))
        );
    }

    #[test]
    fn test_gait_frame_stays_inline() {
        let gait = GaitSequence::new(vec![0; MAX_GAIT_POINTS], vec![180; MAX_GAIT_POINTS], 450, 0)
            .unwrap();
        let frame = Command::InitGait(gait).encode().unwrap();
        assert_eq!(frame.len(), 38);
        assert!(!frame.bytes.spilled());
        assert!(!Frame::stream(90, 90).bytes.spilled());
    }

    #[test]
    fn test_builder_rejects_oversized_frame() {
        let err = FrameBuilder::new(Opcode::StreamPose)
            .smalls(std::iter::repeat_n(1, MAX_FRAME_LEN))
            .finish()
            .unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLong { .. }));
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(Frame::sync_pulse().as_bytes(), &[SYNC_PULSE]);
        assert_eq!(Frame::purge().as_bytes(), &[FRAME_END]);
    }
}
