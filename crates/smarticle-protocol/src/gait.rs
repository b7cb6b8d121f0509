//! 步态序列
//!
//! A gait is two equal-length angle sequences (left and right servo), a delay
//! between consecutive points and the slot it is stored under on the device.

use crate::constants::*;
use crate::ProtocolError;
use std::time::Duration;

/// 步态序列（已校验）
///
/// Invariants established by [`GaitSequence::new`]:
/// - `left.len() == right.len()`
/// - `1..=MAX_GAIT_POINTS` points
/// - the point delay converts to at most [`WIDE_FIELD_MAX`] timer ticks
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaitSequence {
    left: Vec<u8>,
    right: Vec<u8>,
    delay_ms: u32,
    slot: u8,
}

impl GaitSequence {
    /// Validate and build a gait.
    ///
    /// # Errors
    /// - `GaitLengthMismatch`: the two sides differ in length
    /// - `GaitTooLong`: more than [`MAX_GAIT_POINTS`] points
    /// - `ValueOutOfRange`: empty gait, or the delay does not fit a wide field
    pub fn new(
        left: Vec<u8>,
        right: Vec<u8>,
        delay_ms: u32,
        slot: u8,
    ) -> Result<Self, ProtocolError> {
        if left.len() != right.len() {
            return Err(ProtocolError::GaitLengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }
        if left.len() > MAX_GAIT_POINTS {
            return Err(ProtocolError::GaitTooLong {
                len: left.len(),
                max: MAX_GAIT_POINTS,
            });
        }
        if left.is_empty() {
            return Err(ProtocolError::ValueOutOfRange {
                field: "gait points",
                value: 0,
                max: MAX_GAIT_POINTS as u32,
            });
        }
        let ticks = ms_to_ticks(delay_ms);
        if ticks > u64::from(WIDE_FIELD_MAX) {
            return Err(ProtocolError::ValueOutOfRange {
                field: "gait delay ticks",
                value: u32::try_from(ticks).unwrap_or(u32::MAX),
                max: u32::from(WIDE_FIELD_MAX),
            });
        }
        if u32::from(slot) > u32::from(SMALL_FIELD_MAX) {
            return Err(ProtocolError::ValueOutOfRange {
                field: "gait slot",
                value: u32::from(slot),
                max: u32::from(SMALL_FIELD_MAX),
            });
        }
        Ok(Self {
            left,
            right,
            delay_ms,
            slot,
        })
    }

    /// Number of meaningful points (before padding).
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn left(&self) -> &[u8] {
        &self.left
    }

    pub fn right(&self) -> &[u8] {
        &self.right
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    pub fn point_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.delay_ms))
    }

    /// Point delay expressed in firmware timer ticks.
    pub fn delay_ticks(&self) -> u16 {
        // 构造时已校验不超过 WIDE_FIELD_MAX
        u16::try_from(ms_to_ticks(self.delay_ms)).unwrap_or(WIDE_FIELD_MAX)
    }

    /// One full pass through the sequence: `len × point delay`.
    pub fn period(&self) -> Duration {
        self.point_delay() * self.len() as u32
    }

    /// Left and right sides right-padded to capacity with the filler angle.
    pub fn padded(&self) -> ([u8; MAX_GAIT_POINTS], [u8; MAX_GAIT_POINTS]) {
        let mut left = [GAIT_FILLER_ANGLE; MAX_GAIT_POINTS];
        let mut right = [GAIT_FILLER_ANGLE; MAX_GAIT_POINTS];
        left[..self.left.len()].copy_from_slice(&self.left);
        right[..self.right.len()].copy_from_slice(&self.right);
        (left, right)
    }
}
