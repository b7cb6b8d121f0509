//! 控制帧构建
//!
//! Logical commands and their binary encoding. Field order per opcode:
//!
//! | Opcode | Payload |
//! |---|---|
//! | `SetMode` | mode |
//! | `ToggleServoUpdate` / `ToggleTransmit` / `ToggleReadSensors` | flag |
//! | `SetTransmitPeriod` | counts |
//! | `SelectGait` | slot |
//! | `SetPoseEpsilon` | percent |
//! | `SetPoseNoise` | noise |
//! | `SetDebugLevel` | level |
//! | `SetDeviceId` | id |
//! | `SetPose` | left, right |
//! | `SetSyncNoise` | ticks (wide) |
//! | `SetStreamTimingNoise` | flag, max ticks (wide) |
//! | `SetSensorThreshold` | 4 × threshold (wide) |
//! | `InitGait` | slot, len, delay ticks (wide), 15 × left, 15 × right |
//! | `StreamPose` | n, n × (id, left, right) |
//! | `SetPlank` | n, n × state |

use crate::gait::GaitSequence;
use crate::opcodes::{DebugLevel, Mode, Opcode};
use crate::{Frame, FrameBuilder, ProtocolError};

/// One `[id, left, right]` entry of a batched stream frame.
///
/// `id == 0` addresses every device that receives the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamTarget {
    pub id: u8,
    pub left: u8,
    pub right: u8,
}

impl StreamTarget {
    pub fn new(id: u8, left: u8, right: u8) -> Self {
        Self { id, left, right }
    }

    /// Entry applying to the whole swarm.
    pub fn all(left: u8, right: u8) -> Self {
        Self::new(0, left, right)
    }
}

/// 逻辑指令
///
/// Values are encoded as given: the codec does not range check angles or
/// flags. Callers validate domains before building a command.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    SetMode(Mode),
    /// Enable/disable servo updates; enabling also restarts the gait at point 0.
    SetServoUpdate(bool),
    SetTransmit(bool),
    SetReadSensors(bool),
    /// Transmit period in firmware sample counts.
    SetTransmitCounts(u8),
    SelectGait(u8),
    /// Percent (0..=100) of stream updates a device replaces with a random angle.
    SetPoseEpsilon(u8),
    SetPoseNoise(u8),
    SetDebugLevel(DebugLevel),
    SetDeviceId(u8),
    SetPose { left: u8, right: u8 },
    /// Maximum sync jitter in timer ticks.
    SetSyncNoise(u16),
    /// Random delay before a device applies a streamed pose.
    SetStreamTimingNoise { enabled: bool, max_ticks: u16 },
    SetSensorThreshold([u16; 4]),
    InitGait(GaitSequence),
    StreamPose(Vec<StreamTarget>),
    SetPlank(Vec<bool>),
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::SetMode(_) => Opcode::SetMode,
            Command::SetServoUpdate(_) => Opcode::ToggleServoUpdate,
            Command::SetTransmit(_) => Opcode::ToggleTransmit,
            Command::SetReadSensors(_) => Opcode::ToggleReadSensors,
            Command::SetTransmitCounts(_) => Opcode::SetTransmitPeriod,
            Command::SelectGait(_) => Opcode::SelectGait,
            Command::SetPoseEpsilon(_) => Opcode::SetPoseEpsilon,
            Command::SetPoseNoise(_) => Opcode::SetPoseNoise,
            Command::SetDebugLevel(_) => Opcode::SetDebugLevel,
            Command::SetDeviceId(_) => Opcode::SetDeviceId,
            Command::SetPose { .. } => Opcode::SetPose,
            Command::SetSyncNoise(_) => Opcode::SetSyncNoise,
            Command::SetStreamTimingNoise { .. } => Opcode::SetStreamTimingNoise,
            Command::SetSensorThreshold(_) => Opcode::SetSensorThreshold,
            Command::InitGait(_) => Opcode::InitGait,
            Command::StreamPose(_) => Opcode::StreamPose,
            Command::SetPlank(_) => Opcode::SetPlank,
        }
    }

    /// Encode into a binary frame.
    ///
    /// # Errors
    /// `FrameTooLong` when a batched command exceeds the radio payload.
    pub fn encode(&self) -> Result<Frame, ProtocolError> {
        let builder = FrameBuilder::new(self.opcode());
        let builder = match self {
            Command::SetMode(mode) => builder.small((*mode).into()),
            Command::SetServoUpdate(on)
            | Command::SetTransmit(on)
            | Command::SetReadSensors(on) => builder.small(u8::from(*on)),
            Command::SetTransmitCounts(v)
            | Command::SelectGait(v)
            | Command::SetPoseEpsilon(v)
            | Command::SetPoseNoise(v)
            | Command::SetDeviceId(v) => builder.small(*v),
            Command::SetDebugLevel(level) => builder.small((*level).into()),
            Command::SetPose { left, right } => builder.small(*left).small(*right),
            Command::SetSyncNoise(ticks) => builder.wide(*ticks),
            Command::SetStreamTimingNoise { enabled, max_ticks } => {
                builder.small(u8::from(*enabled)).wide(*max_ticks)
            },
            Command::SetSensorThreshold(thresholds) => thresholds
                .iter()
                .fold(builder, |b, &t| b.wide(t)),
            Command::InitGait(gait) => {
                let (left, right) = gait.padded();
                builder
                    .small(gait.slot())
                    .small(gait.len() as u8)
                    .wide(gait.delay_ticks())
                    .smalls(left)
                    .smalls(right)
            },
            Command::StreamPose(targets) => {
                let count = batch_len(targets.len())?;
                targets
                    .iter()
                    .fold(builder.small(count), |b, t| b.small(t.id).small(t.left).small(t.right))
            },
            Command::SetPlank(states) => {
                let count = batch_len(states.len())?;
                builder.small(count).smalls(states.iter().map(|&s| u8::from(s)))
            },
        };
        builder.finish()
    }
}

fn batch_len(len: usize) -> Result<u8, ProtocolError> {
    u8::try_from(len)
        .ok()
        .filter(|&n| n <= crate::SMALL_FIELD_MAX)
        .ok_or(ProtocolError::FrameTooLong {
            len,
            max: crate::MAX_FRAME_LEN,
        })
}
