//! 旧版文本帧（兼容层）
//!
//! Older firmware builds parse colon-delimited text commands such as
//! `":M:2\n"` or `":SP:90,45\n"`. This module renders a [`Command`] in that
//! form so such devices can still be driven through the same dispatcher.
//! The binary framing in [`crate::control`] is the canonical protocol; the two
//! are not interchangeable on one device.

use crate::constants::{FRAME_END, MAX_FRAME_LEN};
use crate::control::Command;
use crate::{Frame, ProtocolError};

/// Render a command as a legacy text frame.
///
/// Returns `Ok(None)` for commands that have no text form (batched stream
/// poses, id assignment, debug level, transmit period).
pub fn encode(command: &Command) -> Result<Option<Frame>, ProtocolError> {
    let text = match command {
        Command::SetMode(mode) => format!(":M:{}", u8::from(*mode)),
        Command::SetServoUpdate(on) => format!(":S:{}", u8::from(*on)),
        Command::SetTransmit(on) => format!(":T:{}", u8::from(*on)),
        Command::SetReadSensors(on) => format!(":R:{}", u8::from(*on)),
        Command::SetPlank(states) => match states.as_slice() {
            [state] => format!(":P:{}", u8::from(*state)),
            _ => return Ok(None),
        },
        Command::SetPose { left, right } => format!(":SP:{},{}", left, right),
        Command::SetPoseEpsilon(percent) => format!(":SE:{}", percent),
        Command::SetPoseNoise(v) => format!(":PN:{}", v),
        Command::SetSyncNoise(ticks) => format!(":SN:{}", ticks),
        Command::SetStreamTimingNoise { enabled, max_ticks } => {
            format!(":SD:{},{}", u8::from(*enabled), max_ticks)
        },
        Command::SelectGait(slot) => format!(":GN:{}", slot),
        Command::SetSensorThreshold(t) => format!(":ST:{},{},{},{}", t[0], t[1], t[2], t[3]),
        Command::InitGait(gait) => return encode_gait(gait).map(Some),
        Command::SetTransmitCounts(_)
        | Command::SetDebugLevel(_)
        | Command::SetDeviceId(_)
        | Command::StreamPose(_) => return Ok(None),
    };
    let mut bytes = text.into_bytes();
    bytes.push(FRAME_END);
    Ok(Some(Frame::from_raw(&bytes)))
}

/// `:GI:{slot},{len:02},` + big-endian tick count + `;` + 15 left + 15 right + `\n`.
///
/// Angles are offset but the tick count is sent as two raw bytes.
fn encode_gait(gait: &crate::GaitSequence) -> Result<Frame, ProtocolError> {
    let (left, right) = gait.padded();
    let mut bytes = format!(":GI:{:01},{:02},", gait.slot(), gait.len()).into_bytes();
    bytes.extend_from_slice(&gait.delay_ticks().to_be_bytes());
    bytes.push(b';');
    bytes.extend(left.iter().chain(right.iter()).map(|&a| crate::encode_small(a)));
    bytes.push(FRAME_END);
    if bytes.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLong {
            len: bytes.len(),
            max: MAX_FRAME_LEN,
        });
    }
    Ok(Frame::from_raw(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GaitSequence, Mode, MAX_GAIT_POINTS};

    fn text(command: Command) -> String {
        let frame = encode(&command).unwrap().unwrap();
        String::from_utf8(frame.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_simple_text_frames() {
        assert_eq!(text(Command::SetMode(Mode::Interpolate)), ":M:2\n");
        assert_eq!(text(Command::SetServoUpdate(true)), ":S:1\n");
        assert_eq!(text(Command::SetPlank(vec![false])), ":P:0\n");
        assert_eq!(text(Command::SetPose { left: 90, right: 45 }), ":SP:90,45\n");
        assert_eq!(text(Command::SetSensorThreshold([1, 2, 3, 4])), ":ST:1,2,3,4\n");
        assert_eq!(text(Command::SetPoseEpsilon(10)), ":SE:10\n");
        assert_eq!(
            text(Command::SetStreamTimingNoise {
                enabled: true,
                max_ticks: 100
            }),
            ":SD:1,100\n"
        );
    }

    #[test]
    fn test_no_text_form() {
        assert_eq!(encode(&Command::SetDeviceId(3)).unwrap(), None);
        assert_eq!(encode(&Command::SetPlank(vec![true, false])).unwrap(), None);
    }

    #[test]
    fn test_gait_text_frame() {
        let gait = GaitSequence::new(vec![0, 180], vec![180, 0], 128, 1).unwrap();
        let frame = encode(&Command::InitGait(gait)).unwrap().unwrap();
        let bytes = frame.as_bytes();
        assert!(bytes.starts_with(b":GI:1,02,"));
        // 128 ms = 1000 ticks = 0x03E8
        assert_eq!(&bytes[9..11], &[0x03, 0xE8]);
        assert_eq!(bytes[11], b';');
        assert_eq!(bytes.len(), 12 + 2 * MAX_GAIT_POINTS + 1);
        assert_eq!(*bytes.last().unwrap(), b'\n');
    }
}
