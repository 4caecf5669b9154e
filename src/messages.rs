// Typed payloads carried inside frames
//
// Floats travel little-endian, 4 bytes each, packed back to back.

use serde::{Deserialize, Serialize};

use crate::protocol::{CmdId, EncodeError, Frame, Packet, encode, encode_to_vec};

const F32_LEN: usize = 4;

/// Velocity command sent host -> robot
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub vx: f32, // m/s, positive = forward
    pub wz: f32, // rad/s, positive = counter-clockwise
}

impl VelocityCommand {
    pub const PAYLOAD_LEN: usize = 2 * F32_LEN;

    pub fn new(vx: f32, wz: f32) -> Self {
        Self { vx, wz }
    }

    pub fn stop() -> Self {
        Self::default()
    }

    pub fn to_payload(&self) -> [u8; Self::PAYLOAD_LEN] {
        let mut out = [0u8; Self::PAYLOAD_LEN];
        put_f32s(&mut out, &[self.vx, self.wz]);
        out
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, MessageError> {
        let [vx, wz] = get_f32s::<2>(CmdId::SetVelocity, payload)?;
        Ok(Self { vx, wz })
    }
}

/// Status reported robot -> host
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotStatus {
    pub voltage: f32, // V
    pub current: f32, // A
    pub yaw: f32,     // rad
}

impl RobotStatus {
    pub const PAYLOAD_LEN: usize = 3 * F32_LEN;

    pub fn to_payload(&self) -> [u8; Self::PAYLOAD_LEN] {
        let mut out = [0u8; Self::PAYLOAD_LEN];
        put_f32s(&mut out, &[self.voltage, self.current, self.yaw]);
        out
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, MessageError> {
        let [voltage, current, yaw] = get_f32s::<3>(CmdId::ReportStatus, payload)?;
        Ok(Self {
            voltage,
            current,
            yaw,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("{cmd:?} payload must be {expected} bytes, got {actual}")]
    PayloadSize {
        cmd: CmdId,
        expected: usize,
        actual: usize,
    },
}

/// A frame interpreted according to its command id
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    None,
    SetVelocity(VelocityCommand),
    GetStatus,
    ReportStatus(RobotStatus),
}

impl Message {
    pub fn cmd_id(&self) -> CmdId {
        match self {
            Message::None => CmdId::None,
            Message::SetVelocity(_) => CmdId::SetVelocity,
            Message::GetStatus => CmdId::GetStatus,
            Message::ReportStatus(_) => CmdId::ReportStatus,
        }
    }

    /// Interpret a validated frame's payload
    pub fn from_frame(frame: Frame<'_>) -> Result<Self, MessageError> {
        match frame.cmd_id {
            CmdId::None => expect_empty(CmdId::None, frame.payload).map(|_| Message::None),
            CmdId::SetVelocity => VelocityCommand::from_payload(frame.payload).map(Message::SetVelocity),
            CmdId::GetStatus => expect_empty(CmdId::GetStatus, frame.payload).map(|_| Message::GetStatus),
            CmdId::ReportStatus => RobotStatus::from_payload(frame.payload).map(Message::ReportStatus),
        }
    }

    /// Serialize into a complete wire frame
    pub fn to_frame(&self) -> Result<Vec<u8>, EncodeError> {
        match self {
            Message::None | Message::GetStatus => encode_to_vec(self.cmd_id(), &[]),
            Message::SetVelocity(cmd) => encode_to_vec(self.cmd_id(), &cmd.to_payload()),
            Message::ReportStatus(status) => encode_to_vec(self.cmd_id(), &status.to_payload()),
        }
    }

    /// Serialize into `buf`, returning the frame length
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        match self {
            Message::None | Message::GetStatus => encode(self.cmd_id(), &[], buf),
            Message::SetVelocity(cmd) => encode(self.cmd_id(), &cmd.to_payload(), buf),
            Message::ReportStatus(status) => encode(self.cmd_id(), &status.to_payload(), buf),
        }
    }
}

impl TryFrom<&Packet> for Message {
    type Error = MessageError;

    fn try_from(packet: &Packet) -> Result<Self, Self::Error> {
        Message::from_frame(packet.as_frame())
    }
}

fn expect_empty(cmd: CmdId, payload: &[u8]) -> Result<(), MessageError> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(MessageError::PayloadSize {
            cmd,
            expected: 0,
            actual: payload.len(),
        })
    }
}

fn put_f32s(out: &mut [u8], values: &[f32]) {
    for (chunk, value) in out.chunks_exact_mut(F32_LEN).zip(values) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
}

fn get_f32s<const N: usize>(cmd: CmdId, payload: &[u8]) -> Result<[f32; N], MessageError> {
    if payload.len() != N * F32_LEN {
        return Err(MessageError::PayloadSize {
            cmd,
            expected: N * F32_LEN,
            actual: payload.len(),
        });
    }

    let mut values = [0.0f32; N];
    for (value, chunk) in values.iter_mut().zip(payload.chunks_exact(F32_LEN)) {
        *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;

    #[test]
    fn test_velocity_payload_layout() {
        let payload = VelocityCommand::new(0.5, 0.0).to_payload();
        // 0.5f32 = 0x3F000000, little-endian
        assert_eq!(payload, [0x00, 0x00, 0x00, 0x3F, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_set_velocity_frame() {
        let frame = Message::SetVelocity(VelocityCommand::new(0.5, 0.0))
            .to_frame()
            .unwrap();
        assert_eq!(frame.len(), 12);
        assert_eq!(&frame[..3], &[0xAA, 0x01, 0x08]);
        // 0xAA + 0x01 + 0x08 + 0x3F = 0xF2
        assert_eq!(frame[11], 0xF2);
    }

    #[test]
    fn test_status_from_frame() {
        let status = RobotStatus {
            voltage: 11.8,
            current: 0.75,
            yaw: -1.25,
        };
        let bytes = Message::ReportStatus(status).to_frame().unwrap();
        let message = Message::from_frame(decode(&bytes).unwrap()).unwrap();
        assert_eq!(message, Message::ReportStatus(status));
    }

    #[test]
    fn test_get_status_is_empty_frame() {
        let bytes = Message::GetStatus.to_frame().unwrap();
        assert_eq!(bytes, vec![0xAA, 0x02, 0x00, 0xAC]);
        let message = Message::from_frame(decode(&bytes).unwrap()).unwrap();
        assert_eq!(message, Message::GetStatus);
    }

    #[test]
    fn test_wrong_payload_size() {
        let bytes = encode_to_vec(CmdId::ReportStatus, &[0u8; 8]).unwrap();
        let err = Message::from_frame(decode(&bytes).unwrap()).unwrap_err();
        assert_eq!(
            err,
            MessageError::PayloadSize {
                cmd: CmdId::ReportStatus,
                expected: 12,
                actual: 8
            }
        );

        let bytes = encode_to_vec(CmdId::GetStatus, &[1]).unwrap();
        assert!(Message::from_frame(decode(&bytes).unwrap()).is_err());
    }

    #[test]
    fn test_status_serializes_to_json() {
        let status = RobotStatus {
            voltage: 12.0,
            current: 0.5,
            yaw: 0.0,
        };
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["voltage"], 12.0);
        assert_eq!(json["current"], 0.5);
    }
}
