// Locomo frame codec
//
// Frame format: [0xAA, CmdId, Size, Payload..., Checksum]
// Checksum is the 8-bit wrapping sum of every byte before it (magic included).

/// Start-of-frame sentinel
pub const MAGIC_BYTE: u8 = 0xAA;

/// Magic + command id + size
pub const HEADER_LEN: usize = 3;
pub const CHECKSUM_LEN: usize = 1;

/// Smallest valid frame: header and checksum with an empty payload
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CHECKSUM_LEN;

/// Payload cap shared with the firmware (the size byte itself could go to 255)
pub const MAX_PAYLOAD_LEN: usize = 252;
pub const MAX_FRAME_LEN: usize = MIN_FRAME_LEN + MAX_PAYLOAD_LEN;

// Header field offsets
const MAGIC_OFFSET: usize = 0;
const CMD_OFFSET: usize = 1;
pub(crate) const SIZE_OFFSET: usize = 2;

/// Command set shared with the robot firmware
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmdId {
    None = 0x00,
    SetVelocity = 0x01,
    GetStatus = 0x02,
    ReportStatus = 0x03, // robot -> host
}

impl TryFrom<u8> for CmdId {
    type Error = FrameError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0x00 => Ok(CmdId::None),
            0x01 => Ok(CmdId::SetVelocity),
            0x02 => Ok(CmdId::GetStatus),
            0x03 => Ok(CmdId::ReportStatus),
            other => Err(FrameError::UnknownCommand(other)),
        }
    }
}

/// Reasons a candidate byte range is not a valid frame
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Bad magic byte: 0x{found:02X}")]
    BadMagic { found: u8 },

    #[error("Frame too short: {len} bytes")]
    Truncated { len: usize },

    #[error("Declared payload size {declared} but {actual} bytes present")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{received:02X}")]
    ChecksumMismatch { expected: u8, received: u8 },

    #[error("Unknown command id 0x{0:02X}")]
    UnknownCommand(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("Buffer too small: frame needs {needed} bytes, capacity is {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },
}

/// A validated frame borrowed from the bytes it was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub cmd_id: CmdId,
    pub payload: &'a [u8],
}

/// Owned counterpart of [`Frame`], produced by the receive-side assembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub cmd_id: CmdId,
    pub payload: Vec<u8>,
}

impl From<Frame<'_>> for Packet {
    fn from(frame: Frame<'_>) -> Self {
        Self {
            cmd_id: frame.cmd_id,
            payload: frame.payload.to_vec(),
        }
    }
}

impl Packet {
    pub fn as_frame(&self) -> Frame<'_> {
        Frame {
            cmd_id: self.cmd_id,
            payload: &self.payload,
        }
    }
}

/// 8-bit wrapping sum, the frame checksum
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Total frame length for a payload of `payload_len` bytes
pub const fn frame_len(payload_len: usize) -> usize {
    MIN_FRAME_LEN + payload_len
}

/// Serialize a frame into `buf`, returning the number of bytes written.
///
/// Fails without touching `buf` when the payload exceeds [`MAX_PAYLOAD_LEN`] or
/// `buf` cannot hold the whole frame, so a partial frame is never produced.
pub fn encode(cmd_id: CmdId, payload: &[u8], buf: &mut [u8]) -> Result<usize, EncodeError> {
    let needed = frame_len(payload.len());
    let capacity = buf.len().min(MAX_FRAME_LEN);
    if needed > capacity {
        return Err(EncodeError::BufferTooSmall { needed, capacity });
    }

    buf[MAGIC_OFFSET] = MAGIC_BYTE;
    buf[CMD_OFFSET] = cmd_id as u8;
    buf[SIZE_OFFSET] = payload.len() as u8;
    buf[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);

    let body_len = HEADER_LEN + payload.len();
    buf[body_len] = checksum(&buf[..body_len]);

    Ok(needed)
}

/// Convenience wrapper around [`encode`] that allocates an exactly sized frame
pub fn encode_to_vec(cmd_id: CmdId, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut frame = vec![0u8; frame_len(payload.len()).min(MAX_FRAME_LEN)];
    let written = encode(cmd_id, payload, &mut frame)?;
    frame.truncate(written);
    Ok(frame)
}

/// Validate a complete candidate frame and return its command id and payload.
///
/// Checks run in order and stop at the first failure: magic, minimum length,
/// declared size (at most [`MAX_PAYLOAD_LEN`] and matching the bytes present),
/// checksum, then the command id.
pub fn decode(bytes: &[u8]) -> Result<Frame<'_>, FrameError> {
    let Some(&magic) = bytes.first() else {
        return Err(FrameError::Truncated { len: 0 });
    };
    if magic != MAGIC_BYTE {
        return Err(FrameError::BadMagic { found: magic });
    }
    if bytes.len() < MIN_FRAME_LEN {
        return Err(FrameError::Truncated { len: bytes.len() });
    }

    let declared = bytes[SIZE_OFFSET] as usize;
    let actual = bytes.len() - MIN_FRAME_LEN;
    if declared > MAX_PAYLOAD_LEN || declared != actual {
        return Err(FrameError::LengthMismatch { declared, actual });
    }

    let (body, tail) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let expected = checksum(body);
    let received = tail[0];
    if expected != received {
        return Err(FrameError::ChecksumMismatch { expected, received });
    }

    let cmd_id = CmdId::try_from(bytes[CMD_OFFSET])?;
    Ok(Frame {
        cmd_id,
        payload: &body[HEADER_LEN..],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CMDS: [CmdId; 4] = [
        CmdId::None,
        CmdId::SetVelocity,
        CmdId::GetStatus,
        CmdId::ReportStatus,
    ];

    fn velocity_payload(vx: f32, wz: f32) -> [u8; 8] {
        let mut payload = [0u8; 8];
        payload[..4].copy_from_slice(&vx.to_le_bytes());
        payload[4..].copy_from_slice(&wz.to_le_bytes());
        payload
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x01, 0x02, 0x03]), 6);
        // 0xAA + 0xAA = 0x154 -> 0x54
        assert_eq!(checksum(&[0xAA, 0xAA]), 0x54);
        assert_eq!(checksum(&[0xFF; 255]), 0x01);
    }

    #[test]
    fn test_set_velocity_frame_layout() {
        let payload = velocity_payload(0.5, 0.0);
        let mut buf = [0u8; 64];
        let len = encode(CmdId::SetVelocity, &payload, &mut buf).unwrap();

        assert_eq!(len, 12);
        assert_eq!(&buf[..3], &[0xAA, 0x01, 0x08]);
        assert_eq!(&buf[3..11], &payload);
        assert_eq!(buf[11], checksum(&buf[..11]));

        let frame = decode(&buf[..len]).unwrap();
        assert_eq!(frame.cmd_id, CmdId::SetVelocity);
        assert_eq!(frame.payload, &payload);
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut buf = [0u8; 8];
        let len = encode(CmdId::GetStatus, &[], &mut buf).unwrap();
        assert_eq!(len, 4);
        assert_eq!(&buf[..4], &[0xAA, 0x02, 0x00, 0xAC]);

        let frame = decode(&buf[..4]).unwrap();
        assert_eq!(frame.cmd_id, CmdId::GetStatus);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_round_trip_sizes() {
        for cmd in ALL_CMDS {
            for size in [0usize, 1, 8, 12, 100, MAX_PAYLOAD_LEN] {
                let payload: Vec<u8> = (0..size).map(|i| (i * 7 + 3) as u8).collect();
                let frame = encode_to_vec(cmd, &payload).unwrap();
                assert_eq!(frame.len(), size + 4);

                let decoded = decode(&frame).unwrap();
                assert_eq!(decoded.cmd_id, cmd);
                assert_eq!(decoded.payload, payload.as_slice());
            }
        }
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = [0u8; MAX_PAYLOAD_LEN + 1];
        let mut buf = [0u8; 1024];
        let err = encode(CmdId::SetVelocity, &payload, &mut buf).unwrap_err();
        assert_eq!(
            err,
            EncodeError::BufferTooSmall {
                needed: 257,
                capacity: MAX_FRAME_LEN
            }
        );
        // Nothing written
        assert!(buf.iter().all(|&b| b == 0));

        assert!(encode_to_vec(CmdId::SetVelocity, &payload).is_err());
    }

    #[test]
    fn test_small_buffer_leaves_no_partial_frame() {
        let payload = velocity_payload(1.0, -1.0);
        let mut buf = [0u8; 11];
        let err = encode(CmdId::SetVelocity, &payload, &mut buf).unwrap_err();
        assert_eq!(
            err,
            EncodeError::BufferTooSmall {
                needed: 12,
                capacity: 11
            }
        );
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_bad_magic_checked_first() {
        // Wrong magic wins even though every other field is also broken
        assert_eq!(decode(&[0x55]), Err(FrameError::BadMagic { found: 0x55 }));
        assert_eq!(
            decode(&[0x00, 0xFF, 0x09, 0x00]),
            Err(FrameError::BadMagic { found: 0x00 })
        );
    }

    #[test]
    fn test_truncated_frames() {
        assert_eq!(decode(&[]), Err(FrameError::Truncated { len: 0 }));
        assert_eq!(
            decode(&[0xAA, 0x01, 0x00]),
            Err(FrameError::Truncated { len: 3 })
        );
    }

    #[test]
    fn test_length_mismatch() {
        let mut frame = encode_to_vec(CmdId::SetVelocity, &velocity_payload(0.5, 0.0)).unwrap();

        // Declared size larger than the bytes present
        frame[2] = 200;
        assert_eq!(
            decode(&frame),
            Err(FrameError::LengthMismatch {
                declared: 200,
                actual: 8
            })
        );

        // Frame cut short: declared 8, only 7 payload bytes remain
        let frame = encode_to_vec(CmdId::SetVelocity, &velocity_payload(0.5, 0.0)).unwrap();
        let short = [&frame[..10], &frame[11..]].concat();
        assert_eq!(
            decode(&short),
            Err(FrameError::LengthMismatch {
                declared: 8,
                actual: 7
            })
        );
    }

    #[test]
    fn test_declared_size_over_cap_rejected() {
        // Self-consistent 257-byte frame whose size byte exceeds the payload cap
        let mut frame = vec![0xAA, 0x01, 253];
        frame.extend_from_slice(&[0u8; 253]);
        frame.push(checksum(&frame));
        assert_eq!(frame.len(), 257);

        assert_eq!(
            decode(&frame),
            Err(FrameError::LengthMismatch {
                declared: 253,
                actual: 253
            })
        );
    }

    #[test]
    fn test_checksum_byte_bit_flips() {
        let frame = encode_to_vec(CmdId::ReportStatus, &[1, 2, 3, 4, 5, 6]).unwrap();
        let last = frame.len() - 1;
        for bit in 0..8 {
            let mut corrupted = frame.clone();
            corrupted[last] ^= 1 << bit;
            assert!(
                matches!(decode(&corrupted), Err(FrameError::ChecksumMismatch { .. })),
                "flipping checksum bit {} was not detected",
                bit
            );
        }
    }

    #[test]
    fn test_payload_corruption_detected() {
        let frame = encode_to_vec(CmdId::SetVelocity, &velocity_payload(-0.5, 1.0)).unwrap();
        for i in 3..frame.len() - 1 {
            let mut corrupted = frame.clone();
            corrupted[i] = corrupted[i].wrapping_add(1);
            assert!(
                matches!(decode(&corrupted), Err(FrameError::ChecksumMismatch { .. })),
                "corrupting payload byte {} was not detected",
                i
            );
        }
    }

    #[test]
    fn test_compensating_corruption_passes() {
        // Single-byte sum cannot see offsetting changes
        let mut frame = encode_to_vec(CmdId::SetVelocity, &[10, 20, 30, 40, 0, 0, 0, 0]).unwrap();
        frame[3] += 1;
        frame[4] -= 1;
        assert!(decode(&frame).is_ok());
    }

    #[test]
    fn test_unknown_command_after_checksum() {
        let mut frame = vec![0xAA, 0x7F, 0x00, 0x00];
        frame[3] = checksum(&frame[..3]);
        assert_eq!(decode(&frame), Err(FrameError::UnknownCommand(0x7F)));

        // A bad checksum is reported before the unknown id
        frame[3] ^= 0x01;
        assert!(matches!(
            decode(&frame),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_packet_conversion() {
        let frame = encode_to_vec(CmdId::ReportStatus, &[9, 8, 7]).unwrap();
        let packet = Packet::from(decode(&frame).unwrap());
        assert_eq!(packet.cmd_id, CmdId::ReportStatus);
        assert_eq!(packet.payload, vec![9, 8, 7]);
        assert_eq!(packet.as_frame().payload, &[9, 8, 7]);
    }
}
