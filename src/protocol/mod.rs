// Wire protocol shared with the robot-side dongle
//
// Provides:
// - Frame encoding and validation (stateless)
// - Reassembly of frames from a byte stream

pub mod assembler;
pub mod packet;

pub use assembler::{AssemblerStats, FrameAssembler};
pub use packet::{
    CmdId, EncodeError, Frame, FrameError, MAGIC_BYTE, MAX_FRAME_LEN, MAX_PAYLOAD_LEN,
    MIN_FRAME_LEN, Packet, checksum, decode, encode, encode_to_vec,
};
