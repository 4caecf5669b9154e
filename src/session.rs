// Sender and receiver contexts sharing one link
//
// The sender turns input into commands and writes one frame per input. The
// receiver polls the link, reassembles frames and reports decoded messages until
// the link is closed. Nothing but the link is shared between the two.

use tracing::{debug, info, warn};

use crate::command::CommandSource;
use crate::config::{READ_CHUNK_SIZE, RX_BUFFER_CAPACITY, TX_BUFFER_SIZE};
use crate::error::Result;
use crate::link::{Link, LinkError};
use crate::messages::{Message, VelocityCommand};
use crate::protocol::{AssemblerStats, FrameAssembler};

/// Result of writing one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sent {
    pub frame_len: usize,
    pub written: usize,
}

impl Sent {
    /// False when the transport accepted only part of the frame
    pub fn is_complete(&self) -> bool {
        self.written == self.frame_len
    }
}

/// Encode a message and hand it to the link in a single write.
///
/// A short write is returned as-is; retrying the remainder is up to the caller.
pub fn send_message<L: Link + ?Sized>(link: &L, message: &Message) -> Result<Sent> {
    let mut buf = [0u8; TX_BUFFER_SIZE];
    let frame_len = message.encode_into(&mut buf)?;
    let written = link.write(&buf[..frame_len])?;

    if written < frame_len {
        warn!(
            "{:?} frame truncated by transport: {} of {} bytes written",
            message.cmd_id(),
            written,
            frame_len
        );
    }
    Ok(Sent { frame_len, written })
}

pub fn send_velocity<L: Link + ?Sized>(link: &L, cmd: &VelocityCommand) -> Result<Sent> {
    send_message(link, &Message::SetVelocity(*cmd))
}

/// Ask the robot for a status report
pub fn request_status<L: Link + ?Sized>(link: &L) -> Result<Sent> {
    send_message(link, &Message::GetStatus)
}

/// Sender context: command source plus the link it writes to
pub struct Controller<S, L> {
    source: S,
    link: L,
}

impl<S: CommandSource, L: Link> Controller<S, L> {
    pub fn new(source: S, link: L) -> Self {
        Self { source, link }
    }

    /// Map one input to a command and send it
    pub fn handle_input(&mut self, input: char) -> Result<(VelocityCommand, Sent)> {
        let cmd = self.source.update(input);
        let sent = send_velocity(&self.link, &cmd)?;
        debug!("Sent vx={:.2} wz={:.2}", cmd.vx, cmd.wz);
        Ok((cmd, sent))
    }

    pub fn request_status(&self) -> Result<Sent> {
        request_status(&self.link)
    }

    pub fn link(&self) -> &L {
        &self.link
    }
}

/// Receiver context: read until the link closes, reporting every decoded message.
///
/// Returns the assembler counters once the link has been closed. I/O errors on a
/// live link end the loop and are returned to the caller.
pub fn run_receiver<L, F>(link: &L, mut on_message: F) -> Result<AssemblerStats>
where
    L: Link + ?Sized,
    F: FnMut(Message),
{
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut assembler = FrameAssembler::new(RX_BUFFER_CAPACITY);
    info!("Receiver started");

    while link.is_open() {
        let n = match link.read(&mut chunk) {
            Ok(0) => continue,
            Ok(n) => n,
            Err(LinkError::NotOpen) => break,
            // The link was closed underneath an in-flight read
            Err(_) if !link.is_open() => break,
            Err(e) => return Err(e.into()),
        };

        assembler.push(&chunk[..n]);
        while let Some(packet) = assembler.next_packet() {
            match Message::try_from(&packet) {
                Ok(message) => on_message(message),
                Err(e) => warn!("Dropping frame: {}", e),
            }
        }
    }

    let stats = assembler.stats();
    info!(
        "Receiver stopped: {} frames, {} rejected, {} bytes discarded, {} overflows",
        stats.frames, stats.rejected, stats.discarded_bytes, stats.overflows
    );
    Ok(stats)
}
