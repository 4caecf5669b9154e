// Receive-side frame reassembly
//
// Serial reads return arbitrary chunks, so bytes are accumulated here until a
// complete candidate frame is available. Garbage is skipped by scanning for the
// magic byte; a rejected candidate drops only its first byte so a real frame
// starting inside it is still found.

use tracing::{debug, warn};

use super::packet::{
    self, FrameError, Packet, MAGIC_BYTE, MAX_FRAME_LEN, MAX_PAYLOAD_LEN, SIZE_OFFSET,
};

/// Counters kept across the lifetime of an assembler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub frames: u64,
    pub rejected: u64,
    pub discarded_bytes: u64,
    pub overflows: u64,
}

/// Bounded accumulation buffer for inbound bytes
pub struct FrameAssembler {
    buf: Vec<u8>,
    capacity: usize,
    stats: AssemblerStats,
}

impl FrameAssembler {
    /// Create an assembler holding at most `capacity` bytes.
    ///
    /// The capacity is raised to [`MAX_FRAME_LEN`] if smaller, otherwise the
    /// largest legal frame could never be assembled.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MAX_FRAME_LEN);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            stats: AssemblerStats::default(),
        }
    }

    /// Append freshly read bytes.
    ///
    /// If the buffer would overflow it is cleared first; only the newest
    /// `capacity` bytes of `data` are kept.
    pub fn push(&mut self, data: &[u8]) {
        if self.buf.len() + data.len() > self.capacity {
            warn!(
                "Receive buffer overflow ({} buffered + {} new > {}), resetting",
                self.buf.len(),
                data.len(),
                self.capacity
            );
            self.stats.overflows += 1;
            self.stats.discarded_bytes += self.buf.len() as u64;
            self.buf.clear();
        }

        let keep_from = data.len().saturating_sub(self.capacity);
        self.stats.discarded_bytes += keep_from as u64;
        self.buf.extend_from_slice(&data[keep_from..]);
    }

    /// Pop the next valid frame, or `None` if more bytes are needed
    pub fn next_packet(&mut self) -> Option<Packet> {
        loop {
            self.skip_to_magic();

            if self.buf.len() <= SIZE_OFFSET {
                return None;
            }

            let size = self.buf[SIZE_OFFSET] as usize;
            if size > MAX_PAYLOAD_LEN {
                debug!("Candidate declares oversized payload ({}), skipping", size);
                self.reject_candidate();
                continue;
            }

            let total = packet::frame_len(size);
            if self.buf.len() < total {
                return None;
            }

            match packet::decode(&self.buf[..total]) {
                Ok(frame) => {
                    let packet = Packet::from(frame);
                    self.buf.drain(..total);
                    self.stats.frames += 1;
                    debug!(
                        "Assembled {:?} frame ({} payload bytes)",
                        packet.cmd_id,
                        packet.payload.len()
                    );
                    return Some(packet);
                }
                Err(e) => {
                    log_rejection(&e);
                    self.reject_candidate();
                }
            }
        }
    }

    /// Drain every complete frame currently buffered
    pub fn drain_packets(&mut self) -> Vec<Packet> {
        std::iter::from_fn(|| self.next_packet()).collect()
    }

    /// Number of bytes waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn skip_to_magic(&mut self) {
        let skip = self
            .buf
            .iter()
            .position(|&b| b == MAGIC_BYTE)
            .unwrap_or(self.buf.len());
        if skip > 0 {
            debug!("Discarding {} bytes before frame start", skip);
            self.stats.discarded_bytes += skip as u64;
            self.buf.drain(..skip);
        }
    }

    // Drop the magic byte of a bad candidate and rescan from the next byte
    fn reject_candidate(&mut self) {
        self.stats.rejected += 1;
        self.stats.discarded_bytes += 1;
        self.buf.drain(..1);
    }
}

fn log_rejection(err: &FrameError) {
    match err {
        // Expected while resynchronizing on a 0xAA inside payload data
        FrameError::LengthMismatch { .. } | FrameError::Truncated { .. } => {
            debug!("Rejected frame candidate: {}", err)
        }
        _ => warn!("Rejected frame candidate: {}", err),
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(crate::config::RX_BUFFER_CAPACITY)
    }
}
