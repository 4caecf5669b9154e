// Byte transport to the robot
//
// `Link` is the contract the sender and receiver loops are written against:
// methods take `&self` so one open link can be shared by a writer thread and a
// reader thread, and closed from either side.

mod serial;

pub use serial::SerialLink;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Failed to open {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Link is not open")]
    NotOpen,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Link: Send + Sync {
    /// Write bytes with a single underlying call, returning how many were taken
    fn write(&self, data: &[u8]) -> Result<usize, LinkError>;

    /// Read whatever arrives within the read timeout; `Ok(0)` means nothing did
    fn read(&self, buf: &mut [u8]) -> Result<usize, LinkError>;

    /// Release the endpoint. Calling it again is a no-op.
    fn close(&self);

    fn is_open(&self) -> bool;
}

impl<L: Link + ?Sized> Link for std::sync::Arc<L> {
    fn write(&self, data: &[u8]) -> Result<usize, LinkError> {
        (**self).write(data)
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, LinkError> {
        (**self).read(buf)
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
