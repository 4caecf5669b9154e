// Serial link to the USB dongle
//
// Raw 8-N-1, no flow control. The dongle resets when DTR/RTS toggle, so both
// lines are cleared right after open(2) and again once the port is configured,
// then a short settle delay follows.
//
// The port handle is cloned once at open: the writer half and the reader half sit
// behind separate locks so a read waiting out its timeout never stalls a write.

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Link, LinkError};
use crate::config::{READ_TIMEOUT, SETTLE_DELAY, SerialConfig};

type Port = Box<dyn SerialPort>;

pub struct SerialLink {
    reader: Mutex<Option<Port>>,
    writer: Mutex<Option<Port>>,
    open: AtomicBool,
    read_timeout: Duration,
}

impl SerialLink {
    /// Create a closed link using the default read timeout
    pub fn new() -> Self {
        Self::with_read_timeout(READ_TIMEOUT)
    }

    pub fn with_read_timeout(read_timeout: Duration) -> Self {
        Self {
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            open: AtomicBool::new(false),
            read_timeout,
        }
    }

    /// Create a link and open it with the given settings
    pub fn connect(config: &SerialConfig) -> Result<Self, LinkError> {
        let link = Self::with_read_timeout(config.read_timeout());
        link.open(&config.port, config.baud_rate)?;
        Ok(link)
    }

    /// Acquire the device exclusively and configure it for raw byte transfer
    pub fn open(&self, path: &str, baud_rate: u32) -> Result<(), LinkError> {
        if self.is_open() {
            return Err(open_failed(path, "link is already open"));
        }

        let port = open_port(path, baud_rate, self.read_timeout)?;
        self.attach(port).map_err(|e| open_failed(path, e))?;

        info!(
            "Opened {} at {} baud ({}ms read timeout)",
            path,
            baud_rate,
            self.read_timeout.as_millis()
        );
        Ok(())
    }

    /// Take over an already configured port: flush it, split it into reader and
    /// writer halves and wait out the settle delay.
    fn attach(&self, mut port: Port) -> serialport::Result<()> {
        port.clear(ClearBuffer::All)?;
        let writer = port.try_clone()?;

        std::thread::sleep(SETTLE_DELAY);

        *lock(&self.reader) = Some(port);
        *lock(&self.writer) = Some(writer);
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl Default for SerialLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Link for SerialLink {
    fn write(&self, data: &[u8]) -> Result<usize, LinkError> {
        let mut guard = lock(&self.writer);
        let port = guard.as_mut().ok_or(LinkError::NotOpen)?;

        let written = port.write(data)?;
        if written < data.len() {
            warn!("Partial write: {} of {} bytes", written, data.len());
        }
        debug!("TX {:02X?}", &data[..written]);
        Ok(written)
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, LinkError> {
        if !self.is_open() {
            return Err(LinkError::NotOpen);
        }

        let mut guard = lock(&self.reader);
        let port = guard.as_mut().ok_or(LinkError::NotOpen)?;

        match port.read(buf) {
            Ok(n) => {
                if n > 0 {
                    debug!("RX {:02X?}", &buf[..n]);
                }
                Ok(n)
            }
            Err(e) if is_timeout(e.kind()) => Ok(0),
            Err(e) => Err(LinkError::Io(e)),
        }
    }

    fn close(&self) {
        let was_open = self.open.swap(false, Ordering::SeqCst);

        // The reader lock is held for at most one read timeout
        lock(&self.writer).take();
        lock(&self.reader).take();

        if was_open {
            info!("Serial link closed");
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open the device and clear DTR/RTS before any line settings are applied.
///
/// The descriptor is opened by hand so the control lines can be dropped right
/// after open(2), then made raw and configured through the `SerialPort` setters.
/// Both lines are cleared again once configuration is done.
#[cfg(unix)]
fn open_port(path: &str, baud_rate: u32, timeout: Duration) -> Result<Port, LinkError> {
    use std::fs::OpenOptions;
    use std::os::fd::{FromRawFd, IntoRawFd};
    use std::os::unix::fs::OpenOptionsExt;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)
        .map_err(|e| open_failed(path, e))?;

    // SAFETY: the descriptor was just opened above and its ownership moves into
    // the port, which closes it on drop.
    let mut port = unsafe { serialport::TTYPort::from_raw_fd(file.into_raw_fd()) };

    deassert_reset_lines(&mut port).map_err(|e| open_failed(path, e))?;
    port.set_exclusive(true).map_err(|e| open_failed(path, e))?;
    make_raw(&port).map_err(|e| open_failed(path, e))?;

    configure(&mut port, baud_rate, timeout).map_err(|e| open_failed(path, e))?;

    deassert_reset_lines(&mut port).map_err(|e| open_failed(path, e))?;
    Ok(Box::new(port))
}

// No hook between open and configuration here; DTR stays low through open and
// both lines are cleared once the port is configured
#[cfg(not(unix))]
fn open_port(path: &str, baud_rate: u32, timeout: Duration) -> Result<Port, LinkError> {
    let mut port = serialport::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(timeout)
        .dtr_on_open(false)
        .open()
        .map_err(|e| open_failed(path, e))?;

    deassert_reset_lines(port.as_mut()).map_err(|e| open_failed(path, e))?;
    Ok(port)
}

/// 8-N-1 at `baud_rate`, no flow control
#[cfg(unix)]
fn configure(port: &mut dyn SerialPort, baud_rate: u32, timeout: Duration) -> serialport::Result<()> {
    port.set_baud_rate(baud_rate)?;
    port.set_data_bits(DataBits::Eight)?;
    port.set_parity(Parity::None)?;
    port.set_stop_bits(StopBits::One)?;
    port.set_flow_control(FlowControl::None)?;
    port.set_timeout(timeout)
}

/// Raw mode, receiver on, modem status ignored, blocking descriptor
#[cfg(unix)]
fn make_raw(port: &serialport::TTYPort) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    let fd = port.as_raw_fd();
    // SAFETY: `fd` is an open tty descriptor owned by `port`, and `tio` is a
    // valid termios for tcgetattr to fill in.
    unsafe {
        let mut tio: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        libc::cfmakeraw(&mut tio);
        tio.c_cflag |= libc::CREAD | libc::CLOCAL;
        tio.c_cc[libc::VMIN] = 0;
        tio.c_cc[libc::VTIME] = 0;
        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(std::io::Error::last_os_error());
        }

        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

fn deassert_reset_lines(port: &mut dyn SerialPort) -> serialport::Result<()> {
    port.write_data_terminal_ready(false)?;
    port.write_request_to_send(false)
}

fn is_timeout(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

fn open_failed(path: &str, reason: impl ToString) -> LinkError {
    LinkError::OpenFailed {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

// A panic on the other side of the link must not wedge close()
fn lock(slot: &Mutex<Option<Port>>) -> MutexGuard<'_, Option<Port>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
