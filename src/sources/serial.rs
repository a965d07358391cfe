//! Serial device channel
//!
//! The device is opened non-blocking and waited on with `poll(2)`, so a read
//! never blocks past its timeout. Bytes that arrive without a trailing newline
//! stay buffered until the rest of the line shows up.

use crate::error::ChannelError;
use crate::sources::LineChannel;
use log::{debug, info};
use std::fs::File;
use std::io::Read;
use std::time::{Duration, Instant};

/// Line channel over a serial device (or any readable file descriptor)
pub struct SerialChannel {
    port: String,
    file: File,
    buffer: Vec<u8>,
}

impl SerialChannel {
    /// Open `port` and, when it is a terminal, configure raw 8N1 at `baud_rate`
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Unavailable` if the device cannot be opened or
    /// configured.
    #[cfg(unix)]
    pub fn open(port: &str, baud_rate: u32) -> Result<Self, ChannelError> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::io::AsRawFd;

        let unavailable = |reason: String| ChannelError::Unavailable {
            port: port.to_string(),
            reason,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(port)
            .map_err(|e| unavailable(e.to_string()))?;

        let fd = file.as_raw_fd();
        // SAFETY: fd is owned by `file` and stays open for the call
        if unsafe { libc::isatty(fd) } == 1 {
            configure_tty(fd, baud_rate).map_err(|e| unavailable(e.to_string()))?;
            info!(
                "Successfully connected to serial port {} at {} baud",
                port, baud_rate
            );
        } else {
            info!("Reading sensor lines from {}", port);
        }

        Ok(Self {
            port: port.to_string(),
            file,
            buffer: Vec::new(),
        })
    }

    #[cfg(not(unix))]
    pub fn open(port: &str, _baud_rate: u32) -> Result<Self, ChannelError> {
        Err(ChannelError::Unavailable {
            port: port.to_string(),
            reason: "serial channels are only supported on Unix platforms".to_string(),
        })
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Pop the next non-blank buffered line
    fn take_line(&mut self) -> Option<String> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    /// Wait until the descriptor is readable or `timeout` elapses
    #[cfg(unix)]
    fn wait_readable(&self, timeout: Duration) -> Result<bool, ChannelError> {
        use std::os::unix::io::AsRawFd;

        let mut pollfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: pollfd is a valid single-element array for the duration of the call
        let ret = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err.into());
        }
        Ok(ret > 0)
    }

    #[cfg(not(unix))]
    fn wait_readable(&self, _timeout: Duration) -> Result<bool, ChannelError> {
        Ok(true)
    }
}

impl LineChannel for SerialChannel {
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, ChannelError> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }

        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !self.wait_readable(remaining)? {
                return Ok(None);
            }

            match self.file.read(&mut chunk) {
                // Nothing more to read right now
                Ok(0) => return Ok(None),
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    if let Some(line) = self.take_line() {
                        return Ok(Some(line));
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }

            if remaining.is_zero() {
                return Ok(None);
            }
        }
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        debug!("Releasing serial port {}", self.port);
    }
}

#[cfg(unix)]
fn baud_constant(baud_rate: u32) -> Option<libc::speed_t> {
    let speed = match baud_rate {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        _ => return None,
    };
    Some(speed)
}

#[cfg(unix)]
fn configure_tty(fd: libc::c_int, baud_rate: u32) -> std::io::Result<()> {
    let speed = baud_constant(baud_rate).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("unsupported baud rate {}", baud_rate),
        )
    })?;

    // SAFETY: termios is plain data and fd refers to an open terminal
    unsafe {
        let mut tio: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        libc::cfmakeraw(&mut tio);
        tio.c_cflag |= libc::CLOCAL | libc::CREAD;
        if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}
