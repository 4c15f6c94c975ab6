use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use crate::config::SERIAL_TIMEOUT_MS;
use crate::error::{Error, Result};

/// Duplex byte stream to the modem.
///
/// A channel is owned by exactly one [`Session`](crate::session::Session)
/// and closed once when that session ends.
pub trait Channel {
    /// Write all bytes to the link.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Return whatever bytes have already arrived, possibly none.
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Discard bytes received but not yet read.
    fn flush_input(&mut self) -> Result<()>;

    /// Discard bytes written but not yet transmitted.
    fn flush_output(&mut self) -> Result<()>;

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Release the underlying handle. Later calls fail with [`Error::Closed`].
    fn close(&mut self) -> Result<()>;
}

/// [`Channel`] over a serial-attached modem.
pub struct SerialChannel {
    port: Option<Box<dyn SerialPort>>,
    port_name: String,
}

impl SerialChannel {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        tracing::debug!(port = %port_name, baud_rate, "Opening serial port");

        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
            .open()
            .map_err(|source| {
                tracing::error!(port = %port_name, error = %source, "Failed to open serial port");
                Error::ChannelOpen {
                    port: port_name.to_string(),
                    source,
                }
            })?;

        tracing::info!(port = %port_name, baud_rate, "Serial port opened");
        Ok(Self {
            port: Some(port),
            port_name: port_name.to_string(),
        })
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(Error::Closed)
    }
}

impl Channel for SerialChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let port = self.port()?;
        let waiting = port.bytes_to_read()? as usize;
        if waiting == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; waiting];
        match port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(ref e) if e.kind() == ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn flush_input(&mut self) -> Result<()> {
        self.port()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn flush_output(&mut self) -> Result<()> {
        self.port()?.clear(ClearBuffer::Output)?;
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port()?.set_timeout(timeout)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self.port.take() {
            Some(port) => {
                drop(port);
                tracing::info!(port = %self.port_name, "Serial port closed");
                Ok(())
            }
            None => Err(Error::Closed),
        }
    }
}
