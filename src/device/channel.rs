//! Byte channels to the range finder
//!
//! The protocol driver talks to the device through a `Channel`, so the same
//! framing code serves the serial and UDP attachments as well as the mock
//! used in tests.

use crate::error::{Error, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::net::UdpSocket;
use std::time::Duration;

const READ_TIMEOUT_MS: u64 = 100;

/// Bidirectional byte channel to the device
pub trait Channel: Send {
    /// Read available bytes. Returns 0 when nothing arrived within the
    /// channel's read timeout.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write the whole buffer
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Drop any buffered input (stale scan bytes from a previous run)
    fn discard_input(&mut self) -> Result<()>;
}

/// Serial channel for UART-attached devices
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Open a serial port at 8N1 with no flow control
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(READ_TIMEOUT_MS))
            .open()
            .map_err(|e| {
                Error::Connection(format!("cannot bind serial port {}: {}", path, e))
            })?;

        log::info!("Opened serial port {} at {} baud", path, baud_rate);
        Ok(SerialChannel { port })
    }
}

impl Channel for SerialChannel {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }
}

/// UDP channel for network-attached devices
pub struct UdpChannel {
    socket: UdpSocket,
}

impl UdpChannel {
    /// Bind a local socket and point it at the device address
    pub fn open(address: &str, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| {
            Error::Connection(format!("cannot create UDP socket: {}", e))
        })?;
        socket.connect((address, port)).map_err(|e| {
            Error::Connection(format!(
                "cannot connect to {} on UDP port {}: {}",
                address, port, e
            ))
        })?;
        socket
            .set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)))
            .map_err(Error::Io)?;

        log::info!("Opened UDP channel to {}:{}", address, port);
        Ok(UdpChannel { socket })
    }
}

impl Channel for UdpChannel {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.socket.recv(buffer) {
            Ok(n) => Ok(n),
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.socket.send(data)?;
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        let mut scratch = [0u8; 2048];
        loop {
            match self.socket.recv(&mut scratch) {
                Ok(_) => continue,
                Err(e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
