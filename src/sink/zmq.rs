//! ZeroMQ PUB sink
//!
//! The endpoint is bound once for the process lifetime. Slow-subscriber
//! behavior is governed by the socket's own high-water-mark drop policy;
//! there is no application-level queueing.

use super::{encode_frame, ScanSink};
use crate::error::Result;
use crate::scan::ScanFrame;

/// Publisher for converted scan frames
pub struct ZmqSink {
    _context: zmq::Context,
    socket: zmq::Socket,
    /// Reusable send buffer
    buf: Vec<u8>,
}

impl ZmqSink {
    /// Create the context and PUB socket and bind the endpoint.
    ///
    /// Accepts any ZeroMQ endpoint form, e.g. `ipc:///tmp/lidar_data` or
    /// `tcp://*:5556`.
    pub fn bind(endpoint: &str) -> Result<Self> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PUB)?;
        socket.bind(endpoint)?;
        log::info!("Publishing scan frames on {}", endpoint);

        Ok(Self {
            _context: context,
            socket,
            buf: Vec::with_capacity(8192),
        })
    }
}

impl ScanSink for ZmqSink {
    fn publish(&mut self, frame: &ScanFrame) -> Result<()> {
        encode_frame(frame, &mut self.buf);
        self.socket.send(self.buf.as_slice(), 0)?;
        Ok(())
    }
}
