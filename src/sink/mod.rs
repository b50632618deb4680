//! Scan output sinks
//!
//! Converted frames leave the process through a [`ScanSink`] chosen by
//! configuration: the ZeroMQ publisher for live subscribers, or a plain-text
//! file for offline inspection.

mod file;
mod zmq;

pub use file::FileSink;
pub use zmq::ZmqSink;

use crate::config::{OutputConfig, SinkKind};
use crate::error::Result;
use crate::scan::ScanFrame;

/// Bytes per encoded point: two little-endian f32 fields
pub const POINT_WIRE_SIZE: usize = 8;

/// Destination for converted scan frames
pub trait ScanSink: Send {
    /// Emit one frame. A failure is fatal for the acquisition loop.
    fn publish(&mut self, frame: &ScanFrame) -> Result<()>;
}

/// Encode a frame as consecutive (angle_deg, distance_mm) f32 pairs.
///
/// No header, no count field: a receiver infers the point count from the
/// message byte length.
pub fn encode_frame(frame: &ScanFrame, buf: &mut Vec<u8>) {
    buf.clear();
    buf.reserve(frame.points.len() * POINT_WIRE_SIZE);
    for point in &frame.points {
        buf.extend_from_slice(&point.angle_deg.to_le_bytes());
        buf.extend_from_slice(&point.distance_mm.to_le_bytes());
    }
}

/// Create the configured sink
pub fn create_sink(config: &OutputConfig) -> Result<Box<dyn ScanSink>> {
    match config.sink {
        SinkKind::Zmq => Ok(Box::new(ZmqSink::bind(&config.endpoint)?)),
        SinkKind::File => Ok(Box::new(FileSink::create(&config.file_path)?)),
    }
}
