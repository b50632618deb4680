//! Plain-text file sink
//!
//! Writes one `angle distance` line per point, flushed after every frame.
//! Intended for offline inspection and plotting.

use super::ScanSink;
use crate::error::Result;
use crate::scan::ScanFrame;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Sink writing frames as whitespace-separated text
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create (or truncate) the output file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(&path)?;
        log::info!("Writing scan frames to {}", path.as_ref().display());
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl ScanSink for FileSink {
    fn publish(&mut self, frame: &ScanFrame) -> Result<()> {
        for point in &frame.points {
            writeln!(self.writer, "{} {}", point.angle_deg, point.distance_mm)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
