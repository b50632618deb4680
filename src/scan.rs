//! Scan sample types and fixed-point conversion
//!
//! The device reports angles in q14 fixed point over a four-quadrant layout
//! (16384 == 90 degrees) and distances in q2 fixed point (4 == 1 mm).
//! Conversion to floating point is pure and deterministic.

/// One raw measurement as produced by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    /// Fixed-point angle, 16384 == 90 degrees
    pub angle_q14: u32,
    /// Fixed-point distance, 4 == 1 mm
    pub dist_q2: u32,
    /// First sample of a new revolution
    pub sync: bool,
}

impl RawSample {
    /// Create a new raw sample
    pub fn new(angle_q14: u32, dist_q2: u32, sync: bool) -> Self {
        Self {
            angle_q14,
            dist_q2,
            sync,
        }
    }

    /// Angle in degrees (0-360)
    pub fn angle_deg(&self) -> f32 {
        (self.angle_q14 as f32 * 90.0) / 16384.0
    }

    /// Distance in millimeters
    pub fn distance_mm(&self) -> f32 {
        self.dist_q2 as f32 / 4.0
    }
}

/// A converted, publishable measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Angle in degrees (0-360)
    pub angle_deg: f32,
    /// Distance in millimeters
    pub distance_mm: f32,
}

/// The ordered point set for one revolution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanFrame {
    pub points: Vec<Point>,
}

impl ScanFrame {
    /// Create a new empty frame
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create a frame with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Number of points in the frame
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the frame is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Filtering applied during conversion.
///
/// The device passes zero-distance samples through for unobstructed
/// directions; dropping them is an opt-in policy, not the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Drop samples with a zero distance reading
    pub drop_invalid: bool,
}

impl FilterPolicy {
    fn keeps(&self, sample: &RawSample) -> bool {
        !self.drop_invalid || sample.dist_q2 > 0
    }
}

/// Reorder a batch into non-decreasing angular order, logically starting at
/// the revolution boundary.
///
/// The device may return samples out of angular order. Rotating to the sync
/// marker first makes the boundary sample lead its angle group under the
/// stable sort, which also makes the operation idempotent.
pub fn ascend(samples: &mut [RawSample]) {
    if let Some(idx) = samples.iter().position(|s| s.sync) {
        samples.rotate_left(idx);
    }
    samples.sort_by_key(|s| s.angle_q14);
}

/// Convert a raw batch into an angle-ordered frame. Pure: the input batch is
/// left untouched and the same batch always yields the same frame.
pub fn convert(batch: &[RawSample], filter: FilterPolicy) -> ScanFrame {
    let mut ordered = batch.to_vec();
    ascend(&mut ordered);

    let mut frame = ScanFrame::with_capacity(ordered.len());
    for sample in ordered.iter().filter(|s| filter.keeps(s)) {
        frame.points.push(Point {
            angle_deg: sample.angle_deg(),
            distance_mm: sample.distance_mm(),
        });
    }
    frame
}
