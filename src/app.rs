//! Daemon orchestration
//!
//! Brings the session up (connect, health check, motor and scan start), runs
//! the acquire-convert-publish loop, and funnels every exit path through the
//! same idempotent teardown.

use crate::config::{AppConfig, ScanConfig};
use crate::device::GrabStatus;
use crate::error::Result;
use crate::scan::{self, FilterPolicy, RawSample};
use crate::session::Session;
use crate::sink::{self, ScanSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Run the daemon until the cancellation flag clears or a fatal error occurs
pub fn run(config: &AppConfig, running: Arc<AtomicBool>) -> Result<()> {
    let session = Session::open(&config.device, &config.scan)?;
    let sink = sink::create_sink(&config.output)?;
    run_pipeline(session, sink, &config.scan, running)
}

/// Drive an opened session through health check, scan start, and the
/// acquisition loop, then tear it down exactly once
pub fn run_pipeline(
    mut session: Session,
    mut sink: Box<dyn ScanSink>,
    scan_cfg: &ScanConfig,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let health = session.check_health()?;
    log::info!(
        "Device health: {:?} (code {})",
        health.status,
        health.error_code
    );

    session.start_scan()?;

    let result = acquire_loop(&mut session, sink.as_mut(), scan_cfg, &running);
    session.stop();

    match result {
        Ok(frames) => {
            log::info!("Acquisition finished after {} frames", frames);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// The acquire-convert-publish loop.
///
/// Cadence is bounded by the blocking retrieval call. A timeout with partial
/// data is benign; hard retrieval failures end the loop once the configured
/// retry budget is spent, and a publish failure ends it immediately.
fn acquire_loop(
    session: &mut Session,
    sink: &mut dyn ScanSink,
    cfg: &ScanConfig,
    running: &AtomicBool,
) -> Result<u64> {
    let filter = FilterPolicy {
        drop_invalid: cfg.drop_invalid,
    };
    let timeout = Duration::from_millis(cfg.grab_timeout_ms);
    let mut raw: Vec<RawSample> = Vec::with_capacity(cfg.buffer_capacity);
    let mut frames: u64 = 0;
    let mut failures: u32 = 0;

    while running.load(Ordering::Relaxed) {
        match session.grab(&mut raw, cfg.buffer_capacity, timeout) {
            Ok(status) => {
                failures = 0;
                if status == GrabStatus::TimeoutPartial {
                    log::debug!("Grab timed out with {} samples", raw.len());
                }
                let frame = scan::convert(&raw, filter);
                sink.publish(&frame)?;
                frames += 1;
                log::debug!("Published {} points ({})", frame.len(), frames);
            }
            Err(e) => {
                failures += 1;
                if failures > cfg.grab_retries {
                    return Err(e);
                }
                log::warn!(
                    "Scan retrieval failed (attempt {} of {}): {}",
                    failures,
                    cfg.grab_retries + 1,
                    e
                );
            }
        }
    }

    Ok(frames)
}
