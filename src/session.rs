//! Device session lifecycle
//!
//! A [`Session`] owns the device handle for one acquisition run. Transitions
//! are forward-only (`Connected` to `HealthChecked` to `Scanning`) except
//! that any state may drop to `Stopped`. A scanning session is never reused:
//! stop it and open a new one.

use crate::config::{DeviceConfig, ScanConfig};
use crate::device::{self, GrabStatus, Health, HealthStatus, RangeFinder};
use crate::error::{Error, Result};
use crate::scan::RawSample;
use std::thread;
use std::time::Duration;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    HealthChecked,
    Scanning,
    Stopped,
}

/// One active connection to the range finder
pub struct Session {
    device: Box<dyn RangeFinder>,
    state: SessionState,
    motor_speed: Option<u16>,
    motor_settle: Duration,
    stop_settle: Duration,
}

impl Session {
    /// Open the configured channel, connect, and identify the device
    pub fn open(device_cfg: &DeviceConfig, scan_cfg: &ScanConfig) -> Result<Self> {
        let mut device = device::open_device(device_cfg)?;
        device.connect().map_err(|e| match e {
            Error::Connection(_) => e,
            other => Error::Connection(other.to_string()),
        })?;

        let info = device
            .device_info()
            .map_err(|e| Error::Connection(format!("device did not acknowledge: {}", e)))?;
        log::info!(
            "Device model {} firmware {}.{:02} hardware {} serial {}",
            info.model,
            info.firmware_major,
            info.firmware_minor,
            info.hardware_version,
            info.serial_hex()
        );

        Ok(Self::attach(device, scan_cfg))
    }

    /// Wrap an already-connected device
    pub fn attach(device: Box<dyn RangeFinder>, scan_cfg: &ScanConfig) -> Self {
        Self {
            device,
            state: SessionState::Connected,
            motor_speed: scan_cfg.motor_speed,
            motor_settle: Duration::from_millis(scan_cfg.motor_settle_ms),
            stop_settle: Duration::from_millis(scan_cfg.stop_settle_ms),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Query device health.
    ///
    /// An error status means the device needs a physical reset; the session
    /// is unusable and the returned fault is fatal.
    pub fn check_health(&mut self) -> Result<Health> {
        match self.state {
            SessionState::Connected | SessionState::HealthChecked => {}
            _ => {
                return Err(Error::HealthQuery(format!(
                    "session is {:?}",
                    self.state
                )))
            }
        }

        let health = self
            .device
            .health()
            .map_err(|e| Error::HealthQuery(e.to_string()))?;
        if health.status == HealthStatus::Error {
            return Err(Error::DeviceFault {
                code: health.error_code,
            });
        }
        if health.status == HealthStatus::Warning {
            log::warn!("Device health warning (code {})", health.error_code);
        }
        self.state = SessionState::HealthChecked;
        Ok(health)
    }

    /// Spin up the motor, wait for the mirror to reach speed, start the scan
    pub fn start_scan(&mut self) -> Result<()> {
        if self.state != SessionState::HealthChecked {
            return Err(Error::ScanStart(format!(
                "health not verified (session is {:?})",
                self.state
            )));
        }

        self.device.set_motor_speed(self.motor_speed)?;
        log::debug!("Waiting {:?} for the mirror to settle", self.motor_settle);
        thread::sleep(self.motor_settle);

        self.device.start_scan(false)?;
        self.state = SessionState::Scanning;
        log::info!("Scan started");
        Ok(())
    }

    /// Retrieve up to one revolution of raw samples
    pub fn grab(
        &mut self,
        out: &mut Vec<RawSample>,
        max_count: usize,
        timeout: Duration,
    ) -> Result<GrabStatus> {
        if self.state != SessionState::Scanning {
            return Err(Error::Retrieval(format!(
                "session is not scanning ({:?})",
                self.state
            )));
        }
        self.device.grab_scan(out, max_count, timeout)
    }

    /// Stop scanning and release the device.
    ///
    /// Idempotent, and never fails: release errors during teardown are
    /// logged, not escalated.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        log::info!("Stopping scan session");

        if let Err(e) = self.device.stop_scan() {
            log::warn!("Scan stop failed: {}", e);
        }
        thread::sleep(self.stop_settle);
        if let Err(e) = self.device.set_motor_speed(Some(0)) {
            log::warn!("Motor stop failed: {}", e);
        }
        self.state = SessionState::Stopped;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockRangeFinder;

    fn scan_config() -> ScanConfig {
        ScanConfig {
            buffer_capacity: 8192,
            grab_timeout_ms: 50,
            motor_settle_ms: 0,
            stop_settle_ms: 0,
            grab_retries: 0,
            drop_invalid: false,
            motor_speed: None,
        }
    }

    fn session_with_mock() -> (Session, MockRangeFinder) {
        let mock = MockRangeFinder::new();
        let session = Session::attach(Box::new(mock.clone()), &scan_config());
        (session, mock)
    }

    #[test]
    fn test_normal_lifecycle() {
        let (mut session, mock) = session_with_mock();
        assert_eq!(session.state(), SessionState::Connected);

        let health = session.check_health().unwrap();
        assert_eq!(health.status, HealthStatus::Ok);
        assert_eq!(session.state(), SessionState::HealthChecked);

        session.start_scan().unwrap();
        assert_eq!(session.state(), SessionState::Scanning);
        assert!(mock.is_scanning());
        assert_eq!(mock.motor_commands(), vec![None]);

        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!mock.is_scanning());
        assert_eq!(mock.motor_commands(), vec![None, Some(0)]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut session, mock) = session_with_mock();
        session.stop();
        session.stop();
        assert_eq!(mock.stop_scan_count(), 1);
        assert_eq!(mock.motor_commands(), vec![Some(0)]);
    }

    #[test]
    fn test_drop_stops_once() {
        let (mut session, mock) = session_with_mock();
        session.stop();
        drop(session);
        assert_eq!(mock.stop_scan_count(), 1);
    }

    #[test]
    fn test_health_error_is_fatal() {
        let (mut session, mock) = session_with_mock();
        mock.set_health(HealthStatus::Error, 0x0002);

        let err = session.check_health().unwrap_err();
        assert!(matches!(err, Error::DeviceFault { code: 0x0002 }));
        // the session never advanced; scanning is not allowed
        assert!(session.start_scan().is_err());
        assert_eq!(mock.start_scan_count(), 0);
    }

    #[test]
    fn test_health_query_failure() {
        let (mut session, mock) = session_with_mock();
        mock.fail_health_query();
        assert!(matches!(
            session.check_health(),
            Err(Error::HealthQuery(_))
        ));
    }

    #[test]
    fn test_start_scan_requires_health_check() {
        let (mut session, mock) = session_with_mock();
        assert!(matches!(session.start_scan(), Err(Error::ScanStart(_))));
        assert_eq!(mock.start_scan_count(), 0);
    }

    #[test]
    fn test_start_scan_rejection() {
        let (mut session, mock) = session_with_mock();
        mock.fail_start();
        session.check_health().unwrap();
        assert!(matches!(session.start_scan(), Err(Error::ScanStart(_))));
        assert_eq!(session.state(), SessionState::HealthChecked);
    }

    #[test]
    fn test_grab_requires_scanning() {
        let (mut session, _mock) = session_with_mock();
        let mut out = Vec::new();
        assert!(matches!(
            session.grab(&mut out, 8192, Duration::from_millis(10)),
            Err(Error::Retrieval(_))
        ));
    }

    #[test]
    fn test_no_health_check_after_stop() {
        let (mut session, _mock) = session_with_mock();
        session.stop();
        assert!(session.check_health().is_err());
    }

    #[test]
    fn test_motor_speed_override() {
        let mock = MockRangeFinder::new();
        let mut cfg = scan_config();
        cfg.motor_speed = Some(512);
        let mut session = Session::attach(Box::new(mock.clone()), &cfg);
        session.check_health().unwrap();
        session.start_scan().unwrap();
        assert_eq!(mock.motor_commands(), vec![Some(512)]);
    }
}
