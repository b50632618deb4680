//! Range finder device abstraction
//!
//! The acquisition pipeline only depends on the [`RangeFinder`] trait; the
//! concrete protocol driver and the mock used in tests both implement it.

pub mod channel;
pub mod mock;
pub mod rplidar;

use crate::config::{ChannelKind, DeviceConfig};
use crate::error::Result;
use crate::scan::RawSample;
use channel::{Channel, SerialChannel, UdpChannel};
use rplidar::RplidarDevice;
use std::time::Duration;

/// Device self-reported health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Warning,
    Error,
}

/// Health report returned by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub status: HealthStatus,
    pub error_code: u16,
}

/// Identification reported by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: u8,
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub hardware_version: u8,
    pub serial_number: [u8; 16],
}

impl DeviceInfo {
    /// Serial number as an uppercase hex string
    pub fn serial_hex(&self) -> String {
        self.serial_number
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect()
    }
}

/// Outcome of a batch retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabStatus {
    /// A full revolution was collected
    Full,
    /// The wait window elapsed before the batch filled; the samples that did
    /// arrive are valid
    TimeoutPartial,
}

/// Driver contract for a rotating-mirror range finder
pub trait RangeFinder: Send {
    /// Verify the device is reachable and in a known idle state
    fn connect(&mut self) -> Result<()>;

    /// Query device identification
    fn device_info(&mut self) -> Result<DeviceInfo>;

    /// Query device health
    fn health(&mut self) -> Result<Health>;

    /// Set the motor speed. `None` selects the device default, `Some(0)`
    /// stops the motor.
    fn set_motor_speed(&mut self, speed: Option<u16>) -> Result<()>;

    /// Request scan start. `force` starts sampling regardless of motor state.
    fn start_scan(&mut self, force: bool) -> Result<()>;

    /// Retrieve up to `max_count` samples of one revolution into `out`,
    /// waiting at most `timeout`.
    fn grab_scan(
        &mut self,
        out: &mut Vec<RawSample>,
        max_count: usize,
        timeout: Duration,
    ) -> Result<GrabStatus>;

    /// Request scan stop
    fn stop_scan(&mut self) -> Result<()>;
}

/// Open the configured channel and wrap it in the protocol driver
pub fn open_device(config: &DeviceConfig) -> Result<Box<dyn RangeFinder>> {
    let channel: Box<dyn Channel> = match config.channel {
        ChannelKind::Serial => {
            Box::new(SerialChannel::open(&config.serial_port, config.baud_rate)?)
        }
        ChannelKind::Udp => Box::new(UdpChannel::open(&config.udp_address, config.udp_port)?),
    };
    Ok(Box::new(RplidarDevice::new(channel)))
}
