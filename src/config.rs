//! Configuration for the parikrama-io daemon
//!
//! Loads configuration from a TOML file. Every knob that used to be a
//! hard-coded constant (device path, baud rate, endpoint, buffer capacity,
//! settle delays) lives here with a named field.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub scan: ScanConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Channel used to reach the range finder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Serial,
    Udp,
}

/// Device connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Channel kind: serial port or UDP
    pub channel: ChannelKind,
    /// Serial port path (e.g. `/dev/ttyUSB0`)
    pub serial_port: String,
    /// Serial baud rate (model-specific, e.g. A1 115200, S1 256000)
    pub baud_rate: u32,
    /// Device IP address for the UDP channel
    pub udp_address: String,
    /// Device UDP port
    pub udp_port: u16,
}

/// Acquisition configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Maximum samples requested per batch (device buffer capacity)
    pub buffer_capacity: usize,
    /// Wait bound for one batch retrieval, in milliseconds
    pub grab_timeout_ms: u64,
    /// Wait after spinning up the motor before starting the scan
    pub motor_settle_ms: u64,
    /// Wait between scan stop and motor stop during teardown
    pub stop_settle_ms: u64,
    /// Retrieval failures tolerated before giving up (0 = first failure is fatal)
    pub grab_retries: u32,
    /// Drop zero-distance samples before publishing
    pub drop_invalid: bool,
    /// Motor duty override; omit to use the device default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motor_speed: Option<u16>,
}

/// Output sink selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Zmq,
    File,
}

/// Scan output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Where converted frames go
    pub sink: SinkKind,
    /// Pub/sub endpoint, e.g. `ipc:///tmp/lidar_data` or `tcp://*:5556`
    pub endpoint: String,
    /// Output path for the file sink
    pub file_path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration for a serial-attached range finder
    ///
    /// Suitable for testing and development. Production deployments should
    /// use a proper TOML configuration file.
    pub fn serial_defaults() -> Self {
        Self {
            device: DeviceConfig {
                channel: ChannelKind::Serial,
                serial_port: "/dev/ttyUSB0".to_string(),
                baud_rate: 460800,
                udp_address: "192.168.11.2".to_string(),
                udp_port: 8089,
            },
            scan: ScanConfig {
                buffer_capacity: 8192,
                grab_timeout_ms: 1000,
                motor_settle_ms: 3000,
                stop_settle_ms: 20,
                grab_retries: 0,
                drop_invalid: false,
                motor_speed: None,
            },
            output: OutputConfig {
                sink: SinkKind::Zmq,
                endpoint: "ipc:///tmp/lidar_data".to_string(),
                file_path: "scan_data.txt".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::serial_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::serial_defaults();
        assert_eq!(config.device.channel, ChannelKind::Serial);
        assert_eq!(config.device.serial_port, "/dev/ttyUSB0");
        assert_eq!(config.device.baud_rate, 460800);
        assert_eq!(config.scan.buffer_capacity, 8192);
        assert_eq!(config.scan.grab_retries, 0);
        assert!(!config.scan.drop_invalid);
        assert_eq!(config.scan.motor_speed, None);
        assert_eq!(config.output.sink, SinkKind::Zmq);
        assert_eq!(config.output.endpoint, "ipc:///tmp/lidar_data");
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::serial_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[device]"));
        assert!(toml_string.contains("[scan]"));
        assert!(toml_string.contains("[output]"));
        assert!(toml_string.contains("[logging]"));

        assert!(toml_string.contains("channel = \"serial\""));
        assert!(toml_string.contains("baud_rate = 460800"));
        assert!(toml_string.contains("endpoint = \"ipc:///tmp/lidar_data\""));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[device]
channel = "udp"
serial_port = "/dev/ttyUSB1"
baud_rate = 256000
udp_address = "192.168.11.2"
udp_port = 8089

[scan]
buffer_capacity = 4096
grab_timeout_ms = 500
motor_settle_ms = 2000
stop_settle_ms = 20
grab_retries = 3
drop_invalid = true
motor_speed = 660

[output]
sink = "file"
endpoint = "tcp://*:5556"
file_path = "/tmp/scan.txt"

[logging]
level = "debug"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.device.channel, ChannelKind::Udp);
        assert_eq!(config.device.baud_rate, 256000);
        assert_eq!(config.scan.buffer_capacity, 4096);
        assert_eq!(config.scan.grab_retries, 3);
        assert!(config.scan.drop_invalid);
        assert_eq!(config.scan.motor_speed, Some(660));
        assert_eq!(config.output.sink, SinkKind::File);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_motor_speed_is_optional() {
        let toml_content = r#"
[device]
channel = "serial"
serial_port = "/dev/ttyUSB0"
baud_rate = 460800
udp_address = "192.168.11.2"
udp_port = 8089

[scan]
buffer_capacity = 8192
grab_timeout_ms = 1000
motor_settle_ms = 3000
stop_settle_ms = 20
grab_retries = 0
drop_invalid = false

[output]
sink = "zmq"
endpoint = "ipc:///tmp/lidar_data"
file_path = "scan_data.txt"

[logging]
level = "info"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.scan.motor_speed, None);
    }
}
