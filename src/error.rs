//! Error types for parikrama-io

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// parikrama-io error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Channel could not be opened or the device did not acknowledge
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Health query could not be completed
    #[error("Cannot retrieve device health: {0}")]
    HealthQuery(String),

    /// Device self-reported an internal error; requires a physical reset
    #[error("Device internal error (code {code:#06x}), reboot the device to retry")]
    DeviceFault {
        /// Device-reported error code
        code: u16,
    },

    /// Scan start command rejected
    #[error("Cannot start the scan operation: {0}")]
    ScanStart(String),

    /// Hard failure while retrieving scan data (distinct from a benign timeout)
    #[error("Scan retrieval failed: {0}")]
    Retrieval(String),

    /// Pub/sub transport bind or send failure
    #[error("Transport error: {0}")]
    Transport(#[from] zmq::Error),

    /// Malformed response or measurement data
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl Error {
    /// Process exit status when this error ends the daemon.
    ///
    /// Mirrors the historical codes: -1 for unusable configuration or
    /// arguments, -2 when the driver cannot be brought up at all, 1 for any
    /// other fatal condition.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => -1,
            Error::Connection(_) => -2,
            _ => 1,
        }
    }
}
