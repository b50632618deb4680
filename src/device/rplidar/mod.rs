//! Protocol driver implementing [`RangeFinder`] over a byte channel

pub mod protocol;

use crate::device::channel::Channel;
use crate::device::{DeviceInfo, GrabStatus, Health, RangeFinder};
use crate::error::{Error, Result};
use crate::scan::RawSample;
use protocol::{
    ANS_LENGTH_DEVHEALTH, ANS_LENGTH_DEVINFO, ANS_TYPE_DEVHEALTH, ANS_TYPE_DEVINFO,
    ANS_TYPE_MEASUREMENT, CMD_FORCE_SCAN, CMD_GET_HEALTH, CMD_GET_INFO, CMD_SCAN, CMD_STOP,
    DEFAULT_MOTOR_PWM, DESCRIPTOR_SIZE, NODE_SIZE,
};
use std::thread;
use std::time::{Duration, Instant};

const READ_CHUNK: usize = 512;
const RESPONSE_TIMEOUT_MS: u64 = 500;
const STOP_COMMAND_DELAY_MS: u64 = 2;

/// Range finder driver speaking the A5-command protocol
pub struct RplidarDevice {
    channel: Box<dyn Channel>,
    /// Unparsed scan bytes read off the channel
    buffer: Vec<u8>,
    /// Revolution-boundary sample held back for the next grab
    carry: Option<RawSample>,
    scanning: bool,
}

impl RplidarDevice {
    /// Create a driver on top of an open channel
    pub fn new(channel: Box<dyn Channel>) -> Self {
        Self {
            channel,
            buffer: Vec::with_capacity(4096),
            carry: None,
            scanning: false,
        }
    }

    fn request(&mut self, cmd: u8) -> Result<()> {
        self.channel.write_all(&protocol::command(cmd))
    }

    /// Read exactly `len` bytes, waiting up to the response timeout
    fn read_response(&mut self, len: usize) -> Result<Vec<u8>> {
        let deadline = Instant::now() + Duration::from_millis(RESPONSE_TIMEOUT_MS);
        let mut out = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self.channel.read(&mut out[filled..])?;
            filled += n;
            if n == 0 {
                if Instant::now() >= deadline {
                    return Err(Error::InvalidPacket(format!(
                        "response timed out after {} of {} bytes",
                        filled, len
                    )));
                }
                thread::sleep(Duration::from_millis(1));
            }
        }
        Ok(out)
    }

    fn read_descriptor(&mut self, expected_len: Option<u32>, type_code: u8) -> Result<()> {
        let descriptor = self.read_response(DESCRIPTOR_SIZE)?;
        protocol::validate_descriptor(&descriptor, expected_len, type_code)
    }

    /// Pull a chunk of scan bytes off the channel into the parse buffer
    fn fill_buffer(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.channel.read(&mut chunk)?;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Take the next well-formed node from the parse buffer, resynchronizing
    /// one byte at a time past garbage
    fn next_node(&mut self) -> Option<RawSample> {
        while self.buffer.len() >= NODE_SIZE {
            let node = [
                self.buffer[0],
                self.buffer[1],
                self.buffer[2],
                self.buffer[3],
                self.buffer[4],
            ];
            match protocol::parse_node(&node) {
                Some(sample) => {
                    self.buffer.drain(..NODE_SIZE);
                    return Some(sample);
                }
                None => {
                    self.buffer.drain(..1);
                }
            }
        }
        None
    }
}

impl RangeFinder for RplidarDevice {
    fn connect(&mut self) -> Result<()> {
        // A previous run may have left the device streaming
        self.request(CMD_STOP)?;
        thread::sleep(Duration::from_millis(STOP_COMMAND_DELAY_MS));
        self.channel.discard_input()?;
        self.scanning = false;
        Ok(())
    }

    fn device_info(&mut self) -> Result<DeviceInfo> {
        self.request(CMD_GET_INFO)?;
        self.read_descriptor(Some(ANS_LENGTH_DEVINFO), ANS_TYPE_DEVINFO)?;
        let payload = self.read_response(ANS_LENGTH_DEVINFO as usize)?;
        protocol::parse_device_info(&payload)
    }

    fn health(&mut self) -> Result<Health> {
        self.request(CMD_GET_HEALTH)?;
        self.read_descriptor(Some(ANS_LENGTH_DEVHEALTH), ANS_TYPE_DEVHEALTH)?;
        let payload = self.read_response(ANS_LENGTH_DEVHEALTH as usize)?;
        protocol::parse_health(&payload)
    }

    fn set_motor_speed(&mut self, speed: Option<u16>) -> Result<()> {
        let pwm = speed.unwrap_or(DEFAULT_MOTOR_PWM);
        log::debug!("Setting motor PWM to {}", pwm);
        self.channel.write_all(&protocol::motor_pwm_command(pwm))
    }

    fn start_scan(&mut self, force: bool) -> Result<()> {
        let cmd = if force { CMD_FORCE_SCAN } else { CMD_SCAN };
        self.request(cmd)
            .and_then(|_| self.read_descriptor(None, ANS_TYPE_MEASUREMENT))
            .map_err(|e| Error::ScanStart(e.to_string()))?;
        self.buffer.clear();
        self.carry = None;
        self.scanning = true;
        Ok(())
    }

    fn grab_scan(
        &mut self,
        out: &mut Vec<RawSample>,
        max_count: usize,
        timeout: Duration,
    ) -> Result<GrabStatus> {
        if !self.scanning {
            return Err(Error::Retrieval("scan not started".to_string()));
        }
        out.clear();
        if let Some(sample) = self.carry.take() {
            out.push(sample);
        }

        let deadline = Instant::now() + timeout;
        loop {
            while let Some(sample) = self.next_node() {
                if sample.sync && !out.is_empty() {
                    // Next revolution begins; hold its first sample back
                    self.carry = Some(sample);
                    return Ok(GrabStatus::Full);
                }
                if out.len() == max_count {
                    self.carry = Some(sample);
                    return Ok(GrabStatus::Full);
                }
                out.push(sample);
            }

            if Instant::now() >= deadline {
                return Ok(GrabStatus::TimeoutPartial);
            }
            let n = self
                .fill_buffer()
                .map_err(|e| Error::Retrieval(e.to_string()))?;
            if n == 0 {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    fn stop_scan(&mut self) -> Result<()> {
        self.request(CMD_STOP)?;
        self.scanning = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockChannel;

    const SCAN_DESCRIPTOR: [u8; 7] = [0xA5, 0x5A, 0x05, 0x00, 0x00, 0x40, 0x81];
    const HEALTH_DESCRIPTOR: [u8; 7] = [0xA5, 0x5A, 0x03, 0x00, 0x00, 0x00, 0x06];
    const INFO_DESCRIPTOR: [u8; 7] = [0xA5, 0x5A, 0x14, 0x00, 0x00, 0x00, 0x04];

    fn node_bytes(angle_q6: u16, dist_q2: u16, sync: bool) -> [u8; 5] {
        let b0 = if sync { 0x01 } else { 0x02 };
        let b1 = ((angle_q6 as u8 & 0x7F) << 1) | 0x01;
        let b2 = (angle_q6 >> 7) as u8;
        let dist = dist_q2.to_le_bytes();
        [b0, b1, b2, dist[0], dist[1]]
    }

    fn device_with_channel() -> (RplidarDevice, MockChannel) {
        let channel = MockChannel::new();
        let device = RplidarDevice::new(Box::new(channel.clone()));
        (device, channel)
    }

    #[test]
    fn test_connect_stops_and_flushes() {
        let (mut device, channel) = device_with_channel();
        channel.inject_read(&[0xFF, 0xFF, 0xFF]);
        device.connect().unwrap();
        assert_eq!(channel.get_written(), vec![0xA5, 0x25]);
        // stale bytes were discarded
        assert_eq!(channel.pending_read_len(), 0);
    }

    #[test]
    fn test_health_query() {
        let (mut device, channel) = device_with_channel();
        channel.inject_read(&HEALTH_DESCRIPTOR);
        channel.inject_read(&[0x00, 0x00, 0x00]);
        let health = device.health().unwrap();
        assert_eq!(health.status, crate::device::HealthStatus::Ok);
        assert_eq!(channel.get_written(), vec![0xA5, 0x52]);
    }

    #[test]
    fn test_device_info_query() {
        let (mut device, channel) = device_with_channel();
        channel.inject_read(&INFO_DESCRIPTOR);
        let mut payload = vec![0x18, 0x02, 0x01, 0x05];
        payload.extend_from_slice(&[0x07; 16]);
        channel.inject_read(&payload);
        let info = device.device_info().unwrap();
        assert_eq!(info.model, 0x18);
        assert_eq!(channel.get_written(), vec![0xA5, 0x50]);
    }

    #[test]
    fn test_start_scan_validates_descriptor() {
        let (mut device, channel) = device_with_channel();
        channel.inject_read(&SCAN_DESCRIPTOR);
        device.start_scan(false).unwrap();
        assert_eq!(channel.get_written(), vec![0xA5, 0x20]);
    }

    #[test]
    fn test_start_scan_rejection_is_scan_start_error() {
        let (mut device, channel) = device_with_channel();
        // health descriptor instead of a measurement descriptor
        channel.inject_read(&HEALTH_DESCRIPTOR);
        assert!(matches!(
            device.start_scan(false),
            Err(Error::ScanStart(_))
        ));
    }

    #[test]
    fn test_force_scan_command() {
        let (mut device, channel) = device_with_channel();
        channel.inject_read(&SCAN_DESCRIPTOR);
        device.start_scan(true).unwrap();
        assert_eq!(channel.get_written(), vec![0xA5, 0x21]);
    }

    #[test]
    fn test_grab_splits_revolutions_on_sync() {
        let (mut device, channel) = device_with_channel();
        channel.inject_read(&SCAN_DESCRIPTOR);
        device.start_scan(false).unwrap();

        channel.inject_read(&node_bytes(0, 4, true));
        channel.inject_read(&node_bytes(90 * 64, 400, false));
        channel.inject_read(&node_bytes(180 * 64, 800, false));
        channel.inject_read(&node_bytes(0, 8, true));
        channel.inject_read(&node_bytes(90 * 64, 12, false));

        let mut out = Vec::new();
        let status = device
            .grab_scan(&mut out, 8192, Duration::from_millis(50))
            .unwrap();
        assert_eq!(status, GrabStatus::Full);
        assert_eq!(out.len(), 3);
        assert!(out[0].sync);
        assert_eq!(out[1].angle_q14, 16384);
        assert_eq!(out[2].angle_q14, 32768);

        // the boundary sample carried over leads the next revolution
        let status = device
            .grab_scan(&mut out, 8192, Duration::from_millis(10))
            .unwrap();
        assert_eq!(status, GrabStatus::TimeoutPartial);
        assert_eq!(out.len(), 2);
        assert!(out[0].sync);
        assert_eq!(out[0].dist_q2, 8);
    }

    #[test]
    fn test_grab_timeout_returns_partial() {
        let (mut device, channel) = device_with_channel();
        channel.inject_read(&SCAN_DESCRIPTOR);
        device.start_scan(false).unwrap();

        channel.inject_read(&node_bytes(0, 4, true));
        channel.inject_read(&node_bytes(45 * 64, 40, false));

        let mut out = Vec::new();
        let status = device
            .grab_scan(&mut out, 8192, Duration::from_millis(10))
            .unwrap();
        assert_eq!(status, GrabStatus::TimeoutPartial);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_grab_resyncs_past_garbage() {
        let (mut device, channel) = device_with_channel();
        channel.inject_read(&SCAN_DESCRIPTOR);
        device.start_scan(false).unwrap();

        // three garbage bytes ahead of a valid stream
        channel.inject_read(&[0x00, 0xFF, 0x03]);
        channel.inject_read(&node_bytes(10 * 64, 100, true));
        channel.inject_read(&node_bytes(20 * 64, 200, false));

        let mut out = Vec::new();
        let status = device
            .grab_scan(&mut out, 8192, Duration::from_millis(10))
            .unwrap();
        assert_eq!(status, GrabStatus::TimeoutPartial);
        assert_eq!(out.len(), 2);
        assert!(out[0].sync);
    }

    #[test]
    fn test_grab_respects_max_count() {
        let (mut device, channel) = device_with_channel();
        channel.inject_read(&SCAN_DESCRIPTOR);
        device.start_scan(false).unwrap();

        channel.inject_read(&node_bytes(0, 4, true));
        channel.inject_read(&node_bytes(10 * 64, 8, false));
        channel.inject_read(&node_bytes(20 * 64, 12, false));

        let mut out = Vec::new();
        let status = device
            .grab_scan(&mut out, 2, Duration::from_millis(50))
            .unwrap();
        assert_eq!(status, GrabStatus::Full);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_motor_pwm_bytes() {
        let (mut device, channel) = device_with_channel();
        device.set_motor_speed(Some(0)).unwrap();
        assert_eq!(channel.get_written(), protocol::motor_pwm_command(0));

        channel.clear_written();
        device.set_motor_speed(None).unwrap();
        assert_eq!(
            channel.get_written(),
            protocol::motor_pwm_command(DEFAULT_MOTOR_PWM)
        );
    }
}
