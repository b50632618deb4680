//! Mock channel and device for unit testing

use crate::device::{DeviceInfo, GrabStatus, Health, HealthStatus, RangeFinder};
use crate::error::{Error, Result};
use crate::scan::RawSample;
use super::channel::Channel;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock byte channel for protocol tests
#[derive(Clone)]
pub struct MockChannel {
    inner: Arc<Mutex<MockChannelInner>>,
}

struct MockChannelInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
}

impl MockChannel {
    /// Create a new mock channel
    pub fn new() -> Self {
        MockChannel {
            inner: Arc::new(Mutex::new(MockChannelInner {
                read_buffer: VecDeque::new(),
                write_buffer: Vec::new(),
            })),
        }
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.read_buffer.extend(data);
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        let inner = self.inner.lock().unwrap();
        inner.write_buffer.clone()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.write_buffer.clear();
    }

    /// Bytes still queued for reading
    pub fn pending_read_len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.read_buffer.len()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for MockChannel {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        let available = inner.read_buffer.len().min(buffer.len());
        for item in buffer.iter_mut().take(available) {
            *item = inner.read_buffer.pop_front().unwrap();
        }
        Ok(available)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.write_buffer.extend_from_slice(data);
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.read_buffer.clear();
        Ok(())
    }
}

/// Scripted range finder for session and pipeline tests
#[derive(Clone)]
pub struct MockRangeFinder {
    inner: Arc<Mutex<MockDeviceState>>,
}

struct MockDeviceState {
    health: Health,
    fail_connect: bool,
    fail_health_query: bool,
    fail_start: bool,
    batches: VecDeque<(GrabStatus, Vec<RawSample>)>,
    motor_commands: Vec<Option<u16>>,
    start_scan_count: u32,
    stop_scan_count: u32,
    scanning: bool,
}

impl MockRangeFinder {
    /// Create a healthy device with no scripted batches
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockDeviceState {
                health: Health {
                    status: HealthStatus::Ok,
                    error_code: 0,
                },
                fail_connect: false,
                fail_health_query: false,
                fail_start: false,
                batches: VecDeque::new(),
                motor_commands: Vec::new(),
                start_scan_count: 0,
                stop_scan_count: 0,
                scanning: false,
            })),
        }
    }

    /// Script the reported health status
    pub fn set_health(&self, status: HealthStatus, error_code: u16) {
        self.inner.lock().unwrap().health = Health { status, error_code };
    }

    /// Make the health query itself fail
    pub fn fail_health_query(&self) {
        self.inner.lock().unwrap().fail_health_query = true;
    }

    /// Make connect fail
    pub fn fail_connect(&self) {
        self.inner.lock().unwrap().fail_connect = true;
    }

    /// Make scan start fail
    pub fn fail_start(&self) {
        self.inner.lock().unwrap().fail_start = true;
    }

    /// Queue a batch for the next grab
    pub fn push_batch(&self, status: GrabStatus, samples: Vec<RawSample>) {
        self.inner.lock().unwrap().batches.push_back((status, samples));
    }

    /// Motor commands received, in order
    pub fn motor_commands(&self) -> Vec<Option<u16>> {
        self.inner.lock().unwrap().motor_commands.clone()
    }

    /// Number of scan start requests received
    pub fn start_scan_count(&self) -> u32 {
        self.inner.lock().unwrap().start_scan_count
    }

    /// Number of scan stop requests received
    pub fn stop_scan_count(&self) -> u32 {
        self.inner.lock().unwrap().stop_scan_count
    }

    /// Batches not yet consumed
    pub fn remaining_batches(&self) -> usize {
        self.inner.lock().unwrap().batches.len()
    }

    /// Whether the device believes it is scanning
    pub fn is_scanning(&self) -> bool {
        self.inner.lock().unwrap().scanning
    }
}

impl Default for MockRangeFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeFinder for MockRangeFinder {
    fn connect(&mut self) -> Result<()> {
        let state = self.inner.lock().unwrap();
        if state.fail_connect {
            return Err(Error::Connection("mock device refused connect".to_string()));
        }
        Ok(())
    }

    fn device_info(&mut self) -> Result<DeviceInfo> {
        Ok(DeviceInfo {
            model: 0x18,
            firmware_major: 1,
            firmware_minor: 29,
            hardware_version: 7,
            serial_number: [0x42; 16],
        })
    }

    fn health(&mut self) -> Result<Health> {
        let state = self.inner.lock().unwrap();
        if state.fail_health_query {
            return Err(Error::InvalidPacket("mock health query refused".to_string()));
        }
        Ok(state.health)
    }

    fn set_motor_speed(&mut self, speed: Option<u16>) -> Result<()> {
        self.inner.lock().unwrap().motor_commands.push(speed);
        Ok(())
    }

    fn start_scan(&mut self, _force: bool) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.start_scan_count += 1;
        if state.fail_start {
            return Err(Error::ScanStart("mock device rejected scan start".to_string()));
        }
        state.scanning = true;
        Ok(())
    }

    fn grab_scan(
        &mut self,
        out: &mut Vec<RawSample>,
        max_count: usize,
        _timeout: Duration,
    ) -> Result<GrabStatus> {
        out.clear();
        let mut state = self.inner.lock().unwrap();
        match state.batches.pop_front() {
            Some((status, samples)) => {
                out.extend(samples.into_iter().take(max_count));
                Ok(status)
            }
            None => Err(Error::Retrieval("scan stream exhausted".to_string())),
        }
    }

    fn stop_scan(&mut self) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.stop_scan_count += 1;
        state.scanning = false;
        Ok(())
    }
}
