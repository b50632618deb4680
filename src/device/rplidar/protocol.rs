//! Range finder wire protocol
//!
//! Requests are `[0xA5, cmd]`, optionally followed by a size-prefixed,
//! XOR-checksummed payload. Responses open with a 7-byte descriptor
//! `[0xA5 0x5A len(30 bit)+mode(2 bit) type]` followed by the payload.
//! Scan data is an endless stream of 5-byte measurement nodes.

use crate::device::{DeviceInfo, Health, HealthStatus};
use crate::error::{Error, Result};
use crate::scan::RawSample;

pub const CMD_SYNC_BYTE: u8 = 0xA5;
pub const CMD_STOP: u8 = 0x25;
pub const CMD_SCAN: u8 = 0x20;
pub const CMD_FORCE_SCAN: u8 = 0x21;
pub const CMD_GET_INFO: u8 = 0x50;
pub const CMD_GET_HEALTH: u8 = 0x52;
pub const CMD_SET_MOTOR_PWM: u8 = 0xF0;

pub const DESCRIPTOR_SIZE: usize = 7;
pub const ANS_TYPE_DEVINFO: u8 = 0x04;
pub const ANS_TYPE_DEVHEALTH: u8 = 0x06;
pub const ANS_TYPE_MEASUREMENT: u8 = 0x81;
pub const ANS_LENGTH_DEVINFO: u32 = 20;
pub const ANS_LENGTH_DEVHEALTH: u32 = 3;
pub const NODE_SIZE: usize = 5;

/// Default motor PWM duty
pub const DEFAULT_MOTOR_PWM: u16 = 660;

/// Build a bare two-byte request
pub fn command(cmd: u8) -> [u8; 2] {
    [CMD_SYNC_BYTE, cmd]
}

/// Build a request with a payload. The trailing byte is the XOR of all
/// preceding bytes.
pub fn payload_command(cmd: u8, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(4 + payload.len());
    packet.push(CMD_SYNC_BYTE);
    packet.push(cmd);
    packet.push(payload.len() as u8);
    packet.extend_from_slice(payload);
    let checksum = packet.iter().fold(0u8, |acc, b| acc ^ b);
    packet.push(checksum);
    packet
}

/// Motor PWM request
pub fn motor_pwm_command(pwm: u16) -> Vec<u8> {
    payload_command(CMD_SET_MOTOR_PWM, &pwm.to_le_bytes())
}

/// Validate a 7-byte response descriptor
pub fn validate_descriptor(
    descriptor: &[u8],
    expected_len: Option<u32>,
    type_code: u8,
) -> Result<()> {
    if descriptor.len() != DESCRIPTOR_SIZE {
        return Err(Error::InvalidPacket(format!(
            "descriptor length {} (expected {})",
            descriptor.len(),
            DESCRIPTOR_SIZE
        )));
    }
    if descriptor[0..2] != [CMD_SYNC_BYTE, 0x5A] {
        return Err(Error::InvalidPacket(format!(
            "bad descriptor magic {:02X}{:02X}",
            descriptor[0], descriptor[1]
        )));
    }
    let len = u32::from_le_bytes([descriptor[2], descriptor[3], descriptor[4], descriptor[5]])
        & 0x3FFF_FFFF;
    if let Some(expected) = expected_len {
        if len != expected {
            return Err(Error::InvalidPacket(format!(
                "response length {} (expected {})",
                len, expected
            )));
        }
    }
    if descriptor[6] != type_code {
        return Err(Error::InvalidPacket(format!(
            "response type {:#04x} (expected {:#04x})",
            descriptor[6], type_code
        )));
    }
    Ok(())
}

/// Parse one 5-byte measurement node.
///
/// Byte 0 carries the revolution sync bit, its inverse, and the quality;
/// byte 1 a fixed check bit plus the low angle bits; byte 2 the high angle
/// bits; bytes 3-4 the q2 distance. Returns `None` when the framing bits do
/// not line up, which signals the caller to resynchronize.
pub fn parse_node(node: &[u8; NODE_SIZE]) -> Option<RawSample> {
    let sync = node[0] & 0x01 != 0;
    let inverted_sync = node[0] & 0x02 != 0;
    if sync == inverted_sync {
        return None;
    }
    if node[1] & 0x01 != 1 {
        return None;
    }

    let angle_q6 = ((node[2] as u32) << 7) | ((node[1] as u32) >> 1);
    let dist_q2 = u16::from_le_bytes([node[3], node[4]]) as u32;

    Some(RawSample {
        angle_q14: (angle_q6 << 8) / 90,
        dist_q2,
        sync,
    })
}

/// Parse a health response payload
pub fn parse_health(payload: &[u8]) -> Result<Health> {
    if payload.len() != ANS_LENGTH_DEVHEALTH as usize {
        return Err(Error::InvalidPacket(format!(
            "health payload length {}",
            payload.len()
        )));
    }
    let status = match payload[0] {
        0 => HealthStatus::Ok,
        1 => HealthStatus::Warning,
        2 => HealthStatus::Error,
        other => {
            return Err(Error::InvalidPacket(format!(
                "unknown health status {:#04x}",
                other
            )))
        }
    };
    Ok(Health {
        status,
        error_code: u16::from_le_bytes([payload[1], payload[2]]),
    })
}

/// Parse a device info response payload
pub fn parse_device_info(payload: &[u8]) -> Result<DeviceInfo> {
    if payload.len() != ANS_LENGTH_DEVINFO as usize {
        return Err(Error::InvalidPacket(format!(
            "device info payload length {}",
            payload.len()
        )));
    }
    let mut serial_number = [0u8; 16];
    serial_number.copy_from_slice(&payload[4..20]);
    Ok(DeviceInfo {
        model: payload[0],
        firmware_minor: payload[1],
        firmware_major: payload[2],
        hardware_version: payload[3],
        serial_number,
    })
}
