// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! DIFOP (Device InFormation Output Protocol) wire format.
//!
//! DIFOP packets are sent about once per second and carry device identity,
//! network configuration, motor/FOV state, the return-mode byte, time sync
//! status, a GPS sentence, and the factory angle calibration tables. The
//! decoder consumes the return mode, RPM, FOV, and angle tables; the rest is
//! surfaced through [`DeviceInfo`] for diagnostics.

use crate::lidar::Error;
use crate::packet::parse_timestamp_us;
use serde::Serialize;

/// DIFOP packet total size in bytes
pub const DIFOP_LEN: usize = 1248;

/// DIFOP packet sync bytes
pub const DIFOP_ID: [u8; 8] = [0xA5, 0xFF, 0x00, 0x5A, 0x11, 0x11, 0x55, 0x55];

const OFF_RPM: usize = 8;
const OFF_LIDAR_IP: usize = 10;
const OFF_DEST_IP: usize = 14;
const OFF_MAC: usize = 18;
const OFF_MSOP_PORT: usize = 24;
const OFF_DIFOP_PORT: usize = 28;
const OFF_FOV_START: usize = 32;
const OFF_FOV_END: usize = 34;
const OFF_TOP_FIRMWARE: usize = 40;
const OFF_BOTTOM_FIRMWARE: usize = 45;
const OFF_SERIAL: usize = 279;
const OFF_RETURN_MODE: usize = 287;
const OFF_TIME_SYNC_MODE: usize = 288;
const OFF_TIME_SYNC_STATUS: usize = 289;
const OFF_TIMESTAMP: usize = 290;
const OFF_GPRMC: usize = 350;
const OFF_VERT_ANGLES: usize = 468;
const OFF_HORIZ_ANGLES: usize = 852;

/// Calibration table entry size: sign byte + u16 value
const ANGLE_ENTRY_LEN: usize = 3;

/// Time synchronization source
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum TimeSyncMode {
    /// Free-running internal oscillator
    #[default]
    Internal = 0x00,
    /// GPS PPS + NMEA
    Gps = 0x01,
    /// PTP (IEEE 1588)
    Ptp = 0x02,
}

impl From<u8> for TimeSyncMode {
    fn from(value: u8) -> Self {
        match value {
            0x01 => TimeSyncMode::Gps,
            0x02 => TimeSyncMode::Ptp,
            _ => TimeSyncMode::Internal,
        }
    }
}

/// Time synchronization state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum TimeSyncStatus {
    /// No valid sync source
    #[default]
    Unsynced = 0x00,
    /// Locked to the sync source
    Synced = 0x01,
    /// Sync source lost, holding over
    Holdover = 0x02,
}

impl From<u8> for TimeSyncStatus {
    fn from(value: u8) -> Self {
        match value {
            0x01 => TimeSyncStatus::Synced,
            0x02 => TimeSyncStatus::Holdover,
            _ => TimeSyncStatus::Unsynced,
        }
    }
}

/// Device information parsed from a DIFOP packet.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DeviceInfo {
    /// Device serial number
    pub serial_number: [u8; 6],
    /// Top board firmware version (5 bytes)
    pub top_firmware: [u8; 5],
    /// Bottom board firmware version (5 bytes)
    pub bottom_firmware: [u8; 5],
    /// Sensor IP address
    pub lidar_ip: [u8; 4],
    /// Configured destination IP address
    pub dest_ip: [u8; 4],
    /// Sensor MAC address
    pub mac: [u8; 6],
    /// MSOP destination port
    pub msop_port: u16,
    /// DIFOP destination port
    pub difop_port: u16,
    /// Motor speed in RPM
    pub rpm: u16,
    /// Field-of-view start angle, 0.01°
    pub fov_start: u16,
    /// Field-of-view end angle, 0.01°
    pub fov_end: u16,
    /// Raw return-mode byte (see `EchoMode::from_return_mode`)
    pub return_mode: u8,
    /// Time synchronization source
    pub time_sync_mode: TimeSyncMode,
    /// Time synchronization state
    pub time_sync_status: TimeSyncStatus,
    /// Device timestamp, microseconds since the Unix epoch
    pub timestamp_us: u64,
    /// GPRMC sentence text, trimmed of NUL padding
    pub gprmc: String,
}

impl DeviceInfo {
    /// Serial number as a hex string
    pub fn serial_string(&self) -> String {
        self.serial_number
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect()
    }

    /// Firmware versions as "top/bottom" hex strings
    pub fn firmware_string(&self) -> String {
        let hex = |bytes: &[u8]| -> String { bytes.iter().map(|b| format!("{:02x}", b)).collect() };
        format!("{}/{}", hex(&self.top_firmware), hex(&self.bottom_firmware))
    }
}

/// Borrowed view of a complete DIFOP packet.
#[derive(Clone, Copy, Debug)]
pub struct DifopPacket<'a> {
    slice: &'a [u8],
}

impl<'a> DifopPacket<'a> {
    /// Wrap a received datagram, checking length and sync bytes.
    pub fn from_slice(slice: &'a [u8]) -> Result<DifopPacket<'a>, Error> {
        if slice.len() < DIFOP_LEN {
            return Err(Error::UnexpectedEnd(slice.len()));
        }
        if slice[..8] != DIFOP_ID {
            return Err(Error::InvalidPacket("bad DIFOP sync bytes".to_string()));
        }
        Ok(DifopPacket { slice })
    }

    fn be16(&self, off: usize) -> u16 {
        u16::from_be_bytes([self.slice[off], self.slice[off + 1]])
    }

    /// Motor speed in RPM.
    pub fn rpm(&self) -> u16 {
        self.be16(OFF_RPM)
    }

    /// FOV start angle, 0.01°.
    pub fn fov_start(&self) -> u16 {
        self.be16(OFF_FOV_START)
    }

    /// FOV end angle, 0.01°.
    pub fn fov_end(&self) -> u16 {
        self.be16(OFF_FOV_END)
    }

    /// Raw return-mode byte.
    pub fn return_mode(&self) -> u8 {
        self.slice[OFF_RETURN_MODE]
    }

    /// Vertical calibration angle of channel `chan`, signed 0.01°.
    pub fn vert_angle(&self, chan: usize) -> i32 {
        self.angle_entry(OFF_VERT_ANGLES + chan * ANGLE_ENTRY_LEN)
    }

    /// Horizontal calibration angle of channel `chan`, signed 0.01°.
    pub fn horiz_angle(&self, chan: usize) -> i32 {
        self.angle_entry(OFF_HORIZ_ANGLES + chan * ANGLE_ENTRY_LEN)
    }

    fn angle_entry(&self, off: usize) -> i32 {
        let value = self.be16(off + 1) as i32;
        if self.slice[off] == 0 {
            value
        } else {
            -value
        }
    }

    /// Parse the diagnostic device information block.
    pub fn device_info(&self) -> DeviceInfo {
        let mut info = DeviceInfo {
            msop_port: self.be16(OFF_MSOP_PORT),
            difop_port: self.be16(OFF_DIFOP_PORT),
            rpm: self.rpm(),
            fov_start: self.fov_start(),
            fov_end: self.fov_end(),
            return_mode: self.return_mode(),
            time_sync_mode: TimeSyncMode::from(self.slice[OFF_TIME_SYNC_MODE]),
            time_sync_status: TimeSyncStatus::from(self.slice[OFF_TIME_SYNC_STATUS]),
            timestamp_us: parse_timestamp_us(&self.slice[OFF_TIMESTAMP..OFF_TIMESTAMP + 10]),
            gprmc: String::from_utf8_lossy(&self.slice[OFF_GPRMC..OFF_GPRMC + 86])
                .trim_end_matches('\0')
                .to_string(),
            ..Default::default()
        };
        info.serial_number
            .copy_from_slice(&self.slice[OFF_SERIAL..OFF_SERIAL + 6]);
        info.top_firmware
            .copy_from_slice(&self.slice[OFF_TOP_FIRMWARE..OFF_TOP_FIRMWARE + 5]);
        info.bottom_firmware
            .copy_from_slice(&self.slice[OFF_BOTTOM_FIRMWARE..OFF_BOTTOM_FIRMWARE + 5]);
        info.lidar_ip
            .copy_from_slice(&self.slice[OFF_LIDAR_IP..OFF_LIDAR_IP + 4]);
        info.dest_ip
            .copy_from_slice(&self.slice[OFF_DEST_IP..OFF_DEST_IP + 4]);
        info.mac.copy_from_slice(&self.slice[OFF_MAC..OFF_MAC + 6]);
        info
    }
}
