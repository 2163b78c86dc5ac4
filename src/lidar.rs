// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common types and error handling for the mechanical LiDAR decoder.

use std::fmt;

/// Common error type for decoder operations.
#[derive(Debug)]
pub enum Error {
    /// I/O error (socket, file operations)
    Io(std::io::Error),
    /// Invalid packet data (bad sync bytes, wrong kind)
    InvalidPacket(String),
    /// Unexpected end of data at given byte position
    UnexpectedEnd(usize),
    /// System time error
    SystemTime(std::time::SystemTimeError),
    /// Configuration error
    Config(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::InvalidPacket(msg) => write!(f, "invalid packet: {}", msg),
            Error::UnexpectedEnd(len) => write!(f, "unexpected end of data at {} bytes", len),
            Error::SystemTime(err) => write!(f, "system time error: {}", err),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(err: std::time::SystemTimeError) -> Self {
        Error::SystemTime(err)
    }
}

/// Recoverable conditions raised from inside the MSOP decode loop.
///
/// These are reported through the decoder's error callback rather than as
/// `Err` returns: the decoder stays usable afterward, it only abandons the
/// remainder of the offending packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// A block's identifier byte did not match the expected sentinel.
    WrongBlockId {
        /// Index of the offending block within the packet
        block: u16,
        /// The identifier byte actually found on the wire
        found: u8,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::WrongBlockId { block, found } => {
                write!(f, "wrong block id 0x{:02X} at block {}", found, block)
            }
        }
    }
}

/// Return (echo) mode of the sensor.
///
/// Under dual return the sensor emits two blocks per azimuth step (strongest
/// and last return), doubling the block count of a full revolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EchoMode {
    /// One return set per azimuth step
    #[default]
    Single,
    /// Two stacked return sets per azimuth step
    Dual,
}

impl EchoMode {
    /// Resolve the DIFOP return-mode byte.
    ///
    /// Unrecognized values map to [`EchoMode::Dual`]: over-estimating the
    /// blocks per revolution never drops data.
    pub fn from_return_mode(mode: u8) -> Self {
        match mode {
            0x00 | 0x01 | 0x02 => EchoMode::Single,
            _ => EchoMode::Dual,
        }
    }
}

impl fmt::Display for EchoMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EchoMode::Single => write!(f, "single"),
            EchoMode::Dual => write!(f, "dual"),
        }
    }
}

/// Get the host wall clock in microseconds since the Unix epoch.
///
/// Used when the sensor's embedded clock is not trusted. On Linux this reads
/// `CLOCK_REALTIME` directly; other platforms fall back to `SystemTime`.
#[cfg(target_os = "linux")]
pub fn host_time_us() -> Result<u64, Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(tp.tv_sec as u64 * 1_000_000 + tp.tv_nsec as u64 / 1_000)
}

#[cfg(not(target_os = "linux"))]
pub fn host_time_us() -> Result<u64, Error> {
    let now = std::time::SystemTime::now();
    let duration = now.duration_since(std::time::UNIX_EPOCH)?;
    Ok(duration.as_micros() as u64)
}
