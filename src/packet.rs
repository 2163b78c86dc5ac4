// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! MSOP (Main data Stream Output Protocol) wire format.
//!
//! An MSOP packet is a fixed 1248-byte record: an 80-byte header, four
//! 244-byte measurement blocks, and 192 reserved tail bytes. All multi-byte
//! fields are big-endian.
//!
//! ```text
//! ┌──────────┬─────────┬─────────┬─────────┬─────────┬──────────┐
//! │ header   │ block 0 │ block 1 │ block 2 │ block 3 │ reserved │
//! │ 80 bytes │ 244     │ 244     │ 244     │ 244     │ 192      │
//! └──────────┴─────────┴─────────┴─────────┴─────────┴──────────┘
//! ```
//!
//! Each block carries one azimuth step: a sentinel id byte (`0xFE`), a
//! return id, a 16-bit azimuth in hundredths of a degree, and 80 channels
//! of `{u16 distance, u8 intensity}`.

use crate::lidar::Error;

/// MSOP packet total size in bytes
pub const MSOP_LEN: usize = 1248;

/// MSOP packet sync bytes
pub const MSOP_ID: [u8; 4] = [0x55, 0xAA, 0x05, 0x5A];

/// MSOP header size in bytes
pub const HEADER_LEN: usize = 80;

/// Number of measurement blocks per MSOP packet
pub const BLOCKS_PER_PACKET: usize = 4;

/// Number of laser channels per block
pub const CHANNELS_PER_BLOCK: usize = 80;

/// Size of one channel entry: u16 distance + u8 intensity
pub const CHANNEL_LEN: usize = 3;

/// Size of one block: id + return id + azimuth + channels
pub const BLOCK_LEN: usize = 2 + 2 + CHANNELS_PER_BLOCK * CHANNEL_LEN;

/// Sentinel identifier carried by every valid block
pub const BLOCK_ID: u8 = 0xFE;

/// Header offset of the packed temperature field
const HDR_TEMPERATURE: usize = 8;

/// Header offset of the 10-byte UTC timestamp field
const HDR_TIMESTAMP: usize = 10;

/// Header offset of the lidar type byte
const HDR_LIDAR_TYPE: usize = 30;

/// Header offset of the lidar model discriminator byte
const HDR_LIDAR_MODEL: usize = 31;

/// Parse the 10-byte UTC timestamp field: 6-byte seconds followed by a
/// 4-byte microsecond remainder. Returns microseconds since the Unix epoch.
pub fn parse_timestamp_us(field: &[u8]) -> u64 {
    let seconds = u64::from_be_bytes([
        0, 0, field[0], field[1], field[2], field[3], field[4], field[5],
    ]);
    let micros = u32::from_be_bytes([field[6], field[7], field[8], field[9]]);
    seconds * 1_000_000 + micros as u64
}

/// Encode microseconds since the Unix epoch into the 10-byte UTC timestamp
/// field layout.
pub fn write_timestamp_us(field: &mut [u8], ts_us: u64) {
    let seconds = ts_us / 1_000_000;
    let micros = (ts_us % 1_000_000) as u32;
    field[..6].copy_from_slice(&seconds.to_be_bytes()[2..8]);
    field[6..10].copy_from_slice(&micros.to_be_bytes());
}

/// Decode the packed 16-bit temperature field.
///
/// Layout: byte 0 holds the low 5 bits in its top bits, byte 1 holds a sign
/// flag in bit 6 and the high 6 bits in its low bits. The decoded integer is
/// in units of 0.0625 °C.
pub fn parse_temperature_raw(field: &[u8]) -> i16 {
    let lsb = (field[0] >> 3) as i16;
    let msb = (field[1] & 0x3F) as i16;
    let neg = field[1] & 0x40 != 0;

    let value = msb << 5 | lsb;
    if neg {
        -value
    } else {
        value
    }
}

/// Encode a raw temperature value into the packed field layout.
/// Inverse of [`parse_temperature_raw`], used by tests and packet builders.
pub fn write_temperature_raw(field: &mut [u8], raw: i16) {
    let (value, neg) = if raw < 0 { (-raw, 0x40u8) } else { (raw, 0) };
    field[0] = ((value & 0x1F) as u8) << 3;
    field[1] = ((value >> 5) & 0x3F) as u8 | neg;
}

/// One channel measurement within a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Channel {
    /// Raw distance in 5 mm units
    pub distance: u16,
    /// Reflectivity
    pub intensity: u8,
}

/// Borrowed view of one measurement block.
#[derive(Clone, Copy, Debug)]
pub struct MsopBlock<'a> {
    slice: &'a [u8],
}

impl<'a> MsopBlock<'a> {
    /// Block identifier byte; must equal [`BLOCK_ID`] for a valid block.
    pub fn id(&self) -> u8 {
        self.slice[0]
    }

    /// Return id: 1 = strongest, 2 = last. Informational only.
    pub fn return_id(&self) -> u8 {
        self.slice[1]
    }

    /// Azimuth of this block in hundredths of a degree, 0..36000.
    pub fn azimuth(&self) -> i32 {
        u16::from_be_bytes([self.slice[2], self.slice[3]]) as i32
    }

    /// Read channel `chan` of this block.
    pub fn channel(&self, chan: usize) -> Channel {
        let off = 4 + chan * CHANNEL_LEN;
        Channel {
            distance: u16::from_be_bytes([self.slice[off], self.slice[off + 1]]),
            intensity: self.slice[off + 2],
        }
    }
}

/// Borrowed view of a complete MSOP packet.
#[derive(Clone, Copy, Debug)]
pub struct MsopPacket<'a> {
    slice: &'a [u8],
}

impl<'a> MsopPacket<'a> {
    /// Wrap a received datagram. Fails if the buffer is shorter than the
    /// fixed packet length; the decoder never indexes past what is checked
    /// here.
    pub fn from_slice(slice: &'a [u8]) -> Result<MsopPacket<'a>, Error> {
        if slice.len() < MSOP_LEN {
            return Err(Error::UnexpectedEnd(slice.len()));
        }
        Ok(MsopPacket { slice })
    }

    /// Check the packet sync bytes.
    pub fn valid_id(&self) -> bool {
        self.slice[..4] == MSOP_ID
    }

    /// Lidar type byte from the header.
    pub fn lidar_type(&self) -> u8 {
        self.slice[HDR_LIDAR_TYPE]
    }

    /// Model discriminator byte; selects the firing-time calibration table.
    pub fn model(&self) -> u8 {
        self.slice[HDR_LIDAR_MODEL]
    }

    /// Raw packed temperature value (0.0625 °C units).
    pub fn temperature_raw(&self) -> i16 {
        parse_temperature_raw(&self.slice[HDR_TEMPERATURE..HDR_TEMPERATURE + 2])
    }

    /// Embedded device timestamp in microseconds since the Unix epoch.
    pub fn timestamp_us(&self) -> u64 {
        parse_timestamp_us(&self.slice[HDR_TIMESTAMP..HDR_TIMESTAMP + 10])
    }

    /// Borrow block `blk` of the packet.
    pub fn block(&self, blk: usize) -> MsopBlock<'a> {
        let off = HEADER_LEN + blk * BLOCK_LEN;
        MsopBlock {
            slice: &self.slice[off..off + BLOCK_LEN],
        }
    }
}

/// Overwrite the header timestamp field in place with a host-derived value.
///
/// This is the one place the decoder mutates a caller's packet buffer; see
/// the `write_packet_timestamp` configuration option.
pub fn rewrite_packet_timestamp(packet: &mut [u8], ts_us: u64) {
    write_timestamp_us(&mut packet[HDR_TIMESTAMP..HDR_TIMESTAMP + 10], ts_us);
}
