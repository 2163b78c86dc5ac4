// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Mechanical spinning LiDAR packet decoder.
//!
//! This library decodes the MSOP/DIFOP wire format of an 80-channel
//! mechanical LiDAR into calibrated, timestamped 3D points.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────────┐     ┌───────────────┐
//! │  PacketSource   │ ──► │       Decoder        │ ──► │  PointBuffer  │
//! │  (UDP/replay)   │     │  MSOP loop + DIFOP   │     │ (client-owned)│
//! └─────────────────┘     └──────────────────────┘     └───────────────┘
//!                             │            │
//!                             ▼            ▼
//!                      error callback  split callback
//!                      (WrongBlockId)  (new revolution)
//! ```
//!
//! The client owns the frame buffers and passes mutable references to the
//! decoder:
//!
//! 1. Client creates a frame: `PointBuffer::with_capacity(decoder.frame_capacity())`
//! 2. Client decodes packets: `decoder.decode_msop(&mut packet, &mut frame)`
//! 3. `Ok(true)` marks a revolution boundary; the client hands the filled
//!    frame off (or swaps a [`buffer::DoubleBuffer`]) and keeps decoding
//!
//! DIFOP packets feed `decoder.decode_difop(&packet)` whenever they arrive;
//! they configure the echo mode, rotation rate, and angle calibration.
//!
//! # Modules
//!
//! - [`decoder`]: configuration and the MSOP/DIFOP decode loops
//! - [`packet`]: MSOP wire format accessors and codecs
//! - [`difop`]: DIFOP wire format and device information
//! - [`calib`]: per-channel firing-time calibration tables
//! - [`angles`]: optical angle calibration and trig lookup
//! - [`block_iter`]: single/dual-return azimuth interpolation
//! - [`split`]: revolution boundary detection
//! - [`section`]: distance and scan-window filtering
//! - [`buffer`]: structure-of-arrays point buffers
//! - [`packet_source`]: UDP and replay packet feeds
//!
//! # Example
//!
//! ```ignore
//! use mechlidar::{Decoder, DecoderConfig, PointBuffer};
//!
//! let mut decoder = Decoder::new(DecoderConfig::default())?;
//! let mut frame = PointBuffer::with_capacity(decoder.frame_capacity());
//!
//! loop {
//!     let len = socket.recv(&mut buf)?;
//!     if decoder.decode_msop(&mut buf[..len], &mut frame)? {
//!         // A revolution completed inside this packet
//!         publish(frame.x(), frame.y(), frame.z(), frame.timestamp());
//!         frame.clear();
//!     }
//! }
//! ```

pub mod angles;
pub mod block_iter;
pub mod buffer;
pub mod calib;
pub mod decoder;
pub mod difop;
pub mod lidar;
pub mod packet;
pub mod packet_source;
pub mod section;
pub mod split;

// Re-exports for convenience
pub use buffer::{DoubleBuffer, PointBuffer};
pub use decoder::{Decoder, DecoderConfig};
pub use difop::DeviceInfo;
pub use lidar::{DecodeError, EchoMode, Error};
pub use packet_source::PacketSource;
