// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! MSOP/DIFOP decoder for the 80-channel mechanical spinning LiDAR.
//!
//! The decoder is synchronous and single-threaded: each call runs to
//! completion, and one decoder instance serves exactly one packet stream.
//! Callers decoding several sensors use one decoder per source.
//!
//! Decoded points are appended to a caller-owned [`PointBuffer`] in
//! block-then-channel firing order. A `decode_msop` call returns `Ok(true)`
//! when the packet carried the start of a new revolution; the caller then
//! typically hands off the filled buffer and continues into an empty one.

use crate::angles::{ChanAngles, Trigon};
use crate::block_iter::{BlockIterator, DualReturnIterator, SingleReturnIterator};
use crate::buffer::PointBuffer;
use crate::calib::{ChannelCalibration, BLOCK_DURATION};
use crate::difop::{DeviceInfo, DifopPacket};
use crate::lidar::{host_time_us, DecodeError, EchoMode, Error};
use crate::packet::{
    rewrite_packet_timestamp, MsopPacket, BLOCKS_PER_PACKET, BLOCK_ID, CHANNELS_PER_BLOCK,
};
use crate::section::{AzimuthSection, DistanceSection};
use crate::split::AngleSplitter;
use log::debug;
use serde::{Deserialize, Serialize};

/// Number of lasers; reported to the frame-split callback as the row count
/// of the per-channel grid.
pub const LASER_NUM: u16 = CHANNELS_PER_BLOCK as u16;

/// Distance resolution in meters (5 mm per LSB)
pub const DISTANCE_RESOLUTION: f32 = 0.005;

/// Temperature resolution in °C per LSB
pub const TEMPERATURE_RESOLUTION: f32 = 0.0625;

/// Optical lens-center offsets in meters. The receiving and emitting optics
/// sit off the rotation axis, so the X offset is projected onto the X/Y
/// plane by the *uncorrected* azimuth while Z is a plain translation.
pub const LENS_RX: f32 = 0.02892;
pub const LENS_RY: f32 = -0.013;
pub const LENS_RZ: f32 = 0.0;

/// Callback invoked for recoverable decode conditions.
pub type ErrorCallback = Box<dyn FnMut(DecodeError) + Send>;

/// Callback invoked when a new revolution begins: (channel count, timestamp
/// of the revolution just completed).
pub type SplitCallback = Box<dyn FnMut(u16, f64) + Send>;

/// Decoder configuration.
///
/// All fields have sensible defaults; angles are in degrees and distances in
/// meters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Trust the sensor's embedded UTC clock for packet timestamps. When
    /// false, timestamps derive from the host clock instead.
    pub use_sensor_clock: bool,
    /// With host-clock timestamps, also rewrite each packet's embedded
    /// timestamp field in place so downstream consumers of the raw packet
    /// see a consistent clock source. Requires a mutable packet buffer.
    pub write_packet_timestamp: bool,
    /// Suppress gap points for filtered-out channels, producing a sparse
    /// cloud instead of a fixed per-channel grid.
    pub dense_points: bool,
    /// Report the completed revolution's first point timestamp to the split
    /// callback; when false, the last point timestamp is reported instead.
    pub ts_first_point: bool,
    /// Minimum valid distance in meters
    pub min_distance: f32,
    /// Maximum valid distance in meters
    pub max_distance: f32,
    /// Scan window start angle in degrees
    pub start_angle: f32,
    /// Scan window end angle in degrees
    pub end_angle: f32,
    /// Azimuth at which a new revolution begins, degrees
    pub split_angle: f32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            use_sensor_clock: false,
            write_packet_timestamp: false,
            dense_points: false,
            ts_first_point: true,
            min_distance: 0.4,
            max_distance: 250.0,
            start_angle: 0.0,
            end_angle: 360.0,
            split_angle: 0.0,
        }
    }
}

/// MSOP/DIFOP packet decoder.
pub struct Decoder {
    config: DecoderConfig,
    calib: ChannelCalibration,
    chan_angles: ChanAngles,
    angles_ready: bool,
    trigon: Trigon,
    distance_section: DistanceSection,
    scan_section: AzimuthSection,
    splitter: AngleSplitter,
    echo_mode: EchoMode,
    model: u8,
    /// Rotation rate in revolutions per second, from DIFOP RPM
    rps: f32,
    blocks_per_frame: u16,
    split_blocks_per_frame: u16,
    /// Nominal azimuth swept per block at the current rotation rate, 0.01°
    block_az_diff: i32,
    /// Time spent sweeping the FOV blind zone, seconds
    fov_blind_ts: f64,
    prev_packet_ts: f64,
    prev_point_ts: f64,
    first_point_ts: f64,
    temperature: f32,
    device_info: Option<DeviceInfo>,
    on_error: Option<ErrorCallback>,
    on_split: Option<SplitCallback>,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Result<Self, Error> {
        if config.min_distance > config.max_distance {
            return Err(Error::Config(format!(
                "min_distance {} exceeds max_distance {}",
                config.min_distance, config.max_distance
            )));
        }

        let rps = 10.0f32; // 600 RPM until the first DIFOP says otherwise
        let blocks_per_frame = Self::frame_blocks(rps);

        Ok(Self {
            distance_section: DistanceSection::new(config.min_distance, config.max_distance),
            scan_section: AzimuthSection::new(
                (config.start_angle * 100.0) as i32,
                (config.end_angle * 100.0) as i32,
            ),
            splitter: AngleSplitter::new((config.split_angle * 100.0) as i32),
            config,
            calib: ChannelCalibration::for_model(0),
            chan_angles: ChanAngles::unity(),
            angles_ready: false,
            trigon: Trigon::new(),
            echo_mode: EchoMode::Single,
            model: 0,
            rps,
            blocks_per_frame,
            split_blocks_per_frame: blocks_per_frame,
            block_az_diff: Self::nominal_az_diff(rps),
            fov_blind_ts: 0.0,
            prev_packet_ts: 0.0,
            prev_point_ts: 0.0,
            first_point_ts: 0.0,
            temperature: 0.0,
            device_info: None,
            on_error: None,
            on_split: None,
        })
    }

    /// Register the callback for recoverable decode errors.
    pub fn set_error_callback(&mut self, cb: impl FnMut(DecodeError) + Send + 'static) {
        self.on_error = Some(Box::new(cb));
    }

    /// Register the callback invoked at each revolution boundary.
    pub fn set_split_callback(&mut self, cb: impl FnMut(u16, f64) + Send + 'static) {
        self.on_split = Some(Box::new(cb));
    }

    fn frame_blocks(rps: f32) -> u16 {
        (1.0 / (rps as f64 * BLOCK_DURATION)).round() as u16
    }

    fn nominal_az_diff(rps: f32) -> i32 {
        (36000.0 * rps as f64 * BLOCK_DURATION).round() as i32
    }

    /// Wall-clock span covered by one packet's firings. Dual-return packets
    /// pair two blocks per azimuth step, halving the span.
    fn packet_duration(&self) -> f64 {
        let steps = match self.echo_mode {
            EchoMode::Single => BLOCKS_PER_PACKET,
            EchoMode::Dual => BLOCKS_PER_PACKET / 2,
        };
        BLOCK_DURATION * steps as f64
    }

    /// Decode a DIFOP packet: echo mode, rotation rate, FOV blind zone,
    /// angle calibration, and device info. Runs per DIFOP packet, about once
    /// a second, never on the MSOP hot path.
    pub fn decode_difop(&mut self, packet: &[u8]) -> Result<(), Error> {
        let pkt = DifopPacket::from_slice(packet)?;

        let rpm = pkt.rpm();
        if rpm > 0 {
            self.rps = rpm as f32 / 60.0;
        }
        self.blocks_per_frame = Self::frame_blocks(self.rps);
        self.block_az_diff = Self::nominal_az_diff(self.rps);

        let fov_range = (pkt.fov_end() as i32 - pkt.fov_start() as i32).rem_euclid(36000);
        let blind_range = if fov_range == 0 { 0 } else { 36000 - fov_range };
        self.fov_blind_ts = blind_range as f64 / (self.rps as f64 * 36000.0);

        self.echo_mode = EchoMode::from_return_mode(pkt.return_mode());
        self.split_blocks_per_frame = match self.echo_mode {
            EchoMode::Dual => self.blocks_per_frame << 1,
            EchoMode::Single => self.blocks_per_frame,
        };

        // Factory angles do not change at runtime; load them once.
        if !self.angles_ready {
            self.chan_angles = ChanAngles::from_difop(&pkt);
            self.angles_ready = true;
        }

        self.device_info = Some(pkt.device_info());
        debug!(
            "difop: rpm {} echo {} blocks/frame {}",
            rpm, self.echo_mode, self.split_blocks_per_frame
        );
        Ok(())
    }

    /// Decode an MSOP packet, appending points to `frame`.
    ///
    /// The buffer is `&mut` because host-clock mode with
    /// `write_packet_timestamp` rewrites the embedded timestamp field in
    /// place; this is the only mutation ever applied to the packet.
    ///
    /// Returns `Ok(true)` when a revolution boundary was detected inside
    /// this packet. A wrong block id aborts the remaining blocks (points
    /// from earlier blocks are kept) and is reported through the error
    /// callback, not as an `Err`.
    pub fn decode_msop(&mut self, packet: &mut [u8], frame: &mut PointBuffer) -> Result<bool, Error> {
        let (model, temperature_raw, sensor_ts_us) = {
            let pkt = MsopPacket::from_slice(packet)?;
            (pkt.model(), pkt.temperature_raw(), pkt.timestamp_us())
        };

        if model != self.model {
            debug!("lidar model changed 0x{:02X} -> 0x{:02X}", self.model, model);
            self.model = model;
            self.calib = ChannelCalibration::for_model(model);
        }

        self.temperature = temperature_raw as f32 * TEMPERATURE_RESOLUTION;

        let pkt_ts = if self.config.use_sensor_clock {
            sensor_ts_us as f64 * 1e-6
        } else {
            let host_us = host_time_us()?;

            if self.config.write_packet_timestamp {
                rewrite_packet_timestamp(packet, host_us);
            }

            // Roll back one packet duration so the base timestamp lands on
            // the first block's firing time rather than on reception.
            host_us as f64 * 1e-6 - self.packet_duration()
        };

        let pkt = MsopPacket::from_slice(packet)?;
        let iter = match self.echo_mode {
            EchoMode::Single => BlockIterator::Single(SingleReturnIterator::new(
                &pkt,
                self.block_az_diff,
                self.fov_blind_ts,
            )),
            EchoMode::Dual => BlockIterator::Dual(DualReturnIterator::new(
                &pkt,
                self.block_az_diff,
                self.fov_blind_ts,
            )),
        };

        let mut split = false;
        for blk in 0..BLOCKS_PER_PACKET {
            let block = pkt.block(blk);

            if block.id() != BLOCK_ID {
                let err = DecodeError::WrongBlockId {
                    block: blk as u16,
                    found: block.id(),
                };
                if let Some(cb) = self.on_error.as_mut() {
                    cb(err);
                }
                break;
            }

            let (block_az_diff, block_ts_off) = iter.get(blk);
            let block_ts = pkt_ts + block_ts_off;
            // The wire field is 16 bits; normalize so corrupt values cannot
            // leave the trig table's range.
            let block_az = block.azimuth() % 36000;

            if self.splitter.new_block(block_az) {
                let cloud_ts = if self.config.ts_first_point {
                    self.first_point_ts
                } else {
                    self.prev_point_ts
                };
                if let Some(cb) = self.on_split.as_mut() {
                    cb(LASER_NUM, cloud_ts);
                }
                self.first_point_ts = block_ts;
                split = true;
            }

            for chan in 0..CHANNELS_PER_BLOCK {
                let channel = block.channel(chan);

                let chan_ts = block_ts + self.calib.time_offset[chan];
                let angle_horiz =
                    block_az + (block_az_diff as f32 * self.calib.azimuth_fraction[chan]) as i32;

                let angle_vert = self.chan_angles.vert_adjust(chan);
                let angle_horiz_final = self.chan_angles.horiz_adjust(chan, angle_horiz);
                let distance = channel.distance as f32 * DISTANCE_RESOLUTION;

                if self.distance_section.contains(distance)
                    && self.scan_section.contains(angle_horiz_final)
                {
                    let cos_vert = self.trigon.cos(angle_vert);
                    let x = distance * cos_vert * self.trigon.cos(angle_horiz_final)
                        + LENS_RX * self.trigon.cos(angle_horiz);
                    let y = -distance * cos_vert * self.trigon.sin(angle_horiz_final)
                        - LENS_RX * self.trigon.sin(angle_horiz);
                    let z = distance * self.trigon.sin(angle_vert) + LENS_RZ;

                    frame.push(
                        x,
                        y,
                        z,
                        channel.intensity,
                        chan_ts,
                        self.chan_angles.ring(chan),
                    );
                } else if !self.config.dense_points {
                    frame.push(
                        f32::NAN,
                        f32::NAN,
                        f32::NAN,
                        0,
                        chan_ts,
                        self.chan_angles.ring(chan),
                    );
                }

                self.prev_point_ts = chan_ts;
            }
        }

        self.prev_packet_ts = pkt_ts;
        Ok(split)
    }

    /// Most recent device temperature reading in °C.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Currently resolved echo mode.
    pub fn echo_mode(&self) -> EchoMode {
        self.echo_mode
    }

    /// Expected blocks per revolution, doubled under dual echo.
    pub fn blocks_per_frame(&self) -> u16 {
        self.split_blocks_per_frame
    }

    /// Point capacity of one full revolution at the current configuration;
    /// the natural size for [`PointBuffer::with_capacity`].
    pub fn frame_capacity(&self) -> usize {
        self.split_blocks_per_frame as usize * CHANNELS_PER_BLOCK
    }

    /// Model discriminator seen on the most recent MSOP packet.
    pub fn model(&self) -> u8 {
        self.model
    }

    /// The calibration table currently in effect.
    pub fn calibration(&self) -> &ChannelCalibration {
        &self.calib
    }

    /// Device information from the most recent DIFOP packet, if any.
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    /// Base timestamp of the most recently decoded MSOP packet, seconds.
    pub fn last_packet_timestamp(&self) -> f64 {
        self.prev_packet_ts
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }
}
