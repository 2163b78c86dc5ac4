// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-channel firing-time calibration.
//!
//! The 80 lasers of a block do not fire simultaneously; each channel fires at
//! a fixed elapsed time within the block's 55.56 µs firing sequence. Two
//! hardware revisions exist with different firing orders, discriminated at
//! runtime by the model byte carried in every MSOP header.

use crate::packet::CHANNELS_PER_BLOCK;
use log::debug;

/// Duration of one block's firing sequence in microseconds.
pub const BLOCK_DURATION_US: f32 = 55.56;

/// Duration of one block's firing sequence in seconds.
pub const BLOCK_DURATION: f64 = BLOCK_DURATION_US as f64 / 1e6;

/// Model discriminator of the base hardware revision.
pub const MODEL_BASE: u8 = 0x02;

/// Model discriminator of the "v" hardware revision.
pub const MODEL_V: u8 = 0x03;

/// Firing times of the base revision, microseconds from block start.
const FIRING_US_BASE: [f32; CHANNELS_PER_BLOCK] = [
    0.0, 0.0, 0.0, 0.0, 1.217, 1.217, 1.217, 1.217, //
    2.434, 2.434, 3.652, 3.652, 3.652, 4.869, 4.869, 6.086, //
    6.086, 7.304, 7.304, 8.521, 8.521, 9.739, 9.739, 11.323, //
    11.323, 12.907, 12.907, 14.924, 14.924, 16.941, 16.941, 16.941, //
    16.941, 18.959, 18.959, 18.959, 18.959, 20.976, 20.976, 20.976, //
    20.976, 23.127, 23.127, 23.127, 23.127, 25.278, 25.278, 25.278, //
    25.278, 27.428, 27.428, 27.428, 27.428, 29.579, 29.579, 29.579, //
    29.579, 31.963, 31.963, 31.963, 31.963, 34.347, 34.347, 34.347, //
    34.347, 36.498, 36.498, 36.498, 36.498, 38.648, 38.648, 40.666, //
    40.666, 42.683, 50.603, 52.187, 52.187, 52.187, 53.771, 53.771,
];

/// Firing times of the "v" revision, microseconds from block start.
const FIRING_US_V: [f32; CHANNELS_PER_BLOCK] = [
    0.0, 0.0, 0.0, 0.0, 1.217, 1.217, 1.217, 1.217, //
    2.434, 2.434, 2.434, 2.434, 3.652, 3.652, 3.652, 3.652, //
    4.869, 4.869, 4.869, 4.869, 6.086, 6.086, 6.086, 6.086, //
    7.304, 7.304, 7.304, 7.304, 8.521, 8.521, 8.521, 8.521, //
    9.739, 9.739, 9.739, 9.739, 11.323, 11.323, 11.323, 11.323, //
    12.907, 12.907, 12.907, 12.907, 14.924, 14.924, 14.924, 14.924, //
    16.941, 16.941, 16.941, 16.941, 18.959, 18.959, 18.959, 18.959, //
    20.976, 20.976, 20.976, 20.976, 23.127, 23.127, 23.127, 23.127, //
    25.278, 25.278, 25.278, 25.278, 27.428, 27.428, 27.428, 27.428, //
    29.579, 29.579, 29.579, 29.579, 31.963, 31.963, 31.963, 31.963,
];

/// Derived per-channel calibration used by the MSOP decode loop.
///
/// Recomputed only when the model discriminator changes between packets; the
/// discriminator is packet-stable within a session so the hot path normally
/// never touches this.
#[derive(Clone, Debug)]
pub struct ChannelCalibration {
    /// Firing time of each channel relative to its block's timestamp, seconds.
    pub time_offset: [f64; CHANNELS_PER_BLOCK],
    /// Fraction of the block's azimuth sweep completed at each channel's
    /// firing time (firing time ÷ block duration).
    pub azimuth_fraction: [f32; CHANNELS_PER_BLOCK],
}

impl ChannelCalibration {
    /// Derive the calibration for the given model discriminator.
    ///
    /// Unknown discriminators select the base table; the sensor family
    /// treats that byte as informational rather than a validity gate.
    pub fn for_model(model: u8) -> Self {
        let firing_us: &[f32; CHANNELS_PER_BLOCK] = match model {
            MODEL_V => &FIRING_US_V,
            MODEL_BASE => &FIRING_US_BASE,
            _ => {
                debug!("unknown lidar model 0x{:02X}, using base firing table", model);
                &FIRING_US_BASE
            }
        };

        let mut time_offset = [0.0f64; CHANNELS_PER_BLOCK];
        let mut azimuth_fraction = [0.0f32; CHANNELS_PER_BLOCK];
        for (chan, &us) in firing_us.iter().enumerate() {
            time_offset[chan] = us as f64 / 1e6;
            azimuth_fraction[chan] = us / BLOCK_DURATION_US;
        }

        Self {
            time_offset,
            azimuth_fraction,
        }
    }
}
