// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Angle calibration and trigonometric lookup.
//!
//! Angles are carried as integer hundredths of a degree throughout the
//! decode loop to avoid floating-point drift across packets; conversion to
//! radians happens only implicitly inside the [`Trigon`] lookup tables.

use crate::difop::DifopPacket;
use crate::packet::CHANNELS_PER_BLOCK;

/// Lowest angle covered by the trig tables, 0.01° units (-90°).
const ANGLE_MIN: i32 = -9000;

/// One past the highest angle covered, 0.01° units (540°).
///
/// The decode loop produces angles in [0, 36000) plus azimuth interpolation
/// and per-channel horizontal adjustments (both bounded well under 90°), so
/// the table extends a quadrant below zero and two above a full turn.
const ANGLE_MAX: i32 = 54000;

/// Precomputed sin/cos tables over [`ANGLE_MIN`, `ANGLE_MAX`) in 0.01° steps.
///
/// The per-channel hot loop performs four trig lookups per point; computing
/// them with libm would dominate the decode cost.
pub struct Trigon {
    sins: Vec<f32>,
    coss: Vec<f32>,
}

impl Trigon {
    pub fn new() -> Self {
        let len = (ANGLE_MAX - ANGLE_MIN) as usize;
        let mut sins = vec![0.0f32; len];
        let mut coss = vec![0.0f32; len];
        for (i, (s, c)) in sins.iter_mut().zip(coss.iter_mut()).enumerate() {
            let rad = (ANGLE_MIN + i as i32) as f64 * 0.01 * std::f64::consts::PI / 180.0;
            *s = rad.sin() as f32;
            *c = rad.cos() as f32;
        }
        Self { sins, coss }
    }

    #[inline]
    pub fn sin(&self, centi_deg: i32) -> f32 {
        self.sins[(centi_deg - ANGLE_MIN) as usize]
    }

    #[inline]
    pub fn cos(&self, centi_deg: i32) -> f32 {
        self.coss[(centi_deg - ANGLE_MIN) as usize]
    }
}

impl Default for Trigon {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-channel optical angle calibration.
///
/// Each laser has a fixed vertical (elevation) angle and a small horizontal
/// correction, both factory-calibrated and reported through DIFOP. The ring
/// map renames physical channel indices to a bottom-to-top ordering so
/// consumers see rings sorted by elevation.
#[derive(Clone, Debug)]
pub struct ChanAngles {
    vert: [i32; CHANNELS_PER_BLOCK],
    horiz: [i32; CHANNELS_PER_BLOCK],
    ring: [u8; CHANNELS_PER_BLOCK],
}

impl ChanAngles {
    /// Uncalibrated angles: zero adjustments, identity ring map. Used until
    /// the first DIFOP packet arrives.
    pub fn unity() -> Self {
        let mut ring = [0u8; CHANNELS_PER_BLOCK];
        for (chan, r) in ring.iter_mut().enumerate() {
            *r = chan as u8;
        }
        Self {
            vert: [0; CHANNELS_PER_BLOCK],
            horiz: [0; CHANNELS_PER_BLOCK],
            ring,
        }
    }

    /// Load the vertical and horizontal calibration tables from a DIFOP
    /// packet.
    ///
    /// Entries outside ±90° are physically impossible for this optic and
    /// indicate an uninitialized or corrupt table; they are replaced with
    /// zero so a bad DIFOP cannot push trig lookups out of range.
    pub fn from_difop(pkt: &DifopPacket) -> Self {
        let sane = |angle: i32| if angle.abs() > 9000 { 0 } else { angle };

        let mut vert = [0i32; CHANNELS_PER_BLOCK];
        let mut horiz = [0i32; CHANNELS_PER_BLOCK];
        for chan in 0..CHANNELS_PER_BLOCK {
            vert[chan] = sane(pkt.vert_angle(chan));
            horiz[chan] = sane(pkt.horiz_angle(chan));
        }
        Self {
            ring: Self::ring_map(&vert),
            vert,
            horiz,
        }
    }

    /// Vertical angle of channel `chan`, 0.01° units.
    #[inline]
    pub fn vert_adjust(&self, chan: usize) -> i32 {
        self.vert[chan]
    }

    /// Apply the horizontal correction of channel `chan` to an azimuth.
    #[inline]
    pub fn horiz_adjust(&self, chan: usize, azimuth: i32) -> i32 {
        azimuth + self.horiz[chan]
    }

    /// Logical ring index of channel `chan` (sorted by elevation).
    #[inline]
    pub fn ring(&self, chan: usize) -> u8 {
        self.ring[chan]
    }

    /// Stable rank of each channel by vertical angle: the lowest beam gets
    /// ring 0. Ties keep wire order, so an uncalibrated (all-zero) table
    /// yields the identity map.
    fn ring_map(vert: &[i32; CHANNELS_PER_BLOCK]) -> [u8; CHANNELS_PER_BLOCK] {
        let mut ring = [0u8; CHANNELS_PER_BLOCK];
        for (chan, r) in ring.iter_mut().enumerate() {
            let rank = vert
                .iter()
                .enumerate()
                .filter(|&(j, &a)| a < vert[chan] || (a == vert[chan] && j < chan))
                .count();
            *r = rank as u8;
        }
        ring
    }
}
