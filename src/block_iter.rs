// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-block azimuth interpolation and timing.
//!
//! Block azimuths are only sampled once per block, but each channel fires at
//! a different time within the block, so the decode loop needs the azimuth
//! swept *during* the block. That delta is interpolated from the neighboring
//! block's azimuth, with different pairing rules for single- and dual-return
//! packets. Both variants precompute every block's `(azimuth delta,
//! timestamp offset)` at construction so the per-channel loop stays free of
//! branching.

use crate::calib::BLOCK_DURATION;
use crate::packet::{MsopPacket, BLOCKS_PER_PACKET};

/// Azimuth gap (0.01° units) beyond which two neighboring blocks are assumed
/// to straddle the sensor's FOV blind zone rather than one rotation step.
const BLIND_ZONE_AZ_DIFF: i32 = 100;

/// Precomputed timing and azimuth interpolation for one block.
#[derive(Clone, Copy, Debug, Default)]
struct BlockValue {
    az_diff: i32,
    ts_off: f64,
}

/// Block timing for single-return packets: every block is an independent
/// azimuth step.
#[derive(Debug)]
pub struct SingleReturnIterator {
    blocks: [BlockValue; BLOCKS_PER_PACKET],
}

impl SingleReturnIterator {
    /// `nominal_az_diff` is the expected per-block azimuth delta derived
    /// from the rotation rate; it is the fallback wherever a neighbor's
    /// azimuth is unusable (blind zone, last block of the packet).
    /// `fov_blind_ts` is the time the sweep spends crossing the blind zone.
    pub fn new(pkt: &MsopPacket, nominal_az_diff: i32, fov_blind_ts: f64) -> Self {
        let mut blocks = [BlockValue::default(); BLOCKS_PER_PACKET];

        let mut tss = 0.0f64;
        for blk in 0..BLOCKS_PER_PACKET {
            blocks[blk].ts_off = tss;

            if blk < BLOCKS_PER_PACKET - 1 {
                let mut az_diff =
                    (pkt.block(blk + 1).azimuth() - pkt.block(blk).azimuth()).rem_euclid(36000);

                if az_diff > BLIND_ZONE_AZ_DIFF {
                    az_diff = nominal_az_diff;
                    tss += fov_blind_ts;
                } else {
                    tss += BLOCK_DURATION;
                }
                blocks[blk].az_diff = az_diff;
            } else {
                blocks[blk].az_diff = nominal_az_diff;
            }
        }

        Self { blocks }
    }

    #[inline]
    pub fn get(&self, blk: usize) -> (i32, f64) {
        let value = &self.blocks[blk];
        (value.az_diff, value.ts_off)
    }
}

/// Block timing for dual-return packets: blocks `2k` and `2k+1` carry the
/// strongest and last return of the *same* azimuth step, so azimuth deltas
/// are taken two blocks apart and timestamps advance per pair.
#[derive(Debug)]
pub struct DualReturnIterator {
    blocks: [BlockValue; BLOCKS_PER_PACKET],
}

impl DualReturnIterator {
    pub fn new(pkt: &MsopPacket, nominal_az_diff: i32, fov_blind_ts: f64) -> Self {
        let mut blocks = [BlockValue::default(); BLOCKS_PER_PACKET];

        let mut tss = 0.0f64;
        for blk in (0..BLOCKS_PER_PACKET).step_by(2) {
            blocks[blk].ts_off = tss;
            blocks[blk + 1].ts_off = tss;

            let az_diff = if blk + 2 < BLOCKS_PER_PACKET {
                let mut diff =
                    (pkt.block(blk + 2).azimuth() - pkt.block(blk).azimuth()).rem_euclid(36000);
                if diff > BLIND_ZONE_AZ_DIFF {
                    diff = nominal_az_diff;
                    tss += fov_blind_ts;
                } else {
                    tss += BLOCK_DURATION;
                }
                diff
            } else {
                // Packet boundary: no pair to difference against
                nominal_az_diff
            };
            blocks[blk].az_diff = az_diff;
            blocks[blk + 1].az_diff = az_diff;
        }

        Self { blocks }
    }

    #[inline]
    pub fn get(&self, blk: usize) -> (i32, f64) {
        let value = &self.blocks[blk];
        (value.az_diff, value.ts_off)
    }
}

/// Echo-mode dispatch over the two iterator variants. An enum rather than a
/// trait object keeps the per-block call monomorphic.
#[derive(Debug)]
pub enum BlockIterator {
    Single(SingleReturnIterator),
    Dual(DualReturnIterator),
}

impl BlockIterator {
    /// Interpolated azimuth delta and timestamp offset for block `blk`,
    /// relative to the packet's base timestamp.
    #[inline]
    pub fn get(&self, blk: usize) -> (i32, f64) {
        match self {
            BlockIterator::Single(iter) => iter.get(blk),
            BlockIterator::Dual(iter) => iter.get(blk),
        }
    }
}
