// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Point filtering windows: distance range and azimuth scan section.

/// Valid distance window in meters.
#[derive(Clone, Copy, Debug)]
pub struct DistanceSection {
    min: f32,
    max: f32,
}

impl DistanceSection {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, distance: f32) -> bool {
        self.min <= distance && distance <= self.max
    }
}

/// Valid azimuth window in hundredths of a degree.
///
/// The window may cross the zero azimuth (e.g. 350°..10°); a span of a full
/// revolution or more accepts everything.
#[derive(Clone, Copy, Debug)]
pub struct AzimuthSection {
    start: i32,
    end: i32,
    full_round: bool,
    cross_zero: bool,
}

impl AzimuthSection {
    pub fn new(start: i32, end: i32) -> Self {
        let full_round = end - start >= 36000;
        let start = start.rem_euclid(36000);
        let end = end.rem_euclid(36000);
        Self {
            start,
            end,
            full_round,
            cross_zero: start > end,
        }
    }

    #[inline]
    pub fn contains(&self, angle: i32) -> bool {
        if self.full_round {
            return true;
        }

        // Adjusted angles can leave [0, 36000) by up to a quadrant
        let angle = angle.rem_euclid(36000);
        if self.cross_zero {
            angle >= self.start || angle < self.end
        } else {
            angle >= self.start && angle < self.end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_section() {
        let section = DistanceSection::new(0.4, 250.0);
        assert!(!section.contains(0.0));
        assert!(!section.contains(0.39));
        assert!(section.contains(0.4));
        assert!(section.contains(100.0));
        assert!(section.contains(250.0));
        assert!(!section.contains(250.1));
    }

    #[test]
    fn test_azimuth_full_round() {
        let section = AzimuthSection::new(0, 36000);
        assert!(section.contains(0));
        assert!(section.contains(18000));
        assert!(section.contains(35999));
        // Out-of-range inputs normalize
        assert!(section.contains(-100));
        assert!(section.contains(36100));
    }

    #[test]
    fn test_azimuth_simple_window() {
        let section = AzimuthSection::new(9000, 27000);
        assert!(!section.contains(8999));
        assert!(section.contains(9000));
        assert!(section.contains(18000));
        assert!(!section.contains(27000));
    }

    #[test]
    fn test_azimuth_cross_zero_window() {
        let section = AzimuthSection::new(35000, 1000);
        assert!(section.contains(35500));
        assert!(section.contains(0));
        assert!(section.contains(999));
        assert!(!section.contains(1000));
        assert!(!section.contains(18000));
        // Negative adjusted angle wraps into the window
        assert!(section.contains(-500));
    }
}
