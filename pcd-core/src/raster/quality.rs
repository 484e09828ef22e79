use std::fmt;

use serde::{Deserialize, Serialize};

/// A raster whose background fraction reaches this value is flagged as
/// degenerate (kept in the output set, reported in the manifest).
pub const DEGENERATE_ZERO_FRACTION: f64 = 0.95;

/// Pixel statistics computed from a rendered raster. Background pixels are
/// those with value 0 (the writer's nodata) or a non-finite value; they count
/// toward `zero_fraction` but still participate in min/max/mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterStats {
    pub width: u32,
    pub height: u32,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub zero_fraction: f64,
}

impl RasterStats {
    pub fn from_single_band(width: u32, height: u32, values: &[f64]) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut finite = 0u64;
        let mut background = 0u64;

        for &value in values {
            if !value.is_finite() {
                background += 1;
                continue;
            }
            if value == 0.0 {
                background += 1;
            }
            min = min.min(value);
            max = max.max(value);
            sum += value;
            finite += 1;
        }

        let (min, max, mean) = if finite > 0 {
            (min, max, sum / finite as f64)
        } else {
            (0.0, 0.0, 0.0)
        };
        let zero_fraction = if values.is_empty() {
            1.0
        } else {
            background as f64 / values.len() as f64
        };

        RasterStats {
            width,
            height,
            min,
            max,
            mean,
            zero_fraction,
        }
    }

    /// Statistics for an interleaved 8-bit RGB buffer. A pixel is background
    /// only when all three bands are zero; min/max/mean run over every band
    /// sample.
    pub fn from_rgb8(width: u32, height: u32, samples: &[u8]) -> Self {
        let pixels = samples.len() / 3;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut background = 0u64;

        for pixel in samples.chunks_exact(3) {
            if pixel[0] == 0 && pixel[1] == 0 && pixel[2] == 0 {
                background += 1;
            }
            for &sample in pixel {
                let value = sample as f64;
                min = min.min(value);
                max = max.max(value);
                sum += value;
            }
        }

        let (min, max, mean) = if pixels > 0 {
            (min, max, sum / (pixels * 3) as f64)
        } else {
            (0.0, 0.0, 0.0)
        };
        let zero_fraction = if pixels > 0 {
            background as f64 / pixels as f64
        } else {
            1.0
        };

        RasterStats {
            width,
            height,
            min,
            max,
            mean,
            zero_fraction,
        }
    }

    /// Flags rasters that carry no usable signal for photogrammetry. They are
    /// still written out; the manifest records the reason.
    pub fn assess(&self) -> RasterQuality {
        if self.width == 0 || self.height == 0 {
            return RasterQuality::Degenerate(DegenerateReason::Empty);
        }
        if self.zero_fraction >= DEGENERATE_ZERO_FRACTION {
            return RasterQuality::Degenerate(DegenerateReason::MostlyBackground {
                zero_fraction: self.zero_fraction,
            });
        }
        if self.min == self.max {
            return RasterQuality::Degenerate(DegenerateReason::CollapsedRange { value: self.min });
        }
        RasterQuality::Valid
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RasterQuality {
    Valid,
    Degenerate(DegenerateReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DegenerateReason {
    Empty,
    MostlyBackground { zero_fraction: f64 },
    CollapsedRange { value: f64 },
}

impl fmt::Display for DegenerateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegenerateReason::Empty => write!(f, "raster has no pixels"),
            DegenerateReason::MostlyBackground { zero_fraction } => write!(
                f,
                "{:.1}% of pixels are background",
                zero_fraction * 100.0
            ),
            DegenerateReason::CollapsedRange { value } => {
                write!(f, "all pixels share the value {}", value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_raster_is_valid() {
        let values = [0.0, 10.0, 20.0, 30.0];
        let stats = RasterStats::from_single_band(2, 2, &values);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.mean, 15.0);
        assert_eq!(stats.zero_fraction, 0.25);
        assert_eq!(stats.assess(), RasterQuality::Valid);
    }

    #[test]
    fn ninety_seven_percent_zeros_is_degenerate() {
        let mut values = vec![0.0; 97];
        values.extend_from_slice(&[5.0, 7.0, 9.0]);
        let stats = RasterStats::from_single_band(10, 10, &values);
        match stats.assess() {
            RasterQuality::Degenerate(DegenerateReason::MostlyBackground { zero_fraction }) => {
                assert!((zero_fraction - 0.97).abs() < 1e-9);
            }
            other => panic!("expected mostly-background, got {:?}", other),
        }
    }

    #[test]
    fn threshold_is_inclusive_at_95_percent() {
        let mut values = vec![0.0; 95];
        values.extend(std::iter::repeat(3.0).take(5));
        let stats = RasterStats::from_single_band(10, 10, &values);
        assert!(matches!(
            stats.assess(),
            RasterQuality::Degenerate(DegenerateReason::MostlyBackground { .. })
        ));

        let mut values = vec![0.0; 94];
        values.extend([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let stats = RasterStats::from_single_band(10, 10, &values);
        assert_eq!(stats.assess(), RasterQuality::Valid);
    }

    #[test]
    fn constant_raster_has_collapsed_range() {
        let values = vec![7.0; 100];
        let stats = RasterStats::from_single_band(10, 10, &values);
        assert_eq!(stats.zero_fraction, 0.0);
        assert_eq!(
            stats.assess(),
            RasterQuality::Degenerate(DegenerateReason::CollapsedRange { value: 7.0 })
        );
    }

    #[test]
    fn all_zero_raster_reports_background_not_collapse() {
        let values = vec![0.0; 16];
        let stats = RasterStats::from_single_band(4, 4, &values);
        assert!(matches!(
            stats.assess(),
            RasterQuality::Degenerate(DegenerateReason::MostlyBackground { .. })
        ));
    }

    #[test]
    fn non_finite_values_count_as_background() {
        let values = [f64::NAN, f64::INFINITY, 1.0, 2.0];
        let stats = RasterStats::from_single_band(2, 2, &values);
        assert_eq!(stats.zero_fraction, 0.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 2.0);
    }

    #[test]
    fn empty_raster_is_degenerate() {
        let stats = RasterStats::from_single_band(0, 0, &[]);
        assert_eq!(
            stats.assess(),
            RasterQuality::Degenerate(DegenerateReason::Empty)
        );
    }

    #[test]
    fn rgb_pixel_is_background_only_when_all_bands_are_zero() {
        // 4 pixels: black, red-only, gray, white
        let samples = [0, 0, 0, 200, 0, 0, 50, 50, 50, 255, 255, 255];
        let stats = RasterStats::from_rgb8(2, 2, &samples);
        assert_eq!(stats.zero_fraction, 0.25);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 255.0);
    }

    #[test]
    fn mostly_black_rgb_is_degenerate() {
        let mut samples = vec![0u8; 97 * 3];
        samples.extend_from_slice(&[10, 20, 30, 40, 50, 60, 70, 80, 90]);
        let stats = RasterStats::from_rgb8(10, 10, &samples);
        assert!(matches!(
            stats.assess(),
            RasterQuality::Degenerate(DegenerateReason::MostlyBackground { .. })
        ));
    }
}
