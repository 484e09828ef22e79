use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pointcloud::cloud::CloudMetadata;

pub const DEFAULT_RESOLUTION: f64 = 0.1;
pub const DEFAULT_TILE_SIZE: f64 = 100.0;
pub const DEFAULT_OVERLAP: f64 = 0.3;
pub const DEFAULT_VIEW_COUNT: u32 = 30;
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

// Auto-derived resolution aims for about this many points per pixel.
const POINTS_PER_PIXEL: f64 = 4.0;
const AUTO_RESOLUTION_MIN: f64 = 0.01;
const AUTO_RESOLUTION_MAX: f64 = 1.0;

/// Which LAS attribute each output pixel is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterMode {
    Rgb,
    Intensity,
    Elevation,
    Count,
}

impl RasterMode {
    /// LAS dimensions the cloud must carry for this mode. `Count` needs none:
    /// it rasterizes point occurrences per cell, not an attribute.
    pub fn required_dimensions(&self) -> &'static [&'static str] {
        match self {
            RasterMode::Rgb => &["Red", "Green", "Blue"],
            RasterMode::Intensity => &["Intensity"],
            RasterMode::Elevation => &["Z"],
            RasterMode::Count => &[],
        }
    }
}

impl fmt::Display for RasterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RasterMode::Rgb => "rgb",
            RasterMode::Intensity => "intensity",
            RasterMode::Elevation => "elevation",
            RasterMode::Count => "count",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RasterMode {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" => Ok(RasterMode::Rgb),
            "intensity" => Ok(RasterMode::Intensity),
            "elevation" => Ok(RasterMode::Elevation),
            "count" => Ok(RasterMode::Count),
            other => Err(RequestError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewStrategy {
    Single,
    Tiled,
    Perspective,
}

impl fmt::Display for ViewStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewStrategy::Single => "single",
            ViewStrategy::Tiled => "tiled",
            ViewStrategy::Perspective => "perspective",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ViewStrategy {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(ViewStrategy::Single),
            "tiled" => Ok(ViewStrategy::Tiled),
            "perspective" => Ok(ViewStrategy::Perspective),
            other => Err(RequestError::UnknownStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Tif,
    Jpg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Tif => "tif",
            OutputFormat::Jpg => "jpg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tif" | "tiff" => Ok(OutputFormat::Tif),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
            other => Err(RequestError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("unknown raster mode '{0}' (expected rgb, intensity, elevation or count)")]
    UnknownMode(String),
    #[error("unknown view strategy '{0}' (expected single, tiled or perspective)")]
    UnknownStrategy(String),
    #[error("unknown output format '{0}' (expected tif or jpg)")]
    UnknownFormat(String),
    #[error("resolution must be positive, got {0}")]
    InvalidResolution(f64),
    #[error("count must be at least 1")]
    InvalidCount,
    #[error("tile size must be positive, got {0}")]
    InvalidTileSize(f64),
    #[error("overlap must be in [0, 1), got {0}")]
    InvalidOverlap(f64),
    #[error("jpeg quality must be in 1..=100, got {0}")]
    InvalidJpegQuality(u8),
}

/// One conversion job's parameters. `resolution` of `None` means derive it
/// from the cloud's point density at probe time.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub mode: RasterMode,
    pub strategy: ViewStrategy,
    pub resolution: Option<f64>,
    pub count: u32,
    pub tile_size: f64,
    pub overlap: f64,
    pub format: OutputFormat,
    pub jpeg_quality: u8,
}

impl Default for ConversionRequest {
    fn default() -> Self {
        ConversionRequest {
            mode: RasterMode::Rgb,
            strategy: ViewStrategy::Single,
            resolution: None,
            count: DEFAULT_VIEW_COUNT,
            tile_size: DEFAULT_TILE_SIZE,
            overlap: DEFAULT_OVERLAP,
            format: OutputFormat::Tif,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ConversionRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        if let Some(resolution) = self.resolution {
            if !(resolution > 0.0) {
                return Err(RequestError::InvalidResolution(resolution));
            }
        }
        if self.count < 1 {
            return Err(RequestError::InvalidCount);
        }
        if !(self.tile_size > 0.0) {
            return Err(RequestError::InvalidTileSize(self.tile_size));
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(RequestError::InvalidOverlap(self.overlap));
        }
        if self.jpeg_quality < 1 || self.jpeg_quality > 100 {
            return Err(RequestError::InvalidJpegQuality(self.jpeg_quality));
        }
        Ok(())
    }

    /// The resolution actually used for rendering: the requested one, or a
    /// density-derived value clamped to a sane range when none was given.
    pub fn effective_resolution(&self, metadata: &CloudMetadata) -> f64 {
        if let Some(resolution) = self.resolution {
            return resolution;
        }
        match metadata.point_density() {
            Some(density) if density > 0.0 => (POINTS_PER_PIXEL / density)
                .sqrt()
                .clamp(AUTO_RESOLUTION_MIN, AUTO_RESOLUTION_MAX),
            _ => DEFAULT_RESOLUTION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcloud::cloud::BoundingVolume;

    fn metadata_with_density(width: f64, height: f64, point_count: u64) -> CloudMetadata {
        CloudMetadata {
            bounding_volume: BoundingVolume {
                min: [0.0, 0.0, 0.0],
                max: [width, height, 5.0],
            },
            point_count,
            dimensions: vec![],
        }
    }

    #[test]
    fn default_request_is_valid() {
        assert!(ConversionRequest::default().validate().is_ok());
    }

    #[test]
    fn overlap_of_one_is_rejected() {
        let request = ConversionRequest {
            overlap: 1.0,
            ..Default::default()
        };
        assert_eq!(request.validate(), Err(RequestError::InvalidOverlap(1.0)));
    }

    #[test]
    fn negative_overlap_is_rejected() {
        let request = ConversionRequest {
            overlap: -0.1,
            ..Default::default()
        };
        assert_eq!(request.validate(), Err(RequestError::InvalidOverlap(-0.1)));
    }

    #[test]
    fn zero_count_is_rejected() {
        let request = ConversionRequest {
            count: 0,
            ..Default::default()
        };
        assert_eq!(request.validate(), Err(RequestError::InvalidCount));
    }

    #[test]
    fn non_positive_resolution_is_rejected() {
        let request = ConversionRequest {
            resolution: Some(0.0),
            ..Default::default()
        };
        assert_eq!(
            request.validate(),
            Err(RequestError::InvalidResolution(0.0))
        );
    }

    #[test]
    fn jpeg_quality_bounds() {
        let request = ConversionRequest {
            jpeg_quality: 0,
            ..Default::default()
        };
        assert_eq!(
            request.validate(),
            Err(RequestError::InvalidJpegQuality(0))
        );
        let request = ConversionRequest {
            jpeg_quality: 101,
            ..Default::default()
        };
        assert_eq!(
            request.validate(),
            Err(RequestError::InvalidJpegQuality(101))
        );
    }

    #[test]
    fn mode_round_trips_through_strings() {
        for name in ["rgb", "intensity", "elevation", "count"] {
            let mode: RasterMode = name.parse().unwrap();
            assert_eq!(mode.to_string(), name);
        }
        assert!(matches!(
            "voxel".parse::<RasterMode>(),
            Err(RequestError::UnknownMode(_))
        ));
    }

    #[test]
    fn strategy_and_format_parse() {
        assert_eq!(
            "perspective".parse::<ViewStrategy>().unwrap(),
            ViewStrategy::Perspective
        );
        assert_eq!("jpeg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpg);
        assert_eq!("TIFF".parse::<OutputFormat>().unwrap(), OutputFormat::Tif);
        assert!(matches!(
            "gltf".parse::<OutputFormat>(),
            Err(RequestError::UnknownFormat(_))
        ));
    }

    #[test]
    fn explicit_resolution_wins() {
        let request = ConversionRequest {
            resolution: Some(0.25),
            ..Default::default()
        };
        let metadata = metadata_with_density(100.0, 100.0, 1_000_000);
        assert_eq!(request.effective_resolution(&metadata), 0.25);
    }

    #[test]
    fn auto_resolution_targets_four_points_per_pixel() {
        let request = ConversionRequest {
            resolution: None,
            ..Default::default()
        };
        // 1M points over 100x100 m = 100 pts/m^2 -> sqrt(4/100) = 0.2
        let metadata = metadata_with_density(100.0, 100.0, 1_000_000);
        let resolution = request.effective_resolution(&metadata);
        assert!((resolution - 0.2).abs() < 1e-12);
    }

    #[test]
    fn auto_resolution_is_clamped() {
        let request = ConversionRequest {
            resolution: None,
            ..Default::default()
        };
        let dense = metadata_with_density(10.0, 10.0, 100_000_000);
        assert_eq!(request.effective_resolution(&dense), 0.01);
        let sparse = metadata_with_density(1000.0, 1000.0, 100);
        assert_eq!(request.effective_resolution(&sparse), 1.0);
    }

    #[test]
    fn auto_resolution_falls_back_without_density() {
        let request = ConversionRequest {
            resolution: None,
            ..Default::default()
        };
        let metadata = metadata_with_density(0.0, 100.0, 1000);
        assert_eq!(request.effective_resolution(&metadata), DEFAULT_RESOLUTION);
    }
}
