use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::ColorType;

use pcd_core::raster::quality::RasterStats;

use crate::error::BackendError;

/// Decodes a rendered GeoTIFF just far enough to compute pixel statistics.
/// Handles the dataset shapes this tool writes: single-band integer or float
/// rasters, and 8-bit interleaved RGB.
pub fn read_stats(path: &Path) -> Result<RasterStats, BackendError> {
    let file = File::open(path).map_err(|e| unreadable(path, e.to_string()))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| unreadable(path, e.to_string()))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| unreadable(path, e.to_string()))?;
    let color = decoder
        .colortype()
        .map_err(|e| unreadable(path, e.to_string()))?;
    let image = decoder
        .read_image()
        .map_err(|e| unreadable(path, e.to_string()))?;

    match (color, image) {
        (ColorType::RGB(8), DecodingResult::U8(samples)) => {
            Ok(RasterStats::from_rgb8(width, height, &samples))
        }
        (ColorType::Gray(_), image) => {
            let values = samples_to_f64(image);
            Ok(RasterStats::from_single_band(width, height, &values))
        }
        (other, _) => Err(unreadable(
            path,
            format!("unsupported color type {:?}", other),
        )),
    }
}

fn samples_to_f64(image: DecodingResult) -> Vec<f64> {
    match image {
        DecodingResult::U8(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::U16(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::I16(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::F64(v) => v,
    }
}

fn unreadable(path: &Path, detail: String) -> BackendError {
    BackendError::OutputUnreadable {
        path: path.to_path_buf(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcd_core::raster::quality::{DegenerateReason, RasterQuality};
    use tiff::encoder::{colortype, TiffEncoder};

    fn write_gray16(path: &Path, width: u32, height: u32, data: &[u16]) {
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::Gray16>(width, height, data)
            .unwrap();
    }

    #[test]
    fn reads_single_band_u16_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("band.tif");
        let data: Vec<u16> = vec![0, 0, 100, 200, 300, 400, 500, 600, 0, 700, 800, 900];
        write_gray16(&path, 4, 3, &data);

        let stats = read_stats(&path).unwrap();
        assert_eq!(stats.width, 4);
        assert_eq!(stats.height, 3);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 900.0);
        assert_eq!(stats.zero_fraction, 0.25);
        assert_eq!(stats.assess(), RasterQuality::Valid);
    }

    #[test]
    fn reads_float32_elevation_rasters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("elevation.tif");
        let data: Vec<f32> = vec![0.0, 410.5, 411.25, 412.0];
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::Gray32Float>(2, 2, &data)
            .unwrap();

        let stats = read_stats(&path).unwrap();
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 412.0);
        assert_eq!(stats.zero_fraction, 0.25);
    }

    #[test]
    fn reads_interleaved_rgb8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        let data: Vec<u8> = vec![0, 0, 0, 120, 130, 140, 10, 20, 30, 0, 0, 0];
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::RGB8>(2, 2, &data)
            .unwrap();

        let stats = read_stats(&path).unwrap();
        assert_eq!(stats.width, 2);
        assert_eq!(stats.zero_fraction, 0.5);
        assert_eq!(stats.max, 140.0);
    }

    #[test]
    fn an_all_zero_raster_reads_as_degenerate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("black.tif");
        write_gray16(&path, 8, 8, &vec![0u16; 64]);

        let stats = read_stats(&path).unwrap();
        assert_eq!(stats.zero_fraction, 1.0);
        assert!(matches!(
            stats.assess(),
            RasterQuality::Degenerate(DegenerateReason::MostlyBackground { .. })
        ));
    }

    #[test]
    fn a_missing_file_is_unreadable() {
        let err = read_stats(Path::new("/nonexistent/raster.tif")).unwrap_err();
        assert!(matches!(err, BackendError::OutputUnreadable { .. }));
    }
}
