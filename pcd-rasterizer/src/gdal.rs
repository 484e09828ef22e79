use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::time::Duration;

use crate::error::BackendError;
use crate::process::run_with_timeout;

pub const GDAL_TRANSLATE: &str = "gdal_translate";
pub const GDAL_BUILDVRT: &str = "gdalbuildvrt";

/// Verifies the GDAL command line tools answer at all.
pub fn check_available(timeout: Duration) -> Result<(), BackendError> {
    run_with_timeout(GDAL_TRANSLATE, ["--version"], timeout)?;
    run_with_timeout(GDAL_BUILDVRT, ["--version"], timeout)?;
    Ok(())
}

/// Stacks single-band rasters into one multi-band virtual dataset.
pub fn build_vrt(vrt: &Path, bands: &[&Path], timeout: Duration) -> Result<(), BackendError> {
    log::debug!("gdalbuildvrt -separate {:?} from {} bands", vrt, bands.len());
    let mut args: Vec<OsString> = vec![OsString::from("-separate"), vrt.into()];
    args.extend(bands.iter().map(|b| OsString::from(*b)));
    run_with_timeout(GDAL_BUILDVRT, args, timeout).map(|_| ())
}

/// Flattens a stacked VRT of 16-bit bands into an 8-bit RGB GeoTIFF. LAS
/// color values are 16-bit, so the scale maps 0..65535 onto 0..255.
pub fn translate_rgb8(vrt: &Path, output: &Path, timeout: Duration) -> Result<(), BackendError> {
    let args: Vec<&OsStr> = vec![
        OsStr::new("-ot"),
        OsStr::new("Byte"),
        OsStr::new("-scale"),
        OsStr::new("0"),
        OsStr::new("65535"),
        OsStr::new("0"),
        OsStr::new("255"),
        OsStr::new("-co"),
        OsStr::new("COMPRESS=DEFLATE"),
        OsStr::new("-co"),
        OsStr::new("PREDICTOR=2"),
        OsStr::new("-co"),
        OsStr::new("PHOTOMETRIC=RGB"),
        OsStr::new("-co"),
        OsStr::new("BIGTIFF=IF_SAFER"),
        vrt.as_os_str(),
        output.as_os_str(),
    ];
    run_with_timeout(GDAL_TRANSLATE, args, timeout).map(|_| ())
}

/// Re-encodes a raster as JPEG, normalizing whatever GDAL can read.
pub fn translate_jpeg(
    source: &Path,
    output: &Path,
    quality: u8,
    timeout: Duration,
) -> Result<(), BackendError> {
    log::debug!("gdal_translate -of JPEG {:?} -> {:?}", source, output);
    let quality_opt = OsString::from(format!("QUALITY={}", quality));
    let args: Vec<&OsStr> = vec![
        OsStr::new("-of"),
        OsStr::new("JPEG"),
        OsStr::new("-co"),
        &quality_opt,
        source.as_os_str(),
        output.as_os_str(),
    ];
    run_with_timeout(GDAL_TRANSLATE, args, timeout).map(|_| ())
}
