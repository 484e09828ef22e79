use thiserror::Error;

use crate::pointcloud::cloud::CloudMetadata;
use crate::raster::request::RasterMode;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DimensionError {
    #[error(
        "mode '{mode}' needs LAS dimensions {missing:?} that the cloud does not carry (available: {available})"
    )]
    UnsupportedMode {
        mode: RasterMode,
        missing: Vec<String>,
        available: String,
    },
}

/// Checks that the cloud carries every dimension the mode rasterizes. Runs
/// before any backend invocation so an impossible request never launches a
/// render.
pub fn resolve(
    mode: RasterMode,
    metadata: &CloudMetadata,
) -> Result<&'static [&'static str], DimensionError> {
    let required = mode.required_dimensions();
    let missing = metadata.missing_dimensions(required);
    if missing.is_empty() {
        Ok(required)
    } else {
        Err(DimensionError::UnsupportedMode {
            mode,
            missing,
            available: metadata.dimensions.join(", "),
        })
    }
}
