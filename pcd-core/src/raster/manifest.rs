use serde::{Deserialize, Serialize};

use crate::raster::quality::RasterStats;
use crate::raster::request::{OutputFormat, RasterMode, ViewStrategy};

/// One successfully written output image, in view-index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRecord {
    pub index: usize,
    pub file: String,
    pub azimuth: f64,
    pub elevation: f64,
    pub stats: RasterStats,
    /// Present when the quality check flagged the raster; the image is kept
    /// either way.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degenerate: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Backend,
    Timeout,
    Cancelled,
}

/// A view that produced no image. Recorded per view; a failure here never
/// aborts the rest of the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewFailure {
    pub index: usize,
    pub kind: FailureKind,
    pub detail: String,
}

/// The job summary handed back to the caller and written next to the images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionManifest {
    pub source: String,
    pub mode: RasterMode,
    pub strategy: ViewStrategy,
    pub format: OutputFormat,
    pub resolution: f64,
    pub requested_views: usize,
    pub produced_views: usize,
    /// True when at least one view rendered.
    pub success: bool,
    pub files: Vec<ViewRecord>,
    pub failures: Vec<ViewFailure>,
    pub warnings: Vec<String>,
    pub elapsed_ms: u64,
}
