use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use pcd_core::pointcloud::cloud::{BoundingVolume, CloudMetadata};

use crate::error::BackendError;
use crate::pipeline::Pipeline;
use crate::process::run_with_timeout;

pub const PDAL: &str = "pdal";

#[derive(Debug, Deserialize)]
struct InfoDocument {
    summary: InfoSummary,
}

#[derive(Debug, Deserialize)]
struct InfoSummary {
    bounds: InfoBounds,
    #[serde(default)]
    num_points: u64,
    #[serde(default)]
    dimensions: String,
}

#[derive(Debug, Deserialize)]
struct InfoBounds {
    minx: f64,
    miny: f64,
    #[serde(default)]
    minz: f64,
    maxx: f64,
    maxy: f64,
    #[serde(default)]
    maxz: f64,
}

/// Verifies the pdal binary answers at all.
pub fn check_available(timeout: Duration) -> Result<(), BackendError> {
    run_with_timeout(PDAL, ["--version"], timeout).map(|_| ())
}

/// Reads bounds, point count and dimension names via `pdal info --summary`.
pub fn probe(cloud: &Path, timeout: Duration) -> Result<CloudMetadata, BackendError> {
    log::debug!("pdal info --summary {:?}", cloud);
    let output = run_with_timeout(
        PDAL,
        [OsStr::new("info"), OsStr::new("--summary"), cloud.as_os_str()],
        timeout,
    )?;
    parse_summary(&output.stdout)
}

fn parse_summary(stdout: &str) -> Result<CloudMetadata, BackendError> {
    let document: InfoDocument =
        serde_json::from_str(stdout).map_err(|e| BackendError::ProbeFormat {
            detail: e.to_string(),
        })?;
    let summary = document.summary;
    let bounds = summary.bounds;
    Ok(CloudMetadata {
        bounding_volume: BoundingVolume {
            min: [bounds.minx, bounds.miny, bounds.minz],
            max: [bounds.maxx, bounds.maxy, bounds.maxz],
        },
        point_count: summary.num_points,
        dimensions: summary
            .dimensions
            .split(',')
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect(),
    })
}

/// Writes the pipeline document beside the outputs and hands it to
/// `pdal pipeline`. The document stays on disk for the lifetime of the job's
/// working directory.
pub fn run_pipeline(
    pipeline: &Pipeline,
    document_path: &Path,
    timeout: Duration,
) -> Result<(), BackendError> {
    let document =
        serde_json::to_string_pretty(pipeline).map_err(|e| BackendError::PipelineEncode {
            detail: e.to_string(),
        })?;
    fs::write(document_path, document)?;
    log::debug!("pdal pipeline {:?}", document_path);
    run_with_timeout(
        PDAL,
        [OsStr::new("pipeline"), document_path.as_os_str()],
        timeout,
    )
    .map(|_| ())
}
