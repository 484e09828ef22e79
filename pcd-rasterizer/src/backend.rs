use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use pcd_core::pointcloud::cloud::CloudMetadata;
use pcd_core::raster::quality::RasterStats;
use pcd_core::raster::request::RasterMode;
use pcd_core::raster::view::ViewSpec;

use crate::error::BackendError;
use crate::{gdal, pdal, pipeline, readback};

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_ENCODE_TIMEOUT: Duration = Duration::from_secs(120);
const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the backend needs to render one view into one raster file.
/// Band temporaries and pipeline documents land in `workdir`.
#[derive(Debug, Clone)]
pub struct RenderTask {
    pub cloud: PathBuf,
    pub output: PathBuf,
    pub workdir: PathBuf,
    pub mode: RasterMode,
    pub resolution: f64,
    pub view: ViewSpec,
    pub timeout: Duration,
}

/// The seam between the conversion orchestrator and the external
/// rasterization tools.
pub trait RasterBackend: Send + Sync {
    /// Fails fast when a required tool is not installed.
    fn ensure_available(&self, needs_gdal: bool) -> Result<(), BackendError>;

    fn probe(&self, cloud: &Path) -> Result<CloudMetadata, BackendError>;

    /// Renders one view and reports statistics for the produced raster.
    fn rasterize(&self, task: &RenderTask) -> Result<RasterStats, BackendError>;

    fn encode_jpeg(&self, source: &Path, output: &Path, quality: u8)
        -> Result<(), BackendError>;
}

/// Drives `pdal` for rasterization and the GDAL tools for band stacking and
/// JPEG re-encoding.
pub struct PdalBackend {
    pub probe_timeout: Duration,
    pub encode_timeout: Duration,
}

impl Default for PdalBackend {
    fn default() -> Self {
        PdalBackend {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            encode_timeout: DEFAULT_ENCODE_TIMEOUT,
        }
    }
}

impl PdalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RasterBackend for PdalBackend {
    fn ensure_available(&self, needs_gdal: bool) -> Result<(), BackendError> {
        pdal::check_available(AVAILABILITY_TIMEOUT)?;
        if needs_gdal {
            gdal::check_available(AVAILABILITY_TIMEOUT)?;
        }
        Ok(())
    }

    fn probe(&self, cloud: &Path) -> Result<CloudMetadata, BackendError> {
        pdal::probe(cloud, self.probe_timeout)
    }

    fn rasterize(&self, task: &RenderTask) -> Result<RasterStats, BackendError> {
        let deadline = ViewDeadline::new(task.timeout);
        let targets = pipeline::band_targets(task.mode);

        if targets.len() == 1 {
            let document = task
                .workdir
                .join(format!("view_{:03}.json", task.view.index));
            let p = pipeline::view_pipeline(
                &task.cloud,
                &task.output,
                &targets[0],
                &task.view,
                task.resolution,
            );
            pdal::run_pipeline(&p, &document, deadline.remaining()?)?;
        } else {
            // Multi-band: render each band separately, then stack.
            let mut band_files = Vec::with_capacity(targets.len());
            for target in targets {
                let suffix = target.band_suffix.unwrap_or("band");
                let band_file = task
                    .workdir
                    .join(format!("view_{:03}_{}.tif", task.view.index, suffix));
                let document = task
                    .workdir
                    .join(format!("view_{:03}_{}.json", task.view.index, suffix));
                let p = pipeline::view_pipeline(
                    &task.cloud,
                    &band_file,
                    target,
                    &task.view,
                    task.resolution,
                );
                pdal::run_pipeline(&p, &document, deadline.remaining()?)?;
                verify_output(&band_file)?;
                band_files.push(band_file);
            }

            let vrt = task
                .workdir
                .join(format!("view_{:03}.vrt", task.view.index));
            let band_refs: Vec<&Path> = band_files.iter().map(PathBuf::as_path).collect();
            gdal::build_vrt(&vrt, &band_refs, deadline.remaining()?)?;
            gdal::translate_rgb8(&vrt, &task.output, deadline.remaining()?)?;
        }

        verify_output(&task.output)?;
        readback::read_stats(&task.output)
    }

    fn encode_jpeg(
        &self,
        source: &Path,
        output: &Path,
        quality: u8,
    ) -> Result<(), BackendError> {
        gdal::translate_jpeg(source, output, quality, self.encode_timeout)?;
        verify_output(output)
    }
}

/// Tracks the per-view time budget across the several subprocess invocations
/// a view can need.
struct ViewDeadline {
    started: Instant,
    budget: Duration,
}

impl ViewDeadline {
    fn new(budget: Duration) -> Self {
        ViewDeadline {
            started: Instant::now(),
            budget,
        }
    }

    fn remaining(&self) -> Result<Duration, BackendError> {
        match self.budget.checked_sub(self.started.elapsed()) {
            Some(left) if !left.is_zero() => Ok(left),
            _ => Err(BackendError::Timeout {
                tool: pdal::PDAL,
                elapsed: self.started.elapsed(),
            }),
        }
    }
}

fn verify_output(path: &Path) -> Result<(), BackendError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(BackendError::OutputMissing {
            path: path.to_path_buf(),
        }),
    }
}
