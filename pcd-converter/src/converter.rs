use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use pcd_core::pointcloud::cloud::CloudSource;
use pcd_core::raster::dimension;
use pcd_core::raster::manifest::{ConversionManifest, FailureKind, ViewFailure, ViewRecord};
use pcd_core::raster::quality::{RasterQuality, RasterStats};
use pcd_core::raster::request::{ConversionRequest, OutputFormat, RasterMode};
use pcd_core::raster::view::ViewSpec;
use pcd_rasterizer::{RasterBackend, RenderTask};
use pcd_views::{PlannerBuilder, RequestPlannerBuilder};

use crate::error::{ConvertError, Result};
use crate::naming;

pub const DEFAULT_VIEW_TIMEOUT: Duration = Duration::from_secs(300);

// Rendering is subprocess-bound; beyond this many workers PDAL instances
// start starving each other for memory.
const MAX_DEFAULT_WORKERS: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct ConverterOptions {
    /// Concurrent render workers. Zero falls back to one.
    pub jobs: usize,
    /// Wall-clock budget for rendering one view, shared across the pdal and
    /// gdal invocations that produce its raster. JPEG re-encoding during
    /// finalize runs under the backend's own encode timeout instead.
    pub view_timeout: Duration,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        ConverterOptions {
            jobs: num_cpus::get().min(MAX_DEFAULT_WORKERS),
            view_timeout: DEFAULT_VIEW_TIMEOUT,
        }
    }
}

/// Cooperative cancellation handle. Views already rendering run to
/// completion; views not yet started are recorded as cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Runs one conversion job: probe, dimension check, view planning, parallel
/// rendering, finalization. A failed view never aborts the job; the manifest
/// records it.
pub struct Converter {
    backend: Arc<dyn RasterBackend>,
    options: ConverterOptions,
}

/// Job-wide values shared by every render worker.
struct JobContext<'a> {
    cloud: &'a Path,
    destination: &'a Path,
    workdir: &'a Path,
    basename: &'a str,
    mode: RasterMode,
    format: OutputFormat,
    resolution: f64,
    timeout: Duration,
}

enum ViewOutcome {
    Rendered {
        view: ViewSpec,
        stats: RasterStats,
        degenerate: Option<String>,
        tif: PathBuf,
    },
    Failed {
        index: usize,
        kind: FailureKind,
        detail: String,
    },
}

impl Converter {
    pub fn new(backend: Arc<dyn RasterBackend>, options: ConverterOptions) -> Self {
        Converter { backend, options }
    }

    pub fn convert(
        &self,
        cloud: &Path,
        destination: &Path,
        request: &ConversionRequest,
        cancel: &CancelFlag,
    ) -> Result<ConversionManifest> {
        let started = Instant::now();
        request.validate()?;

        // RGB stacking and JPEG re-encoding both go through the GDAL tools.
        let needs_gdal =
            request.mode == RasterMode::Rgb || request.format == OutputFormat::Jpg;
        self.backend.ensure_available(needs_gdal)?;

        log::info!("start probing {:?} ...", cloud);
        let probe_started = Instant::now();
        let metadata = self
            .backend
            .probe(cloud)
            .map_err(|source| ConvertError::UnreadableFile {
                path: cloud.to_path_buf(),
                source,
            })?;
        let source = CloudSource {
            path: cloud.to_path_buf(),
            metadata,
        };
        log::info!(
            "finish probing in {:?} ({} points, {} dimensions)",
            probe_started.elapsed(),
            source.metadata.point_count,
            source.metadata.dimensions.len()
        );

        dimension::resolve(request.mode, &source.metadata)?;

        let resolution = request.effective_resolution(&source.metadata);
        if request.resolution.is_none() {
            log::info!("derived resolution {}m/px from point density", resolution);
        }

        let plan = RequestPlannerBuilder::new(request)
            .build()
            .plan(&source.metadata)?;
        let mut warnings = plan.warnings;
        for warning in &warnings {
            log::warn!("{}", warning);
        }

        fs::create_dir_all(destination)?;
        let workdir = tempfile::Builder::new().prefix("pimager-").tempdir()?;

        let basename = source
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cloud".to_string());

        let context = JobContext {
            cloud: &source.path,
            destination,
            workdir: workdir.path(),
            basename: &basename,
            mode: request.mode,
            format: request.format,
            resolution,
            timeout: self.options.view_timeout,
        };

        let jobs = self.options.jobs.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| ConvertError::WorkerPool(e.to_string()))?;

        log::info!(
            "start rendering {} {} views with {} workers ...",
            plan.specs.len(),
            request.strategy,
            jobs
        );
        let render_started = Instant::now();
        let outcomes: Vec<ViewOutcome> = pool.install(|| {
            plan.specs
                .par_iter()
                .map(|view| self.render_view(&context, view, cancel))
                .collect()
        });

        let (files, failures) =
            self.finalize(&context, request.jpeg_quality, outcomes, &mut warnings);
        log::info!(
            "finish rendering {}/{} views in {:?}",
            files.len(),
            plan.specs.len(),
            render_started.elapsed()
        );

        Ok(ConversionManifest {
            source: source.path.display().to_string(),
            mode: request.mode,
            strategy: request.strategy,
            format: request.format,
            resolution,
            requested_views: plan.specs.len(),
            produced_views: files.len(),
            success: !files.is_empty(),
            files,
            failures,
            warnings,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn render_view(
        &self,
        context: &JobContext,
        view: &ViewSpec,
        cancel: &CancelFlag,
    ) -> ViewOutcome {
        if cancel.is_cancelled() {
            return ViewOutcome::Failed {
                index: view.index,
                kind: FailureKind::Cancelled,
                detail: "cancelled before rendering started".to_string(),
            };
        }

        // GeoTIFF is always rendered first; JPEG jobs re-encode from it
        // during finalization, so their intermediate lands in the workdir.
        let tif_name = naming::view_file_name(context.basename, context.mode, view, "tif");
        let tif = match context.format {
            OutputFormat::Tif => context.destination.join(&tif_name),
            OutputFormat::Jpg => context.workdir.join(&tif_name),
        };

        let task = RenderTask {
            cloud: context.cloud.to_path_buf(),
            output: tif.clone(),
            workdir: context.workdir.to_path_buf(),
            mode: context.mode,
            resolution: context.resolution,
            view: *view,
            timeout: context.timeout,
        };

        match self.backend.rasterize(&task) {
            Ok(stats) => {
                let degenerate = match stats.assess() {
                    RasterQuality::Valid => None,
                    RasterQuality::Degenerate(reason) => {
                        log::warn!("view {:03} flagged: {}", view.index, reason);
                        Some(reason.to_string())
                    }
                };
                ViewOutcome::Rendered {
                    view: *view,
                    stats,
                    degenerate,
                    tif,
                }
            }
            Err(e) => {
                let kind = if e.is_timeout() {
                    FailureKind::Timeout
                } else {
                    FailureKind::Backend
                };
                log::warn!("view {:03} failed: {}", view.index, e);
                ViewOutcome::Failed {
                    index: view.index,
                    kind,
                    detail: e.to_string(),
                }
            }
        }
    }

    /// Walks outcomes in view order, re-encoding JPEG outputs and splitting
    /// records from failures. A failed JPEG encode falls back to keeping the
    /// GeoTIFF instead of losing the view.
    fn finalize(
        &self,
        context: &JobContext,
        jpeg_quality: u8,
        outcomes: Vec<ViewOutcome>,
        warnings: &mut Vec<String>,
    ) -> (Vec<ViewRecord>, Vec<ViewFailure>) {
        let mut files = Vec::new();
        let mut failures = Vec::new();

        for outcome in outcomes {
            match outcome {
                ViewOutcome::Rendered {
                    view,
                    stats,
                    degenerate,
                    tif,
                } => {
                    let file = match context.format {
                        OutputFormat::Tif => {
                            naming::view_file_name(context.basename, context.mode, &view, "tif")
                        }
                        OutputFormat::Jpg => {
                            match self.encode_view(context, jpeg_quality, &view, &tif, warnings) {
                                Ok(name) => name,
                                Err(failure) => {
                                    failures.push(failure);
                                    continue;
                                }
                            }
                        }
                    };
                    if let Some(reason) = &degenerate {
                        warnings.push(format!(
                            "view {:03} is degenerate: {}",
                            view.index, reason
                        ));
                    }
                    files.push(ViewRecord {
                        index: view.index,
                        file,
                        azimuth: view.azimuth,
                        elevation: view.elevation,
                        stats,
                        degenerate,
                    });
                }
                ViewOutcome::Failed {
                    index,
                    kind,
                    detail,
                } => failures.push(ViewFailure {
                    index,
                    kind,
                    detail,
                }),
            }
        }

        (files, failures)
    }

    fn encode_view(
        &self,
        context: &JobContext,
        jpeg_quality: u8,
        view: &ViewSpec,
        tif: &Path,
        warnings: &mut Vec<String>,
    ) -> std::result::Result<String, ViewFailure> {
        let jpg_name = naming::view_file_name(context.basename, context.mode, view, "jpg");
        let jpg = context.destination.join(&jpg_name);
        match self.backend.encode_jpeg(tif, &jpg, jpeg_quality) {
            Ok(()) => Ok(jpg_name),
            Err(encode_err) => {
                let tif_name =
                    naming::view_file_name(context.basename, context.mode, view, "tif");
                let fallback = context.destination.join(&tif_name);
                match fs::copy(tif, &fallback) {
                    Ok(_) => {
                        let warning = format!(
                            "view {:03}: jpeg encode failed ({}), keeping GeoTIFF {}",
                            view.index, encode_err, tif_name
                        );
                        log::warn!("{}", warning);
                        warnings.push(warning);
                        Ok(tif_name)
                    }
                    Err(copy_err) => Err(ViewFailure {
                        index: view.index,
                        kind: FailureKind::Backend,
                        detail: format!(
                            "jpeg encode failed ({}); tiff fallback failed: {}",
                            encode_err, copy_err
                        ),
                    }),
                }
            }
        }
    }
}
