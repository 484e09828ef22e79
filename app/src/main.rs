use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use env_logger::Builder;
use glob::glob;
use log::LevelFilter;

use pcd_converter::naming;
use pcd_converter::{CancelFlag, Converter, ConverterOptions};
use pcd_core::raster::request::{ConversionRequest, RequestError};
use pcd_rasterizer::PdalBackend;

#[derive(Parser, Debug)]
#[command(
    name = "Point Imager",
    about = "A tool for converting point cloud data into multiview 2D rasters",
    author = "MIERUNE Inc.",
    version = "0.0.1"
)]
struct Cli {
    #[arg(short, long, required = true, num_args = 1.., value_name = "FILE")]
    input: Vec<String>,

    #[arg(short, long, required = true, value_name = "DIR")]
    output: String,

    /// rgb, intensity, elevation or count
    #[arg(short, long, default_value = "rgb")]
    mode: String,

    /// single, tiled or perspective
    #[arg(short, long, default_value = "single")]
    strategy: String,

    /// Ground resolution in meters per pixel. Derived from point density
    /// when omitted.
    #[arg(short, long, value_name = "METERS")]
    resolution: Option<f64>,

    #[arg(short, long, default_value_t = 30)]
    count: u32,

    #[arg(long, default_value_t = 100.0, value_name = "METERS")]
    tile_size: f64,

    #[arg(long, default_value_t = 0.3)]
    overlap: f64,

    /// tif or jpg
    #[arg(short, long, default_value = "tif")]
    format: String,

    #[arg(long, default_value_t = 95)]
    jpeg_quality: u8,

    /// Concurrent render workers. Defaults to the CPU count, capped at 8.
    #[arg(short, long)]
    jobs: Option<usize>,

    #[arg(long, default_value_t = 300, value_name = "SECONDS")]
    view_timeout: u64,
}

fn build_request(args: &Cli) -> Result<ConversionRequest, RequestError> {
    let request = ConversionRequest {
        mode: args.mode.parse()?,
        strategy: args.strategy.parse()?,
        resolution: args.resolution,
        count: args.count,
        tile_size: args.tile_size,
        overlap: args.overlap,
        format: args.format.parse()?,
        jpeg_quality: args.jpeg_quality,
    };
    request.validate()?;
    Ok(request)
}

fn expand_globs(input_patterns: Vec<String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for pattern in input_patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            for entry in glob(&pattern).expect("Failed to read glob pattern") {
                match entry {
                    Ok(path) => paths.push(path),
                    Err(e) => eprintln!("Error: {:?}", e),
                }
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }
    paths
}

fn cloud_basename(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cloud".to_string())
}

fn main() {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        .init();

    let args = Cli::parse();

    log::info!("input files: {:?}", args.input);
    log::info!("output folder: {}", args.output);
    log::info!("mode: {}", args.mode);
    log::info!("strategy: {}", args.strategy);
    log::info!("format: {}", args.format);

    let request = match build_request(&args) {
        Ok(request) => request,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let start = std::time::Instant::now();

    log::info!("start processing...");
    let input_files = expand_globs(args.input);
    log::info!("Expanded input files: {:?}", input_files);
    if input_files.is_empty() {
        log::error!("no input files matched");
        std::process::exit(1);
    }

    let output_path = PathBuf::from(args.output);
    std::fs::create_dir_all(&output_path).unwrap();

    let mut options = ConverterOptions::default();
    if let Some(jobs) = args.jobs {
        options.jobs = jobs;
    }
    options.view_timeout = Duration::from_secs(args.view_timeout);

    let converter = Converter::new(Arc::new(PdalBackend::new()), options);
    let cancel = CancelFlag::new();

    let mut failed = 0usize;
    for input in &input_files {
        log::info!("start converting {:?} ...", input);
        let start_local = std::time::Instant::now();
        match converter.convert(input, &output_path, &request, &cancel) {
            Ok(manifest) => {
                let manifest_path = output_path
                    .join(naming::manifest_file_name(&cloud_basename(input)));
                fs::write(
                    &manifest_path,
                    serde_json::to_string_pretty(&manifest).unwrap(),
                )
                .unwrap();
                log::info!("write manifest: {:?}", manifest_path);

                for failure in &manifest.failures {
                    log::warn!(
                        "view {:03} was not produced: {}",
                        failure.index,
                        failure.detail
                    );
                }
                if manifest.success {
                    log::info!(
                        "Finish converting {:?}: {}/{} views in {:?}",
                        input,
                        manifest.produced_views,
                        manifest.requested_views,
                        start_local.elapsed()
                    );
                } else {
                    log::error!("no views were produced for {:?}", input);
                    failed += 1;
                }
            }
            Err(e) => {
                log::error!("Failed to convert {:?}: {}", input, e);
                failed += 1;
            }
        }
    }

    log::info!("Elapsed: {:?}", start.elapsed());
    if failed > 0 {
        log::error!("{} of {} inputs failed", failed, input_files.len());
        std::process::exit(1);
    }
    log::info!("Finish processing");
}
