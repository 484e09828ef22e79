use std::path::PathBuf;

use thiserror::Error;

use pcd_core::raster::dimension::DimensionError;
use pcd_core::raster::request::RequestError;
use pcd_rasterizer::BackendError;
use pcd_views::PlanError;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("invalid request: {0}")]
    Request(#[from] RequestError),

    #[error("failed to read point cloud {path:?}: {source}")]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    UnsupportedMode(#[from] DimensionError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("worker pool setup failed: {0}")]
    WorkerPool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
