use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("'{tool}' was not found in PATH")]
    ToolNotFound { tool: &'static str },
    #[error("{tool} exited with status {exit_code}: {stderr}")]
    Failed {
        tool: &'static str,
        exit_code: i32,
        stderr: String,
    },
    #[error("{tool} timed out after {elapsed:?}")]
    Timeout {
        tool: &'static str,
        elapsed: Duration,
    },
    #[error("pdal info output could not be parsed: {detail}")]
    ProbeFormat { detail: String },
    #[error("pipeline document could not be encoded: {detail}")]
    PipelineEncode { detail: String },
    #[error("raster output missing or empty: {path:?}")]
    OutputMissing { path: PathBuf },
    #[error("raster output unreadable: {path:?}: {detail}")]
    OutputUnreadable { path: PathBuf, detail: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// True for the per-view deadline expiring, as opposed to the backend
    /// rejecting or mangling the work.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout { .. })
    }
}
