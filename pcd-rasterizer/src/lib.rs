pub mod backend;
pub mod error;
pub mod gdal;
pub mod pdal;
pub mod pipeline;
pub mod process;
pub mod readback;

pub use backend::{PdalBackend, RasterBackend, RenderTask};
pub use error::BackendError;
