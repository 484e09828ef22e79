use thiserror::Error;

use pcd_core::pointcloud::cloud::CloudMetadata;
use pcd_core::raster::request::{ConversionRequest, ViewStrategy};
use pcd_core::raster::view::{ViewExtent, ViewSpec};

use crate::perspective::PerspectivePlanner;
use crate::single::SinglePlanner;
use crate::tiled::TiledPlanner;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("cloud bounds span {width}m x {height}m and enclose no area to render")]
    DegenerateBounds { width: f64, height: f64 },
}

/// The ordered set of views one job will render, plus anything the planner
/// wants the caller to know about how it arrived at them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewPlan {
    pub specs: Vec<ViewSpec>,
    pub warnings: Vec<String>,
}

pub trait ViewPlanner {
    fn plan(&self, metadata: &CloudMetadata) -> Result<ViewPlan, PlanError>;
}

pub trait PlannerBuilder {
    fn build(&self) -> Box<dyn ViewPlanner>;
}

/// Selects the planner for a request's strategy.
pub struct RequestPlannerBuilder {
    strategy: ViewStrategy,
    count: u32,
    tile_size: f64,
    overlap: f64,
}

impl RequestPlannerBuilder {
    pub fn new(request: &ConversionRequest) -> Self {
        RequestPlannerBuilder {
            strategy: request.strategy,
            count: request.count,
            tile_size: request.tile_size,
            overlap: request.overlap,
        }
    }
}

impl PlannerBuilder for RequestPlannerBuilder {
    fn build(&self) -> Box<dyn ViewPlanner> {
        match self.strategy {
            ViewStrategy::Single => Box::new(SinglePlanner),
            ViewStrategy::Tiled => Box::new(TiledPlanner {
                tile_size: self.tile_size,
                overlap: self.overlap,
                count: self.count,
            }),
            ViewStrategy::Perspective => Box::new(PerspectivePlanner { count: self.count }),
        }
    }
}

/// The cloud's ground footprint, rejected when it has no area.
pub(crate) fn cloud_extent(metadata: &CloudMetadata) -> Result<ViewExtent, PlanError> {
    let extent = ViewExtent::from_bounding_volume(&metadata.bounding_volume);
    if !extent.has_area() {
        return Err(PlanError::DegenerateBounds {
            width: extent.width(),
            height: extent.height(),
        });
    }
    Ok(extent)
}
