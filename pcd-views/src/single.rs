use pcd_core::pointcloud::cloud::CloudMetadata;
use pcd_core::raster::view::ViewSpec;

use crate::planner::{cloud_extent, PlanError, ViewPlan, ViewPlanner};

/// One nadir view covering the whole cloud.
pub struct SinglePlanner;

impl ViewPlanner for SinglePlanner {
    fn plan(&self, metadata: &CloudMetadata) -> Result<ViewPlan, PlanError> {
        let extent = cloud_extent(metadata)?;
        Ok(ViewPlan {
            specs: vec![ViewSpec {
                index: 1,
                extent,
                azimuth: 0.0,
                elevation: 90.0,
                crops: false,
            }],
            warnings: Vec::new(),
        })
    }
}
