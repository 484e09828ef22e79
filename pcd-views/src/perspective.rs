use pcd_core::pointcloud::cloud::CloudMetadata;
use pcd_core::raster::view::ViewSpec;

use crate::planner::{cloud_extent, PlanError, ViewPlan, ViewPlanner};

const ELEVATION_MIN: f64 = 60.0;
const ELEVATION_MAX: f64 = 89.0;
const ELEVATION_STEPS: usize = 8;

/// Nominal camera orbits around the cloud. Every view renders the full
/// bounds: the backend only rasterizes orthographically, so the azimuth and
/// elevation attached to each view vary the filenames, not the pixels. The
/// plan carries a warning stating exactly that; callers must not treat these
/// views as truly distinct perspectives.
pub struct PerspectivePlanner {
    pub count: u32,
}

impl ViewPlanner for PerspectivePlanner {
    fn plan(&self, metadata: &CloudMetadata) -> Result<ViewPlan, PlanError> {
        let extent = cloud_extent(metadata)?;
        let count = self.count as usize;

        let specs = (0..count)
            .map(|i| {
                let azimuth = i as f64 * 360.0 / count as f64;
                let elevation = ELEVATION_MIN
                    + (i % ELEVATION_STEPS) as f64
                        * ((ELEVATION_MAX - ELEVATION_MIN) / (ELEVATION_STEPS - 1) as f64);
                ViewSpec {
                    index: i + 1,
                    extent,
                    azimuth,
                    elevation,
                    crops: false,
                }
            })
            .collect();

        Ok(ViewPlan {
            specs,
            warnings: vec![
                "perspective views share the full cloud extent; the backend renders \
                 orthographically, so pixel content is near-identical across views and only \
                 the angles encoded in the filenames differ"
                    .to_string(),
            ],
        })
    }
}
