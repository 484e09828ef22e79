use pcd_core::pointcloud::cloud::CloudMetadata;
use pcd_core::raster::view::{ViewExtent, ViewSpec};

use crate::planner::{cloud_extent, PlanError, ViewPlan, ViewPlanner};

// A tile_size larger than the cloud is shrunk to this share of the longest
// side so the grid still yields several overlapping views.
const OVERSIZE_TILE_SHRINK: f64 = 0.4;

/// A row-major grid of overlapping square tiles, each rendered nadir. Tiles
/// are clamped to the cloud bounds; slivers with no area are skipped.
pub struct TiledPlanner {
    pub tile_size: f64,
    pub overlap: f64,
    pub count: u32,
}

impl ViewPlanner for TiledPlanner {
    fn plan(&self, metadata: &CloudMetadata) -> Result<ViewPlan, PlanError> {
        let bounds = cloud_extent(metadata)?;
        let width = bounds.width();
        let height = bounds.height();
        let mut warnings = Vec::new();

        let mut tile_size = self.tile_size;
        let longest_side = width.max(height);
        if tile_size > longest_side {
            let shrunk = longest_side * OVERSIZE_TILE_SHRINK;
            warnings.push(format!(
                "tile size {:.2}m exceeds the cloud extent {:.2}m, shrinking to {:.2}m",
                tile_size, longest_side, shrunk
            ));
            tile_size = shrunk;
        }

        // overlap < 1 is guaranteed by request validation, so the step stays
        // positive.
        let step = tile_size * (1.0 - self.overlap);
        let cols = (width / step).ceil().max(1.0) as usize;
        let rows = (height / step).ceil().max(1.0) as usize;
        log::debug!(
            "tile grid: {} columns x {} rows ({}m tiles, {}m step)",
            cols,
            rows,
            tile_size,
            step
        );

        let requested = self.count as usize;
        let total = rows.saturating_mul(cols);

        // A fine step over a large cloud implies a grid orders of magnitude
        // bigger than anything the job keeps; never materialize past the
        // requested count.
        let mut specs = Vec::new();
        'grid: for row in 0..rows {
            for col in 0..cols {
                if specs.len() == requested {
                    break 'grid;
                }
                let min_x = bounds.min[0] + col as f64 * step;
                let min_y = bounds.min[1] + row as f64 * step;
                let extent = ViewExtent {
                    min: [min_x.max(bounds.min[0]), min_y.max(bounds.min[1])],
                    max: [
                        (min_x + tile_size).min(bounds.max[0]),
                        (min_y + tile_size).min(bounds.max[1]),
                    ],
                };
                if !extent.has_area() {
                    continue;
                }
                specs.push(ViewSpec {
                    index: specs.len() + 1,
                    extent,
                    azimuth: 0.0,
                    elevation: 90.0,
                    crops: extent != bounds,
                });
            }
        }

        if total > requested {
            warnings.push(format!(
                "tile grid yields {} views, keeping the first {} in row-major order",
                total, requested
            ));
        } else if specs.len() < requested {
            warnings.push(format!(
                "tile grid yields only {} of the {} requested views",
                specs.len(),
                requested
            ));
        }

        Ok(ViewPlan { specs, warnings })
    }
}
