use crate::pointcloud::cloud::BoundingVolume;

/// The 2D ground-plane region one view renders.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewExtent {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl ViewExtent {
    pub fn from_bounding_volume(volume: &BoundingVolume) -> Self {
        ViewExtent {
            min: [volume.min[0], volume.min[1]],
            max: [volume.max[0], volume.max[1]],
        }
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn has_area(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }
}

/// One planned output image. Produced once per job by the view planner,
/// consumed exactly once by the rasterization backend. `index` is 1-based,
/// stable, and determines output ordering across repeated runs.
///
/// `azimuth` and `elevation` are synthetic tags carried into filenames; the
/// backend renders orthographically regardless of their values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSpec {
    pub index: usize,
    pub extent: ViewExtent,
    pub azimuth: f64,
    pub elevation: f64,
    /// True when `extent` is a proper subset of the cloud bounds and the
    /// backend must crop before rasterizing.
    pub crops: bool,
}
