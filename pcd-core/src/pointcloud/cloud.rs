use std::path::PathBuf;

// Coordinates are in the units of the cloud's CRS, meters for the projected
// systems this tool is used with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundingVolume {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingVolume {
    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn footprint_area(&self) -> f64 {
        self.width() * self.height()
    }
}

/// Metadata reported by the rasterization backend's probe of a cloud file.
/// Immutable for the duration of a conversion job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudMetadata {
    pub bounding_volume: BoundingVolume,
    pub point_count: u64,
    pub dimensions: Vec<String>,
}

impl CloudMetadata {
    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimensions.iter().any(|d| d.eq_ignore_ascii_case(name))
    }

    pub fn missing_dimensions(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| !self.has_dimension(name))
            .map(|name| name.to_string())
            .collect()
    }

    /// Points per square meter of ground footprint, if the footprint has area.
    pub fn point_density(&self) -> Option<f64> {
        let area = self.bounding_volume.footprint_area();
        if area > 0.0 && self.point_count > 0 {
            Some(self.point_count as f64 / area)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct CloudSource {
    pub path: PathBuf,
    pub metadata: CloudMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_metadata(width: f64, height: f64, point_count: u64) -> CloudMetadata {
        CloudMetadata {
            bounding_volume: BoundingVolume {
                min: [100.0, 200.0, 0.0],
                max: [100.0 + width, 200.0 + height, 10.0],
            },
            point_count,
            dimensions: vec![
                "X".to_string(),
                "Y".to_string(),
                "Z".to_string(),
                "Intensity".to_string(),
            ],
        }
    }

    #[test]
    fn dimension_lookup_ignores_case() {
        let metadata = make_metadata(10.0, 10.0, 100);
        assert!(metadata.has_dimension("Intensity"));
        assert!(metadata.has_dimension("intensity"));
        assert!(!metadata.has_dimension("Red"));
    }

    #[test]
    fn missing_dimensions_are_listed_in_order() {
        let metadata = make_metadata(10.0, 10.0, 100);
        let missing = metadata.missing_dimensions(&["Red", "Z", "Blue"]);
        assert_eq!(missing, vec!["Red".to_string(), "Blue".to_string()]);
    }

    #[test]
    fn point_density_over_footprint() {
        let metadata = make_metadata(100.0, 100.0, 1_000_000);
        assert_eq!(metadata.point_density(), Some(100.0));
    }

    #[test]
    fn point_density_is_none_for_flat_bounds() {
        let metadata = make_metadata(0.0, 100.0, 1_000_000);
        assert_eq!(metadata.point_density(), None);
        let empty = make_metadata(100.0, 100.0, 0);
        assert_eq!(empty.point_density(), None);
    }
}
