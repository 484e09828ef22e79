use std::path::Path;

use serde::Serialize;

use pcd_core::raster::request::RasterMode;
use pcd_core::raster::view::{ViewExtent, ViewSpec};

const GDALOPTS: &str = "COMPRESS=DEFLATE,PREDICTOR=2,BIGTIFF=IF_SAFER";
// PREDICTOR=2 only applies to integer samples.
const GDALOPTS_FLOAT: &str = "COMPRESS=DEFLATE,BIGTIFF=IF_SAFER";

/// One stage of a PDAL pipeline document. Serialized in order into the
/// `pipeline` array that `pdal pipeline` executes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Stage {
    #[serde(rename = "readers.las")]
    ReadLas { filename: String },
    #[serde(rename = "filters.crop")]
    Crop { bounds: String },
    #[serde(rename = "writers.gdal")]
    WriteGdal {
        filename: String,
        resolution: f64,
        radius: f64,
        output_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        dimension: Option<String>,
        data_type: String,
        nodata: i32,
        gdalopts: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
    pub pipeline: Vec<Stage>,
}

/// How one output band of a mode maps onto `writers.gdal` options. Scalar
/// modes have exactly one target; rgb has three that get stacked afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandTarget {
    pub dimension: Option<&'static str>,
    pub output_type: &'static str,
    pub data_type: &'static str,
    pub gdalopts: &'static str,
    /// Distinguishes the intermediate per-band files of multi-band modes.
    pub band_suffix: Option<&'static str>,
}

const INTENSITY_TARGETS: [BandTarget; 1] = [BandTarget {
    dimension: Some("Intensity"),
    output_type: "mean",
    data_type: "uint16_t",
    gdalopts: GDALOPTS,
    band_suffix: None,
}];

const ELEVATION_TARGETS: [BandTarget; 1] = [BandTarget {
    dimension: Some("Z"),
    output_type: "mean",
    data_type: "float32",
    gdalopts: GDALOPTS_FLOAT,
    band_suffix: None,
}];

// Density counts points per cell, so no source dimension is named.
const COUNT_TARGETS: [BandTarget; 1] = [BandTarget {
    dimension: None,
    output_type: "count",
    data_type: "uint32_t",
    gdalopts: GDALOPTS,
    band_suffix: None,
}];

const RGB_TARGETS: [BandTarget; 3] = [
    BandTarget {
        dimension: Some("Red"),
        output_type: "mean",
        data_type: "uint16_t",
        gdalopts: GDALOPTS,
        band_suffix: Some("red"),
    },
    BandTarget {
        dimension: Some("Green"),
        output_type: "mean",
        data_type: "uint16_t",
        gdalopts: GDALOPTS,
        band_suffix: Some("green"),
    },
    BandTarget {
        dimension: Some("Blue"),
        output_type: "mean",
        data_type: "uint16_t",
        gdalopts: GDALOPTS,
        band_suffix: Some("blue"),
    },
];

pub fn band_targets(mode: RasterMode) -> &'static [BandTarget] {
    match mode {
        RasterMode::Rgb => &RGB_TARGETS,
        RasterMode::Intensity => &INTENSITY_TARGETS,
        RasterMode::Elevation => &ELEVATION_TARGETS,
        RasterMode::Count => &COUNT_TARGETS,
    }
}

/// Bounds in the `([minx,maxx],[miny,maxy])` form `filters.crop` expects.
pub fn crop_bounds(extent: &ViewExtent) -> String {
    format!(
        "([{},{}],[{},{}])",
        extent.min[0], extent.max[0], extent.min[1], extent.max[1]
    )
}

/// The pipeline rendering one band of one view: read, crop when the view
/// narrows the cloud, rasterize.
pub fn view_pipeline(
    cloud: &Path,
    output: &Path,
    target: &BandTarget,
    view: &ViewSpec,
    resolution: f64,
) -> Pipeline {
    let mut stages = vec![Stage::ReadLas {
        filename: cloud.to_string_lossy().into_owned(),
    }];
    if view.crops {
        stages.push(Stage::Crop {
            bounds: crop_bounds(&view.extent),
        });
    }
    stages.push(Stage::WriteGdal {
        filename: output.to_string_lossy().into_owned(),
        resolution,
        radius: resolution,
        output_type: target.output_type.to_string(),
        dimension: target.dimension.map(|d| d.to_string()),
        data_type: target.data_type.to_string(),
        nodata: 0,
        gdalopts: target.gdalopts.to_string(),
    });
    Pipeline { pipeline: stages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn full_view() -> ViewSpec {
        ViewSpec {
            index: 1,
            extent: ViewExtent {
                min: [0.0, 0.0],
                max: [100.0, 100.0],
            },
            azimuth: 0.0,
            elevation: 90.0,
            crops: false,
        }
    }

    fn cropped_view() -> ViewSpec {
        ViewSpec {
            index: 4,
            extent: ViewExtent {
                min: [10.0, 20.0],
                max: [60.0, 80.0],
            },
            azimuth: 0.0,
            elevation: 90.0,
            crops: true,
        }
    }

    #[test]
    fn intensity_pipeline_document() {
        let targets = band_targets(RasterMode::Intensity);
        assert_eq!(targets.len(), 1);
        let pipeline = view_pipeline(
            &PathBuf::from("/in/scan.laz"),
            &PathBuf::from("/out/scan.tif"),
            &targets[0],
            &full_view(),
            0.1,
        );
        let doc = serde_json::to_value(&pipeline).unwrap();
        assert_eq!(
            doc,
            json!({
                "pipeline": [
                    {"type": "readers.las", "filename": "/in/scan.laz"},
                    {
                        "type": "writers.gdal",
                        "filename": "/out/scan.tif",
                        "resolution": 0.1,
                        "radius": 0.1,
                        "output_type": "mean",
                        "dimension": "Intensity",
                        "data_type": "uint16_t",
                        "nodata": 0,
                        "gdalopts": "COMPRESS=DEFLATE,PREDICTOR=2,BIGTIFF=IF_SAFER"
                    }
                ]
            })
        );
    }

    #[test]
    fn cropped_views_insert_a_crop_stage() {
        let targets = band_targets(RasterMode::Intensity);
        let pipeline = view_pipeline(
            &PathBuf::from("in.las"),
            &PathBuf::from("out.tif"),
            &targets[0],
            &cropped_view(),
            0.5,
        );
        assert_eq!(pipeline.pipeline.len(), 3);
        assert_eq!(
            pipeline.pipeline[1],
            Stage::Crop {
                bounds: "([10,60],[20,80])".to_string()
            }
        );
    }

    #[test]
    fn elevation_writes_float32_without_predictor() {
        let targets = band_targets(RasterMode::Elevation);
        let pipeline = view_pipeline(
            &PathBuf::from("in.las"),
            &PathBuf::from("out.tif"),
            &targets[0],
            &full_view(),
            0.2,
        );
        match &pipeline.pipeline[1] {
            Stage::WriteGdal {
                dimension,
                data_type,
                gdalopts,
                output_type,
                ..
            } => {
                assert_eq!(dimension.as_deref(), Some("Z"));
                assert_eq!(data_type, "float32");
                assert_eq!(output_type, "mean");
                assert!(!gdalopts.contains("PREDICTOR"));
            }
            other => panic!("expected writers.gdal, got {:?}", other),
        }
    }

    #[test]
    fn count_mode_rasterizes_occurrences_without_a_dimension() {
        let targets = band_targets(RasterMode::Count);
        let pipeline = view_pipeline(
            &PathBuf::from("in.las"),
            &PathBuf::from("out.tif"),
            &targets[0],
            &full_view(),
            0.1,
        );
        let doc = serde_json::to_value(&pipeline).unwrap();
        let writer = &doc["pipeline"][1];
        assert_eq!(writer["output_type"], "count");
        assert_eq!(writer["data_type"], "uint32_t");
        assert!(writer.get("dimension").is_none());
    }

    #[test]
    fn rgb_splits_into_three_band_targets() {
        let targets = band_targets(RasterMode::Rgb);
        let dims: Vec<_> = targets.iter().map(|t| t.dimension.unwrap()).collect();
        assert_eq!(dims, vec!["Red", "Green", "Blue"]);
        for target in targets {
            assert_eq!(target.data_type, "uint16_t");
            assert!(target.band_suffix.is_some());
        }
    }

    #[test]
    fn crop_bounds_formats_min_max_pairs() {
        let extent = ViewExtent {
            min: [500.25, 600.5],
            max: [570.25, 670.5],
        };
        assert_eq!(crop_bounds(&extent), "([500.25,570.25],[600.5,670.5])");
    }
}
