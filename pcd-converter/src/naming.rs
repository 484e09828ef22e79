use pcd_core::raster::request::RasterMode;
use pcd_core::raster::view::ViewSpec;

/// Output filename for one rendered view. Angles are rounded to whole
/// degrees; the zero-padded index keeps names unique and sortable even when
/// rounded angles coincide.
pub fn view_file_name(
    basename: &str,
    mode: RasterMode,
    view: &ViewSpec,
    extension: &str,
) -> String {
    format!(
        "{}_{}_view_{:03}_az{}_el{}.{}",
        basename,
        mode,
        view.index,
        view.azimuth.round() as i64,
        view.elevation.round() as i64,
        extension
    )
}

pub fn manifest_file_name(basename: &str) -> String {
    format!("{}_manifest.json", basename)
}
