use crate::grid::{GridField, RadarGrid};
use ndarray::{Array1, Array2, Array3};

/// Mean Earth radius (m).
const EARTH_RADIUS: f64 = 6_371_000.0;

/// Project a geographic point to grid-relative Cartesian coordinates (m)
/// with an equirectangular projection about the grid origin.
pub fn geographic_to_cartesian(
    lon: f64,
    lat: f64,
    origin_lon: f64,
    origin_lat: f64,
) -> (f64, f64) {
    let x = EARTH_RADIUS * (lon - origin_lon).to_radians() * origin_lat.to_radians().cos();
    let y = EARTH_RADIUS * (lat - origin_lat).to_radians();
    (x, y)
}

/// Beam crossing angle between two radar sites at every (y, x) grid cell,
/// in radians, by the law of cosines on the projected plane.
///
/// Cells coincident with either radar site have no defined crossing angle
/// and get NaN.
pub fn beam_crossing_angle(
    radar1_lon: f64,
    radar1_lat: f64,
    radar2_lon: f64,
    radar2_lat: f64,
    origin_lon: f64,
    origin_lat: f64,
    x: &Array1<f64>,
    y: &Array1<f64>,
) -> Array2<f64> {
    let (x1, y1) = geographic_to_cartesian(radar1_lon, radar1_lat, origin_lon, origin_lat);
    let (x2, y2) = geographic_to_cartesian(radar2_lon, radar2_lat, origin_lon, origin_lat);
    let baseline = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();

    Array2::from_shape_fn((y.len(), x.len()), |(j, i)| {
        let a = ((x[i] - x1).powi(2) + (y[j] - y1).powi(2)).sqrt();
        let b = ((x[i] - x2).powi(2) + (y[j] - y2).powi(2)).sqrt();
        if a == 0.0 || b == 0.0 {
            return f64::NAN;
        }
        let cos_angle = (a * a + b * b - baseline * baseline) / (2.0 * a * b);
        cos_angle.clamp(-1.0, 1.0).acos()
    })
}

/// Grid-relative Cartesian position of a grid's radar site.
fn radar_position(grid: &RadarGrid) -> (f64, f64) {
    geographic_to_cartesian(
        grid.radar_longitude,
        grid.radar_latitude,
        grid.origin_longitude,
        grid.origin_latitude,
    )
}

/// Attach the per-cell azimuth from the radar site (degrees clockwise from
/// north) as an `azimuth` field on the grid.
pub fn add_azimuth_field(grid: &mut RadarGrid) {
    let (xr, yr) = radar_position(grid);
    let shape = grid.shape();
    let (x, y) = (grid.x.clone(), grid.y.clone());

    let data = Array3::from_shape_fn(shape, |(_, j, i)| {
        (x[i] - xr).atan2(y[j] - yr).to_degrees()
    });
    grid.add_field(
        "azimuth",
        GridField::new(data, "azimuth", "azimuth angle from radar", "degrees"),
    );
}

/// Attach the per-cell elevation angle above the radar horizon (degrees)
/// as an `elevation` field on the grid.
pub fn add_elevation_field(grid: &mut RadarGrid) {
    let (xr, yr) = radar_position(grid);
    let shape = grid.shape();
    let (x, y, z) = (grid.x.clone(), grid.y.clone(), grid.z.clone());
    let altitude = grid.radar_altitude;

    let data = Array3::from_shape_fn(shape, |(k, j, i)| {
        let range = ((x[i] - xr).powi(2) + (y[j] - yr).powi(2)).sqrt();
        (z[k] - altitude).atan2(range).to_degrees()
    });
    grid.add_field(
        "elevation",
        GridField::new(data, "elevation", "elevation angle from radar", "degrees"),
    );
}
