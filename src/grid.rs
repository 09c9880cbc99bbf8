use ndarray::{Array1, Array3};
use std::collections::HashMap;
use thiserror::Error;

/// Absolute tolerance for coordinate agreement between grids (m).
pub const COORD_TOLERANCE: f64 = 10.0;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("at least one input grid is required")]
    EmptyGridList,

    #[error("grid {index} does not have equal {axis} coordinates")]
    CoordinateMismatch { index: usize, axis: &'static str },

    #[error("grid {index} has a different origin latitude")]
    OriginMismatch { index: usize },

    #[error("field not found on grid: {0}")]
    MissingField(String),

    #[error("axis {axis} needs at least two points, found {len}")]
    DegenerateAxis { axis: &'static str, len: usize },
}

/// One named data field on a radar grid. Masked cells are NaN.
#[derive(Clone, Debug)]
pub struct GridField {
    pub data: Array3<f64>,
    pub standard_name: String,
    pub long_name: String,
    pub units: String,
    /// Numeric metadata carried alongside the data
    pub attributes: HashMap<String, f64>,
}

impl GridField {
    pub fn new(data: Array3<f64>, standard_name: &str, long_name: &str, units: &str) -> Self {
        Self {
            data,
            standard_name: standard_name.to_string(),
            long_name: long_name.to_string(),
            units: units.to_string(),
            attributes: HashMap::new(),
        }
    }
}

/// A radar's Cartesian analysis grid: coordinate arrays in a shared
/// projected system, named 3D data fields, and site metadata.
///
/// The solver only reads coordinates and fields and writes the retrieved
/// u/v/w plus derived azimuth/elevation fields.
#[derive(Clone, Debug)]
pub struct RadarGrid {
    /// East-west coordinates relative to the grid origin (m)
    pub x: Array1<f64>,
    /// North-south coordinates relative to the grid origin (m)
    pub y: Array1<f64>,
    /// Heights above the grid origin (m)
    pub z: Array1<f64>,
    pub origin_latitude: f64,
    pub origin_longitude: f64,
    pub radar_latitude: f64,
    pub radar_longitude: f64,
    /// Radar antenna height above the grid origin (m)
    pub radar_altitude: f64,
    pub fields: HashMap<String, GridField>,
}

impl RadarGrid {
    /// Grid shape as (nz, ny, nx).
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.z.len(), self.y.len(), self.x.len())
    }

    pub fn field(&self, name: &str) -> Result<&GridField, GridError> {
        self.fields
            .get(name)
            .ok_or_else(|| GridError::MissingField(name.to_string()))
    }

    /// Insert a field, replacing any existing one with the same name.
    pub fn add_field(&mut self, name: &str, field: GridField) {
        self.fields.insert(name.to_string(), field);
    }

    /// Grid spacing (dx, dy, dz) from the first coordinate differences.
    pub fn spacing(&self) -> Result<(f64, f64, f64), GridError> {
        for (axis, coords) in [("x", &self.x), ("y", &self.y), ("z", &self.z)] {
            if coords.len() < 2 {
                return Err(GridError::DegenerateAxis {
                    axis,
                    len: coords.len(),
                });
            }
        }
        Ok((
            self.x[1] - self.x[0],
            self.y[1] - self.y[0],
            self.z[1] - self.z[0],
        ))
    }

    /// The fine resolution level spanned by this grid's coordinates.
    pub fn level(&self) -> GridLevel {
        GridLevel::new(self.z.clone(), self.y.clone(), self.x.clone())
    }
}

/// The coordinate triple of one resolution level plus the matching 3D
/// meshgrid arrays used for interpolation queries.
#[derive(Clone, Debug)]
pub struct GridLevel {
    pub z: Array1<f64>,
    pub y: Array1<f64>,
    pub x: Array1<f64>,
    pub z_pts: Array3<f64>,
    pub y_pts: Array3<f64>,
    pub x_pts: Array3<f64>,
}

impl GridLevel {
    pub fn new(z: Array1<f64>, y: Array1<f64>, x: Array1<f64>) -> Self {
        let shape = (z.len(), y.len(), x.len());
        let z_pts = Array3::from_shape_fn(shape, |(k, _, _)| z[k]);
        let y_pts = Array3::from_shape_fn(shape, |(_, j, _)| y[j]);
        let x_pts = Array3::from_shape_fn(shape, |(_, _, i)| x[i]);
        Self {
            z,
            y,
            x,
            z_pts,
            y_pts,
            x_pts,
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.z.len(), self.y.len(), self.x.len())
    }

    pub fn n_points(&self) -> usize {
        self.z.len() * self.y.len() * self.x.len()
    }
}

/// Verify that every grid shares the coordinate system of the first one.
///
/// Coordinates must agree within [`COORD_TOLERANCE`] on every axis and the
/// origin latitude must match exactly. The first offending grid index and
/// axis are reported.
pub fn check_grid_conformance(grids: &[RadarGrid]) -> Result<(), GridError> {
    let first = grids.first().ok_or(GridError::EmptyGridList)?;

    for (index, grid) in grids.iter().enumerate().skip(1) {
        for (axis, a, b) in [
            ("x", &grid.x, &first.x),
            ("y", &grid.y, &first.y),
            ("z", &grid.z, &first.z),
        ] {
            let equal = a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(p, q)| (p - q).abs() <= COORD_TOLERANCE);
            if !equal {
                return Err(GridError::CoordinateMismatch { index, axis });
            }
        }
        if grid.origin_latitude != first.origin_latitude {
            return Err(GridError::OriginMismatch { index });
        }
    }
    Ok(())
}
