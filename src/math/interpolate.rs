use crate::grid::GridLevel;
use ndarray::{Array1, Array3};
use num_traits::Float;

/// Generic linear interpolation between two values.
pub fn lin_interp<T: Float>(v0: T, v1: T, fac: T) -> T {
    v0 + (v1 - v0) * fac
}

/// Linear interpolation between two points (traditional interface).
pub fn linear_interpolate(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    if (x1 - x0).abs() < f64::EPSILON {
        return y0; // Avoid division by zero
    }
    let fac = (x - x0) / (x1 - x0);
    lin_interp(y0, y1, fac)
}

/// Generic bilinear interpolation between four corner values.
pub fn bilin_interp<T: Float>(f00: T, f01: T, f10: T, f11: T, fac_x: T, fac_y: T) -> T {
    let f_y0 = lin_interp(f00, f10, fac_x);
    let f_y1 = lin_interp(f01, f11, fac_x);
    lin_interp(f_y0, f_y1, fac_y)
}

/// Locate the cell of a monotone increasing coordinate axis that brackets
/// `target`, returning the lower index and the fractional position inside
/// the cell. `None` when the target falls outside the axis range; queries
/// outside the grid are never extrapolated.
pub fn find_bracket(coords: &Array1<f64>, target: f64) -> Option<(usize, f64)> {
    let n = coords.len();
    if n < 2 || target < coords[0] || target > coords[n - 1] {
        return None;
    }
    if target == coords[n - 1] {
        return Some((n - 2, 1.0));
    }

    // Binary search for the bracketing cell
    let mut left = 0;
    let mut right = n - 1;
    while right - left > 1 {
        let mid = (left + right) / 2;
        if coords[mid] <= target {
            left = mid;
        } else {
            right = mid;
        }
    }

    let weight = (target - coords[left]) / (coords[right] - coords[left]);
    Some((left, weight))
}

/// Trilinear sample of a regular-grid field at one (z, y, x) point.
///
/// Returns NaN outside the grid bounds, and NaN whenever any of the eight
/// surrounding corner values is NaN (masked data stays masked).
pub fn sample_trilinear(
    z_coords: &Array1<f64>,
    y_coords: &Array1<f64>,
    x_coords: &Array1<f64>,
    data: &Array3<f64>,
    z: f64,
    y: f64,
    x: f64,
) -> f64 {
    let (k, wz) = match find_bracket(z_coords, z) {
        Some(b) => b,
        None => return f64::NAN,
    };
    let (j, wy) = match find_bracket(y_coords, y) {
        Some(b) => b,
        None => return f64::NAN,
    };
    let (i, wx) = match find_bracket(x_coords, x) {
        Some(b) => b,
        None => return f64::NAN,
    };

    // Interpolate along z first, then bilinearly in the xy-plane
    let f00 = lin_interp(data[[k, j, i]], data[[k + 1, j, i]], wz);
    let f01 = lin_interp(data[[k, j, i + 1]], data[[k + 1, j, i + 1]], wz);
    let f10 = lin_interp(data[[k, j + 1, i]], data[[k + 1, j + 1, i]], wz);
    let f11 = lin_interp(data[[k, j + 1, i + 1]], data[[k + 1, j + 1, i + 1]], wz);
    bilin_interp(f00, f01, f10, f11, wx, wy)
}

/// Resample a field defined on `from` at every node of `to`.
///
/// Nodes of `to` falling outside `from` get NaN.
pub fn resample_field(data: &Array3<f64>, from: &GridLevel, to: &GridLevel) -> Array3<f64> {
    Array3::from_shape_fn(to.shape(), |(k, j, i)| {
        sample_trilinear(
            &from.z,
            &from.y,
            &from.x,
            data,
            to.z[k],
            to.y[j],
            to.x[i],
        )
    })
}

/// Linearly interpolate a 1D profile onto new levels, NaN outside the
/// profile's own range.
pub fn interpolate_profile(
    profile_z: &Array1<f64>,
    profile: &Array1<f64>,
    levels: &Array1<f64>,
) -> Array1<f64> {
    Array1::from_shape_fn(levels.len(), |k| match find_bracket(profile_z, levels[k]) {
        Some((i, w)) => lin_interp(profile[i], profile[i + 1], w),
        None => f64::NAN,
    })
}
