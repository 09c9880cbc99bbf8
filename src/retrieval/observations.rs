use crate::config::SolverOptions;
use crate::cost::RadarObservation;
use crate::grid::{GridError, RadarGrid};
use crate::retrieval::geometry::{add_azimuth_field, add_elevation_field};
use log::debug;
use ndarray::Array3;

/// Terminal hydrometeor fall speed from reflectivity.
///
/// Power law `vt = a * 10^(b * refl) * (rho0 / rho)^0.4` with (a, b)
/// selected by reflectivity band and by height relative to the freezing
/// level; `rho = exp(-z / 10000)` is the relative air density. Cells with
/// masked reflectivity get NaN.
pub fn calculate_fall_speed(
    grid: &RadarGrid,
    reflectivity_field: &str,
    freezing_level: f64,
) -> Result<Array3<f64>, GridError> {
    let refl = &grid.field(reflectivity_field)?.data;
    let z = &grid.z;

    let data = Array3::from_shape_fn(refl.dim(), |(k, j, i)| {
        let dbz = refl[[k, j, i]];
        if !dbz.is_finite() {
            return f64::NAN;
        }
        let (a, b) = if z[k] < freezing_level {
            match dbz {
                d if d < 55.0 => (-2.6, 0.0107),
                d if d < 60.0 => (-2.5, 0.013),
                _ => (-3.95, 0.0148),
            }
        } else {
            match dbz {
                d if d < 33.0 => (-0.817, 0.0063),
                d if d < 49.0 => (-2.5, 0.013),
                _ => (-3.95, 0.0148),
            }
        };
        let rho = (-z[k] / 10_000.0).exp();
        a * 10f64.powf(b * dbz) * (1.2 / rho).powf(0.4)
    });
    Ok(data)
}

/// Read the radial velocity, annotate azimuth/elevation fields, compute
/// fall speeds, and bundle one radar's observation arrays.
///
/// The azimuth/elevation fields are written back onto the grid in degrees
/// and carried in the observation set in radians.
pub fn build_observation(
    grid: &mut RadarGrid,
    options: &SolverOptions,
) -> Result<RadarObservation, GridError> {
    let fall_speed =
        calculate_fall_speed(grid, &options.reflectivity_field, options.freezing_level)?;
    add_azimuth_field(grid);
    add_elevation_field(grid);

    let radial_velocity = grid.field(&options.velocity_field)?.data.clone();
    let azimuth = grid.field("azimuth")?.data.mapv(f64::to_radians);
    let elevation = grid.field("elevation")?.data.mapv(f64::to_radians);

    let n_valid = radial_velocity.iter().filter(|v| v.is_finite()).count();
    debug!(
        "observation set built: {} of {} cells valid",
        n_valid,
        radial_velocity.len()
    );

    Ok(RadarObservation {
        radial_velocity,
        fall_speed,
        azimuth,
        elevation,
    })
}

/// RMS of the weighted radial velocities over all radars, skipping masked
/// entries. Zero under zero coverage rather than a division failure.
pub fn rms_radial_velocity(observations: &[RadarObservation], weights: &[Array3<f64>]) -> f64 {
    let mut sum_sq = 0.0;
    let mut sum_weights = 0.0;
    for (obs, weight) in observations.iter().zip(weights) {
        for (&vr, &wgt) in obs.radial_velocity.iter().zip(weight.iter()) {
            let weighted = vr * wgt;
            if weighted.is_finite() {
                sum_sq += weighted * weighted;
            }
            if wgt.is_finite() {
                sum_weights += wgt;
            }
        }
    }
    if sum_weights > 0.0 {
        sum_sq / sum_weights
    } else {
        0.0
    }
}
