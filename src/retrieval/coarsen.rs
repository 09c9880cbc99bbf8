use crate::cost::{LevelBackground, ModelWinds, RadarObservation, WeightSet};
use crate::grid::GridLevel;
use crate::math::interpolate::resample_field;
use ndarray::Array1;

/// Midpoints of consecutive coordinate pairs: the coarse axis has half the
/// node count of the fine axis.
pub fn coarsen_axis(coords: &Array1<f64>) -> Array1<f64> {
    let n = coords.len() / 2;
    Array1::from_shape_fn(n, |i| (coords[2 * i] + coords[2 * i + 1]) / 2.0)
}

/// Pairwise average of a per-level profile, matching [`coarsen_axis`].
pub fn coarsen_profile(profile: &Array1<f64>) -> Array1<f64> {
    let n = profile.len() / 2;
    Array1::from_shape_fn(n, |i| (profile[2 * i] + profile[2 * i + 1]) / 2.0)
}

/// Build the half-resolution level from a fine level.
pub fn coarsen_level(fine: &GridLevel) -> GridLevel {
    GridLevel::new(
        coarsen_axis(&fine.z),
        coarsen_axis(&fine.y),
        coarsen_axis(&fine.x),
    )
}

/// Restrict one radar's observation arrays onto the coarse level.
///
/// Resampling is trilinear; out-of-bounds queries return NaN and stay
/// masked rather than being extrapolated.
pub fn restrict_observation(
    obs: &RadarObservation,
    fine: &GridLevel,
    coarse: &GridLevel,
) -> RadarObservation {
    RadarObservation {
        radial_velocity: resample_field(&obs.radial_velocity, fine, coarse),
        fall_speed: resample_field(&obs.fall_speed, fine, coarse),
        azimuth: resample_field(&obs.azimuth, fine, coarse),
        elevation: resample_field(&obs.elevation, fine, coarse),
    }
}

/// Restrict a full weight set onto the coarse level.
pub fn restrict_weights(weights: &WeightSet, fine: &GridLevel, coarse: &GridLevel) -> WeightSet {
    WeightSet {
        observation: weights
            .observation
            .iter()
            .map(|w| resample_field(w, fine, coarse))
            .collect(),
        background: resample_field(&weights.background, fine, coarse),
        model: weights
            .model
            .iter()
            .map(|w| resample_field(w, fine, coarse))
            .collect(),
    }
}

/// Restrict one model wind field onto the coarse level.
pub fn restrict_model(model: &ModelWinds, fine: &GridLevel, coarse: &GridLevel) -> ModelWinds {
    ModelWinds {
        u: resample_field(&model.u, fine, coarse),
        v: resample_field(&model.v, fine, coarse),
        w: resample_field(&model.w, fine, coarse),
    }
}

/// Restrict the level-interpolated background profile to the coarse levels.
pub fn restrict_background(background: &LevelBackground) -> LevelBackground {
    LevelBackground {
        u: coarsen_profile(&background.u),
        v: coarsen_profile(&background.v),
    }
}
