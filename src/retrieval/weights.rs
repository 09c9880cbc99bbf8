use crate::config::SolverOptions;
use crate::cost::{RadarObservation, WeightSet};
use crate::grid::RadarGrid;
use crate::retrieval::geometry::beam_crossing_angle;
use log::info;
use ndarray::Array3;

/// Caller-supplied weight arrays that replace the computed ones verbatim.
#[derive(Clone, Debug, Default)]
pub struct WeightOverrides {
    pub observation: Option<Vec<Array3<f64>>>,
    pub background: Option<Array3<f64>>,
    pub model: Option<Vec<Array3<f64>>>,
}

/// Build the observation, background, and model weights for one level.
///
/// Weights start at zero and are accumulated by an explicit fold over
/// unordered radar pairs; the {0, 1} clip of the observation weights is a
/// pure final step. With a single radar the observation weight is the
/// validity mask of its velocity field and the background weight is its
/// complement. Model weights fade with normalized radar coverage:
/// `1 - coverage / (n_radars + 1)`.
pub fn build_weights(
    grids: &[RadarGrid],
    observations: &[RadarObservation],
    n_models: usize,
    options: &SolverOptions,
    overrides: &WeightOverrides,
) -> WeightSet {
    let n_radars = grids.len();
    let shape = observations[0].radial_velocity.dim();
    let min_bca = options.min_bca.to_radians();
    let max_bca = options.max_bca.to_radians();

    let mut observation: Vec<Array3<f64>> = vec![Array3::zeros(shape); n_radars];
    let mut background: Array3<f64> = Array3::zeros(shape);

    if n_radars > 1 {
        let origin = (grids[0].origin_longitude, grids[0].origin_latitude);
        for i in 0..n_radars {
            for j in (i + 1)..n_radars {
                info!("calculating weights for radars {} and {}", i, j);
                let bca = beam_crossing_angle(
                    grids[i].radar_longitude,
                    grids[i].radar_latitude,
                    grids[j].radar_longitude,
                    grids[j].radar_latitude,
                    origin.0,
                    origin.1,
                    &grids[0].x,
                    &grids[0].y,
                );

                for radar in [i, j] {
                    let valid = observations[radar].radial_velocity.map(|v| v.is_finite());
                    for ((k, jy, ix), wgt) in observation[radar].indexed_iter_mut() {
                        let angle = bca[[jy, ix]];
                        if valid[[k, jy, ix]] && angle >= min_bca && angle <= max_bca {
                            *wgt += 1.0;
                        }
                    }
                }

                // Background fallback where this pair was evaluated but the
                // first radar of the pair saw nothing
                for ((k, jy, ix), wgt) in background.indexed_iter_mut() {
                    *wgt = if observations[i].radial_velocity[[k, jy, ix]].is_finite() {
                        0.0
                    } else {
                        1.0
                    };
                }
            }
        }
    } else {
        observation[0] = observations[0]
            .radial_velocity
            .map(|v| if v.is_finite() { 1.0 } else { 0.0 });
        background = observations[0]
            .radial_velocity
            .map(|v| if v.is_finite() { 0.0 } else { 1.0 });
    }

    // Presence indicator: any accumulated coverage counts as covered
    for weight in &mut observation {
        weight.mapv_inplace(|w| if w > 0.0 { 1.0 } else { 0.0 });
    }

    // Model influence is maximal where no radar coverage exists
    let mut model: Vec<Array3<f64>> = Vec::new();
    if n_models > 0 {
        let mut coverage: Array3<f64> = Array3::zeros(shape);
        for weight in &observation {
            coverage = coverage + weight;
        }
        let max_coverage = coverage.iter().cloned().fold(0.0, f64::max);
        if max_coverage > 0.0 {
            coverage.mapv_inplace(|c| c / max_coverage);
        }
        let fade = coverage.mapv(|c| 1.0 - c / (n_radars as f64 + 1.0));
        model = vec![fade; n_models];
    }

    let mut weights = WeightSet {
        observation,
        background,
        model,
    };

    if let Some(obs) = &overrides.observation {
        weights.observation = obs.clone();
    }
    if let Some(bg) = &overrides.background {
        weights.background = bg.clone();
    }
    if let Some(model) = &overrides.model {
        weights.model = model.clone();
    }
    weights
}
