//! Multigrid variational retrieval of the 3D wind field from multiple
//! Doppler radar grids.

pub mod coarsen;
pub mod geometry;
pub mod multigrid;
pub mod observations;
pub mod weights;

use crate::config::{ConfigError, CostParameters, SolverOptions};
use crate::cost::{CostContext, CostModel, LevelBackground, ModelWinds, RetrievalCost, WeightSet};
use crate::grid::{check_grid_conformance, GridError, GridField, RadarGrid};
use crate::math::interpolate::interpolate_profile;
use crate::wind::WindField;
use coarsen::{
    coarsen_level, restrict_background, restrict_model, restrict_observation, restrict_weights,
};
use log::info;
use ndarray::{Array1, Array3};
use observations::{build_observation, rms_radial_velocity};
use thiserror::Error;
use weights::{build_weights, WeightOverrides};

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("initial wind field shape {found:?} does not match the grid shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },
}

/// Sounding-derived background winds on their own height axis.
#[derive(Clone, Debug)]
pub struct BackgroundProfile {
    pub z: Array1<f64>,
    pub u: Array1<f64>,
    pub v: Array1<f64>,
}

/// Optional retrieval inputs beyond the grids themselves.
#[derive(Clone, Debug, Default)]
pub struct AuxiliaryInputs {
    /// Background sounding pulled toward by the background term
    pub background: Option<BackgroundProfile>,
    /// Model field name suffixes; each expects `U_<name>`, `V_<name>`,
    /// `W_<name>` fields on the first grid
    pub model_field_names: Vec<String>,
    /// Verbatim replacements for the computed weights
    pub weight_overrides: WeightOverrides,
}

/// Retrieve u/v/w with the reference cost model.
///
/// Returns clones of the input grids, each augmented with identical `u`,
/// `v`, `w` fields (every radar's grid carries the same retrieved wind
/// field).
pub fn retrieve_wind_field_multigrid(
    grids: &[RadarGrid],
    u_init: &Array3<f64>,
    v_init: &Array3<f64>,
    w_init: &Array3<f64>,
    params: &CostParameters,
    options: &SolverOptions,
    inputs: &AuxiliaryInputs,
) -> Result<Vec<RadarGrid>, RetrievalError> {
    retrieve_wind_field_multigrid_with(
        grids,
        u_init,
        v_init,
        w_init,
        params,
        options,
        inputs,
        &RetrievalCost,
    )
}

/// Retrieve u/v/w with a caller-supplied cost model.
#[allow(clippy::too_many_arguments)]
pub fn retrieve_wind_field_multigrid_with<C: CostModel>(
    grids: &[RadarGrid],
    u_init: &Array3<f64>,
    v_init: &Array3<f64>,
    w_init: &Array3<f64>,
    params: &CostParameters,
    options: &SolverOptions,
    inputs: &AuxiliaryInputs,
    cost_model: &C,
) -> Result<Vec<RadarGrid>, RetrievalError> {
    options.validate()?;
    check_grid_conformance(grids)?;
    params.validate(!inputs.model_field_names.is_empty())?;

    let shape = grids[0].shape();
    for init in [u_init, v_init, w_init] {
        if init.dim() != shape {
            return Err(RetrievalError::ShapeMismatch {
                expected: shape,
                found: init.dim(),
            });
        }
    }

    let mut out_grids: Vec<RadarGrid> = grids.to_vec();
    let fine_level = out_grids[0].level();
    let coarse_level = coarsen_level(&fine_level);
    let spacing = out_grids[0].spacing()?;

    info!("interpolating radar data to coarse grid");
    let mut observations = Vec::with_capacity(out_grids.len());
    for grid in &mut out_grids {
        observations.push(build_observation(grid, options)?);
    }
    let observations_coarse: Vec<_> = observations
        .iter()
        .map(|obs| restrict_observation(obs, &fine_level, &coarse_level))
        .collect();

    let mut models = Vec::with_capacity(inputs.model_field_names.len());
    for name in &inputs.model_field_names {
        models.push(ModelWinds {
            u: out_grids[0].field(&format!("U_{name}"))?.data.clone(),
            v: out_grids[0].field(&format!("V_{name}"))?.data.clone(),
            w: out_grids[0].field(&format!("W_{name}"))?.data.clone(),
        });
    }
    let models_coarse: Vec<_> = models
        .iter()
        .map(|model| restrict_model(model, &fine_level, &coarse_level))
        .collect();

    let weights = build_weights(
        &out_grids,
        &observations,
        models.len(),
        options,
        &inputs.weight_overrides,
    );
    let weights_coarse = restrict_weights(&weights, &fine_level, &coarse_level);

    let background = inputs.background.as_ref().map(|profile| {
        info!("interpolating sounding to radar grid levels");
        LevelBackground {
            u: interpolate_profile(&profile.z, &profile.u, &fine_level.z),
            v: interpolate_profile(&profile.z, &profile.v, &fine_level.z),
        }
    });
    let background_coarse = background.as_ref().map(restrict_background);

    let rms_vr = rms_radial_velocity(&observations_coarse, &weights_coarse.observation);
    info!("rms radial velocity = {rms_vr:.3}");

    let fine_ctx = CostContext {
        observations: &observations,
        weights: &weights,
        background: background.as_ref(),
        models: &models,
        params,
        shape,
        spacing,
        rms_vr,
    };
    let coarse_ctx = CostContext {
        observations: &observations_coarse,
        weights: &weights_coarse,
        background: background_coarse.as_ref(),
        models: &models_coarse,
        params,
        shape: coarse_level.shape(),
        spacing,
        rms_vr,
    };

    let mut winds = WindField::from_components(u_init, v_init, w_init);
    multigrid::run_multigrid_cycles(
        cost_model,
        &mut winds,
        &fine_ctx,
        &coarse_ctx,
        &fine_level,
        &coarse_level,
        options,
    );

    attach_wind_fields(&mut out_grids, &winds, &weights, options);
    Ok(out_grids)
}

/// Reshape the converged wind vector, apply coverage-based masking, and
/// attach identical u/v/w fields to every output grid.
fn attach_wind_fields(
    grids: &mut [RadarGrid],
    winds: &WindField,
    weights: &WeightSet,
    options: &SolverOptions,
) {
    let (mut u, mut v, mut w) = winds.to_components();

    // Cells never touched by a radar or a model have no retrieval support
    let mut combined = Array3::<f64>::zeros(winds.shape());
    for weight in weights.observation.iter().chain(weights.model.iter()) {
        combined.zip_mut_with(weight, |c, &wgt| *c += wgt);
    }

    if options.mask_outside_opt {
        for field in [&mut u, &mut v] {
            field.zip_mut_with(&combined, |value, &c| {
                if c < 1.0 {
                    *value = f64::NAN;
                }
            });
        }
    }
    if options.mask_outside_opt || options.mask_w_outside_opt {
        w.zip_mut_with(&combined, |value, &c| {
            if c < 1.0 {
                *value = f64::NAN;
            }
        });
    }

    let components = [
        ("u", &u, "eastward_wind", "eastward component of wind velocity"),
        ("v", &v, "northward_wind", "northward component of wind velocity"),
        ("w", &w, "upward_air_velocity", "vertical component of wind velocity"),
    ];
    for grid in grids.iter_mut() {
        for (name, data, standard_name, long_name) in &components {
            let mut field = GridField::new((*data).clone(), standard_name, long_name, "m/s");
            field.attributes.insert("min_bca".to_string(), options.min_bca);
            field.attributes.insert("max_bca".to_string(), options.max_bca);
            grid.add_field(name, field);
        }
    }
}
