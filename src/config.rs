use thiserror::Error;

/// Configuration problems detected before any computation starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("storm motion (ut, vt) must be prescribed when the vorticity constraint is enabled")]
    MissingStormMotion,

    #[error("model constraint weight must be zero when no model fields are supplied")]
    MissingModelFields,

    #[error("invalid beam crossing angle window: [{min}, {max}] degrees")]
    InvalidBcaWindow { min: f64, max: f64 },
}

/// Physical regularization coefficients for the retrieval cost function.
///
/// The bundle is immutable for the whole run and is passed as a single
/// value object to every component that evaluates cost or gradient terms.
#[derive(Clone, Debug)]
pub struct CostParameters {
    /// Observation (radial velocity) term coefficient
    pub co: f64,
    /// Mass continuity term coefficient
    pub cm: f64,
    /// Smoothness coefficient along x
    pub cx: f64,
    /// Smoothness coefficient along y
    pub cy: f64,
    /// Smoothness coefficient along z
    pub cz: f64,
    /// Background (sounding) term coefficient
    pub cb: f64,
    /// Vertical vorticity term coefficient
    pub cv: f64,
    /// Model blending term coefficient
    pub cmod: f64,
    /// Prescribed storm motion, eastward component (m/s)
    pub ut: Option<f64>,
    /// Prescribed storm motion, northward component (m/s)
    pub vt: Option<f64>,
    /// Impose w = 0 at the upper boundary
    pub upper_bc: bool,
}

impl Default for CostParameters {
    fn default() -> Self {
        Self {
            co: 1.0,
            cm: 1500.0,
            cx: 0.0,
            cy: 0.0,
            cz: 0.0,
            cb: 0.0,
            cv: 0.0,
            cmod: 0.0,
            ut: None,
            vt: None,
            upper_bc: true,
        }
    }
}

impl CostParameters {
    /// Validate the coefficient bundle against the supplied inputs.
    ///
    /// The vorticity constraint needs a prescribed storm motion, and the
    /// model blending coefficient is only meaningful when model fields
    /// exist.
    pub fn validate(&self, has_model_fields: bool) -> Result<(), ConfigError> {
        if self.cv != 0.0 && (self.ut.is_none() || self.vt.is_none()) {
            return Err(ConfigError::MissingStormMotion);
        }
        if self.cmod != 0.0 && !has_model_fields {
            return Err(ConfigError::MissingModelFields);
        }
        Ok(())
    }
}

/// Tuning knobs for the multigrid solver.
#[derive(Clone, Debug)]
pub struct SolverOptions {
    /// Name of the radial velocity field on the input grids
    pub velocity_field: String,
    /// Name of the reflectivity field used for fall speed and angle setup
    pub reflectivity_field: String,
    /// Outer iteration budget; each cycle accounts for 50 iterations
    pub max_iterations: usize,
    /// Steepest-descent sweeps per cycle on the fine grid
    pub relax_steps: usize,
    /// Step size of the fine-grid relaxation sweeps
    pub relax_step_size: f64,
    /// Inner iteration cap of the coarse bound-constrained solve
    pub coarse_max_iterations: usize,
    /// Projected-gradient tolerance of the coarse solve
    pub coarse_pg_tolerance: f64,
    /// Scale applied to the restricted residual in the coarse objective
    pub residual_scale: f64,
    /// Box half-width for every coarse wind component (m/s)
    pub coarse_bound: f64,
    /// Minimum beam crossing angle for dual-Doppler coverage (degrees)
    pub min_bca: f64,
    /// Maximum beam crossing angle for dual-Doppler coverage (degrees)
    pub max_bca: f64,
    /// Mask u and v where no radar or model constrained the cell
    pub mask_outside_opt: bool,
    /// Mask w where no radar or model constrained the cell
    pub mask_w_outside_opt: bool,
    /// Log the coarse objective and gradient norm every 50th iteration
    pub output_cost_diagnostics: bool,
    /// Freezing level used by the fall speed parameterization (m)
    pub freezing_level: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            velocity_field: "corrected_velocity".to_string(),
            reflectivity_field: "reflectivity".to_string(),
            max_iterations: 1300,
            relax_steps: 5,
            relax_step_size: 1.0,
            coarse_max_iterations: 200,
            coarse_pg_tolerance: 1e-3,
            residual_scale: 0.001,
            coarse_bound: 5.0,
            min_bca: 30.0,
            max_bca: 150.0,
            mask_outside_opt: false,
            mask_w_outside_opt: true,
            output_cost_diagnostics: true,
            freezing_level: 4500.0,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=180.0).contains(&self.min_bca)
            || !(0.0..=180.0).contains(&self.max_bca)
            || self.min_bca >= self.max_bca
        {
            return Err(ConfigError::InvalidBcaWindow {
                min: self.min_bca,
                max: self.max_bca,
            });
        }
        Ok(())
    }
}
