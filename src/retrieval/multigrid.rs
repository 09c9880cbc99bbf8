use crate::config::SolverOptions;
use crate::cost::{CostContext, CostModel};
use crate::grid::GridLevel;
use crate::math::interpolate::resample_field;
use crate::math::optimize::{minimize_bounded, BoundedObjective, LbfgsSettings};
use crate::wind::{WindField, U, V, W};
use log::{debug, info, warn};
use ndarray::Array1;

/// The residual-matching subproblem solved on the coarse grid.
///
/// Instead of minimizing the raw physical cost, the coarse optimizer
/// matches the cost against the scaled fine-grid residual, so the coarse
/// level inherits the gradient the fine relaxation could not resolve.
pub struct CoarseResidualObjective<'a, C: CostModel> {
    pub model: &'a C,
    pub ctx: &'a CostContext<'a>,
    pub residual: &'a Array1<f64>,
    pub scale: f64,
}

impl<C: CostModel> BoundedObjective for CoarseResidualObjective<'_, C> {
    /// Euclidean norm of `cost - scale * residual`, restricted to entries
    /// where both the candidate winds and the residual are finite.
    fn value(&self, x: &Array1<f64>) -> f64 {
        let winds = WindField::from_flat(x.clone(), self.ctx.shape);
        let cost = self.model.cost(&winds, self.ctx);

        let mut sum_sq = 0.0;
        for (&xi, &ri) in x.iter().zip(self.residual.iter()) {
            if xi.is_finite() && ri.is_finite() {
                let diff = cost - self.scale * ri;
                sum_sq += diff * diff;
            }
        }
        sum_sq.sqrt()
    }

    /// `gradient(cost) - scale * residual`, without finiteness restriction;
    /// non-finite entries are the optimizer's concern.
    fn gradient(&self, x: &Array1<f64>) -> Array1<f64> {
        let winds = WindField::from_flat(x.clone(), self.ctx.shape);
        self.model.gradient(&winds, self.ctx) - &(self.residual * self.scale)
    }
}

/// Transfer each wind component between resolution levels by trilinear
/// interpolation; out-of-grid samples become NaN.
fn transfer_winds(winds: &WindField, from: &GridLevel, to: &GridLevel) -> WindField {
    let u = resample_field(&winds.component(U).to_owned(), from, to);
    let v = resample_field(&winds.component(V).to_owned(), from, to);
    let w = resample_field(&winds.component(W).to_owned(), from, to);
    WindField::from_components(&u, &v, &w)
}

/// Drive the fine/coarse correction cycles until the iteration budget is
/// spent, mutating the fine wind field in place.
///
/// Each cycle: relaxation sweeps on the fine grid, restriction of the
/// relaxed winds and the leftover gradient, the bound-constrained coarse
/// solve against the scaled residual, and prolongation of the coarse
/// correction back onto the fine field. Every cycle accounts for 50
/// iterations of the budget; there is no convergence stopping rule beyond
/// the coarse solver's own tolerance.
pub fn run_multigrid_cycles<C: CostModel>(
    model: &C,
    winds: &mut WindField,
    fine_ctx: &CostContext<'_>,
    coarse_ctx: &CostContext<'_>,
    fine_level: &GridLevel,
    coarse_level: &GridLevel,
    options: &SolverOptions,
) {
    let settings = LbfgsSettings {
        max_iterations: options.coarse_max_iterations,
        pg_tolerance: options.coarse_pg_tolerance,
        ..LbfgsSettings::default()
    };
    let bound = options.coarse_bound;
    let mut iterations = 0;

    info!("starting multigrid solver");
    while iterations < options.max_iterations {
        // Relaxation: a few unit-step descent sweeps knock down the
        // high-frequency error; the last gradient is the fine residual
        let mut fine_residual = Array1::zeros(winds.flat().len());
        for _ in 0..options.relax_steps {
            let mut gradient = model.gradient(winds, fine_ctx);
            gradient.mapv_inplace(|g| if g.is_finite() { g } else { 0.0 });
            winds
                .flat_mut()
                .zip_mut_with(&gradient, |w, &g| *w -= options.relax_step_size * g);
            fine_residual = gradient;
        }

        // Restriction of the relaxed state and its residual
        let residual_field = WindField::from_flat(fine_residual, winds.shape());
        let winds_coarse = transfer_winds(winds, fine_level, coarse_level);
        let residual_coarse = transfer_winds(&residual_field, fine_level, coarse_level);

        let objective = CoarseResidualObjective {
            model,
            ctx: coarse_ctx,
            residual: residual_coarse.flat(),
            scale: options.residual_scale,
        };
        let report = minimize_bounded(
            &objective,
            winds_coarse.flat().clone(),
            -bound,
            bound,
            &settings,
        );
        // The convergence flag is informational only; the cycle proceeds
        // either way and relies on the iteration budget
        if report.converged {
            debug!(
                "coarse solve converged in {} iterations at iteration {}",
                report.iterations, iterations
            );
        } else {
            warn!(
                "coarse solve hit its iteration cap at iteration {}",
                iterations
            );
        }

        if options.output_cost_diagnostics && iterations % 50 == 0 {
            let matched_cost = objective.value(winds_coarse.flat());
            let gradient_norm = objective
                .gradient(winds_coarse.flat())
                .mapv(|g| g * g)
                .sum()
                .sqrt();
            info!(
                "iteration {}: |cost - residual| = {:.6e}, gradient norm = {:.6e}",
                iterations, matched_cost, gradient_norm
            );
        }

        // Prolongation: the coarse correction, not the coarse solution,
        // moves back to the fine grid; out-of-grid cells contribute zero
        let solution = WindField::from_flat(report.x, coarse_ctx.shape);
        for component in [U, V, W] {
            let correction =
                &solution.component(component) - &winds_coarse.component(component);
            let fine_correction = resample_field(&correction, coarse_level, fine_level);
            winds
                .component_mut(component)
                .zip_mut_with(&fine_correction, |w, &c| {
                    if c.is_finite() {
                        *w += c;
                    }
                });
        }

        // The coarse solve dominates the per-cycle work
        iterations += 50;
    }
    info!("multigrid solver finished after {} iterations", iterations);
}
