use crate::config::CostParameters;
use crate::wind::{WindField, U, V, W};
use ndarray::{Array1, Array3};

/// Per-radar observation arrays for one resolution level. Angles are in
/// radians; masked cells are NaN.
#[derive(Clone, Debug)]
pub struct RadarObservation {
    pub radial_velocity: Array3<f64>,
    pub fall_speed: Array3<f64>,
    pub azimuth: Array3<f64>,
    pub elevation: Array3<f64>,
}

/// Observation, background, and model weights for one resolution level.
///
/// Observation weights are {0, 1} presence indicators after clipping;
/// weights of masked observations are zero.
#[derive(Clone, Debug)]
pub struct WeightSet {
    pub observation: Vec<Array3<f64>>,
    pub background: Array3<f64>,
    pub model: Vec<Array3<f64>>,
}

/// One numerical-model wind field used as a soft constraint.
#[derive(Clone, Debug)]
pub struct ModelWinds {
    pub u: Array3<f64>,
    pub v: Array3<f64>,
    pub w: Array3<f64>,
}

/// Background sounding winds interpolated to the grid levels.
#[derive(Clone, Debug)]
pub struct LevelBackground {
    pub u: Array1<f64>,
    pub v: Array1<f64>,
}

/// Everything a cost model needs besides the wind state itself, fixed for
/// one resolution level.
pub struct CostContext<'a> {
    pub observations: &'a [RadarObservation],
    pub weights: &'a WeightSet,
    pub background: Option<&'a LevelBackground>,
    pub models: &'a [ModelWinds],
    pub params: &'a CostParameters,
    pub shape: (usize, usize, usize),
    /// Grid spacing (dx, dy, dz) in meters
    pub spacing: (f64, f64, f64),
    /// RMS of the weighted radial velocities, available as a normalizer
    pub rms_vr: f64,
}

/// The cost/gradient seam consumed by the multigrid solver.
///
/// `cost` must be finite for any finite wind state; masked entries of the
/// context arrays contribute zero. `gradient` returns an array shaped like
/// the flattened wind vector.
pub trait CostModel {
    fn cost(&self, winds: &WindField, ctx: &CostContext) -> f64;
    fn gradient(&self, winds: &WindField, ctx: &CostContext) -> Array1<f64>;
}

/// Reference cost model: observation, mass continuity, smoothness,
/// background, and model blending terms, each with its analytic gradient.
///
/// The vorticity coefficient is accepted by [`CostParameters`] but left to
/// external implementations of [`CostModel`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RetrievalCost;

impl RetrievalCost {
    /// Radial velocity of the wind state as seen by the radar: the
    /// projection of (u, v, w - fall speed) onto the beam direction.
    fn project_radial(u: f64, v: f64, w: f64, vt: f64, az: f64, el: f64) -> f64 {
        u * el.cos() * az.sin() + v * el.cos() * az.cos() + (w - vt) * el.sin()
    }

    fn observation_terms(
        winds: &WindField,
        ctx: &CostContext,
        mut grad: Option<&mut [Array3<f64>; 3]>,
    ) -> f64 {
        let co = ctx.params.co;
        if co == 0.0 {
            return 0.0;
        }
        // Normalizing by the RMS radial velocity keeps the term's curvature
        // compatible with the unit-step relaxation sweeps
        let norm = if ctx.rms_vr > 0.0 { ctx.rms_vr } else { 1.0 };
        let coeff = co / norm;
        let (u, v, w) = (winds.component(U), winds.component(V), winds.component(W));
        let (nz, ny, nx) = ctx.shape;
        let mut cost = 0.0;

        for (obs, weight) in ctx.observations.iter().zip(&ctx.weights.observation) {
            for k in 0..nz {
                for j in 0..ny {
                    for i in 0..nx {
                        let c = [k, j, i];
                        let wgt = weight[c];
                        if wgt == 0.0 {
                            continue;
                        }
                        let vr = obs.radial_velocity[c];
                        let az = obs.azimuth[c];
                        let el = obs.elevation[c];
                        let vt = obs.fall_speed[c];
                        let vr_model = Self::project_radial(u[c], v[c], w[c], vt, az, el);
                        let diff = vr_model - vr;
                        if !diff.is_finite() {
                            continue;
                        }
                        cost += coeff * wgt * diff * diff;
                        if let Some(g) = grad.as_deref_mut() {
                            let factor = 2.0 * coeff * wgt * diff;
                            g[U][c] += factor * el.cos() * az.sin();
                            g[V][c] += factor * el.cos() * az.cos();
                            g[W][c] += factor * el.sin();
                        }
                    }
                }
            }
        }
        cost
    }

    fn mass_continuity_terms(
        winds: &WindField,
        ctx: &CostContext,
        mut grad: Option<&mut [Array3<f64>; 3]>,
    ) -> f64 {
        let cm = ctx.params.cm;
        if cm == 0.0 {
            return 0.0;
        }
        let (u, v, w) = (winds.component(U), winds.component(V), winds.component(W));
        let (nz, ny, nx) = ctx.shape;
        let (dx, dy, dz) = ctx.spacing;
        let mut cost = 0.0;

        for k in 1..nz.saturating_sub(1) {
            for j in 1..ny.saturating_sub(1) {
                for i in 1..nx.saturating_sub(1) {
                    let div = (u[[k, j, i + 1]] - u[[k, j, i - 1]]) / (2.0 * dx)
                        + (v[[k, j + 1, i]] - v[[k, j - 1, i]]) / (2.0 * dy)
                        + (w[[k + 1, j, i]] - w[[k - 1, j, i]]) / (2.0 * dz);
                    if !div.is_finite() {
                        continue;
                    }
                    cost += cm * div * div;
                    if let Some(g) = grad.as_deref_mut() {
                        let factor = 2.0 * cm * div;
                        g[U][[k, j, i + 1]] += factor / (2.0 * dx);
                        g[U][[k, j, i - 1]] -= factor / (2.0 * dx);
                        g[V][[k, j + 1, i]] += factor / (2.0 * dy);
                        g[V][[k, j - 1, i]] -= factor / (2.0 * dy);
                        g[W][[k + 1, j, i]] += factor / (2.0 * dz);
                        g[W][[k - 1, j, i]] -= factor / (2.0 * dz);
                    }
                }
            }
        }

        // Impermeability at the model top: penalize vertical motion there,
        // scaled like the finite-difference divergence entries
        if ctx.params.upper_bc && nz > 0 {
            let top = nz - 1;
            let scale = 1.0 / (2.0 * dz);
            for j in 0..ny {
                for i in 0..nx {
                    let wt = w[[top, j, i]] * scale;
                    if !wt.is_finite() {
                        continue;
                    }
                    cost += cm * wt * wt;
                    if let Some(g) = grad.as_deref_mut() {
                        g[W][[top, j, i]] += 2.0 * cm * scale * wt;
                    }
                }
            }
        }
        cost
    }

    fn smoothness_terms(
        winds: &WindField,
        ctx: &CostContext,
        mut grad: Option<&mut [Array3<f64>; 3]>,
    ) -> f64 {
        let (nz, ny, nx) = ctx.shape;
        let coeffs = [ctx.params.cz, ctx.params.cy, ctx.params.cx];
        let mut cost = 0.0;

        for (axis, &coeff) in coeffs.iter().enumerate() {
            if coeff == 0.0 {
                continue;
            }
            for comp in [U, V, W] {
                let field = winds.component(comp);
                let len = [nz, ny, nx][axis];
                for k in 0..nz {
                    for j in 0..ny {
                        for i in 0..nx {
                            let pos = [k, j, i][axis];
                            if pos == 0 || pos + 1 >= len {
                                continue;
                            }
                            let mut prev = [k, j, i];
                            let mut next = [k, j, i];
                            prev[axis] -= 1;
                            next[axis] += 1;
                            let s = field[prev] - 2.0 * field[[k, j, i]] + field[next];
                            if !s.is_finite() {
                                continue;
                            }
                            cost += coeff * s * s;
                            if let Some(g) = grad.as_deref_mut() {
                                g[comp][prev] += 2.0 * coeff * s;
                                g[comp][[k, j, i]] -= 4.0 * coeff * s;
                                g[comp][next] += 2.0 * coeff * s;
                            }
                        }
                    }
                }
            }
        }
        cost
    }

    fn background_terms(
        winds: &WindField,
        ctx: &CostContext,
        mut grad: Option<&mut [Array3<f64>; 3]>,
    ) -> f64 {
        let cb = ctx.params.cb;
        let background = match (cb != 0.0, ctx.background) {
            (true, Some(b)) => b,
            _ => return 0.0,
        };
        let (u, v) = (winds.component(U), winds.component(V));
        let (nz, ny, nx) = ctx.shape;
        let mut cost = 0.0;

        for k in 0..nz {
            let (ub, vb) = (background.u[k], background.v[k]);
            if !ub.is_finite() || !vb.is_finite() {
                continue;
            }
            for j in 0..ny {
                for i in 0..nx {
                    let wgt = ctx.weights.background[[k, j, i]];
                    if wgt == 0.0 {
                        continue;
                    }
                    let du = u[[k, j, i]] - ub;
                    let dv = v[[k, j, i]] - vb;
                    cost += cb * wgt * (du * du + dv * dv);
                    if let Some(g) = grad.as_deref_mut() {
                        g[U][[k, j, i]] += 2.0 * cb * wgt * du;
                        g[V][[k, j, i]] += 2.0 * cb * wgt * dv;
                    }
                }
            }
        }
        cost
    }

    fn model_terms(
        winds: &WindField,
        ctx: &CostContext,
        mut grad: Option<&mut [Array3<f64>; 3]>,
    ) -> f64 {
        let cmod = ctx.params.cmod;
        if cmod == 0.0 {
            return 0.0;
        }
        let (u, v, w) = (winds.component(U), winds.component(V), winds.component(W));
        let (nz, ny, nx) = ctx.shape;
        let mut cost = 0.0;

        for (model, weight) in ctx.models.iter().zip(&ctx.weights.model) {
            for k in 0..nz {
                for j in 0..ny {
                    for i in 0..nx {
                        let c = [k, j, i];
                        let wgt = weight[c];
                        if wgt == 0.0 {
                            continue;
                        }
                        let (du, dv, dw) = (u[c] - model.u[c], v[c] - model.v[c], w[c] - model.w[c]);
                        if !du.is_finite() || !dv.is_finite() || !dw.is_finite() {
                            continue;
                        }
                        cost += cmod * wgt * (du * du + dv * dv + dw * dw);
                        if let Some(g) = grad.as_deref_mut() {
                            g[U][c] += 2.0 * cmod * wgt * du;
                            g[V][c] += 2.0 * cmod * wgt * dv;
                            g[W][c] += 2.0 * cmod * wgt * dw;
                        }
                    }
                }
            }
        }
        cost
    }

    fn evaluate(winds: &WindField, ctx: &CostContext, mut grad: Option<&mut [Array3<f64>; 3]>) -> f64 {
        Self::observation_terms(winds, ctx, grad.as_deref_mut())
            + Self::mass_continuity_terms(winds, ctx, grad.as_deref_mut())
            + Self::smoothness_terms(winds, ctx, grad.as_deref_mut())
            + Self::background_terms(winds, ctx, grad.as_deref_mut())
            + Self::model_terms(winds, ctx, grad)
    }
}

impl CostModel for RetrievalCost {
    fn cost(&self, winds: &WindField, ctx: &CostContext) -> f64 {
        Self::evaluate(winds, ctx, None)
    }

    fn gradient(&self, winds: &WindField, ctx: &CostContext) -> Array1<f64> {
        let mut grad = [
            Array3::zeros(ctx.shape),
            Array3::zeros(ctx.shape),
            Array3::zeros(ctx.shape),
        ];
        Self::evaluate(winds, ctx, Some(&mut grad));
        WindField::from_components(&grad[U], &grad[V], &grad[W])
            .flat()
            .clone()
    }
}
