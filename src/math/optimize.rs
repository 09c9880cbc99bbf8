use log::debug;
use ndarray::Array1;
use std::collections::VecDeque;

/// A smooth objective restricted to a box, as consumed by
/// [`minimize_bounded`]. Implementations must tolerate any point inside
/// the box; non-finite gradient entries are treated as zero by the solver.
pub trait BoundedObjective {
    fn value(&self, x: &Array1<f64>) -> f64;
    fn gradient(&self, x: &Array1<f64>) -> Array1<f64>;
}

/// Settings of the bound-constrained limited-memory quasi-Newton solver.
#[derive(Clone, Debug)]
pub struct LbfgsSettings {
    pub max_iterations: usize,
    /// Stop when the sup-norm of the projected gradient falls below this
    pub pg_tolerance: f64,
    /// Number of curvature pairs kept for the two-loop recursion
    pub memory: usize,
    /// Backtracking halvings attempted per line search
    pub max_line_search: usize,
}

impl Default for LbfgsSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            pg_tolerance: 1e-3,
            memory: 10,
            max_line_search: 20,
        }
    }
}

/// Outcome of a bounded minimization.
#[derive(Clone, Debug)]
pub struct LbfgsReport {
    pub x: Array1<f64>,
    pub value: f64,
    pub iterations: usize,
    /// Whether the projected-gradient tolerance was reached
    pub converged: bool,
}

fn clamp_in_place(x: &mut Array1<f64>, lower: f64, upper: f64) {
    x.mapv_inplace(|v| v.clamp(lower, upper));
}

fn sanitize(mut g: Array1<f64>) -> Array1<f64> {
    g.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
    g
}

/// Sup-norm of the gradient projected onto the feasible box: components
/// pointing out of the box at an active bound do not count.
fn projected_gradient_norm(x: &Array1<f64>, g: &Array1<f64>, lower: f64, upper: f64) -> f64 {
    x.iter()
        .zip(g.iter())
        .map(|(&xi, &gi)| {
            if (xi <= lower && gi > 0.0) || (xi >= upper && gi < 0.0) {
                0.0
            } else {
                gi.abs()
            }
        })
        .fold(0.0, f64::max)
}

/// Search direction from the standard two-loop recursion over the stored
/// curvature pairs; steepest descent when the history is empty.
fn two_loop_direction(
    g: &Array1<f64>,
    history: &VecDeque<(Array1<f64>, Array1<f64>)>,
) -> Array1<f64> {
    let mut q = g.clone();
    let mut alphas = Vec::with_capacity(history.len());

    for (s, y) in history.iter().rev() {
        let rho = 1.0 / y.dot(s);
        let alpha = rho * s.dot(&q);
        q = q - &(y * alpha);
        alphas.push((alpha, rho));
    }

    if let Some((s, y)) = history.back() {
        let gamma = s.dot(y) / y.dot(y);
        q *= gamma;
    }

    for ((s, y), &(alpha, rho)) in history.iter().zip(alphas.iter().rev()) {
        let beta = rho * y.dot(&q);
        q = q + &(s * (alpha - beta));
    }

    -q
}

/// Minimize an objective over the uniform box `[lower, upper]^n` with a
/// projected-gradient limited-memory BFGS iteration.
///
/// The line search backtracks on an Armijo condition evaluated at
/// projected trial points; when it fails to find sufficient decrease the
/// last trial point is kept and the iteration continues, so a single poor
/// step never aborts the solve.
pub fn minimize_bounded<F: BoundedObjective>(
    objective: &F,
    x0: Array1<f64>,
    lower: f64,
    upper: f64,
    settings: &LbfgsSettings,
) -> LbfgsReport {
    const ARMIJO_C1: f64 = 1e-4;
    const CURVATURE_EPS: f64 = 1e-10;

    let mut x = x0;
    clamp_in_place(&mut x, lower, upper);

    let mut value = objective.value(&x);
    let mut grad = sanitize(objective.gradient(&x));
    let mut history: VecDeque<(Array1<f64>, Array1<f64>)> = VecDeque::new();
    let mut converged = false;
    let mut iterations = 0;

    while iterations < settings.max_iterations {
        if projected_gradient_norm(&x, &grad, lower, upper) <= settings.pg_tolerance {
            converged = true;
            break;
        }

        let mut direction = two_loop_direction(&grad, &history);
        if direction.dot(&grad) >= 0.0 || !direction.iter().all(|d| d.is_finite()) {
            // Not a descent direction; restart from steepest descent
            history.clear();
            direction = -grad.clone();
        }

        let mut step = 1.0;
        let mut x_new = &x + &(&direction * step);
        clamp_in_place(&mut x_new, lower, upper);
        let mut value_new = objective.value(&x_new);

        for _ in 0..settings.max_line_search {
            let decrease = ARMIJO_C1 * grad.dot(&(&x_new - &x));
            if value_new.is_finite() && value_new <= value + decrease {
                break;
            }
            step *= 0.5;
            x_new = &x + &(&direction * step);
            clamp_in_place(&mut x_new, lower, upper);
            value_new = objective.value(&x_new);
        }

        let grad_new = sanitize(objective.gradient(&x_new));
        let s = &x_new - &x;
        let y = &grad_new - &grad;
        if s.dot(&y) > CURVATURE_EPS {
            if history.len() == settings.memory {
                history.pop_front();
            }
            history.push_back((s.clone(), y));
        }

        if s.iter().all(|&d| d == 0.0) {
            // Projection pinned every component; nothing left to move
            break;
        }

        x = x_new;
        value = value_new;
        grad = grad_new;
        iterations += 1;
    }

    debug!(
        "bounded L-BFGS finished: {} iterations, value {:.6e}, converged {}",
        iterations, value, converged
    );

    LbfgsReport {
        x,
        value,
        iterations,
        converged,
    }
}
