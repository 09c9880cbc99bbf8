use dda_rust::math::optimize::{minimize_bounded, BoundedObjective, LbfgsSettings};
use ndarray::Array1;

/// Separable quadratic with its minimum at `target`.
struct Quadratic {
    target: Array1<f64>,
}

impl BoundedObjective for Quadratic {
    fn value(&self, x: &Array1<f64>) -> f64 {
        (x - &self.target).mapv(|d| d * d).sum()
    }

    fn gradient(&self, x: &Array1<f64>) -> Array1<f64> {
        (x - &self.target) * 2.0
    }
}

#[test]
fn converges_to_an_interior_minimum() {
    let objective = Quadratic {
        target: Array1::from(vec![1.0, -2.0, 3.0, 0.5]),
    };
    let report = minimize_bounded(
        &objective,
        Array1::zeros(4),
        -5.0,
        5.0,
        &LbfgsSettings::default(),
    );

    assert!(report.converged);
    for (found, expected) in report.x.iter().zip(objective.target.iter()) {
        assert!((found - expected).abs() < 1e-3);
    }
}

#[test]
fn exterior_minimum_lands_on_the_bound() {
    let objective = Quadratic {
        target: Array1::from(vec![8.0, -9.0]),
    };
    let report = minimize_bounded(
        &objective,
        Array1::zeros(2),
        -5.0,
        5.0,
        &LbfgsSettings::default(),
    );

    assert!((report.x[0] - 5.0).abs() < 1e-6);
    assert!((report.x[1] + 5.0).abs() < 1e-6);
}

#[test]
fn iteration_cap_is_respected() {
    let objective = Quadratic {
        target: Array1::from(vec![1.0; 10]),
    };
    let settings = LbfgsSettings {
        max_iterations: 3,
        pg_tolerance: 0.0,
        ..LbfgsSettings::default()
    };
    let report = minimize_bounded(&objective, Array1::zeros(10), -5.0, 5.0, &settings);

    assert!(!report.converged);
    assert!(report.iterations <= 3);
}

#[test]
fn clamps_an_infeasible_start_before_optimizing() {
    let objective = Quadratic {
        target: Array1::from(vec![0.0, 0.0]),
    };
    let report = minimize_bounded(
        &objective,
        Array1::from(vec![100.0, -100.0]),
        -5.0,
        5.0,
        &LbfgsSettings::default(),
    );

    assert!(report.converged);
    assert!(report.x.iter().all(|&v| v.abs() < 1e-3));
}
