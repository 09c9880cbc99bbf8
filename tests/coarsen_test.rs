use dda_rust::grid::GridLevel;
use dda_rust::math::interpolate::resample_field;
use dda_rust::retrieval::coarsen::{coarsen_axis, coarsen_level, coarsen_profile};
use ndarray::{Array1, Array3};

fn fine_level() -> GridLevel {
    GridLevel::new(
        Array1::linspace(0.0, 3000.0, 4),
        Array1::linspace(-3000.0, 3000.0, 6),
        Array1::linspace(-3000.0, 3000.0, 6),
    )
}

#[test]
fn coarse_axis_is_midpoints_of_adjacent_pairs() {
    let fine = Array1::from(vec![0.0, 1000.0, 2000.0, 3000.0, 4000.0]);
    let coarse = coarsen_axis(&fine);

    assert_eq!(coarse.len(), 2);
    assert!((coarse[0] - 500.0).abs() < 1e-12);
    assert!((coarse[1] - 2500.0).abs() < 1e-12);
}

#[test]
fn coarsening_a_constant_field_preserves_the_constant() {
    let fine = fine_level();
    let coarse = coarsen_level(&fine);
    let field = Array3::from_elem(fine.shape(), 7.25);

    let coarsened = resample_field(&field, &fine, &coarse);
    assert_eq!(coarsened.dim(), coarse.shape());
    for &value in coarsened.iter() {
        assert!((value - 7.25).abs() < 1e-12);
    }
}

#[test]
fn restriction_then_zero_correction_prolongation_leaves_fine_field_unchanged() {
    let fine = fine_level();
    let coarse = coarsen_level(&fine);
    // A smooth analytic field sampled on the fine grid
    let field = Array3::from_shape_fn(fine.shape(), |(k, j, i)| {
        0.5 * fine.z[k] / 3000.0 + (fine.y[j] / 3000.0).sin() + (fine.x[i] / 3000.0).cos()
    });

    let coarse_input = resample_field(&field, &fine, &coarse);
    // The coarse solution equals the coarse input, so the correction is
    // zero everywhere; prolonging it must not move the fine field
    let correction = &coarse_input - &coarse_input;
    let prolonged = resample_field(&correction, &coarse, &fine);

    let mut updated = field.clone();
    updated.zip_mut_with(&prolonged, |value, &delta| {
        if delta.is_finite() {
            *value += delta;
        }
    });

    for (&before, &after) in field.iter().zip(updated.iter()) {
        assert!((before - after).abs() < 1e-12);
    }
}

#[test]
fn out_of_bounds_queries_stay_masked() {
    let fine = fine_level();
    let coarse = coarsen_level(&fine);
    let coarse_field = Array3::from_elem(coarse.shape(), 1.0);

    // Fine edge nodes fall outside the coarse coordinate span and must
    // come back NaN rather than extrapolated
    let prolonged = resample_field(&coarse_field, &coarse, &fine);
    let (nz, ny, nx) = fine.shape();
    assert!(prolonged[[0, 0, 0]].is_nan());
    assert!(prolonged[[nz - 1, ny - 1, nx - 1]].is_nan());

    // Interior fine nodes inside the coarse span interpolate normally
    assert!((prolonged[[1, 2, 2]] - 1.0).abs() < 1e-12);
}

#[test]
fn profile_coarsening_matches_axis_coarsening() {
    let profile = Array1::from(vec![2.0, 4.0, 6.0, 8.0]);
    let coarse = coarsen_profile(&profile);
    assert_eq!(coarse.len(), 2);
    assert!((coarse[0] - 3.0).abs() < 1e-12);
    assert!((coarse[1] - 7.0).abs() < 1e-12);
}
