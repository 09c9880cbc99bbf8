use dda_rust::config::{CostParameters, SolverOptions};
use dda_rust::cost::{CostContext, CostModel, RetrievalCost, WeightSet};
use dda_rust::grid::{GridField, RadarGrid};
use dda_rust::math::optimize::BoundedObjective;
use dda_rust::retrieval::coarsen::{
    coarsen_level, restrict_observation, restrict_weights,
};
use dda_rust::retrieval::geometry::{add_azimuth_field, add_elevation_field};
use dda_rust::retrieval::multigrid::{run_multigrid_cycles, CoarseResidualObjective};
use dda_rust::retrieval::observations::{
    build_observation, calculate_fall_speed, rms_radial_velocity,
};
use dda_rust::retrieval::weights::{build_weights, WeightOverrides};
use dda_rust::retrieval::{retrieve_wind_field_multigrid, AuxiliaryInputs};
use dda_rust::wind::WindField;
use ndarray::{Array1, Array3};
use std::collections::HashMap;

const U0: f64 = 3.0;
const V0: f64 = -2.0;

fn make_grid(
    nz: usize,
    nxy: usize,
    radar_longitude: f64,
    radar_latitude: f64,
) -> RadarGrid {
    let shape = (nz, nxy, nxy);
    let mut grid = RadarGrid {
        x: Array1::linspace(-2000.0, 2000.0, nxy),
        y: Array1::linspace(-2000.0, 2000.0, nxy),
        z: Array1::linspace(0.0, 2000.0, nz),
        origin_latitude: 35.0,
        origin_longitude: 0.0,
        radar_latitude,
        radar_longitude,
        radar_altitude: 0.0,
        fields: HashMap::new(),
    };
    grid.add_field(
        "reflectivity",
        GridField::new(
            Array3::from_elem(shape, 30.0),
            "equivalent_reflectivity_factor",
            "reflectivity",
            "dBZ",
        ),
    );
    grid
}

/// Project the analytic wind (U0, V0, w = 0) onto the radar's line of
/// sight, using the same angle and fall-speed fields the solver derives.
fn fill_radial_velocity(grid: &mut RadarGrid) {
    add_azimuth_field(grid);
    add_elevation_field(grid);
    let azimuth = grid.field("azimuth").unwrap().data.mapv(f64::to_radians);
    let elevation = grid.field("elevation").unwrap().data.mapv(f64::to_radians);
    let fall_speed = calculate_fall_speed(grid, "reflectivity", 4500.0).unwrap();

    let vr = Array3::from_shape_fn(azimuth.dim(), |c| {
        let (az, el, vt) = (azimuth[c], elevation[c], fall_speed[c]);
        U0 * el.cos() * az.sin() + V0 * el.cos() * az.cos() + (0.0 - vt) * el.sin()
    });
    grid.add_field(
        "corrected_velocity",
        GridField::new(vr, "radial_velocity", "Doppler radial velocity", "m/s"),
    );
}

fn two_radar_grids(nz: usize, nxy: usize) -> Vec<RadarGrid> {
    let mut grids = vec![
        make_grid(nz, nxy, -0.05, 34.95),
        make_grid(nz, nxy, 0.05, 34.95),
    ];
    for grid in &mut grids {
        fill_radial_velocity(grid);
    }
    grids
}

#[test]
fn coarse_adapter_is_zero_at_zero_winds_and_zero_residual() {
    let shape = (2, 2, 2);
    let weights = WeightSet {
        observation: Vec::new(),
        background: Array3::zeros(shape),
        model: Vec::new(),
    };
    let params = CostParameters::default();
    let ctx = CostContext {
        observations: &[],
        weights: &weights,
        background: None,
        models: &[],
        params: &params,
        shape,
        spacing: (1000.0, 1000.0, 1000.0),
        rms_vr: 0.0,
    };

    let residual = Array1::zeros(24);
    let objective = CoarseResidualObjective {
        model: &RetrievalCost,
        ctx: &ctx,
        residual: &residual,
        scale: 0.001,
    };

    assert_eq!(objective.value(&Array1::zeros(24)), 0.0);
}

#[test]
fn consistent_initial_guess_passes_through_unchanged() {
    let _ = env_logger::builder().is_test(true).try_init();
    let grids = two_radar_grids(3, 5);
    let shape = grids[0].shape();
    let u_init = Array3::from_elem(shape, U0);
    let v_init = Array3::from_elem(shape, V0);
    let w_init = Array3::zeros(shape);

    let options = SolverOptions {
        max_iterations: 100,
        ..SolverOptions::default()
    };
    let out = retrieve_wind_field_multigrid(
        &grids,
        &u_init,
        &v_init,
        &w_init,
        &CostParameters::default(),
        &options,
        &AuxiliaryInputs::default(),
    )
    .unwrap();

    assert_eq!(out.len(), 2);
    // The analytic field is already consistent with every observation, so
    // the solver must leave it alone
    let u = &out[0].field("u").unwrap().data;
    let v = &out[0].field("v").unwrap().data;
    for (&uu, &vv) in u.iter().zip(v.iter()) {
        assert!((uu - U0).abs() < 1e-6);
        assert!((vv - V0).abs() < 1e-6);
    }

    // Identical wind fields are attached to every grid, with the BCA
    // window recorded on each
    let u1 = &out[1].field("u").unwrap().data;
    assert_eq!(u, u1);
    let attrs = &out[0].field("u").unwrap().attributes;
    assert_eq!(attrs.get("min_bca"), Some(&30.0));
    assert_eq!(attrs.get("max_bca"), Some(&150.0));
}

#[test]
fn perturbed_initial_guess_converges_toward_the_analytic_field() {
    let grids = two_radar_grids(3, 5);
    let shape = grids[0].shape();
    let perturbation = 1.5;
    let u_init = Array3::from_elem(shape, U0 + perturbation);
    let v_init = Array3::from_elem(shape, V0 - perturbation);
    let w_init = Array3::zeros(shape);

    let options = SolverOptions {
        max_iterations: 300,
        ..SolverOptions::default()
    };
    let out = retrieve_wind_field_multigrid(
        &grids,
        &u_init,
        &v_init,
        &w_init,
        &CostParameters::default(),
        &options,
        &AuxiliaryInputs::default(),
    )
    .unwrap();

    // w is masked by coverage; its finite cells mark where the radars
    // constrained the solution
    let w = &out[0].field("w").unwrap().data;
    let u = &out[0].field("u").unwrap().data;
    let v = &out[0].field("v").unwrap().data;

    let mut covered = 0;
    for ((&ww, &uu), &vv) in w.iter().zip(u.iter()).zip(v.iter()) {
        if ww.is_nan() {
            continue;
        }
        covered += 1;
        assert!(
            (uu - U0).abs() < perturbation / 2.0,
            "u did not move toward the analytic value: {uu}"
        );
        assert!(
            (vv - V0).abs() < perturbation / 2.0,
            "v did not move toward the analytic value: {vv}"
        );
    }
    assert!(covered > 0, "no cell had dual-Doppler coverage");
}

#[test]
fn fine_cost_never_increases_across_cycles() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut grids = two_radar_grids(4, 6);
    let shape = grids[0].shape();
    let fine_level = grids[0].level();
    let coarse_level = coarsen_level(&fine_level);
    let spacing = grids[0].spacing().unwrap();
    let options = SolverOptions {
        max_iterations: 50, // exactly one cycle per controller call
        ..SolverOptions::default()
    };

    let mut observations = Vec::new();
    for grid in &mut grids {
        observations.push(build_observation(grid, &options).unwrap());
    }
    let observations_coarse: Vec<_> = observations
        .iter()
        .map(|obs| restrict_observation(obs, &fine_level, &coarse_level))
        .collect();
    let weights = build_weights(&grids, &observations, 0, &options, &WeightOverrides::default());
    let weights_coarse = restrict_weights(&weights, &fine_level, &coarse_level);
    let rms_vr = rms_radial_velocity(&observations_coarse, &weights_coarse.observation);
    let params = CostParameters::default();

    let fine_ctx = CostContext {
        observations: &observations,
        weights: &weights,
        background: None,
        models: &[],
        params: &params,
        shape,
        spacing,
        rms_vr,
    };
    let coarse_ctx = CostContext {
        observations: &observations_coarse,
        weights: &weights_coarse,
        background: None,
        models: &[],
        params: &params,
        shape: coarse_level.shape(),
        spacing,
        rms_vr,
    };

    let u_init = Array3::from_elem(shape, U0 + 1.0);
    let v_init = Array3::from_elem(shape, V0 + 1.0);
    let w_init = Array3::zeros(shape);
    let mut winds = WindField::from_components(&u_init, &v_init, &w_init);

    let model = RetrievalCost;
    let mut costs = vec![model.cost(&winds, &fine_ctx)];
    for _ in 0..4 {
        run_multigrid_cycles(
            &model,
            &mut winds,
            &fine_ctx,
            &coarse_ctx,
            &fine_level,
            &coarse_level,
            &options,
        );
        costs.push(model.cost(&winds, &fine_ctx));
    }

    assert!(costs[0] > 0.0);
    for pair in costs.windows(2) {
        assert!(
            pair[1] <= pair[0] * 1.001 + 1e-9,
            "cost increased across a cycle: {:?}",
            costs
        );
    }
    assert!(
        costs[costs.len() - 1] < costs[0],
        "cost failed to decrease over four cycles: {:?}",
        costs
    );
}
