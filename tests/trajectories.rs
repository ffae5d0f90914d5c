use approx::assert_abs_diff_eq;
use pknet::{ConfigurationError, Connection, Dosing, Elimination, Model, OutputShift, PknetError};

fn grid(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let step = (stop - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

#[test]
fn constant_dose_approaches_steady_state() {
    let mut model = Model::new();
    model
        .create_root(
            "central",
            1.0,
            Dosing::Constant { rate: 1.0 },
            Elimination::FirstOrder { k: 1.0 },
        )
        .unwrap();

    let t_eval = grid(0.0, 20.0, 81);
    let trajectory = model.solve(&t_eval, &[0.0]).unwrap();

    assert_eq!(trajectory.times(), t_eval.as_slice());
    assert_eq!(trajectory.values().len(), 1);

    let central = trajectory.compartment(0).unwrap();
    assert_eq!(central.len(), t_eval.len());
    assert_eq!(central[0], 0.0);
    // dq/dt = 1 - q, so q(t) = 1 - e^{-t}.
    let idx = 20; // t = 5
    assert_abs_diff_eq!(central[idx], 1.0 - (-5.0_f64).exp(), epsilon = 1e-3);
    assert_abs_diff_eq!(*central.last().unwrap(), 1.0, epsilon = 1e-3);
}

// The same physical system built two ways: once by shifting the root's
// first-order elimination onto a child of a different volume (exercising the
// index-permutation adapter and the volume correction), and once wired up
// explicitly. Their trajectories must agree at every shared time point.
#[test]
fn volume_corrected_shift_preserves_the_flow() {
    let mut shifted = Model::new();
    shifted
        .create_root(
            "central",
            2.0,
            Dosing::Constant { rate: 1.0 },
            Elimination::FirstOrder { k: 3.0 },
        )
        .unwrap();
    shifted
        .add_child(
            "central",
            "renal",
            0.5,
            Connection::FirstOrder { k: 1.0 },
            OutputShift::MoveVolumeCorrected,
        )
        .unwrap();

    let mut explicit = Model::new();
    explicit
        .create_root(
            "central",
            2.0,
            Dosing::Constant { rate: 1.0 },
            Elimination::FirstOrder { k: 0.0 },
        )
        .unwrap();
    explicit
        .add_child(
            "central",
            "renal",
            0.5,
            Connection::FirstOrder { k: 1.0 },
            OutputShift::None,
        )
        .unwrap();
    // The moved elimination acted on the root (k/v = 3/2) and is rescaled by
    // the volume ratio 2/0.5 on the move, so the child eliminates at
    // (3/2) * 4 * q[1] = 6 q[1].
    explicit
        .add_output("renal", |_t, q: &[f64]| 6.0 * q[1], "urine")
        .unwrap();

    let t_eval = grid(0.0, 5.0, 21);
    let q0 = [2.0, 0.0];
    let a = shifted.solve(&t_eval, &q0).unwrap();
    let b = explicit.solve(&t_eval, &q0).unwrap();

    for comp in 0..2 {
        let ya = a.compartment(comp).unwrap();
        let yb = b.compartment(comp).unwrap();
        assert_eq!(ya.len(), yb.len());
        for i in 0..t_eval.len() {
            assert_abs_diff_eq!(ya[i], yb[i], epsilon = 1e-3);
        }
    }

    // Both renderings agree with a direct RHS substitution as well.
    let q = [1.0, 0.5];
    let da = shifted.rhs(0.0, &q).unwrap();
    let db = explicit.rhs(0.0, &q).unwrap();
    for i in 0..2 {
        assert_abs_diff_eq!(da[i], db[i], epsilon = 1e-12);
    }
}

#[test]
fn sibling_equilibrium_conserves_mass_without_elimination() {
    let mut model = Model::new();
    model
        .create_root(
            "central",
            1.0,
            Dosing::Constant { rate: 0.0 },
            Elimination::FirstOrder { k: 0.0 },
        )
        .unwrap();
    model
        .add_sibling("central", "tissue", 2.0, Connection::FirstOrder { k: 1.0 })
        .unwrap();

    let t_eval = grid(0.0, 10.0, 41);
    let trajectory = model.solve(&t_eval, &[3.0, 0.0]).unwrap();

    let central = trajectory.compartment(0).unwrap();
    let tissue = trajectory.compartment(1).unwrap();
    for i in 0..t_eval.len() {
        assert_abs_diff_eq!(central[i] + tissue[i], 3.0, epsilon = 1e-3);
    }
    // Equilibrium balances concentrations: q0/v0 == q1/v1, so with a total
    // mass of 3 the compartments settle at 1 and 2.
    assert_abs_diff_eq!(*central.last().unwrap(), 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(*tissue.last().unwrap(), 2.0, epsilon = 1e-3);
}

// Models hold only `Send + Sync` rate functions, so a solve can run on a
// worker thread. The closure takes the model by value.
#[test]
fn models_solve_on_worker_threads() {
    let mut model = Model::new();
    model
        .create_root(
            "central",
            1.0,
            Dosing::Constant { rate: 1.0 },
            Elimination::FirstOrder { k: 1.0 },
        )
        .unwrap();

    let t_eval = grid(0.0, 5.0, 21);
    let handle = {
        let t_eval = t_eval.clone();
        std::thread::spawn(move || model.solve(&t_eval, &[0.0]).unwrap())
    };
    let trajectory = handle.join().unwrap();

    assert_eq!(trajectory.times(), t_eval.as_slice());
    assert_abs_diff_eq!(
        *trajectory.compartment(0).unwrap().last().unwrap(),
        1.0 - (-5.0_f64).exp(),
        epsilon = 1e-3
    );
}

#[test]
fn single_point_grid_returns_the_initial_state() {
    let mut model = Model::new();
    model
        .create_root(
            "central",
            1.0,
            Dosing::Constant { rate: 1.0 },
            Elimination::FirstOrder { k: 1.0 },
        )
        .unwrap();

    let trajectory = model.solve(&[0.0], &[4.0]).unwrap();
    assert_eq!(trajectory.times(), &[0.0]);
    assert_eq!(trajectory.compartment(0).unwrap(), &[4.0]);
}

#[test]
fn bad_time_grids_are_rejected() {
    let mut model = Model::new();
    model
        .create_root(
            "central",
            1.0,
            Dosing::Constant { rate: 1.0 },
            Elimination::FirstOrder { k: 1.0 },
        )
        .unwrap();

    for t_eval in [vec![], vec![0.0, 1.0, 1.0], vec![0.0, 2.0, 1.0]] {
        let err = model.solve(&t_eval, &[0.0]).unwrap_err();
        assert!(matches!(
            err,
            PknetError::Configuration(ConfigurationError::InvalidTimeGrid)
        ));
    }
}

#[test]
fn solving_an_empty_model_fails() {
    let model = Model::new();
    let err = model.solve(&[0.0, 1.0], &[]).unwrap_err();
    assert!(matches!(
        err,
        PknetError::Configuration(ConfigurationError::Uninitialized)
    ));
}

#[test]
fn trajectories_serialize_for_external_plotting() {
    let mut model = Model::new();
    model
        .create_root(
            "central",
            1.0,
            Dosing::Constant { rate: 1.0 },
            Elimination::FirstOrder { k: 1.0 },
        )
        .unwrap();

    let trajectory = model.solve(&grid(0.0, 1.0, 5), &[0.0]).unwrap();
    let json = serde_json::to_value(&trajectory).unwrap();
    assert_eq!(json["times"].as_array().unwrap().len(), 5);
    assert_eq!(json["values"].as_array().unwrap().len(), 1);
}
