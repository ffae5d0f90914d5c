//! Integration wrapper around the external ODE solver.
//!
//! The model hands over an assembled RHS closure, an initial state and a
//! time grid; everything numerical happens inside `diffsol` (BDF with a
//! dense nalgebra backend). The wrapper steps the solver to each requested
//! time point with the stop-time mechanism and copies the state out, so the
//! returned trajectory is sampled exactly on the caller's grid.

use diffsol::{
    error::{DiffsolError, OdeSolverError},
    NalgebraLU, NalgebraMat, NalgebraVec, OdeBuilder, OdeSolverMethod, OdeSolverStopReason,
    Vector, VectorHost,
};
use serde::Serialize;

use crate::error::{ConfigurationError, PknetError};

type T = f64;
type V = NalgebraVec<T>;
type M = NalgebraMat<T>;

const RTOL: f64 = 1e-4;
const ATOL: f64 = 1e-4;
const H0: f64 = 1e-3;

/// Step used for the directional-difference Jacobian action. Exact (up to
/// rounding) for the affine systems the builder produces.
const JAC_EPS: f64 = 1e-6;

/// An integrated model trajectory: ordered time samples and one quantity
/// series per compartment.
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    times: Vec<f64>,
    values: Vec<Vec<f64>>,
}

impl Trajectory {
    /// Time points, identical to the grid passed to `solve`.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Quantity samples indexed as `values()[compartment][time]`.
    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    /// Quantity series of one compartment.
    pub fn compartment(&self, index: usize) -> Option<&[f64]> {
        self.values.get(index).map(Vec::as_slice)
    }
}

/// Integrate `dq/dt = rhs(t, q)` from `q0` at `t_eval[0]`, sampling the
/// state at every point of `t_eval`.
///
/// The RHS closure is fallible (rate functions can break their contract at
/// evaluation time), but the solver's own callback interface is not: a
/// failing RHS poisons the derivative with NaN, which stalls the solver and
/// is reported as a diagnostic error rather than a wrong trajectory.
pub(crate) fn solve_ivp<F>(rhs: F, t_eval: &[f64], q0: &[f64]) -> Result<Trajectory, PknetError>
where
    F: Fn(f64, &[f64]) -> Result<Vec<f64>, PknetError> + Send + Sync + 'static,
{
    if t_eval.is_empty() || t_eval.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ConfigurationError::InvalidTimeGrid.into());
    }

    let nstates = q0.len();
    let t0 = t_eval[0];

    let mut times = Vec::with_capacity(t_eval.len());
    let mut samples: Vec<Vec<f64>> = Vec::with_capacity(t_eval.len());
    times.push(t0);
    samples.push(q0.to_vec());

    if t_eval.len() > 1 {
        let rhs = std::sync::Arc::new(rhs);
        let rhs_for_jac = rhs.clone();

        let rhs_inplace = move |x: &V, _p: &V, t: T, y: &mut V| match (*rhs)(t, x.as_slice()) {
            Ok(dq) => {
                for (yi, dqi) in y.as_mut_slice().iter_mut().zip(dq.iter()) {
                    *yi = *dqi;
                }
            }
            Err(_) => y.fill(f64::NAN),
        };

        // Directional difference (f(x + h v) - f(x)) / h. For the linear
        // first-order networks the builder produces this is the exact
        // Jacobian action; constant dosing terms cancel in the difference.
        let jac_inplace = move |x: &V, _p: &V, t: T, v: &V, y: &mut V| {
            let mut shifted = x.clone();
            shifted.axpy(JAC_EPS, v, 1.0);
            match (
                (*rhs_for_jac)(t, shifted.as_slice()),
                (*rhs_for_jac)(t, x.as_slice()),
            ) {
                (Ok(f1), Ok(f0)) => {
                    for (i, yi) in y.as_mut_slice().iter_mut().enumerate() {
                        *yi = (f1[i] - f0[i]) / JAC_EPS;
                    }
                }
                _ => y.fill(f64::NAN),
            }
        };

        let init = q0.to_vec();
        let init_inplace = move |_p: &V, _t: T, y: &mut V| {
            for (yi, qi) in y.as_mut_slice().iter_mut().zip(init.iter()) {
                *yi = *qi;
            }
        };

        let problem = OdeBuilder::<M>::new()
            .t0(t0)
            .h0(H0)
            .rtol(RTOL)
            .atol(vec![ATOL; nstates])
            .rhs_implicit(rhs_inplace, jac_inplace)
            .init(init_inplace, nstates)
            .build()?;
        let mut solver = problem.bdf::<NalgebraLU<f64>>()?;

        for &t in &t_eval[1..] {
            match solver.set_stop_time(t) {
                Ok(_) => loop {
                    match solver.step() {
                        Ok(OdeSolverStopReason::InternalTimestep) => continue,
                        Ok(OdeSolverStopReason::TstopReached) => break,
                        Ok(reason) => {
                            return Err(PknetError::Other(format!(
                                "unexpected solver stop reason: {:?}",
                                reason
                            )))
                        }
                        Err(DiffsolError::OdeSolverError(
                            OdeSolverError::StepSizeTooSmall { .. },
                        )) => {
                            return Err(PknetError::Other(
                                "the ODE solver's step size went to zero; a rate function is \
                                 likely returning non-finite or extreme values"
                                    .to_string(),
                            ))
                        }
                        Err(err) => return Err(err.into()),
                    }
                },
                Err(DiffsolError::OdeSolverError(OdeSolverError::StopTimeAtCurrentTime)) => {}
                Err(err) => return Err(err.into()),
            }
            times.push(t);
            samples.push(solver.state().y.as_slice().to_vec());
        }
    }

    // Transpose the per-time samples into per-compartment series.
    let mut values = vec![Vec::with_capacity(times.len()); nstates];
    for sample in &samples {
        for (i, qi) in sample.iter().enumerate() {
            values[i].push(*qi);
        }
    }

    Ok(Trajectory { times, values })
}
