//! The compartment-graph builder.
//!
//! A [`Model`] owns an ordered collection of compartments whose position in
//! the collection **is** their index in the shared state vector. Structural
//! operations are strictly append-only: inserting a compartment into an
//! existing graph never removes or reorders compartments, which is what
//! allows every rate function to hold fixed state indices. Consistency of
//! the live system of equations across edits is preserved by moving rate
//! functions between compartments (ownership transfer, never aliasing) and,
//! where a moved function still reads its original index, by wrapping it in
//! the index-permutation adapter from [`rate`].

mod compartment;
pub mod rate;

pub use compartment::Compartment;
pub use rate::{windows_from_rows, Connection, Dosing, Elimination, RateFn};

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{ConfigurationError, PknetError};
use crate::model::rate::Rate;
use crate::solver::{self, Trajectory};

/// Label of the virtual boundary node used for dosing and elimination edges
/// in the exported network view.
pub const BOUNDARY: &str = "";

/// What to do with the existing compartment's first output when a child is
/// inserted downstream of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShift {
    /// Leave the parent's outputs untouched; the child starts with no
    /// output and the parent gains the connection as an extra output.
    None,
    /// Move the parent's first output to the child unchanged.
    Move,
    /// Move the parent's first output to the child and rescale it by
    /// `parent_volume / child_volume`, keeping a first-order flow
    /// numerically consistent after the move.
    MoveVolumeCorrected,
}

/// Node and edge lists describing the network topology, for consumption by
/// an external graph renderer. Boundary (dosing/elimination) edges use
/// [`BOUNDARY`] as their outside label. No data flows back.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkView {
    /// Compartment names in state-vector order.
    pub nodes: Vec<String>,
    /// Directed edges, including the designated entry and exit edges.
    pub edges: Vec<(String, String)>,
}

/// A compartmental pharmacokinetic model under construction.
///
/// The builder starts empty; [`create_root`](Model::create_root) creates
/// compartment 0 and every further structural operation appends exactly one
/// compartment (manual [`add_input`](Model::add_input) /
/// [`add_output`](Model::add_output) append none). Once built, the model
/// yields the combined ODE right-hand side via [`rhs`](Model::rhs) or
/// [`assemble_rhs`](Model::assemble_rhs) and integrates it with
/// [`solve`](Model::solve).
///
/// ```
/// use pknet::{Connection, Dosing, Elimination, Model};
///
/// let mut model = Model::new();
/// model
///     .create_root(
///         "central",
///         1.0,
///         Dosing::Constant { rate: 1.0 },
///         Elimination::FirstOrder { k: 1.0 },
///     )
///     .unwrap();
/// model
///     .add_sibling("central", "peripheral", 1.0, Connection::FirstOrder { k: 1.0 })
///     .unwrap();
///
/// let dq = model.rhs(0.0, &[1.0, 2.0]).unwrap();
/// assert_eq!(dq, vec![1.0, -1.0]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Model {
    compartments: Vec<Compartment>,
    names: Vec<String>,
    indices: HashMap<String, usize>,
    edges: Vec<(String, String)>,
    entry_edge: Option<(String, String)>,
    exit_edge: Option<(String, String)>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compartments, which is also the required state-vector length.
    pub fn len(&self) -> usize {
        self.compartments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compartments.is_empty()
    }

    /// Compartments in state-vector order.
    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    /// Look up a compartment by name.
    pub fn compartment(&self, name: &str) -> Option<&Compartment> {
        self.indices.get(name).map(|&i| &self.compartments[i])
    }

    /// Compartment names in state-vector order.
    pub fn compartment_names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    /// Export the topology for visualization.
    pub fn network(&self) -> NetworkView {
        let mut edges = self.edges.clone();
        if let Some(entry) = &self.entry_edge {
            edges.push(entry.clone());
        }
        if let Some(exit) = &self.exit_edge {
            edges.push(exit.clone());
        }
        NetworkView {
            nodes: self.names.clone(),
            edges,
        }
    }

    /// Set up a basic one-compartment model.
    ///
    /// Creates compartment 0 with the given dosing function as its input and
    /// the given elimination as its output. A first-order elimination
    /// constant `k` is scaled to `k / volume` so that it acts on
    /// concentration rather than mass. Also records the boundary entry and
    /// exit edges for the network view.
    pub fn create_root(
        &mut self,
        name: &str,
        volume: f64,
        dosing: Dosing,
        elimination: Elimination,
    ) -> Result<(), PknetError> {
        if !self.compartments.is_empty() {
            return Err(ConfigurationError::AlreadyInitialized.into());
        }
        self.check_new_compartment(name, volume)?;

        let input = dosing.resolve()?;
        let output = elimination.resolve(volume, 0);
        self.register(name, Compartment::new(0, volume, Some(input), Some(output)));

        self.entry_edge = Some((BOUNDARY.to_string(), name.to_string()));
        self.exit_edge = Some((name.to_string(), BOUNDARY.to_string()));
        Ok(())
    }

    /// Add a new compartment upstream of `existing`.
    ///
    /// A first-order connection flows from the new compartment into the
    /// existing one at rate `k / new_volume * q[new]`; the identical rate
    /// value is the new compartment's outflow and the existing compartment's
    /// inflow, which is the mass-balance contract of a first-order exchange.
    ///
    /// With `shift_input` the existing compartment's *first* input function
    /// is moved to the new parent (dosing now arrives upstream) and its old
    /// slot is taken by the connection; the entry edge is redirected to the
    /// parent. Without it the parent starts with no input and the existing
    /// compartment gains the connection as an additional input.
    pub fn add_parent(
        &mut self,
        existing: &str,
        name: &str,
        volume: f64,
        connection: Connection,
        shift_input: bool,
    ) -> Result<(), PknetError> {
        let old_index = self.index_of(existing)?;
        self.check_new_compartment(name, volume)?;

        let new_index = self.compartments.len();
        let conn = connection.resolve(volume, new_index);

        let new_comp = if shift_input {
            let old = &mut self.compartments[old_index];
            if old.n_inputs() == 0 {
                return Err(ConfigurationError::NoInputToShift {
                    name: existing.to_string(),
                }
                .into());
            }
            let shifted = old.inputs_mut().remove(0);
            old.inputs_mut().insert(0, conn.clone());
            self.entry_edge = Some((BOUNDARY.to_string(), name.to_string()));
            Compartment::new(new_index, volume, Some(shifted), Some(conn))
        } else {
            self.compartments[old_index].inputs_mut().push(conn.clone());
            Compartment::new(new_index, volume, None, Some(conn))
        };

        self.register(name, new_comp);
        self.edges.push((name.to_string(), existing.to_string()));
        Ok(())
    }

    /// Add a new compartment downstream of `existing`.
    ///
    /// Symmetric to [`add_parent`](Model::add_parent): a first-order
    /// connection flows from the existing compartment into the child at
    /// rate `k / existing_volume * q[existing]`.
    ///
    /// When `shift` moves the existing compartment's first output to the
    /// child, the moved function originally read the existing compartment's
    /// state index, so it is wrapped in an adapter that swaps the two index
    /// positions in a private copy of `q` before delegating;
    /// [`OutputShift::MoveVolumeCorrected`] additionally rescales the flow
    /// by `existing_volume / new_volume`. A wrong permutation here would
    /// produce a plausible-looking but wrong trajectory, so the adapter is
    /// exercised directly by the trajectory-equivalence tests.
    pub fn add_child(
        &mut self,
        existing: &str,
        name: &str,
        volume: f64,
        connection: Connection,
        shift: OutputShift,
    ) -> Result<(), PknetError> {
        let old_index = self.index_of(existing)?;
        self.check_new_compartment(name, volume)?;

        let new_index = self.compartments.len();
        let old_volume = self.compartments[old_index].volume();
        let conn = connection.resolve(old_volume, old_index);

        let new_comp = match shift {
            OutputShift::None => {
                self.compartments[old_index]
                    .outputs_mut()
                    .push(conn.clone());
                Compartment::new(new_index, volume, Some(conn), None)
            }
            OutputShift::Move | OutputShift::MoveVolumeCorrected => {
                let old = &mut self.compartments[old_index];
                if old.n_outputs() == 0 {
                    return Err(ConfigurationError::NoOutputToShift {
                        name: existing.to_string(),
                    }
                    .into());
                }
                let moved = old.outputs_mut().remove(0);
                old.outputs_mut().insert(0, conn.clone());

                let scale = match shift {
                    OutputShift::MoveVolumeCorrected => old_volume / volume,
                    _ => 1.0,
                };
                let shifted = Rate::permuted(moved, new_index, old_index, scale);
                self.exit_edge = Some((name.to_string(), BOUNDARY.to_string()));
                Compartment::new(new_index, volume, Some(conn), Some(shifted))
            }
        };

        self.register(name, new_comp);
        self.edges.push((existing.to_string(), name.to_string()));
        Ok(())
    }

    /// Add a new compartment beside `existing`, connected by a first-order
    /// equilibrium exchange in both directions.
    ///
    /// The existing compartment gains an extra output
    /// (`k / existing_volume * q[existing]`, flowing to the sibling) and an
    /// extra input (`k / new_volume * q[new]`, flowing back); the sibling
    /// gets exactly those two functions as its sole input and output. Only
    /// first-order connections are meaningful here; anything else fails with
    /// [`ConfigurationError::SiblingConnectionNotFirstOrder`].
    pub fn add_sibling(
        &mut self,
        existing: &str,
        name: &str,
        volume: f64,
        connection: Connection,
    ) -> Result<(), PknetError> {
        let old_index = self.index_of(existing)?;
        self.check_new_compartment(name, volume)?;

        let k = match connection {
            Connection::FirstOrder { k } => k,
            Connection::Custom(_) => {
                return Err(ConfigurationError::SiblingConnectionNotFirstOrder.into())
            }
        };

        let new_index = self.compartments.len();
        let old_volume = self.compartments[old_index].volume();
        let to_sibling = Rate::FirstOrder {
            k: k / old_volume,
            index: old_index,
        };
        let from_sibling = Rate::FirstOrder {
            k: k / volume,
            index: new_index,
        };

        let new_comp = Compartment::new(
            new_index,
            volume,
            Some(to_sibling.clone()),
            Some(from_sibling.clone()),
        );
        let old = &mut self.compartments[old_index];
        old.inputs_mut().push(from_sibling);
        old.outputs_mut().push(to_sibling);

        self.register(name, new_comp);
        self.edges.push((existing.to_string(), name.to_string()));
        self.edges.push((name.to_string(), existing.to_string()));
        Ok(())
    }

    /// Manually append an input function to the named compartment and record
    /// a boundary edge labelled `label`.
    pub fn add_input(
        &mut self,
        name: &str,
        f: impl Fn(f64, &[f64]) -> f64 + Send + Sync + 'static,
        label: &str,
    ) -> Result<(), PknetError> {
        let index = self.index_of(name)?;
        self.compartments[index]
            .inputs_mut()
            .push(Rate::Custom(RateFn::new(f)));
        self.edges.push((label.to_string(), name.to_string()));
        Ok(())
    }

    /// Manually append an output function to the named compartment and
    /// record a boundary edge labelled `label`.
    pub fn add_output(
        &mut self,
        name: &str,
        f: impl Fn(f64, &[f64]) -> f64 + Send + Sync + 'static,
        label: &str,
    ) -> Result<(), PknetError> {
        let index = self.index_of(name)?;
        self.compartments[index]
            .outputs_mut()
            .push(Rate::Custom(RateFn::new(f)));
        self.edges.push((name.to_string(), label.to_string()));
        Ok(())
    }

    /// Evaluate the full-system RHS: the derivative of every compartment's
    /// quantity, in index order.
    pub fn rhs(&self, t: f64, q: &[f64]) -> Result<Vec<f64>, PknetError> {
        if q.len() != self.compartments.len() {
            return Err(PknetError::DimensionMismatch {
                expected: self.compartments.len(),
                actual: q.len(),
            });
        }
        self.compartments
            .iter()
            .map(|c| c.net_rate(t, q).map_err(PknetError::from))
            .collect()
    }

    /// Assemble the RHS into an owned closure suitable for handing to an
    /// ODE solver.
    ///
    /// The closure snapshots the current compartment list; later edits to
    /// the model do not affect it. It is a pure function of `(t, q)` with no
    /// side effects, so adaptive solvers may call it repeatedly and with
    /// non-monotonic `t`.
    pub fn assemble_rhs(
        &self,
    ) -> impl Fn(f64, &[f64]) -> Result<Vec<f64>, PknetError> + Send + Sync + 'static {
        let compartments = self.compartments.clone();
        move |t, q| {
            if q.len() != compartments.len() {
                return Err(PknetError::DimensionMismatch {
                    expected: compartments.len(),
                    actual: q.len(),
                });
            }
            compartments
                .iter()
                .map(|c| c.net_rate(t, q).map_err(PknetError::from))
                .collect()
        }
    }

    /// Integrate the model over `t_eval`, starting from the initial state
    /// `q0` at `t_eval[0]`.
    ///
    /// The numerical work is delegated wholesale to the solver wrapper; the
    /// returned [`Trajectory`] is its output, unmodified.
    pub fn solve(&self, t_eval: &[f64], q0: &[f64]) -> Result<Trajectory, PknetError> {
        if self.compartments.is_empty() {
            return Err(ConfigurationError::Uninitialized.into());
        }
        if q0.len() != self.compartments.len() {
            return Err(PknetError::DimensionMismatch {
                expected: self.compartments.len(),
                actual: q0.len(),
            });
        }
        solver::solve_ivp(self.assemble_rhs(), t_eval, q0)
    }

    fn index_of(&self, name: &str) -> Result<usize, ConfigurationError> {
        self.indices
            .get(name)
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownCompartment(name.to_string()))
    }

    fn check_new_compartment(&self, name: &str, volume: f64) -> Result<(), ConfigurationError> {
        if self.indices.contains_key(name) {
            return Err(ConfigurationError::DuplicateName(name.to_string()));
        }
        if !(volume.is_finite() && volume > 0.0) {
            return Err(ConfigurationError::NonPositiveVolume {
                name: name.to_string(),
                volume,
            });
        }
        Ok(())
    }

    /// Append a fully constructed compartment. All validation has happened
    /// by the time this runs, so the structural invariants hold on exit.
    fn register(&mut self, name: &str, compartment: Compartment) {
        debug_assert_eq!(compartment.index(), self.compartments.len());
        self.indices.insert(name.to_string(), self.compartments.len());
        self.names.push(name.to_string());
        self.compartments.push(compartment);
    }
}
