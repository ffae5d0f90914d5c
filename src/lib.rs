//! `pknet` is a library for assembling compartmental pharmacokinetic (PK)
//! models as directed networks and solving the resulting system of ODEs.
//!
//! A [`Model`] is built declaratively: create a root compartment with a
//! dosing input and an elimination output, then grow the network with
//! [`add_parent`](Model::add_parent), [`add_child`](Model::add_child),
//! [`add_sibling`](Model::add_sibling) and manual
//! [`add_input`](Model::add_input)/[`add_output`](Model::add_output) calls.
//! Each compartment occupies a fixed slot of the shared state vector; the
//! builder keeps the system of equations consistent across insertions by
//! transferring rate functions between compartments and re-targeting their
//! state indices where needed. The assembled right-hand side is handed to
//! an external ODE solver (`diffsol`), which produces a [`Trajectory`].
//!
//! ```
//! use pknet::{Connection, Dosing, Elimination, Model, OutputShift};
//!
//! let mut model = Model::new();
//! model
//!     .create_root(
//!         "central",
//!         2.0,
//!         Dosing::Windowed {
//!             rate: 5.0,
//!             windows: vec![(0.0, 1.0), (2.0, 3.0)],
//!         },
//!         Elimination::FirstOrder { k: 1.0 },
//!     )
//!     .unwrap();
//! model
//!     .add_child(
//!         "central",
//!         "renal",
//!         0.5,
//!         Connection::FirstOrder { k: 1.0 },
//!         OutputShift::MoveVolumeCorrected,
//!     )
//!     .unwrap();
//!
//! assert_eq!(model.compartment_names(), vec!["central", "renal"]);
//! let dq = model.rhs(0.5, &[1.0, 0.0]).unwrap();
//! assert_eq!(dq.len(), 2);
//! ```

pub mod error;
pub mod model;
pub mod solver;

pub use error::{ConfigurationError, PknetError, RateError};
pub use model::{
    windows_from_rows, Compartment, Connection, Dosing, Elimination, Model, NetworkView,
    OutputShift, RateFn, BOUNDARY,
};
pub use solver::Trajectory;

pub mod prelude {
    pub use crate::error::{ConfigurationError, PknetError, RateError};
    pub use crate::model::{
        windows_from_rows, Compartment, Connection, Dosing, Elimination, Model, NetworkView,
        OutputShift, RateFn,
    };
    pub use crate::solver::Trajectory;
}
