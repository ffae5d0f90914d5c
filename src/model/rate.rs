//! Rate-function kinds and their resolved runtime representation.
//!
//! The public configuration enums ([`Dosing`], [`Elimination`],
//! [`Connection`]) carry their own parameters and are resolved exactly once,
//! when a compartment is wired into the model, into a concrete [`Rate`]
//! value. Whether a connection is a recognised built-in is therefore a
//! single explicit match, not an identity comparison against known
//! functions.

use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigurationError, RateError};

/// A user-supplied rate function `(t, q) -> rate`.
///
/// The function must return a finite scalar; a non-finite result is
/// reported as a [`RateError::NonFinite`] when the RHS is evaluated. The
/// state vector `q` always has exactly one entry per compartment.
#[derive(Clone)]
pub struct RateFn(Arc<dyn Fn(f64, &[f64]) -> f64 + Send + Sync>);

impl RateFn {
    pub fn new(f: impl Fn(f64, &[f64]) -> f64 + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub(crate) fn call(&self, t: f64, q: &[f64]) -> f64 {
        (self.0)(t, q)
    }
}

impl fmt::Debug for RateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RateFn")
    }
}

/// Dosing (input) kinds accepted by [`Model::create_root`](crate::Model::create_root).
#[derive(Debug, Clone)]
pub enum Dosing {
    /// Constant-rate dosing: `rate = X` for all `t`.
    Constant { rate: f64 },
    /// Windowed dosing: `rate = X` while `t` falls in any of the closed
    /// intervals, else `0`. Both boundaries are inclusive, so adjacent
    /// windows that touch at a shared timestamp both count at that instant.
    Windowed { rate: f64, windows: Vec<(f64, f64)> },
    /// A fully formed `(t, q) -> rate` function.
    Custom(RateFn),
}

/// Elimination (output) kinds accepted by [`Model::create_root`](crate::Model::create_root).
#[derive(Debug, Clone)]
pub enum Elimination {
    /// First-order decay of the compartment's own quantity, with rate
    /// constant `k / volume`.
    FirstOrder { k: f64 },
    /// A fully formed `(t, q) -> rate` function. No volume scaling is
    /// applied on the caller's behalf.
    Custom(RateFn),
}

/// Connection kinds used when inserting a parent, child or sibling.
#[derive(Debug, Clone)]
pub enum Connection {
    /// First-order exchange with rate constant `k / volume`, where the
    /// volume and the state index it reads depend on the insertion
    /// direction (see the individual `Model::add_*` methods).
    FirstOrder { k: f64 },
    /// A fully formed `(t, q) -> rate` function. The builder does not
    /// attempt volume scaling for custom connections, and siblings reject
    /// them outright.
    Custom(RateFn),
}

/// Convert a dynamically shaped window list into typed pairs, validating
/// that every row is exactly `[start, stop]`.
///
/// The typed API ([`Dosing::Windowed`]) makes malformed shapes
/// unrepresentable; this helper exists for callers holding row-oriented
/// data from elsewhere and reproduces the original shape check.
pub fn windows_from_rows(rows: &[Vec<f64>]) -> Result<Vec<(f64, f64)>, ConfigurationError> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| match row.as_slice() {
            [start, stop] => Ok((*start, *stop)),
            _ => Err(ConfigurationError::MalformedWindow {
                index,
                width: row.len(),
            }),
        })
        .collect()
}

fn validate_windows(windows: &[(f64, f64)]) -> Result<(), ConfigurationError> {
    for (index, &(start, stop)) in windows.iter().enumerate() {
        if !start.is_finite() || !stop.is_finite() || start > stop {
            return Err(ConfigurationError::InvalidWindow { index, start, stop });
        }
    }
    Ok(())
}

/// A rate function resolved against concrete state indices and volumes.
/// This is what compartments actually store and evaluate.
#[derive(Debug, Clone)]
pub(crate) enum Rate {
    Constant {
        rate: f64,
    },
    Windowed {
        rate: f64,
        windows: Vec<(f64, f64)>,
    },
    /// `k * q[index]`. The division by volume has already happened during
    /// resolution.
    FirstOrder {
        k: f64,
        index: usize,
    },
    Custom(RateFn),
    /// Index-permutation adapter for a rate function moved to a different
    /// compartment. The wrapped function still reads the state index it was
    /// built with, so it is evaluated against a private copy of `q` with
    /// positions `a` and `b` swapped, then rescaled. The caller's vector is
    /// never mutated.
    Permuted {
        inner: Box<Rate>,
        a: usize,
        b: usize,
        scale: f64,
    },
}

impl Rate {
    pub(crate) fn permuted(inner: Rate, a: usize, b: usize, scale: f64) -> Self {
        Rate::Permuted {
            inner: Box::new(inner),
            a,
            b,
            scale,
        }
    }

    pub(crate) fn eval(&self, t: f64, q: &[f64]) -> Result<f64, RateError> {
        match self {
            Rate::Constant { rate } => Ok(*rate),
            Rate::Windowed { rate, windows } => {
                // Inclusive on both ends.
                if windows.iter().any(|&(start, stop)| t >= start && t <= stop) {
                    Ok(*rate)
                } else {
                    Ok(0.0)
                }
            }
            Rate::FirstOrder { k, index } => q
                .get(*index)
                .map(|&mass| k * mass)
                .ok_or(RateError::IndexOutOfBounds {
                    index: *index,
                    len: q.len(),
                }),
            Rate::Custom(f) => {
                let rate = f.call(t, q);
                if rate.is_finite() {
                    Ok(rate)
                } else {
                    Err(RateError::NonFinite { time: t })
                }
            }
            Rate::Permuted {
                inner,
                a,
                b,
                scale,
            } => {
                let worst = (*a).max(*b);
                if worst >= q.len() {
                    return Err(RateError::IndexOutOfBounds {
                        index: worst,
                        len: q.len(),
                    });
                }
                let mut swapped = q.to_vec();
                swapped.swap(*a, *b);
                Ok(inner.eval(t, &swapped)? * scale)
            }
        }
    }
}

impl Dosing {
    pub(crate) fn resolve(self) -> Result<Rate, ConfigurationError> {
        match self {
            Dosing::Constant { rate } => Ok(Rate::Constant { rate }),
            Dosing::Windowed { rate, windows } => {
                validate_windows(&windows)?;
                Ok(Rate::Windowed { rate, windows })
            }
            Dosing::Custom(f) => Ok(Rate::Custom(f)),
        }
    }
}

impl Elimination {
    pub(crate) fn resolve(self, volume: f64, index: usize) -> Rate {
        match self {
            Elimination::FirstOrder { k } => Rate::FirstOrder {
                k: k / volume,
                index,
            },
            Elimination::Custom(f) => Rate::Custom(f),
        }
    }
}

impl Connection {
    /// Resolve against the volume and state index of the compartment whose
    /// quantity drives the flow.
    pub(crate) fn resolve(self, volume: f64, index: usize) -> Rate {
        match self {
            Connection::FirstOrder { k } => Rate::FirstOrder {
                k: k / volume,
                index,
            },
            Connection::Custom(f) => Rate::Custom(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windowed_rate_is_inclusive_on_both_boundaries() {
        let rate = Rate::Windowed {
            rate: 5.0,
            windows: vec![(1.0, 3.0), (7.0, 9.0), (12.0, 15.0)],
        };
        for t in [2.0, 8.0, 13.0, 1.0, 3.0, 15.0] {
            assert_eq!(rate.eval(t, &[]).unwrap(), 5.0, "t = {}", t);
        }
        for t in [0.0, 5.0, 17.0] {
            assert_eq!(rate.eval(t, &[]).unwrap(), 0.0, "t = {}", t);
        }
    }

    #[test]
    fn malformed_window_rows_are_rejected() {
        let err = windows_from_rows(&[vec![1.0]]).unwrap_err();
        assert_eq!(err, ConfigurationError::MalformedWindow { index: 0, width: 1 });

        let err = windows_from_rows(&[vec![1.0, 3.0, 6.0], vec![7.0, 9.0, 11.0]]).unwrap_err();
        assert_eq!(err, ConfigurationError::MalformedWindow { index: 0, width: 3 });

        let ok = windows_from_rows(&[vec![1.0, 3.0], vec![7.0, 9.0]]).unwrap();
        assert_eq!(ok, vec![(1.0, 3.0), (7.0, 9.0)]);
    }

    #[test]
    fn inverted_window_is_rejected_at_resolution() {
        let err = Dosing::Windowed {
            rate: 1.0,
            windows: vec![(3.0, 1.0)],
        }
        .resolve()
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidWindow { index: 0, .. }));
    }

    #[test]
    fn permuted_adapter_swaps_a_private_copy() {
        // Reads index 0 of the permuted vector, i.e. index 2 of the original.
        let inner = Rate::FirstOrder { k: 2.0, index: 0 };
        let rate = Rate::permuted(inner, 2, 0, 3.0);

        let q = vec![1.0, 2.0, 5.0];
        assert_eq!(rate.eval(0.0, &q).unwrap(), 2.0 * 5.0 * 3.0);
        // Caller's vector untouched.
        assert_eq!(q, vec![1.0, 2.0, 5.0]);
    }

    #[test]
    fn permuted_adapter_checks_bounds() {
        let rate = Rate::permuted(Rate::Constant { rate: 1.0 }, 0, 3, 1.0);
        let err = rate.eval(0.0, &[1.0, 2.0]).unwrap_err();
        assert_eq!(err, RateError::IndexOutOfBounds { index: 3, len: 2 });
    }

    #[test]
    fn non_finite_custom_rate_is_reported() {
        let rate = Rate::Custom(RateFn::new(|_t, q| 1.0 / q[0]));
        assert_eq!(rate.eval(0.0, &[2.0]).unwrap(), 0.5);
        let err = rate.eval(1.5, &[0.0]).unwrap_err();
        assert_eq!(err, RateError::NonFinite { time: 1.5 });
    }
}
