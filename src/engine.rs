//! Numerical integration engine.
//!
//! Solves the SEIR initial-value problem with an adaptive Dormand-Prince 5(4)
//! scheme and samples the trajectory at every requested grid point. Step-size
//! selection is internal; callers only choose the error tolerances.

use crate::model::{Compartments, Population, Rates, SeirModel};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("integration failed: {0}")]
    IntegrationFailure(String),
}

/// Sample times of a trajectory. Always non-empty, finite and strictly
/// increasing; invalid sequences are rejected at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    points: Vec<f64>,
}

impl TimeGrid {
    /// Evenly spaced grid of `n_points` samples spanning `[start, end]`.
    pub fn linspace(start: f64, end: f64, n_points: usize) -> Result<Self, Error> {
        if n_points == 0 {
            return Err(Error::InvalidInput("time grid is empty".into()));
        }
        if n_points == 1 {
            return Self::from_points(vec![start]);
        }
        let step = (end - start) / (n_points - 1) as f64;
        let points = (0..n_points).map(|idx| start + idx as f64 * step).collect();
        Self::from_points(points)
    }

    pub fn from_points(points: Vec<f64>) -> Result<Self, Error> {
        if points.is_empty() {
            return Err(Error::InvalidInput("time grid is empty".into()));
        }
        if points.iter().any(|point| !point.is_finite()) {
            return Err(Error::InvalidInput("time grid has non-finite points".into()));
        }
        if points.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(Error::InvalidInput(
                "time grid is not strictly increasing".into(),
            ));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Multiply every sample time by `ratio`, reinterpreting the horizon in
    /// another unit. The sample count is unchanged, so index i of the
    /// rescaled grid refers to the same instant as index i of the original.
    pub fn rescaled(&self, ratio: f64) -> Self {
        Self {
            points: self.points.iter().map(|point| point * ratio).collect(),
        }
    }

    /// Index of the sample closest to `time`; ties resolve to the earlier
    /// sample, and times outside the grid clamp to the first or last one.
    pub fn nearest_index(&self, time: f64) -> usize {
        let idx = self.points.partition_point(|&point| point < time);
        if idx == 0 {
            return 0;
        }
        if idx == self.points.len() {
            return self.points.len() - 1;
        }
        if time - self.points[idx - 1] <= self.points[idx] - time {
            idx - 1
        } else {
            idx
        }
    }
}

/// Integrator error control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    pub rel_tol: f64,
    pub abs_tol: f64,
    /// Budget of internal step attempts (accepted and rejected) for one
    /// integration; exhausting it is reported as `IntegrationFailure`.
    pub max_steps: usize,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            rel_tol: 1e-8,
            abs_tol: 1e-6,
            max_steps: 100_000,
        }
    }
}

impl Tolerances {
    fn validate(&self) -> Result<(), Error> {
        if !self.rel_tol.is_finite() || self.rel_tol <= 0.0 {
            return Err(Error::InvalidInput("rel_tol must be finite and > 0".into()));
        }
        if !self.abs_tol.is_finite() || self.abs_tol <= 0.0 {
            return Err(Error::InvalidInput("abs_tol must be finite and > 0".into()));
        }
        if self.max_steps == 0 {
            return Err(Error::InvalidInput("max_steps must be > 0".into()));
        }
        Ok(())
    }
}

/// One computed trajectory: a state per grid point plus the model that
/// produced it. Immutable once returned by [`integrate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    grid: TimeGrid,
    states: Vec<Compartments>,
    model: SeirModel,
}

impl Solution {
    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn states(&self) -> &[Compartments] {
        &self.states
    }

    pub fn rates(&self) -> &Rates {
        self.model.rates()
    }

    pub fn population(&self) -> &Population {
        self.model.population()
    }

    /// (time, state) per grid point, in increasing time order.
    pub fn rows(&self) -> impl Iterator<Item = (f64, &Compartments)> + '_ {
        self.grid.points().iter().copied().zip(self.states.iter())
    }

    pub fn final_state(&self) -> &Compartments {
        self.states.last().expect("states are never empty")
    }
}

// Dormand-Prince 5(4) coefficients. The fifth-order weights advance the
// solution; the E* weights give the embedded fourth-order error estimate.
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

const BS1: f64 = 5179.0 / 57600.0;
const BS3: f64 = 7571.0 / 16695.0;
const BS4: f64 = 393.0 / 640.0;
const BS5: f64 = -92097.0 / 339200.0;
const BS6: f64 = 187.0 / 2100.0;
const BS7: f64 = 1.0 / 40.0;

const E1: f64 = B1 - BS1;
const E3: f64 = B3 - BS3;
const E4: f64 = B4 - BS4;
const E5: f64 = B5 - BS5;
const E6: f64 = B6 - BS6;
const E7: f64 = -BS7;

const DIM: usize = 4;

/// Solve the initial-value problem and sample it at every grid point.
///
/// Sub-steps adaptively between requested points and lands on each one
/// exactly, so no interpolation is involved. A one-point grid returns the
/// initial state unchanged.
pub fn integrate(
    model: &SeirModel,
    initial: Compartments,
    grid: &TimeGrid,
    tolerances: &Tolerances,
) -> Result<Solution, Error> {
    tolerances.validate()?;
    if !initial.is_finite() {
        return Err(Error::InvalidInput(
            "initial state has non-finite entries".into(),
        ));
    }
    if !model.rates().is_finite() {
        return Err(Error::InvalidParameters(
            "rate constants must be finite".into(),
        ));
    }
    if let Population::Fixed(n) = model.population() {
        if !n.is_finite() || *n < 0.0 {
            return Err(Error::InvalidInput(format!(
                "total population must be finite and non-negative, got {n}"
            )));
        }
    }

    let points = grid.points();
    let mut states = Vec::with_capacity(points.len());
    states.push(initial);

    if points.len() > 1 {
        let span = points[points.len() - 1] - points[0];
        // Below this the step no longer advances time reliably.
        let h_floor = span * 1e-14;

        let mut t = points[0];
        let mut y = initial.as_array();
        let mut h = span * 1e-3;
        let mut n_steps = 0;

        let eval = |time: f64, y: &[f64; DIM]| -> [f64; DIM] {
            model.deriv(time, &Compartments::from_array(*y)).as_array()
        };

        let mut y_tmp = [0.0; DIM];
        let mut y_new = [0.0; DIM];
        let mut k1 = eval(t, &y);

        for &target in &points[1..] {
            while t < target {
                if n_steps >= tolerances.max_steps {
                    return Err(Error::IntegrationFailure(format!(
                        "step budget of {} exhausted at t = {t:.6e}",
                        tolerances.max_steps
                    )));
                }
                n_steps += 1;

                let landing = h >= target - t;
                let h_try = if landing { target - t } else { h };

                for i in 0..DIM {
                    y_tmp[i] = y[i] + h_try * A21 * k1[i];
                }
                let k2 = eval(t + C2 * h_try, &y_tmp);

                for i in 0..DIM {
                    y_tmp[i] = y[i] + h_try * (A31 * k1[i] + A32 * k2[i]);
                }
                let k3 = eval(t + C3 * h_try, &y_tmp);

                for i in 0..DIM {
                    y_tmp[i] = y[i] + h_try * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
                }
                let k4 = eval(t + C4 * h_try, &y_tmp);

                for i in 0..DIM {
                    y_tmp[i] = y[i]
                        + h_try * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
                }
                let k5 = eval(t + C5 * h_try, &y_tmp);

                for i in 0..DIM {
                    y_tmp[i] = y[i]
                        + h_try
                            * (A61 * k1[i]
                                + A62 * k2[i]
                                + A63 * k3[i]
                                + A64 * k4[i]
                                + A65 * k5[i]);
                }
                let k6 = eval(t + h_try, &y_tmp);

                for i in 0..DIM {
                    y_new[i] = y[i]
                        + h_try
                            * (B1 * k1[i] + B3 * k3[i] + B4 * k4[i] + B5 * k5[i] + B6 * k6[i]);
                }

                // First-same-as-last: k7 doubles as the next step's k1.
                let k7 = eval(t + h_try, &y_new);

                let mut err_norm = 0.0;
                for i in 0..DIM {
                    let err = h_try
                        * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i]
                            + E7 * k7[i]);
                    let scale =
                        tolerances.abs_tol + tolerances.rel_tol * y[i].abs().max(y_new[i].abs());
                    err_norm += (err / scale) * (err / scale);
                }
                err_norm = (err_norm / DIM as f64).sqrt();

                if err_norm <= 1.0 {
                    t = if landing { target } else { t + h_try };
                    y = y_new;
                    k1 = k7;
                }

                let factor = if err_norm == 0.0 {
                    5.0
                } else {
                    (0.9 * err_norm.powf(-0.2)).clamp(0.2, 5.0)
                };
                // An accepted landing step was clamped for output, not for
                // accuracy; keep the larger step estimate in that case.
                h = if landing && err_norm <= 1.0 {
                    h.max(h_try * factor)
                } else {
                    h_try * factor
                };

                if h < h_floor {
                    return Err(Error::IntegrationFailure(format!(
                        "step size underflow at t = {t:.6e}"
                    )));
                }
            }

            states.push(Compartments::from_array(y));
        }
    }

    Ok(Solution {
        grid: grid.clone(),
        states,
        model: *model,
    })
}
