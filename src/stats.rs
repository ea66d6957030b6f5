//! Running statistics over trajectory quantities.

use serde::{Deserialize, Serialize};

/// Single-pass mean and standard deviation (Welford update).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            mean: self.mean,
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Running maximum of a sampled quantity and the time it occurs.
pub struct Extremum {
    time: f64,
    value: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtremumReport {
    pub time: f64,
    pub value: f64,
}

impl Extremum {
    pub fn new() -> Self {
        Self {
            time: f64::NAN,
            value: f64::NEG_INFINITY,
        }
    }

    pub fn add(&mut self, time: f64, value: f64) {
        if value > self.value {
            self.time = time;
            self.value = value;
        }
    }

    pub fn report(&self) -> ExtremumReport {
        ExtremumReport {
            time: self.time,
            value: self.value,
        }
    }
}
