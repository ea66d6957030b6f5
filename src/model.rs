//! SEIR model definitions.
//!
//! Two variants of the same compartmental model: one with a constant total
//! population supplied from outside, one where the total is recomputed from
//! the state at every evaluation.

use serde::{Deserialize, Serialize};

/// Population counts of the four compartments at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Compartments {
    pub susceptible: f64,
    pub exposed: f64,
    pub infected: f64,
    pub recovered: f64,
}

impl Compartments {
    pub fn new(susceptible: f64, exposed: f64, infected: f64, recovered: f64) -> Self {
        Self {
            susceptible,
            exposed,
            infected,
            recovered,
        }
    }

    pub fn total(&self) -> f64 {
        self.susceptible + self.exposed + self.infected + self.recovered
    }

    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|val| val.is_finite())
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.susceptible, self.exposed, self.infected, self.recovered]
    }

    pub fn from_array(vals: [f64; 4]) -> Self {
        Self::new(vals[0], vals[1], vals[2], vals[3])
    }
}

/// Transition rate constants, expressed in the caller's chosen time unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    /// Inflow (recruitment) rate.
    pub mu1: f64,
    /// Outflow rate from every compartment.
    pub mu2: f64,
    /// S -> E transition rate.
    pub alpha: f64,
    /// E -> I transition rate.
    pub beta: f64,
    /// I -> R natural recovery rate.
    pub gamma: f64,
    /// I -> R intervention-driven recovery rate.
    pub theta: f64,
}

impl Rates {
    /// Convert to another time unit by dividing every rate by `ratio`
    /// (e.g. 12.0 for annual to monthly).
    pub fn rescaled(&self, ratio: f64) -> Self {
        Self {
            mu1: self.mu1 / ratio,
            mu2: self.mu2 / ratio,
            alpha: self.alpha / ratio,
            beta: self.beta / ratio,
            gamma: self.gamma / ratio,
            theta: self.theta / ratio,
        }
    }

    /// Long-run trend of the dynamic-population total: positive means the
    /// total grows without bound, non-positive means decline or stability.
    pub fn net_growth_rate(&self) -> f64 {
        self.mu1 - self.mu2
    }

    /// Basic reproduction number of the infected compartment. Below one the
    /// system decays toward the disease-free state.
    pub fn reproduction_number(&self) -> f64 {
        self.beta / (self.gamma + self.theta + self.mu2)
    }

    pub fn is_finite(&self) -> bool {
        [self.mu1, self.mu2, self.alpha, self.beta, self.gamma, self.theta]
            .iter()
            .all(|rate| rate.is_finite())
    }
}

/// How the total population N entering the inflow term is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Population {
    /// N is an external constant, independent of the current state.
    Fixed(f64),
    /// N is recomputed as S + E + I + R at every evaluation.
    Dynamic,
}

impl Population {
    pub fn label(&self) -> &'static str {
        match self {
            Population::Fixed(_) => "fixed-n",
            Population::Dynamic => "dynamic-n",
        }
    }
}

/// One model variant bound to its rate constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeirModel {
    rates: Rates,
    population: Population,
}

impl SeirModel {
    pub fn new(rates: Rates, population: Population) -> Self {
        Self { rates, population }
    }

    pub fn rates(&self) -> &Rates {
        &self.rates
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Instantaneous rate of change of each compartment.
    ///
    /// Pure: the integrator evaluates this a solver-dependent number of
    /// times per step, including trial steps that are later discarded.
    /// The time argument is part of the ODE signature and unused here.
    pub fn deriv(&self, _time: f64, state: &Compartments) -> Compartments {
        let Rates {
            mu1,
            mu2,
            alpha,
            beta,
            gamma,
            theta,
        } = self.rates;

        let n = match self.population {
            Population::Fixed(n) => n,
            Population::Dynamic => state.total(),
        };

        Compartments {
            susceptible: mu1 * n - (alpha + mu2) * state.susceptible,
            exposed: alpha * state.susceptible - (beta + mu2) * state.exposed,
            infected: beta * state.exposed - (gamma + theta + mu2) * state.infected,
            recovered: (gamma + theta) * state.infected - mu2 * state.recovered,
        }
    }
}

/// Closed-form endemic equilibrium of the fixed-N variant.
///
/// Solves deriv = 0 compartment by compartment: the susceptible equation
/// depends only on S, and each later compartment only on the ones before it.
pub fn equilibrium(rates: &Rates, n: f64) -> Compartments {
    let susceptible = rates.mu1 * n / (rates.alpha + rates.mu2);
    let exposed = rates.alpha * susceptible / (rates.beta + rates.mu2);
    let infected = rates.beta * exposed / (rates.gamma + rates.theta + rates.mu2);
    let recovered = (rates.gamma + rates.theta) * infected / rates.mu2;
    Compartments {
        susceptible,
        exposed,
        infected,
        recovered,
    }
}
