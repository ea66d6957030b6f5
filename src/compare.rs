//! Multi-variant comparison.
//!
//! Runs the same initial condition through several model configurations so
//! the resulting trajectories can be compared sample by sample.

use crate::engine::{Error, Solution, TimeGrid, Tolerances, integrate};
use crate::model::{Compartments, Population, Rates, SeirModel};

/// One labelled simulation configuration: a model variant bound to the grid
/// it is sampled on. Gives every variant the same call shape.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub label: String,
    pub model: SeirModel,
    pub grid: TimeGrid,
}

impl Scenario {
    pub fn new(label: impl Into<String>, model: SeirModel, grid: TimeGrid) -> Self {
        Self {
            label: label.into(),
            model,
            grid,
        }
    }

    pub fn run(&self, initial: Compartments, tolerances: &Tolerances) -> Result<Solution, Error> {
        integrate(&self.model, initial, &self.grid, tolerances)
    }
}

/// Outcome of a comparison run: solutions for the configurations that
/// succeeded and the error for each one that failed. A failed configuration
/// contributes no partial trajectory.
#[derive(Debug)]
pub struct Comparison {
    pub solutions: Vec<(String, Solution)>,
    pub failures: Vec<(String, Error)>,
}

impl Comparison {
    pub fn solution(&self, label: &str) -> Option<&Solution> {
        self.solutions
            .iter()
            .find(|(have, _)| have == label)
            .map(|(_, solution)| solution)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The canonical comparison set over one initial condition:
///
/// - `fixed-n-annual`: constant N equal to the initial total, base rates;
/// - `dynamic-n-annual`: N recomputed from the state, base rates;
/// - `dynamic-n-monthly`: every rate divided by `unit_ratio` and the grid
///   multiplied by it, so sample i matches sample i of the annual runs.
pub fn standard_scenarios(
    rates: &Rates,
    grid: &TimeGrid,
    initial: &Compartments,
    unit_ratio: f64,
) -> Vec<Scenario> {
    vec![
        Scenario::new(
            "fixed-n-annual",
            SeirModel::new(*rates, Population::Fixed(initial.total())),
            grid.clone(),
        ),
        Scenario::new(
            "dynamic-n-annual",
            SeirModel::new(*rates, Population::Dynamic),
            grid.clone(),
        ),
        Scenario::new(
            "dynamic-n-monthly",
            SeirModel::new(rates.rescaled(unit_ratio), Population::Dynamic),
            grid.rescaled(unit_ratio),
        ),
    ]
}

/// Run every scenario against the same initial state. Runs are independent
/// pure computations, so execution order cannot affect the results; failures
/// are collected per label instead of aborting the remaining runs.
pub fn run_comparison(
    initial: Compartments,
    scenarios: &[Scenario],
    tolerances: &Tolerances,
) -> Comparison {
    let mut solutions = Vec::with_capacity(scenarios.len());
    let mut failures = Vec::new();

    for scenario in scenarios {
        match scenario.run(initial, tolerances) {
            Ok(solution) => solutions.push((scenario.label.clone(), solution)),
            Err(error) => failures.push((scenario.label.clone(), error)),
        }
    }

    Comparison {
        solutions,
        failures,
    }
}
