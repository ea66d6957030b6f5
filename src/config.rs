use crate::engine::Tolerances;
use crate::model::{Compartments, Rates};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Comparison run configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Rate constants in the base time unit.
    pub rates: Rates,
    /// Shared initial state of every compared configuration.
    pub init: Compartments,
    /// Sampling grid of the base-unit runs.
    pub grid: GridConfig,
    /// Comparison settings.
    pub compare: CompareConfig,
    /// Integrator error control.
    pub solver: Tolerances,
    /// Analysis settings.
    pub analysis: AnalysisConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub t_start: f64,
    pub t_end: f64,
    pub n_points: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    /// Unit ratio for the rescaled configuration (12.0 for annual rates
    /// reinterpreted per month).
    pub unit_ratio: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Times whose nearest trajectory samples are reported.
    pub milestones: Vec<f64>,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config =
            toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.rates.mu1, 0.0..f64::INFINITY).context("invalid inflow rate mu1")?;
        check_num(self.rates.mu2, 0.0..f64::INFINITY).context("invalid outflow rate mu2")?;
        check_num(self.rates.alpha, 0.0..f64::INFINITY).context("invalid exposure rate alpha")?;
        check_num(self.rates.beta, 0.0..f64::INFINITY).context("invalid infection rate beta")?;
        check_num(self.rates.gamma, 0.0..f64::INFINITY).context("invalid recovery rate gamma")?;
        check_num(self.rates.theta, 0.0..f64::INFINITY)
            .context("invalid intervention rate theta")?;

        check_num(self.init.susceptible, 0.0..f64::INFINITY)
            .context("invalid initial susceptible count")?;
        check_num(self.init.exposed, 0.0..f64::INFINITY).context("invalid initial exposed count")?;
        check_num(self.init.infected, 0.0..f64::INFINITY)
            .context("invalid initial infected count")?;
        check_num(self.init.recovered, 0.0..f64::INFINITY)
            .context("invalid initial recovered count")?;

        if !self.grid.t_start.is_finite() || !self.grid.t_end.is_finite() {
            bail!("grid endpoints must be finite");
        }
        if self.grid.n_points > 1 && self.grid.t_end <= self.grid.t_start {
            bail!("grid end time must be greater than its start time");
        }
        check_num(self.grid.n_points, 1..10_000_000).context("invalid number of grid points")?;

        check_num(self.compare.unit_ratio, f64::MIN_POSITIVE..f64::INFINITY)
            .context("invalid unit ratio")?;

        check_num(self.solver.rel_tol, f64::MIN_POSITIVE..1.0)
            .context("invalid relative tolerance")?;
        check_num(self.solver.abs_tol, f64::MIN_POSITIVE..f64::INFINITY)
            .context("invalid absolute tolerance")?;
        check_num(self.solver.max_steps, 1..100_000_000).context("invalid step budget")?;

        for (idx, milestone) in self.analysis.milestones.iter().enumerate() {
            if !milestone.is_finite() {
                bail!("milestone {idx} must be finite, but is {milestone}");
            }
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_toml() -> String {
        String::new()
            + "[rates]\n"
            + "mu1 = 0.409\n"
            + "mu2 = 0.097\n"
            + "alpha = 0.438\n"
            + "beta = 0.102\n"
            + "gamma = 0.051\n"
            + "theta = 1.0\n"
            + "\n"
            + "[init]\n"
            + "susceptible = 72.0\n"
            + "exposed = 77.0\n"
            + "infected = 18.0\n"
            + "recovered = 9.0\n"
            + "\n"
            + "[grid]\n"
            + "t_start = 0.0\n"
            + "t_end = 36.0\n"
            + "n_points = 360\n"
            + "\n"
            + "[compare]\n"
            + "unit_ratio = 12.0\n"
            + "\n"
            + "[solver]\n"
            + "rel_tol = 1e-8\n"
            + "abs_tol = 1e-6\n"
            + "max_steps = 100000\n"
            + "\n"
            + "[analysis]\n"
            + "milestones = [3.6, 7.2, 18.0, 36.0]\n"
    }

    fn parse_and_validate(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn valid_config_passes_validation() {
        let config = parse_and_validate(&valid_toml()).unwrap();

        assert_eq!(config.rates.theta, 1.0);
        assert_eq!(config.init.total(), 176.0);
        assert_eq!(config.grid.n_points, 360);
        assert_eq!(config.compare.unit_ratio, 12.0);
        assert_eq!(config.analysis.milestones.len(), 4);
    }

    #[test]
    fn negative_rate_is_rejected() {
        let contents = valid_toml().replace("mu1 = 0.409", "mu1 = -0.409");
        assert!(parse_and_validate(&contents).is_err());
    }

    #[test]
    fn zero_grid_points_is_rejected() {
        let contents = valid_toml().replace("n_points = 360", "n_points = 0");
        assert!(parse_and_validate(&contents).is_err());
    }

    #[test]
    fn reversed_grid_is_rejected() {
        let contents = valid_toml().replace("t_end = 36.0", "t_end = -1.0");
        assert!(parse_and_validate(&contents).is_err());
    }

    #[test]
    fn zero_unit_ratio_is_rejected() {
        let contents = valid_toml().replace("unit_ratio = 12.0", "unit_ratio = 0.0");
        assert!(parse_and_validate(&contents).is_err());
    }

    #[test]
    fn missing_section_is_rejected() {
        let contents = valid_toml().replace("[solver]", "[misnamed]");
        assert!(parse_and_validate(&contents).is_err());
    }
}
