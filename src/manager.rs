use crate::analysis::Analyzer;
use crate::compare::{run_comparison, standard_scenarios};
use crate::config::Config;
use crate::engine::{Solution, TimeGrid};
use anyhow::{Context, Result, bail};
use glob::glob;
use rmp_serde::{decode, encode};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Orchestrates comparison runs and analysis over a simulation directory
/// holding a `config.toml`. The engine itself performs no I/O; everything
/// written here is presentation output.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Run the standard comparison set and write one solution file per
    /// successful configuration. Failed configurations are reported per
    /// label; the successful ones are still written.
    pub fn compare_sim(&self) -> Result<()> {
        let grid = TimeGrid::linspace(
            self.cfg.grid.t_start,
            self.cfg.grid.t_end,
            self.cfg.grid.n_points,
        )
        .context("failed to build time grid")?;

        let scenarios = standard_scenarios(
            &self.cfg.rates,
            &grid,
            &self.cfg.init,
            self.cfg.compare.unit_ratio,
        );
        log::info!(
            "comparing {} configurations over {} grid points",
            scenarios.len(),
            grid.len()
        );

        let comparison = run_comparison(self.cfg.init, &scenarios, &self.cfg.solver);

        for (label, error) in &comparison.failures {
            log::warn!("configuration {label} failed: {error}");
        }
        if comparison.solutions.is_empty() {
            bail!("every configuration failed");
        }

        for (label, solution) in &comparison.solutions {
            let file = self.solution_file(label);
            write_solution(&file, solution)
                .with_context(|| format!("failed to write {file:?}"))?;

            let final_state = solution.final_state();
            log::info!(
                "{label}: final S={:.2} E={:.2} I={:.2} R={:.2} total={:.2}",
                final_state.susceptible,
                final_state.exposed,
                final_state.infected,
                final_state.recovered,
                final_state.total()
            );
        }

        if comparison.is_complete() {
            if let (Some(fixed), Some(dynamic)) = (
                comparison.solution("fixed-n-annual"),
                comparison.solution("dynamic-n-annual"),
            ) {
                let diff = dynamic.final_state().total() - fixed.final_state().total();
                log::info!("dynamic-n final total exceeds fixed-n by {diff:.2}");
            }
        }

        Ok(())
    }

    /// Analyze every solution file in the directory and write the milestone
    /// and diagnostic reports to `results.json`.
    pub fn analyze_sim(&self) -> Result<()> {
        let files = self
            .solution_files()
            .context("failed to list solution files")?;
        if files.is_empty() {
            bail!("no solution files found; run compare first");
        }

        let analyzer = Analyzer::new(self.cfg.analysis.milestones.clone());

        let mut reports = serde_json::Map::new();
        for file in files {
            let solution = read_solution(&file).with_context(|| format!("failed to read {file:?}"))?;
            let label = solution_label(&file)?;
            reports.insert(label, analyzer.analyze(&solution));
        }

        let file = self.results_file();
        let file = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &reports).context("failed to write results")?;

        log::info!("analyzed {} solution(s)", reports.len());

        Ok(())
    }

    /// Remove generated solution and result files, keeping the config.
    pub fn clean_sim(&self) -> Result<()> {
        let mut n_removed = 0;
        for file in self
            .solution_files()
            .context("failed to list solution files")?
        {
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            n_removed += 1;
        }

        let results = self.results_file();
        if results.exists() {
            fs::remove_file(&results).with_context(|| format!("failed to remove {results:?}"))?;
            n_removed += 1;
        }

        log::info!("removed {n_removed} file(s)");

        Ok(())
    }

    fn solution_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("solution-*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let mut files: Vec<_> = glob(pattern)
            .context("failed to glob solution files")?
            .filter_map(Result::ok)
            .collect();
        files.sort();
        Ok(files)
    }

    fn solution_file(&self, label: &str) -> PathBuf {
        self.sim_dir.join(format!("solution-{label}.msgpack"))
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.json")
    }
}

fn write_solution(file: &Path, solution: &Solution) -> Result<()> {
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write(&mut writer, solution).context("failed to serialize solution")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

fn read_solution(file: &Path) -> Result<Solution> {
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    let solution = decode::from_read(&mut reader).context("failed to deserialize solution")?;
    Ok(solution)
}

fn solution_label(file: &Path) -> Result<String> {
    let stem = file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("invalid solution file name {file:?}"))?;
    let label = stem
        .strip_prefix("solution-")
        .with_context(|| format!("unexpected solution file name {file:?}"))?;
    Ok(label.to_string())
}
