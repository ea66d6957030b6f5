use std::{fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
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
        + "milestones = [3.6, 7.2, 18.0, 36.0]\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_seircmp"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "compare"]);

    for label in ["fixed-n-annual", "dynamic-n-annual", "dynamic-n-monthly"] {
        let solution_file = test_dir.join(format!("solution-{label}.msgpack"));
        assert!(solution_file.is_file(), "missing {solution_file:?}");
    }

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    let results_file = test_dir.join("results.json");
    let results = fs::read_to_string(&results_file).expect("failed to read results file");
    let results: serde_json::Value =
        serde_json::from_str(&results).expect("failed to parse results file");
    for label in ["fixed-n-annual", "dynamic-n-annual", "dynamic-n-monthly"] {
        assert!(results.get(label).is_some(), "missing report for {label}");
    }
    let growth = results["dynamic-n-annual"]["net_growth_rate"]
        .as_f64()
        .expect("missing net growth rate");
    assert!((growth - 0.312).abs() < 1e-12);

    run_bin(&["--sim-dir", test_dir_str, "clean"]);

    assert!(!results_file.exists());

    fs::remove_dir_all(&test_dir).ok();
}
