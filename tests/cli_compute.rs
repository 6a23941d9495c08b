use std::fs;
use std::path::Path;
use std::process::Command;

use mpindex::output::MpiSummary;
use tempfile::tempdir;

const HOUSEHOLDS: &str = "hh_id,nutrition,mortality,schooling,attendance,water,electricity,sanitation
1,1,0,1,0,1,1,0
2,0,0,0,0,0,0,0
3,1,1,1,1,1,1,1
4,0,0,0,1,1,0,0
5,0,1,0,0,0,0,0
";

const CONFIG: &str = r#"
[dimensions]
health = ["nutrition", "mortality"]
education = ["schooling", "attendance"]
living = ["water", "electricity", "sanitation"]

[domain_weights]
health = 0.3333333333333333
education = 0.3333333333333333
living = 0.3333333333333334
"#;

fn write_inputs(dir: &Path) -> (String, String) {
    let data = dir.join("households.csv");
    let config = dir.join("mpi.toml");
    fs::write(&data, HOUSEHOLDS).expect("write data");
    fs::write(&config, CONFIG).expect("write config");
    (
        data.to_str().expect("path str").to_string(),
        config.to_str().expect("path str").to_string(),
    )
}

#[test]
fn compute_writes_all_outputs() {
    let tmp = tempdir().expect("temporary directory");
    let (data, config) = write_inputs(tmp.path());

    let exe = env!("CARGO_BIN_EXE_mpindex");
    let output = Command::new(exe)
        .current_dir(tmp.path())
        .args(["compute", &data, "--config", &config])
        .output()
        .expect("run mpindex cli");

    assert!(output.status.success(), "CLI exited with status {:?}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Headcount (H):     0.4000"), "stdout was:\n{stdout}");

    for suffix in [
        "scored.csv",
        "deprivation.csv",
        "contributions.csv",
        "weights.csv",
        "summary.toml",
    ] {
        let path = tmp.path().join(format!("households_{suffix}"));
        assert!(path.exists(), "{} missing", path.display());
    }

    let scored = fs::read_to_string(tmp.path().join("households_scored.csv")).expect("read scored");
    let header = scored.lines().next().expect("header line");
    assert!(header.ends_with("Deprivation_Score,Is_Poor"), "header was {header}");
    assert_eq!(scored.lines().count(), 6);

    let summary =
        MpiSummary::load(&tmp.path().join("households_summary.toml")).expect("load summary");
    assert_eq!(summary.mpi_stats.num_poor, 2);
    assert!((summary.mpi_stats.mpi - 0.4 * 7.0 / 9.0).abs() < 1e-9);
}

#[test]
fn compute_refuses_to_overwrite_without_force() {
    let tmp = tempdir().expect("temporary directory");
    let (data, config) = write_inputs(tmp.path());
    let exe = env!("CARGO_BIN_EXE_mpindex");

    let first = Command::new(exe)
        .args(["compute", &data, "--config", &config])
        .status()
        .expect("run mpindex cli");
    assert!(first.success());

    let second = Command::new(exe)
        .args(["compute", &data, "--config", &config])
        .output()
        .expect("run mpindex cli");
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("already exists"));

    let forced = Command::new(exe)
        .args(["compute", &data, "--config", &config, "--force"])
        .status()
        .expect("run mpindex cli");
    assert!(forced.success());
}

#[test]
fn threshold_flag_overrides_config() {
    let tmp = tempdir().expect("temporary directory");
    let (data, config) = write_inputs(tmp.path());

    let status = Command::new(env!("CARGO_BIN_EXE_mpindex"))
        .args(["compute", &data, "--config", &config, "--threshold", "0.9"])
        .status()
        .expect("run mpindex cli");
    assert!(status.success());

    let summary =
        MpiSummary::load(&tmp.path().join("households_summary.toml")).expect("load summary");
    assert_eq!(summary.mpi_stats.num_poor, 1);
    assert!((summary.poverty_threshold - 0.9).abs() < 1e-12);
}

#[test]
fn invalid_weights_fail_with_message() {
    let tmp = tempdir().expect("temporary directory");
    let (data, config) = write_inputs(tmp.path());
    let broken = fs::read_to_string(&config)
        .expect("read config")
        .replace("living = 0.3333333333333334", "living = 0.9");
    fs::write(&config, broken).expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_mpindex"))
        .args(["compute", &data, "--config", &config])
        .output()
        .expect("run mpindex cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Domain weights sum to"), "stderr was:\n{stderr}");
    assert!(!tmp.path().join("households_scored.csv").exists());
}

#[test]
fn init_config_drafts_equal_weights() {
    let tmp = tempdir().expect("temporary directory");
    let (data, _) = write_inputs(tmp.path());
    let drafted = tmp.path().join("drafted.toml");
    let exe = env!("CARGO_BIN_EXE_mpindex");

    let status = Command::new(exe)
        .args([
            "init-config",
            &data,
            drafted.to_str().expect("path str"),
            "--id-column",
            "hh_id",
        ])
        .status()
        .expect("run mpindex cli");
    assert!(status.success());

    let config = mpindex::AnalysisConfig::load(&drafted).expect("load drafted config");
    assert_eq!(config.dimensions.num_indicators(), 7);
    assert!(!config.dimensions.contains_indicator("hh_id"));

    let weights = Command::new(exe)
        .args(["weights", "--config", drafted.to_str().expect("path str")])
        .output()
        .expect("run mpindex cli");
    assert!(weights.status.success());
    assert!(String::from_utf8_lossy(&weights.stdout).contains("0.1429"));
}
