//! Integration tests for configuration resolution via CLI.
//!
//! These tests verify that:
//! - `wm config show` reports defaults when no config.kdl exists
//! - `--config` and `WAYMARK_CONFIG` select the file, CLI flag first
//! - layout settings from config.kdl change the synthesized graph

mod common;

use common::{TestEnv, parse_json};
use predicates::prelude::*;

#[test]
fn test_config_show_defaults() {
    let env = TestEnv::new();

    let output = env.wm().args(["config", "show"]).output().unwrap();
    assert!(output.status.success());

    let json = parse_json(&output.stdout);
    assert!(json["config_file"].is_null());
    assert_eq!(json["layout"]["epic_spacing"], 450.0);
    assert_eq!(json["layout"]["story_nudge"], 20.0);
    assert_eq!(json["fitter"]["quiet_period"], 100);
    assert_eq!(json["fitter"]["options"]["max_zoom"], 1.2);
    assert_eq!(json["store_dir"]["source"], "default");
}

#[test]
fn test_config_flag_overrides_env() {
    let env = TestEnv::new();
    let from_flag = env.write_config("viewport { debounce-ms 40 }");
    let from_env = env.path().join("env.kdl");
    std::fs::write(&from_env, "viewport { debounce-ms 70 }").unwrap();

    let output = env
        .wm()
        .args(["config", "show"])
        .env("WAYMARK_CONFIG", &from_env)
        .output()
        .unwrap();
    assert_eq!(parse_json(&output.stdout)["fitter"]["quiet_period"], 70);

    let output = env
        .wm()
        .args(["config", "show", "--config"])
        .arg(&from_flag)
        .env("WAYMARK_CONFIG", &from_env)
        .output()
        .unwrap();
    let json = parse_json(&output.stdout);
    assert_eq!(json["fitter"]["quiet_period"], 40);
    assert_eq!(json["config_file"]["source"], "cli_flag");
}

#[test]
fn test_config_store_dir() {
    let env = TestEnv::new();
    let config = env.write_config("store { dir \"/srv/roadmaps\" }");

    env.wm()
        .args(["config", "show", "-H", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("store dir: /srv/roadmaps (file:"));

    env.wm()
        .args(["config", "show", "-H", "--config"])
        .arg(&config)
        .args(["--store-dir", "/tmp/elsewhere"])
        .assert()
        .success()
        .stdout(predicate::str::contains("store dir: /tmp/elsewhere (cli)"));
}

#[test]
fn test_layout_config_moves_epics() {
    let env = TestEnv::with_sample();
    let config = env.write_config("layout {\n    epic-top 0\n    epic-spacing 1000\n}");

    let output = env
        .wm()
        .args(["graph", "todo.json", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = parse_json(&output.stdout);
    let epic_y: Vec<f64> = json["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["type"] == "epic")
        .map(|n| n["position"]["y"].as_f64().unwrap())
        .collect();
    assert_eq!(epic_y, vec![0.0, 1000.0]);
}

#[test]
fn test_invalid_config_is_reported() {
    let env = TestEnv::with_sample();
    let config = env.write_config("layout { epic-spacing \"wide\" }");

    env.wm()
        .args(["summary", "todo.json", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_missing_explicit_config_is_reported() {
    let env = TestEnv::new();

    env.wm()
        .args(["config", "show", "--config", "nope.kdl", "-H"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Invalid configuration"));
}
