//! Integration tests for the read-side roadmap commands via CLI.
//!
//! These tests verify that:
//! - `wm graph` prints the synthesized nodes and edges
//! - `wm summary` derives progress from stories, not stored fields
//! - `wm normalize` re-aggregates epics and rewrites legacy field names
//! - `wm fit` computes a viewport and refuses a zero-area container

mod common;

use common::{TestEnv, parse_json};
use predicates::prelude::*;

// === Graph Tests ===

#[test]
fn test_graph_counts_nodes_and_edges() {
    let env = TestEnv::with_sample();

    let output = env.wm().args(["graph", "todo.json"]).output().unwrap();
    assert!(output.status.success());

    let json = parse_json(&output.stdout);
    assert_eq!(json["node_count"], 6);
    assert_eq!(json["edge_count"], 5);
    assert_eq!(json["nodes"][0]["id"], "start-node");
    assert_eq!(json["nodes"][0]["data"]["label"], "Todo App");
    assert_eq!(json["nodes"][1]["type"], "epic");
    assert_eq!(json["nodes"][1]["data"]["status"], "in-progress");
    assert_eq!(json["nodes"][2]["id"], "1-story-0");
    assert_eq!(json["edges"][0]["id"], "start-node->1");
}

#[test]
fn test_graph_project_name_override() {
    let env = TestEnv::with_sample();

    env.wm()
        .args(["graph", "todo.json", "--project-name", "Launch", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("6 nodes, 5 edges"))
        .stdout(predicate::str::contains("Launch"))
        .stdout(predicate::str::contains("[x] Create repository"))
        .stdout(predicate::str::contains("[ ] Add linting"));
}

#[test]
fn test_graph_empty_document_has_start_node() {
    let env = TestEnv::new();
    env.write_roadmap("empty", r#"{"epics": []}"#);

    env.wm()
        .args(["graph", "empty.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"node_count\":1"))
        .stdout(predicate::str::contains("\"edge_count\":0"))
        .stdout(predicate::str::contains("Start Your New Project"));
}

#[test]
fn test_graph_rejects_duplicate_epic_ids() {
    let env = TestEnv::new();
    env.write_roadmap(
        "dup",
        r#"{"epics": [{"id": 1, "title": "A"}, {"id": 1, "title": "B"}]}"#,
    );

    env.wm()
        .args(["graph", "dup.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid roadmap"));
}

#[test]
fn test_graph_missing_file() {
    let env = TestEnv::new();

    env.wm()
        .args(["graph", "nope.json", "-H"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_graph_from_project_store() {
    let env = TestEnv::with_sample();

    env.wm()
        .args(["graph", "--project", "todo"])
        .arg("--store-dir")
        .arg(env.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"node_count\":6"));
}

// === Summary Tests ===

#[test]
fn test_summary_derives_progress() {
    let env = TestEnv::with_sample();

    let output = env.wm().args(["summary", "todo.json"]).output().unwrap();
    assert!(output.status.success());

    let json = parse_json(&output.stdout);
    assert_eq!(json["project"], "Todo App");
    assert_eq!(json["epic_count"], 2);
    assert_eq!(json["story_count"], 3);
    assert_eq!(json["completed_story_count"], 2);
    assert_eq!(json["completion_percentage"], 67);
    assert_eq!(json["in_progress_epics"], 1);
    assert_eq!(json["pending_epics"], 1);
    assert_eq!(json["completed_epics"], 0);
    assert_eq!(json["total_estimated_hours"], 16.5);
    assert_eq!(json["epics"][0]["status"], "in-progress");
}

#[test]
fn test_summary_human() {
    let env = TestEnv::with_sample();

    env.wm()
        .args(["summary", "todo.json", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 epics, 2/3 stories done (67%)"))
        .stdout(predicate::str::contains("in-progress"));
}

// === Normalize Tests ===

#[test]
fn test_normalize_prints_without_writing() {
    let env = TestEnv::with_sample();

    env.wm()
        .args(["normalize", "todo.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"changed_epics\":[\"1\"]"));

    // File untouched
    assert_eq!(env.read_roadmap("todo")["epics"][0]["status"], "completed");
}

#[test]
fn test_normalize_write_rewrites_legacy_fields() {
    let env = TestEnv::new();
    env.write_roadmap(
        "legacy",
        r#"{
            "nodes": [
                {"id": "a", "name": "Old style", "status": "in_progress",
                 "subtasks": [{"title": "one", "completed": true}]}
            ]
        }"#,
    );

    env.wm()
        .args(["normalize", "legacy.json", "--write"])
        .assert()
        .success()
        .stdout(predicate::str::contains("legacy.json"));

    let json = env.read_roadmap("legacy");
    assert!(json.get("nodes").is_none());
    let epic = &json["epics"][0];
    assert_eq!(epic["title"], "Old style");
    assert_eq!(epic["status"], "completed");
    assert_eq!(epic["completion_percentage"], 100);
    assert_eq!(epic["stories"][0]["title"], "one");
}

// === Fit Tests ===

#[test]
fn test_fit_clamps_zoom() {
    let env = TestEnv::with_sample();

    let output = env
        .wm()
        .args(["fit", "todo.json", "--width", "1200", "--height", "900"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = parse_json(&output.stdout);
    let zoom = json["viewport"]["zoom"].as_f64().unwrap();
    assert!((0.1..=1.2).contains(&zoom));
    assert_eq!(json["node_count"], 6);
}

#[test]
fn test_fit_zoom_override() {
    let env = TestEnv::with_sample();

    let output = env
        .wm()
        .args(["fit", "todo.json", "--width", "100000", "--height", "100000"])
        .args(["--max-zoom", "0.5"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(parse_json(&output.stdout)["viewport"]["zoom"], 0.5);
}

#[test]
fn test_fit_zero_area_fails() {
    let env = TestEnv::with_sample();

    env.wm()
        .args(["fit", "todo.json", "--width", "0", "--height", "600"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Layout not ready"));
}

#[test]
fn test_fit_invalid_zoom_range() {
    let env = TestEnv::with_sample();

    env.wm()
        .args(["fit", "todo.json", "--width", "800", "--height", "600"])
        .args(["--min-zoom", "2", "--max-zoom", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
