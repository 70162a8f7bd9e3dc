//! Common test utilities for waymark integration tests.
//!
//! Provides `TestEnv` for isolated test environments that never read the
//! user's `~/.config/waymark/config.kdl` or write to their roadmap store.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// Two epics: "1" with three stories (two done), "2" with none.
pub const SAMPLE_ROADMAP: &str = r#"{
    "project": {"title": "Todo App", "description": "A small todo app"},
    "epics": [
        {
            "id": 1,
            "title": "Project setup",
            "tags": ["infra"],
            "status": "completed",
            "completion_percentage": 100,
            "stories": [
                {"id": "repo", "title": "Create repository", "completed": true, "estimated_hours": 1},
                {"id": "ci", "title": "Configure CI", "completed": true, "estimated_hours": 2},
                {"id": "lint", "title": "Add linting", "estimated_hours": 1.5}
            ]
        },
        {"id": 2, "title": "Core features", "stories": [], "estimated_hours": 12}
    ]
}"#;

/// A test environment with an isolated working, config and store directory.
///
/// The `wm()` method returns a `Command` with `XDG_CONFIG_HOME`,
/// `XDG_DATA_HOME` and `HOME` pointed inside the environment, making tests
/// parallel-safe.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Create an environment holding `todo.json` with [`SAMPLE_ROADMAP`].
    pub fn with_sample() -> Self {
        let env = Self::new();
        env.write_roadmap("todo", SAMPLE_ROADMAP);
        env
    }

    /// Get a Command for the wm binary, isolated from the user's config.
    pub fn wm(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_wm"));
        cmd.current_dir(self.path());
        cmd.env("HOME", self.path());
        cmd.env("XDG_CONFIG_HOME", self.path().join("config"));
        cmd.env("XDG_DATA_HOME", self.path().join("data"));
        cmd.env_remove("WAYMARK_CONFIG");
        cmd.env_remove("WAYMARK_STORE_DIR");
        cmd.env_remove("WAYMARK_LOG");
        cmd
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `<name>.json` and return its path.
    pub fn write_roadmap(&self, name: &str, json: &str) -> PathBuf {
        let path = self.path().join(format!("{}.json", name));
        std::fs::write(&path, json).unwrap();
        path
    }

    /// Read `<name>.json` back as JSON.
    pub fn read_roadmap(&self, name: &str) -> serde_json::Value {
        let path = self.path().join(format!("{}.json", name));
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    /// Write a config.kdl and return its path.
    pub fn write_config(&self, content: &str) -> PathBuf {
        let path = self.path().join("waymark.kdl");
        std::fs::write(&path, content).unwrap();
        path
    }
}

/// Parse stdout of a successful command as JSON.
pub fn parse_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).unwrap()
}
