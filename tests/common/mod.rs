#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use agri_normalize::data::RawRecord;
use assert_cmd::Command;
use serde_json::Value;
use tempfile::{TempDir, tempdir};

pub const BIN: &str = "agri-normalize";

/// Absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

pub fn fixture_str(name: &str) -> String {
    fixture_path(name).to_str().expect("utf-8 path").to_string()
}

pub fn bin() -> Command {
    Command::cargo_bin(BIN).expect("binary exists")
}

/// Objects from a JSON array literal.
pub fn records(value: Value) -> Vec<RawRecord> {
    value
        .as_array()
        .expect("array of records")
        .iter()
        .map(|item| item.as_object().expect("record object").clone())
        .collect()
}

/// Scratch directory removed on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` to `name` under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.join(name)).expect("read temp file")
    }

    /// Number of `.json` entries directly under `dir` inside the workspace.
    pub fn json_files(&self, dir: &str) -> usize {
        fs::read_dir(self.join(dir))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
                    .count()
            })
            .unwrap_or(0)
    }
}
