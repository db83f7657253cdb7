//! Shared fixtures for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tui_wbs::models::Project;
use tui_wbs::parser;

/// A throwaway project directory.
pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        TestProject {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a project file and return its absolute path.
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read_file(&self, name: &str) -> String {
        fs::read_to_string(self.path().join(name)).unwrap()
    }

    pub fn parse(&self) -> Project {
        parser::load_project(self.path()).unwrap()
    }
}
