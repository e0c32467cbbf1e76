//! Common utilities for CLI integration tests

#![allow(dead_code)]

pub mod cli;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Drive with a docs folder, two top-level files and one knowledge base
pub const FIXTURE: &str = r#"{
    "connection_id": "conn",
    "org_id": "org-1",
    "indexing_lag_ms": 0,
    "source": [
        {"resource_id": "d-docs", "inode_type": "directory", "inode_path": {"path": "docs/"}},
        {"resource_id": "f-readme", "inode_type": "file", "inode_path": {"path": "docs/readme.txt"}},
        {"resource_id": "f-guide", "inode_type": "file", "inode_path": {"path": "docs/guide.md"}},
        {"resource_id": "f-a", "inode_type": "file", "inode_path": {"path": "a.txt"},
         "modified_at": "2024-03-01T08:00:00Z"},
        {"resource_id": "f-report", "inode_type": "file", "inode_path": {"path": "report.pdf"},
         "modified_at": "2024-01-14T15:45:00Z"}
    ],
    "knowledge_bases": {
        "admin": [{"knowledge_base_id": "kb-main", "name": "Main", "connection_source_ids": ["f-report"]}]
    },
    "indexed": {
        "kb-main": [
            {"resource_id": "f-report", "inode_type": "file", "inode_path": {"path": "report.pdf"}, "status": "indexed"}
        ]
    }
}"#;

/// Same drive with no knowledge base at all
pub const FIXTURE_NO_KB: &str = r#"{
    "connection_id": "conn",
    "source": [
        {"resource_id": "f-a", "inode_type": "file", "inode_path": {"path": "a.txt"}}
    ]
}"#;

/// Fast polling so mutations settle in well under a second
const CONFIG: &str = "[poll]\ninterval_ms = 20\nmax_attempts = 5\n";

/// Temporary directory holding a fixture and a config file
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        Self::with_fixture(FIXTURE)
    }

    pub fn with_fixture(fixture: &str) -> Result<Self> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("fixture.json"), fixture)?;
        std::fs::write(dir.path().join("config.toml"), CONFIG)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn fixture(&self) -> PathBuf {
        self.dir.path().join("fixture.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }
}
