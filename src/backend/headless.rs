//! Snapshot-file backend for the CLI and tests.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use madori_state::ScreenSnapshot;

use super::Backend;

/// Reads a [`ScreenSnapshot`] from a JSON file instead of a display server.
pub struct Headless {
    path: PathBuf,
}

impl Headless {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Backend for Headless {
    fn name(&self) -> &str {
        "headless"
    }

    fn read_state(&mut self) -> anyhow::Result<ScreenSnapshot> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("error reading snapshot file {:?}", self.path))?;
        let snapshot = serde_json::from_str(&text)
            .with_context(|| format!("error parsing snapshot file {:?}", self.path))?;
        Ok(snapshot)
    }
}
