use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const LIBRARY_ENV: &str = "MAPALG_LIBRARY";
pub const CONFIG_ENV: &str = "MAPALG_CONFIG";

fn default_library_paths() -> Vec<PathBuf> {
    ["lib/libmap.so", "../lib/libmap.so", "/usr/local/lib/libmap.so"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

fn default_max_loop_iterations() -> usize {
    1_000_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Ordered search list for the native engine library.
    pub library_paths: Vec<PathBuf>,
    /// Upper bound on iterations the reference engine runs for one loop.
    pub max_loop_iterations: usize,
    /// Where the reference engine persists named resources.
    pub resource_dir: Option<PathBuf>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            library_paths: default_library_paths(),
            max_loop_iterations: default_max_loop_iterations(),
            resource_dir: None,
        }
    }
}

impl MapConfig {
    /// Defaults, overlaid with `MAPALG_CONFIG` (a JSON file) and `MAPALG_LIBRARY`.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(library) = env::var_os(LIBRARY_ENV) {
            config.library_paths.insert(0, PathBuf::from(library));
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_library_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.library_paths = paths;
        self
    }

    pub fn with_max_loop_iterations(mut self, limit: usize) -> Self {
        self.max_loop_iterations = limit;
        self
    }

    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }
}
