use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::error::MapError;
use crate::simulator::grid::Grid;

/// Named rasters visible to `read` and `write`.
#[derive(Debug, Default)]
pub(crate) struct ResourceStore {
    grids: HashMap<String, Grid>,
    protected: HashSet<String>,
    dir: Option<PathBuf>,
}

pub(crate) const WRITE_OK: i32 = 0;
pub(crate) const WRITE_PROTECTED: i32 = 1;
pub(crate) const WRITE_IO_FAILED: i32 = 2;

impl ResourceStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            ..Self::default()
        }
    }

    fn file_for(&self, name: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{name}.json")))
    }

    pub fn insert(&mut self, name: &str, grid: Grid) {
        self.grids.insert(name.to_string(), grid);
    }

    pub fn protect(&mut self, name: &str) {
        self.protected.insert(name.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&Grid> {
        self.grids.get(name)
    }

    pub fn load(&self, name: &str) -> Result<Grid> {
        if let Some(grid) = self.grids.get(name) {
            return Ok(grid.clone());
        }
        match self.file_for(name) {
            Some(path) if path.exists() => {
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read resource {}", path.display()))?;
                let grid = serde_json::from_str(&text)
                    .with_context(|| format!("invalid resource {}", path.display()))?;
                Ok(grid)
            }
            _ => Err(MapError::engine(format!("unknown resource '{name}'"))),
        }
    }

    /// Stores `grid` under `name` and returns the write status.
    pub fn store(&mut self, name: &str, grid: Grid) -> i32 {
        if self.protected.contains(name) {
            crate::warning!(Engine, "resource '{name}' is protected; write refused");
            return WRITE_PROTECTED;
        }
        if let Some(path) = self.file_for(name) {
            let written = serde_json::to_string(&grid)
                .map_err(anyhow::Error::from)
                .and_then(|text| fs::write(&path, text).map_err(anyhow::Error::from));
            if let Err(err) = written {
                crate::error!(Engine, "failed to persist resource {}: {err}", path.display());
                return WRITE_IO_FAILED;
            }
        }
        self.grids.insert(name.to_string(), grid);
        WRITE_OK
    }
}
