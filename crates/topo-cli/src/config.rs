//! YAML configuration for the command-line tool.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use topo_dem::{AssemblyConfig, DEFAULT_CHUNK_SIZE_MB, DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_RECENT, DEFAULT_MEMORY_BUDGET_MB};
use topo_gradient::DEFAULT_GRADIENTS_FILE;
use topo_render::TerrainRenderer;

pub const DEFAULT_RECENT_FILE: &str = "recent_databases.json";

/// Settings read from `--config`. Every field is optional in the file.
///
/// ```yaml
/// gradients_file: ~/maps/gradients.json
/// memory_budget_mb: 16384
/// tile_cache_size: 64
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Gradient library JSON.
    pub gradients_file: PathBuf,
    /// Recently opened databases JSON.
    pub recent_file: PathBuf,
    /// Memory available to renders and assembly.
    pub memory_budget_mb: u64,
    /// Target chunk size for chunked assembly.
    pub chunk_size_mb: u64,
    /// Tiles kept in memory per database.
    pub tile_cache_size: usize,
    /// Entries kept in the recent list.
    pub max_recent: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            gradients_file: PathBuf::from(DEFAULT_GRADIENTS_FILE),
            recent_file: PathBuf::from(DEFAULT_RECENT_FILE),
            memory_budget_mb: DEFAULT_MEMORY_BUDGET_MB,
            chunk_size_mb: DEFAULT_CHUNK_SIZE_MB,
            tile_cache_size: DEFAULT_MAX_CACHE_SIZE,
            max_recent: DEFAULT_MAX_RECENT,
        }
    }
}

impl CliConfig {
    /// Read a config file, or return defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parse config '{}'", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn assembly_config(&self) -> AssemblyConfig {
        AssemblyConfig::default()
            .with_memory_budget_mb(self.memory_budget_mb)
            .with_chunk_size_mb(self.chunk_size_mb)
    }

    pub fn renderer(&self) -> TerrainRenderer {
        TerrainRenderer::new().with_memory_budget_mb(self.memory_budget_mb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = CliConfig::from_yaml("memory_budget_mb: 2048\ntile_cache_size: 4\n").unwrap();
        assert_eq!(config.memory_budget_mb, 2048);
        assert_eq!(config.tile_cache_size, 4);
        assert_eq!(config.gradients_file, PathBuf::from("gradients.json"));
        assert_eq!(config.chunk_size_mb, DEFAULT_CHUNK_SIZE_MB);
        assert_eq!(config.assembly_config().memory_budget_mb, 2048);
        assert_eq!(config.renderer().memory_budget_mb(), 2048);
    }

    #[test]
    fn test_empty_and_missing() {
        assert_eq!(CliConfig::from_yaml("").unwrap(), CliConfig::default());
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
        assert!(CliConfig::load(Some(Path::new("/nonexistent/topoimg.yaml"))).is_err());
        assert!(CliConfig::from_yaml("memory_budget_mb: lots").is_err());
    }
}
