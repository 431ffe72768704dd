//! Single-slot window snapshot cache
//!
//! Evacuation persists its snapshot to a fixed-path JSON file so a restore
//! can be triggered by a later, separate process invocation. Each save
//! overwrites the previous snapshot; there is no history.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::window::tracker::WindowSnapshot;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    positions: Vec<WindowSnapshot>,
}

pub fn default_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(crate::constants::config::APP_DIR);
    path.push(crate::constants::config::WINDOW_CACHE_FILENAME);
    path
}

pub fn save(path: &Path, positions: &[WindowSnapshot]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache directory {:?}", parent))?;
    }
    let file = CacheFile {
        positions: positions.to_vec(),
    };
    let json = serde_json::to_string_pretty(&file).context("Failed to serialize window cache")?;
    fs::write(path, json).with_context(|| format!("Failed to write window cache to {:?}", path))?;
    Ok(())
}

/// Load the cached snapshot, degrading to empty on missing or corrupt data.
pub fn load(path: &Path) -> Vec<WindowSnapshot> {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<CacheFile>(&contents) {
            Ok(file) => file.positions,
            Err(e) => {
                warn!(path = ?path, error = %e, "Window cache is corrupt, ignoring");
                Vec::new()
            }
        },
        Err(_) => Vec::new(),
    }
}
