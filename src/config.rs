//! Application configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::beatmap::MapInfo;
use crate::gpu::FilterMode;

/// Errors that can occur while loading the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Startup configuration, loadable from a JSON file. Every field has a
/// default, so a partial file is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `info.dat`, the difficulty file, and the song.
    pub map_dir: PathBuf,
    /// Difficulty name; `<difficulty>.dat` is loaded from `map_dir`.
    pub difficulty: String,
    pub window_width: u32,
    pub window_height: u32,
    /// Where in the song playback starts.
    pub start_offset_seconds: f64,
    pub volume: f32,
    /// Which post-processing configuration runs.
    pub filter_mode: FilterMode,
    pub title: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            map_dir: PathBuf::from("resources/map"),
            difficulty: "Expert".to_string(),
            window_width: 1920,
            window_height: 1080,
            start_offset_seconds: 0.0,
            volume: 1.0,
            filter_mode: FilterMode::default(),
            title: "Beat Light Show".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn info_path(&self) -> PathBuf {
        self.map_dir.join("info.dat")
    }

    pub fn difficulty_path(&self) -> PathBuf {
        self.map_dir.join(format!("{}.dat", self.difficulty))
    }

    /// Song path from the level metadata, falling back to `song.wav`.
    pub fn song_path(&self, info: &MapInfo) -> PathBuf {
        self.map_dir
            .join(info.song_filename.as_deref().unwrap_or("song.wav"))
    }
}
