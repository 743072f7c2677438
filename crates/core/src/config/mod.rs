use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{slots::MAX_SLOTS, EyeglowError, Result};

const APP_DIR: &str = "eyeglow";

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub editor: EditorConfig,
}

impl AppConfig {
    /// Per-user location of the configuration file.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push("config.json");
        path
    }

    /// Reads a JSON configuration file. A missing file yields the defaults;
    /// out-of-range values are clamped with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<AppConfig>(&raw).map_err(|err| {
                EyeglowError::Config(format!("{}: {err}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "config file not found, using defaults");
                AppConfig::default()
            }
            Err(err) => return Err(err.into()),
        };
        config.validate_and_clamp();
        Ok(config)
    }

    fn validate_and_clamp(&mut self) {
        let editor = &mut self.editor;
        if editor.slot_count == 0 || editor.slot_count > MAX_SLOTS {
            warn!(
                slot_count = editor.slot_count,
                max = MAX_SLOTS,
                "slot_count out of range, clamping"
            );
            editor.slot_count = editor.slot_count.clamp(1, MAX_SLOTS);
        }

        if !(0.0..=1.0).contains(&editor.default_glow_intensity) {
            warn!(
                default_glow_intensity = editor.default_glow_intensity,
                "default_glow_intensity outside [0, 1], using default"
            );
            editor.default_glow_intensity = default_glow_intensity();
        }

        if !(editor.hit_radius > 0.0 && editor.hit_radius <= 1.0) {
            warn!(
                hit_radius = editor.hit_radius,
                "hit_radius outside (0, 1], using default"
            );
            editor.hit_radius = default_hit_radius();
        }
    }
}

/// Which key-value backend the application persists scenes into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Memory,
}

/// Configuration specific to the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Directory the file backend writes into.
    pub fn resolved_data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.clone(),
            None => {
                let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
                path.push(APP_DIR);
                path
            }
        }
    }
}

/// Interaction defaults for the scene editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_slot_count")]
    pub slot_count: u8,
    #[serde(default = "default_glow_intensity")]
    pub default_glow_intensity: f64,
    /// Pick radius for hover hit testing, in normalized units.
    #[serde(default = "default_hit_radius")]
    pub hit_radius: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            slot_count: default_slot_count(),
            default_glow_intensity: default_glow_intensity(),
            hit_radius: default_hit_radius(),
        }
    }
}

fn default_slot_count() -> u8 {
    MAX_SLOTS
}

fn default_glow_intensity() -> f64 {
    0.6
}

fn default_hit_radius() -> f64 {
    0.03
}
