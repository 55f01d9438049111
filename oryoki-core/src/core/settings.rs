//! Application settings persistence.
//!
//! Stores where the knowledge base, the image store and exports live, as a
//! JSON file at an OS-appropriate location.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// SQLite file holding the knowledge base.
    pub database_path: String,
    /// Root of the [`DirImageStore`](crate::DirImageStore).
    pub image_directory: String,
    /// Where exports are written.
    pub export_directory: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        let base = default_data_directory();
        Self {
            database_path: base.join("oryoki.db").to_string_lossy().to_string(),
            image_directory: base.join("images").to_string_lossy().to_string(),
            export_directory: base.join("exports").to_string_lossy().to_string(),
        }
    }
}

fn config_directory() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("Oryoki")
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("oryoki")
    }
}

/// Returns the path to the settings JSON file.
///
/// - macOS / Linux: `~/.config/oryoki/settings.json`
/// - Windows: `%APPDATA%/Oryoki/settings.json`
pub fn settings_file_path() -> PathBuf {
    config_directory().join("settings.json")
}

pub(crate) fn session_marker_path() -> PathBuf {
    config_directory().join("session.json")
}

/// Returns the default data directory: `~/Documents/Oryoki`.
pub fn default_data_directory() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Documents")
        })
        .join("Oryoki")
}

/// Loads settings from the default location.
pub fn load_settings() -> AppSettings {
    load_settings_from(&settings_file_path())
}

/// Loads settings from `path`; returns defaults if the file is missing or corrupt.
pub fn load_settings_from(path: &Path) -> AppSettings {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring corrupt settings at {}: {e}", path.display());
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    }
}

pub fn save_settings(settings: &AppSettings) -> Result<()> {
    save_settings_to(&settings_file_path(), settings)
}

/// Saves settings to `path`, creating parent directories as needed.
pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}
