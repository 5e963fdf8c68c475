//! TOML configuration file loading
//!
//! Supports `~/.config/voice-tutor/config.toml` as a persistent config source.
//! All fields are optional: the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::session::Language;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TutorConfigFile {
    /// Gemini API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Live session configuration
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Audio configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Service endpoints
    #[serde(default)]
    pub endpoints: EndpointsFileConfig,
}

/// Live session configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SessionFileConfig {
    /// Model identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Prebuilt voice name (e.g. "Orus")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Spoken language code (e.g. "pt")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,

    /// Start in teaching mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teaching_mode: Option<bool>,
}

/// Audio configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AudioFileConfig {
    /// Samples per capture frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_size: Option<usize>,
}

/// Service endpoints
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndpointsFileConfig {
    /// Live API websocket URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,

    /// Instant answer search URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_url: Option<String>,
}

/// Load the TOML config file from `path`, or the standard path
///
/// Returns `TutorConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: Option<&Path>) -> TutorConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return TutorConfigFile::default();
    };

    if !path.exists() {
        return TutorConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                TutorConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            TutorConfigFile::default()
        }
    }
}

/// Serialize and write the config file, creating parent directories
///
/// # Errors
///
/// Returns error if the directory or file cannot be written
pub fn write_config_file(path: &Path, config: &TutorConfigFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml = toml::to_string_pretty(config)
        .map_err(|e| crate::Error::Config(format!("cannot serialize config: {e}")))?;
    std::fs::write(path, toml)?;

    Ok(())
}

/// Return the config file path: `~/.config/voice-tutor/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-tutor").join("config.toml"))
}
