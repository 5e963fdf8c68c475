//! Configuration management for the voice tutor
//!
//! Precedence: CLI > env > TOML file > defaults.

pub mod file;

use std::path::Path;

use secrecy::SecretString;

use crate::audio::DEFAULT_FRAME_SIZE;
use crate::search::DEFAULT_SEARCH_URL;
use crate::session::{DEFAULT_LIVE_URL, DEFAULT_MODEL, DEFAULT_VOICE, Language, SessionSettings};
use crate::{Error, Result};

use self::file::TutorConfigFile;

/// Voice tutor configuration
#[derive(Debug)]
pub struct Config {
    /// Gemini API key (`GEMINI_API_KEY`)
    pub api_key: Option<SecretString>,

    /// Live model identifier
    pub model: String,

    /// Prebuilt voice name
    pub voice_name: String,

    /// Spoken language at startup
    pub language: Language,

    /// Start in teaching mode
    pub teaching_mode: bool,

    /// Samples per capture frame
    pub frame_size: usize,

    /// Live API websocket URL
    pub live_url: String,

    /// Instant answer search URL
    pub search_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            voice_name: DEFAULT_VOICE.to_string(),
            language: Language::default(),
            teaching_mode: false,
            frame_size: DEFAULT_FRAME_SIZE,
            live_url: DEFAULT_LIVE_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
        }
    }
}

/// Command-line overrides, applied last
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub language: Option<Language>,
    pub teaching_mode: Option<bool>,
    pub model: Option<String>,
    pub voice_name: Option<String>,
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let fc = file::load_config_file(path);
        Self::from_sources(fc, |key| std::env::var(key).ok(), overrides)
    }

    /// Merge a config file, an environment lookup and CLI overrides
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn from_sources(
        fc: TutorConfigFile,
        env: impl Fn(&str) -> Option<String>,
        overrides: Overrides,
    ) -> Result<Self> {
        let defaults = Self::default();

        let env_language = env("TUTOR_LANGUAGE").and_then(|code| match code.parse() {
            Ok(lang) => Some(lang),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring TUTOR_LANGUAGE");
                None
            }
        });

        let env_teaching = env("TUTOR_TEACHING_MODE").and_then(|v| {
            let parsed = parse_bool(&v);
            if parsed.is_none() {
                tracing::warn!(value = %v, "ignoring TUTOR_TEACHING_MODE");
            }
            parsed
        });

        let env_frame_size = env("TUTOR_FRAME_SIZE").and_then(|v| v.parse().ok());

        let config = Self {
            api_key: env("GEMINI_API_KEY")
                .filter(|k| !k.trim().is_empty())
                .or_else(|| fc.api_key.filter(|k| !k.trim().is_empty()))
                .map(SecretString::from),
            model: overrides
                .model
                .or_else(|| env("TUTOR_MODEL"))
                .or(fc.session.model)
                .unwrap_or(defaults.model),
            voice_name: overrides
                .voice_name
                .or_else(|| env("TUTOR_VOICE"))
                .or(fc.session.voice)
                .unwrap_or(defaults.voice_name),
            language: overrides
                .language
                .or(env_language)
                .or(fc.session.language)
                .unwrap_or(defaults.language),
            teaching_mode: overrides
                .teaching_mode
                .or(env_teaching)
                .or(fc.session.teaching_mode)
                .unwrap_or(defaults.teaching_mode),
            frame_size: env_frame_size
                .or(fc.audio.frame_size)
                .unwrap_or(defaults.frame_size),
            live_url: env("TUTOR_LIVE_URL")
                .or(fc.endpoints.live_url)
                .unwrap_or(defaults.live_url),
            search_url: env("TUTOR_SEARCH_URL")
                .or(fc.endpoints.search_url)
                .unwrap_or(defaults.search_url),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.frame_size == 0 {
            return Err(Error::Config("frame_size must be at least 1".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config("model must not be empty".to_string()));
        }
        Ok(())
    }

    /// Settings for the first live session
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            model: self.model.clone(),
            voice_name: self.voice_name.clone(),
            language: self.language,
            teaching_mode: self.teaching_mode,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
