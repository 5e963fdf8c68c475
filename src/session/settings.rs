//! Spoken language, teaching mode and model selection for a live session

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Default hosted live model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-native-audio-dialog";

/// Default prebuilt voice
pub const DEFAULT_VOICE: &str = "Orus";

/// Languages the assistant can speak and teach
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Pt,
    Es,
    Fr,
    De,
    It,
    Ja,
}

impl Language {
    /// Every supported language, in menu order
    pub const ALL: [Self; 7] = [
        Self::En,
        Self::Pt,
        Self::Es,
        Self::Fr,
        Self::De,
        Self::It,
        Self::Ja,
    ];

    /// Short code (`en`, `pt`, ...)
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Pt => "pt",
            Self::Es => "es",
            Self::Fr => "fr",
            Self::De => "de",
            Self::It => "it",
            Self::Ja => "ja",
        }
    }

    /// BCP-47 tag sent to the speech model
    #[must_use]
    pub const fn speech_code(self) -> &'static str {
        match self {
            Self::En => "en-US",
            Self::Pt => "pt-BR",
            Self::Es => "es-ES",
            Self::Fr => "fr-FR",
            Self::De => "de-DE",
            Self::It => "it-IT",
            Self::Ja => "ja-JP",
        }
    }

    /// Human readable name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Pt => "Portuguese",
            Self::Es => "Spanish",
            Self::Fr => "French",
            Self::De => "German",
            Self::It => "Italian",
            Self::Ja => "Japanese",
        }
    }

    /// Look up a code, falling back to English for anything unknown
    #[must_use]
    pub fn from_code_or_default(code: &str) -> Self {
        code.parse().unwrap_or_default()
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|l| l.code() == code || l.speech_code().eq_ignore_ascii_case(&code))
            .ok_or_else(|| Error::Config(format!("unsupported language: {s}")))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything fixed for the lifetime of one live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Model identifier
    pub model: String,
    /// Prebuilt voice name
    pub voice_name: String,
    /// Spoken language
    pub language: Language,
    /// Whether the model acts as a language tutor
    pub teaching_mode: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            voice_name: DEFAULT_VOICE.to_string(),
            language: Language::default(),
            teaching_mode: false,
        }
    }
}

impl SessionSettings {
    /// Tutoring instructions for teaching mode
    #[must_use]
    pub fn system_instruction(&self) -> Option<String> {
        if !self.teaching_mode {
            return None;
        }
        let lang = self.language.name();
        Some(format!(
            "You are a patient {lang} tutor. Speak in {lang} at a pace suited to a learner. \
             Correct mistakes gently, explain grammar and vocabulary when asked, and keep \
             each reply short so the student gets plenty of practice speaking."
        ))
    }
}
