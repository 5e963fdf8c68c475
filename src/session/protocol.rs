//! Messages exchanged with the hosted live model
//!
//! Only the fields the audio pipeline and transcript need are modeled;
//! anything else in a server message is ignored.

use serde::{Deserialize, Serialize};

use super::settings::SessionSettings;
use crate::audio::PcmPacket;

/// Message sent from the client to the live session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// First message on a new connection
    Setup(Setup),
    /// Streaming microphone audio
    RealtimeInput(RealtimeInput),
}

impl ClientMessage {
    /// Build the setup message for `settings`
    #[must_use]
    pub fn setup(settings: &SessionSettings) -> Self {
        let model = if settings.model.starts_with("models/") {
            settings.model.clone()
        } else {
            format!("models/{}", settings.model)
        };

        Self::Setup(Setup {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: settings.voice_name.clone(),
                        },
                    },
                    language_code: settings.language.speech_code().to_string(),
                },
            },
            system_instruction: settings.system_instruction().map(|text| Content {
                parts: vec![TextPart { text }],
            }),
        })
    }

    /// Wrap one encoded microphone frame
    #[must_use]
    pub fn audio(packet: PcmPacket) -> Self {
        Self::RealtimeInput(RealtimeInput {
            media_chunks: vec![packet],
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
    pub language_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<PcmPacket>,
}

/// Message received from the live session
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    /// Present once the session accepted the setup message
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    /// Model output for the current turn
    #[serde(default)]
    pub server_content: Option<ServerContent>,
}

/// Model output carried by a server message
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    /// The user spoke over the model; queued audio must stop
    #[serde(default)]
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub inline_data: Option<PcmPacket>,
    #[serde(default)]
    pub text: Option<String>,
}

impl ServerMessage {
    /// Whether this message acknowledges the setup
    #[must_use]
    pub const fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    fn parts(&self) -> &[Part] {
        self.server_content
            .as_ref()
            .and_then(|c| c.model_turn.as_ref())
            .map(|t| t.parts.as_slice())
            .unwrap_or_default()
    }

    /// First inline audio payload of the model turn
    #[must_use]
    pub fn audio(&self) -> Option<&PcmPacket> {
        self.parts().iter().find_map(|p| p.inline_data.as_ref())
    }

    /// Text parts joined by spaces and trimmed, if any remain
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let joined = self
            .parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join(" ");
        let trimmed = joined.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Whether the model was interrupted
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.server_content.as_ref().is_some_and(|c| c.interrupted)
    }
}
