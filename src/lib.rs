//! Voice Tutor - real-time voice assistant and language tutor
//!
//! Streams microphone audio to a hosted live speech model, plays the
//! spoken replies back without gaps, and mirrors the conversation in a
//! text transcript. Teaching mode switches the spoken language and turns
//! the model into a tutor.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  frames   ┌─────────────┐  base64 PCM  ┌──────────────┐
//! │  Microphone  ├──────────►│ PCM encoder ├─────────────►│              │
//! └──────────────┘           └─────────────┘              │ Live session │
//! ┌──────────────┐  start/   ┌─────────────┐  base64 PCM  │  (websocket) │
//! │   Speakers   │◄──────────┤  Scheduler  │◄─────────────┤              │
//! └──────┬───────┘   stop    └──────▲──────┘   decoder    └──────────────┘
//!        │ ended                    │
//!        └──────────────────────────┘  one dispatcher loop drains all channels
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod search;
pub mod session;
pub mod setup;

pub use audio::{AudioBuffer, PcmPacket, PlaybackScheduler, ScheduledSource, SourceId};
pub use config::Config;
pub use error::{Error, Result};
pub use search::{SearchBackend, WebSearchTool, format_instant_answer};
pub use session::{
    Assistant, AssistantState, Command, GeminiConnector, Language, LiveConnector, SessionEvent,
    SessionSettings,
};
