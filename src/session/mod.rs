//! Live conversation with a hosted speech model
//!
//! The [`Assistant`] owns one live session at a time. Microphone frames are
//! encoded and streamed up; model audio comes back through the
//! [`AudioPipeline`] and model text lands in the chat transcript.

mod assistant;
pub mod gemini;
mod pipeline;
pub mod protocol;
mod settings;
mod state;
mod transport;

pub use assistant::{Assistant, COMMAND_HELP, Command, SearchOutcome};
pub use gemini::{DEFAULT_LIVE_URL, GeminiConnector};
pub use pipeline::{AudioPipeline, MessageOutcome};
pub use protocol::{ClientMessage, ServerMessage};
pub use settings::{DEFAULT_MODEL, DEFAULT_VOICE, Language, SessionSettings};
pub use state::{AssistantState, ChatMessage};
pub use transport::{LiveConnector, LiveSession, SessionEvent, Uplink};
