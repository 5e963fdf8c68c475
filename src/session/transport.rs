//! Seams between the assistant and a live-session backend

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::protocol::ServerMessage;
use super::settings::SessionSettings;
use crate::Result;
use crate::audio::PcmPacket;

/// Lifecycle notifications from a live session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session accepted its setup and is ready for audio
    Open,
    /// A message from the model
    Message(Box<ServerMessage>),
    /// A transport or protocol error; the session may still be usable
    Error(String),
    /// The session ended
    Closed(String),
}

/// Sending half of a live session
#[async_trait]
pub trait Uplink: Send {
    /// Send one encoded microphone frame
    async fn send_audio(&mut self, packet: PcmPacket) -> Result<()>;

    /// Close the session
    async fn close(&mut self) -> Result<()>;
}

/// A connected live session: the uplink plus its event stream
pub struct LiveSession {
    /// Outbound audio
    pub uplink: Box<dyn Uplink>,
    /// Inbound events, in arrival order
    pub events: mpsc::Receiver<SessionEvent>,
}

/// Opens live sessions
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Connect with `settings`
    async fn connect(&self, settings: &SessionSettings) -> Result<LiveSession>;
}
