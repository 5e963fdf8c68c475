//! Websocket connector for the hosted Gemini live API

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::protocol::{ClientMessage, ServerMessage};
use super::settings::SessionSettings;
use super::transport::{LiveConnector, LiveSession, SessionEvent, Uplink};
use crate::audio::PcmPacket;
use crate::{Error, Result};

/// Default live API websocket endpoint
pub const DEFAULT_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Events buffered between the reader task and the dispatcher
const EVENT_QUEUE: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to the Gemini live API
pub struct GeminiConnector {
    endpoint: Url,
    api_key: SecretString,
}

impl GeminiConnector {
    /// Create a connector for `endpoint`
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is not a websocket URL
    pub fn new(endpoint: &str, api_key: SecretString) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(Error::Config(format!(
                "live endpoint must be ws:// or wss://, got {endpoint}"
            )));
        }
        Ok(Self { endpoint, api_key })
    }

    /// Endpoint with the API key attached
    fn authorized_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());
        url
    }
}

#[async_trait]
impl LiveConnector for GeminiConnector {
    async fn connect(&self, settings: &SessionSettings) -> Result<LiveSession> {
        tracing::info!(
            endpoint = %self.endpoint,
            model = %settings.model,
            language = settings.language.code(),
            teaching = settings.teaching_mode,
            "connecting live session"
        );

        let (ws, _response) = connect_async(self.authorized_url().as_str())
            .await
            .map_err(handshake_error)?;
        let (mut sink, stream) = ws.split();

        let setup = serde_json::to_string(&ClientMessage::setup(settings))?;
        sink.send(Message::Text(setup))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let (tx, events) = mpsc::channel(EVENT_QUEUE);
        let reader = tokio::spawn(read_events(stream, tx));

        Ok(LiveSession {
            uplink: Box::new(GeminiUplink { sink, reader }),
            events,
        })
    }
}

/// Classify a failed websocket handshake
///
/// An HTTP answer means the service refused the session (bad key, unknown
/// model); anything else is a transport failure.
fn handshake_error(e: tungstenite::Error) -> Error {
    match e {
        tungstenite::Error::Http(response) => Error::Session(format!(
            "live session rejected: HTTP {}",
            response.status()
        )),
        other => Error::WebSocket(other.to_string()),
    }
}

/// Forward websocket frames as session events until the socket ends
async fn read_events(mut stream: SplitStream<WsStream>, tx: mpsc::Sender<SessionEvent>) {
    let closed = loop {
        let Some(frame) = stream.next().await else {
            break "connection ended".to_string();
        };

        let payload = match frame {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(frame)) => {
                break frame.map_or_else(|| "closed".to_string(), |f| f.reason.into_owned());
            }
            Ok(_) => continue,
            Err(e) => {
                let _ = tx.send(SessionEvent::Error(e.to_string())).await;
                break e.to_string();
            }
        };

        let event = match serde_json::from_slice::<ServerMessage>(&payload) {
            Ok(msg) if msg.is_setup_complete() => SessionEvent::Open,
            Ok(msg) => SessionEvent::Message(Box::new(msg)),
            Err(e) => {
                tracing::warn!(error = %e, "unparseable live message");
                SessionEvent::Error(format!("unparseable message: {e}"))
            }
        };

        if tx.send(event).await.is_err() {
            // dispatcher dropped the session
            return;
        }
    };

    tracing::debug!(reason = %closed, "live session closed");
    let _ = tx.send(SessionEvent::Closed(closed)).await;
}

struct GeminiUplink {
    sink: SplitSink<WsStream, Message>,
    reader: JoinHandle<()>,
}

#[async_trait]
impl Uplink for GeminiUplink {
    async fn send_audio(&mut self, packet: PcmPacket) -> Result<()> {
        let json = serde_json::to_string(&ClientMessage::audio(packet))?;
        self.sink
            .send(Message::Text(json))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        let result = self
            .sink
            .close()
            .await
            .map_err(|e| Error::WebSocket(e.to_string()));
        self.reader.abort();
        result
    }
}

impl Drop for GeminiUplink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
