//! The assistant's dispatcher loop
//!
//! Capture frames, session events, playback completions, search results
//! and user commands all arrive on channels drained by one task, so state
//! changes never interleave.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::pipeline::AudioPipeline;
use super::settings::{Language, SessionSettings};
use super::state::AssistantState;
use super::transport::{LiveConnector, LiveSession, SessionEvent};
use crate::audio::{AudioFrame, Microphone, OutputClock, PlaybackOutput, SourceId, pcm};
use crate::search::SearchBackend;

/// Something the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start or stop streaming the microphone
    ToggleRecording,
    /// Switch teaching mode on or off
    ToggleTeaching,
    /// Pick the spoken language
    SetLanguage(Language),
    /// Look something up on the web
    Search(String),
    /// Reconnect the live session
    Reset,
    /// Leave
    Quit,
}

/// Help text for the terminal front end
pub const COMMAND_HELP: &str =
    "commands: /mic, /teach, /lang <en|pt|es|fr|de|it|ja>, /search <query>, /reset, /quit";

impl Command {
    /// Parse a terminal line
    ///
    /// Blank lines yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns a message for the user if the line is not a command
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (name, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(n, a)| (n, a.trim()));

        let cmd = match name {
            "/mic" => Self::ToggleRecording,
            "/teach" => Self::ToggleTeaching,
            "/lang" => Self::SetLanguage(arg.parse().map_err(|e| format!("{e}"))?),
            "/search" if !arg.is_empty() => Self::Search(arg.to_string()),
            "/search" => return Err("usage: /search <query>".to_string()),
            "/reset" => Self::Reset,
            "/quit" | "/exit" => Self::Quit,
            _ => return Err(COMMAND_HELP.to_string()),
        };
        Ok(Some(cmd))
    }
}

/// Result of a background search
#[derive(Debug)]
pub struct SearchOutcome {
    pub query: String,
    pub result: Result<String, String>,
}

/// Voice assistant: live session, audio pipeline and user-facing state
pub struct Assistant<C, O, M> {
    connector: C,
    pipeline: AudioPipeline<O>,
    mic: M,
    search: Arc<dyn SearchBackend>,
    state: AssistantState,
    model: String,
    voice_name: String,
    session: Option<LiveSession>,
    frames: Option<mpsc::Receiver<AudioFrame>>,
    search_tx: mpsc::UnboundedSender<SearchOutcome>,
    search_rx: mpsc::UnboundedReceiver<SearchOutcome>,
}

impl<C, O, M> Assistant<C, O, M>
where
    C: LiveConnector,
    O: PlaybackOutput + OutputClock,
    M: Microphone,
{
    /// Assemble an assistant; nothing connects until [`Self::connect`] or [`Self::run`]
    pub fn new(
        connector: C,
        output: O,
        mic: M,
        search: Arc<dyn SearchBackend>,
        settings: SessionSettings,
    ) -> Self {
        let (search_tx, search_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            pipeline: AudioPipeline::new(output),
            mic,
            search,
            state: AssistantState::new(settings.language, settings.teaching_mode),
            model: settings.model,
            voice_name: settings.voice_name,
            session: None,
            frames: None,
            search_tx,
            search_rx,
        }
    }

    /// Settings the next session will be opened with
    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            model: self.model.clone(),
            voice_name: self.voice_name.clone(),
            language: self.state.language(),
            teaching_mode: self.state.is_teaching_mode(),
        }
    }

    /// Open a live session with the current settings
    pub async fn connect(&mut self) {
        self.state.set_session_ready(false);
        self.state.update_status("Connecting...");

        match self.connector.connect(&self.settings()).await {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                tracing::error!(error = %e, "failed to open live session");
                self.state.update_error(e.to_string());
            }
        }
    }

    /// Close the live session, if any
    pub async fn close(&mut self) {
        self.state.set_session_ready(false);
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.uplink.close().await {
                tracing::warn!(error = %e, "error closing live session");
            }
        }
    }

    /// Close and reopen the session so new settings take effect
    pub async fn reset(&mut self) {
        self.close().await;
        self.connect().await;
    }

    /// Whether a live session is open
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Apply a user command; returns `false` on quit
    pub async fn handle_command(&mut self, cmd: Command) -> bool {
        tracing::debug!(?cmd, "command");
        match cmd {
            Command::ToggleRecording => {
                if self.state.is_recording() {
                    self.stop_recording();
                } else {
                    self.start_recording();
                }
            }
            Command::ToggleTeaching => {
                self.state.toggle_teaching_mode();
                self.reset().await;
            }
            Command::SetLanguage(language) => {
                if self.state.set_language(language) {
                    self.reset().await;
                    self.state.announce_language();
                }
            }
            Command::Search(query) => self.search(query),
            Command::Reset => self.reset().await,
            Command::Quit => return false,
        }
        true
    }

    /// Start streaming microphone frames to the session
    pub fn start_recording(&mut self) {
        if self.state.is_recording() {
            return;
        }

        self.state.update_status("Requesting microphone access...");

        match self.mic.start() {
            Ok(frames) => {
                self.frames = Some(frames);
                self.state.set_recording(true);
                let status = self.state.recording_status();
                self.state.update_status(status);
                tracing::info!("recording started");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start recording");
                self.state
                    .update_error(format!("Failed to start recording: {e}"));
                self.release_microphone();
            }
        }
    }

    /// Stop streaming the microphone
    pub fn stop_recording(&mut self) {
        self.release_microphone();
        if self.state.is_session_ready() {
            let status = self.state.ready_status();
            self.state.update_status(status);
        }
    }

    fn release_microphone(&mut self) {
        self.state.set_recording(false);
        self.frames = None;
        self.mic.stop();
    }

    /// Encode a capture frame and send it, if recording into a session
    pub async fn send_frame(&mut self, frame: AudioFrame) {
        if !self.state.is_recording() {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if let Err(e) = session.uplink.send_audio(pcm::encode(&frame)).await {
            tracing::warn!(error = %e, "failed to send audio frame");
            self.state.update_error(e.to_string());
        }
    }

    /// React to a session event; `None` means the event stream ended
    pub fn handle_event(&mut self, event: Option<SessionEvent>) {
        match event {
            Some(SessionEvent::Open) => {
                tracing::info!("live session ready");
                self.state.set_session_ready(true);
                let status = self.state.ready_status();
                self.state.update_status(status);
            }
            Some(SessionEvent::Message(msg)) => {
                let outcome = self.pipeline.apply(&msg);
                if let Some(e) = outcome.decode_error {
                    self.state.update_error(format!("Could not play audio: {e}"));
                }
                if let Some(text) = outcome.text {
                    self.state.add_chat_message(text, false);
                }
                if let Some(stopped) = outcome.stopped {
                    tracing::debug!(stopped, "model interrupted");
                }
            }
            Some(SessionEvent::Error(e)) => {
                tracing::warn!(error = %e, "live session error");
                self.state.update_error(e);
            }
            Some(SessionEvent::Closed(reason)) => self.on_closed(&reason),
            None => self.on_closed("event stream ended"),
        }
    }

    fn on_closed(&mut self, reason: &str) {
        tracing::info!(reason, "live session closed");
        self.session = None;
        self.state.set_session_ready(false);
        self.state.update_status("Connection closed.");
    }

    /// Forward a playback completion to the scheduler
    pub fn on_ended(&mut self, id: SourceId) {
        self.pipeline.on_ended(id);
    }

    /// Run a web search in the background; the answer lands in the chat
    pub fn search(&mut self, query: String) {
        self.state.set_searching(true);
        self.state
            .add_search_message(format!("Searching for: \"{query}\"..."));

        let backend = Arc::clone(&self.search);
        let tx = self.search_tx.clone();
        tokio::spawn(async move {
            let result = backend.search(&query).await.map_err(|e| e.to_string());
            let _ = tx.send(SearchOutcome { query, result });
        });
    }

    /// Post a finished search to the chat
    pub fn handle_search_outcome(&mut self, outcome: SearchOutcome) {
        match outcome.result {
            Ok(text) => {
                self.state
                    .add_search_message(format!("Search results:\n{text}"));
            }
            Err(e) => {
                tracing::warn!(query = %outcome.query, error = %e, "search failed");
                self.state.add_search_message(format!("Search failed: {e}"));
            }
        }
        self.state.set_searching(false);
    }

    /// Connect, then dispatch until `Quit` or the command channel closes
    ///
    /// `render` receives the lines produced by [`AssistantState::render`]
    /// after every change.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<Command>,
        mut ended: mpsc::UnboundedReceiver<SourceId>,
        mut render: impl FnMut(Vec<String>),
    ) {
        self.connect().await;
        render(self.state.render());

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
                event = next_event(&mut self.session) => self.handle_event(event),
                frame = next_frame(&mut self.frames) => match frame {
                    Some(frame) => self.send_frame(frame).await,
                    None => {
                        tracing::warn!("capture stream ended");
                        self.stop_recording();
                    }
                },
                Some(id) = ended.recv() => self.on_ended(id),
                Some(outcome) = self.search_rx.recv() => self.handle_search_outcome(outcome),
            }

            let lines = self.state.render();
            if !lines.is_empty() {
                render(lines);
            }
        }

        self.stop_recording();
        self.pipeline.interrupt();
        self.close().await;
        tracing::info!("assistant stopped");
    }

    #[must_use]
    pub const fn state(&self) -> &AssistantState {
        &self.state
    }

    pub const fn state_mut(&mut self) -> &mut AssistantState {
        &mut self.state
    }

    #[must_use]
    pub const fn pipeline(&self) -> &AudioPipeline<O> {
        &self.pipeline
    }

    pub const fn pipeline_mut(&mut self) -> &mut AudioPipeline<O> {
        &mut self.pipeline
    }
}

async fn next_event(session: &mut Option<LiveSession>) -> Option<SessionEvent> {
    match session {
        Some(session) => session.events.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_frame(frames: &mut Option<mpsc::Receiver<AudioFrame>>) -> Option<AudioFrame> {
    match frames {
        Some(frames) => frames.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("  "), Ok(None));
        assert_eq!(Command::parse("/mic"), Ok(Some(Command::ToggleRecording)));
        assert_eq!(Command::parse("/teach"), Ok(Some(Command::ToggleTeaching)));
        assert_eq!(
            Command::parse("/lang pt"),
            Ok(Some(Command::SetLanguage(Language::Pt)))
        );
        assert_eq!(
            Command::parse("/search  rust audio "),
            Ok(Some(Command::Search("rust audio".to_string())))
        );
        assert_eq!(Command::parse("/exit"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse("/lang xx").is_err());
        assert!(Command::parse("/search").is_err());
        assert_eq!(Command::parse("hello"), Err(COMMAND_HELP.to_string()));
    }
}
