//! Assistant state shown to the user
//!
//! Every mutation goes through a method here; the front end calls
//! [`AssistantState::render`] afterwards to pick up what changed.

use chrono::{DateTime, Local};

use super::settings::Language;

/// One line of the chat transcript
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Sequential id, starting at 0
    pub id: u64,
    /// Message text
    pub text: String,
    /// Typed or spoken by the user rather than the assistant
    pub is_user: bool,
    /// Produced by a web search
    pub is_search_result: bool,
    /// When the message was added
    pub timestamp: DateTime<Local>,
}

impl ChatMessage {
    /// Time formatted as `HH:MM`
    #[must_use]
    pub fn time(&self) -> String {
        self.timestamp.format("%H:%M").to_string()
    }
}

/// Status, errors, toggles and transcript of the assistant
#[derive(Debug)]
pub struct AssistantState {
    status: String,
    error: String,
    is_recording: bool,
    is_session_ready: bool,
    is_teaching_mode: bool,
    is_searching: bool,
    language: Language,
    messages: Vec<ChatMessage>,
    next_id: u64,
    rendered: usize,
    shown_status: String,
    shown_error: String,
}

impl AssistantState {
    /// Fresh state for `language`
    #[must_use]
    pub const fn new(language: Language, teaching_mode: bool) -> Self {
        Self {
            status: String::new(),
            error: String::new(),
            is_recording: false,
            is_session_ready: false,
            is_teaching_mode: teaching_mode,
            is_searching: false,
            language,
            messages: Vec::new(),
            next_id: 0,
            rendered: 0,
            shown_status: String::new(),
            shown_error: String::new(),
        }
    }

    /// Set the status line and clear any error
    pub fn update_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
        self.error.clear();
    }

    /// Set the error line
    pub fn update_error(&mut self, msg: impl Into<String>) {
        self.error = msg.into();
    }

    /// Append a chat message
    pub fn add_chat_message(&mut self, text: impl Into<String>, is_user: bool) -> &ChatMessage {
        self.push_message(text.into(), is_user, false)
    }

    /// Append a search progress or result message
    pub fn add_search_message(&mut self, text: impl Into<String>) -> &ChatMessage {
        self.push_message(text.into(), false, true)
    }

    fn push_message(&mut self, text: String, is_user: bool, is_search_result: bool) -> &ChatMessage {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            text,
            is_user,
            is_search_result,
            timestamp: Local::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Flip teaching mode and post the matching chat messages
    ///
    /// Returns the new value. The caller restarts the session.
    pub fn toggle_teaching_mode(&mut self) -> bool {
        self.is_teaching_mode = !self.is_teaching_mode;
        if self.is_teaching_mode {
            let name = self.language.name();
            self.add_chat_message(
                format!("Teaching mode on! You are now studying {name}."),
                false,
            );
            self.add_chat_message("How can I help you with your language learning today?", false);
        } else {
            self.add_chat_message("Teaching mode off.", false);
        }
        self.is_teaching_mode
    }

    /// Select a language
    ///
    /// Returns `true` when the running session must restart, which is only
    /// the case in teaching mode.
    pub const fn set_language(&mut self, language: Language) -> bool {
        self.language = language;
        self.is_teaching_mode
    }

    /// Post the notice that follows a language change in teaching mode
    pub fn announce_language(&mut self) {
        let name = self.language.name();
        self.add_chat_message(format!("Language changed to {name}."), false);
    }

    /// Status text while recording
    #[must_use]
    pub fn recording_status(&self) -> String {
        if self.is_teaching_mode {
            format!("Recording... teaching mode ({})", self.language.name())
        } else {
            "Recording... speak now.".to_string()
        }
    }

    /// Status text while idle with a ready session
    #[must_use]
    pub fn ready_status(&self) -> String {
        if self.is_teaching_mode {
            format!("Ready - teaching mode ({})", self.language.name())
        } else {
            "Ready".to_string()
        }
    }

    pub const fn set_recording(&mut self, recording: bool) {
        self.is_recording = recording;
    }

    pub const fn set_session_ready(&mut self, ready: bool) {
        self.is_session_ready = ready;
    }

    pub const fn set_searching(&mut self, searching: bool) {
        self.is_searching = searching;
    }

    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    #[must_use]
    pub fn error(&self) -> &str {
        &self.error
    }

    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.is_recording
    }

    #[must_use]
    pub const fn is_session_ready(&self) -> bool {
        self.is_session_ready
    }

    #[must_use]
    pub const fn is_teaching_mode(&self) -> bool {
        self.is_teaching_mode
    }

    #[must_use]
    pub const fn is_searching(&self) -> bool {
        self.is_searching
    }

    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    /// Full transcript
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Lines describing everything that changed since the last call
    ///
    /// New chat messages come first, then the status and error lines if
    /// either changed.
    pub fn render(&mut self) -> Vec<String> {
        let mut lines: Vec<String> = self.messages[self.rendered..]
            .iter()
            .map(format_message)
            .collect();
        self.rendered = self.messages.len();

        if self.status != self.shown_status {
            self.shown_status.clone_from(&self.status);
            if !self.status.is_empty() {
                lines.push(format!("[status] {}", self.status));
            }
        }

        if self.error != self.shown_error {
            self.shown_error.clone_from(&self.error);
            if !self.error.is_empty() {
                lines.push(format!("[error] {}", self.error));
            }
        }

        lines
    }
}

fn format_message(msg: &ChatMessage) -> String {
    let who = if msg.is_user {
        "you"
    } else if msg.is_search_result {
        "search"
    } else {
        "tutor"
    };
    format!("[{}] {who}: {}", msg.time(), msg.text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_increase() {
        let mut state = AssistantState::new(Language::En, false);
        assert_eq!(state.add_chat_message("a", true).id, 0);
        assert_eq!(state.add_search_message("b").id, 1);
        assert!(state.messages()[1].is_search_result);
    }

    #[test]
    fn test_status_clears_error() {
        let mut state = AssistantState::new(Language::En, false);
        state.update_error("boom");
        assert_eq!(state.error(), "boom");
        state.update_status("Ready");
        assert_eq!(state.error(), "");
        assert_eq!(state.status(), "Ready");
    }

    #[test]
    fn test_teaching_toggle_messages() {
        let mut state = AssistantState::new(Language::Es, false);

        assert!(state.toggle_teaching_mode());
        let texts: Vec<_> = state.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("Spanish"));

        assert!(!state.toggle_teaching_mode());
        assert_eq!(state.messages().last().unwrap().text, "Teaching mode off.");
    }

    #[test]
    fn test_set_language_restart_only_when_teaching() {
        let mut state = AssistantState::new(Language::En, false);
        assert!(!state.set_language(Language::Ja));
        assert_eq!(state.language(), Language::Ja);

        state.toggle_teaching_mode();
        assert!(state.set_language(Language::It));
        assert_eq!(state.recording_status(), "Recording... teaching mode (Italian)");
        assert_eq!(state.ready_status(), "Ready - teaching mode (Italian)");
    }

    #[test]
    fn test_render_only_reports_changes() {
        let mut state = AssistantState::new(Language::En, false);
        state.update_status("Connecting...");
        state.add_chat_message("hello", false);

        let lines = state.render();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("tutor: hello"));
        assert_eq!(lines[1], "[status] Connecting...");

        assert!(state.render().is_empty());

        state.update_error("lost");
        assert_eq!(state.render(), vec!["[error] lost".to_string()]);
    }
}
