//! Assistant integration tests
//!
//! Runs the assistant against in-memory fakes for the live session, the
//! audio output, the microphone and web search.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use voice_tutor::audio::{INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE, pcm};
use voice_tutor::{Assistant, Command, Language, SessionEvent, SessionSettings};

mod common;

use common::{FakeConnector, FakeMic, FakeOutput, FakeSearch};

type TestAssistant = Assistant<FakeConnector, FakeOutput, FakeMic>;

struct Harness {
    assistant: TestAssistant,
    connector: FakeConnector,
    output: FakeOutput,
    mic: FakeMic,
}

fn harness(settings: SessionSettings) -> Harness {
    let connector = FakeConnector::default();
    let output = FakeOutput::default();
    let mic = FakeMic::default();
    let assistant = Assistant::new(
        connector.clone(),
        output.clone(),
        mic.clone(),
        Arc::new(FakeSearch),
        settings,
    );
    Harness {
        assistant,
        connector,
        output,
        mic,
    }
}

async fn connected(settings: SessionSettings) -> Harness {
    let mut h = harness(settings);
    h.assistant.connect().await;
    h.assistant.handle_event(Some(SessionEvent::Open));
    h
}

fn model_audio(seconds: f32) -> SessionEvent {
    let samples = common::sine(220.0, seconds, 0.4, OUTPUT_SAMPLE_RATE);
    common::audio_message(&pcm::encode_at(&samples, OUTPUT_SAMPLE_RATE))
}

#[tokio::test]
async fn test_connect_sends_settings_and_becomes_ready() {
    let mut h = harness(SessionSettings::default());
    h.assistant.connect().await;

    assert!(h.assistant.is_connected());
    assert_eq!(h.assistant.state().status(), "Connecting...");
    assert!(!h.assistant.state().is_session_ready());

    let connects = h.connector.connects();
    assert_eq!(connects.len(), 1);
    assert_eq!(connects[0].voice_name, "Orus");
    assert!(!connects[0].teaching_mode);

    h.assistant.handle_event(Some(SessionEvent::Open));
    assert!(h.assistant.state().is_session_ready());
    assert_eq!(h.assistant.state().status(), "Ready");
}

#[tokio::test]
async fn test_connect_failure_shows_error() {
    let mut h = harness(SessionSettings::default());
    h.connector.refuse();
    h.assistant.connect().await;

    assert!(!h.assistant.is_connected());
    assert!(h.assistant.state().error().contains("connection refused"));
}

#[tokio::test]
async fn test_model_audio_is_queued_gaplessly() {
    let mut h = connected(SessionSettings::default()).await;
    h.output.set_now(10.0);

    h.assistant.handle_event(Some(model_audio(0.5)));
    h.assistant.handle_event(Some(model_audio(0.25)));

    let started = h.output.started();
    assert_eq!(started.len(), 2);
    assert!((started[0].at - 10.0).abs() < 1e-9);
    assert!((started[1].at - 10.5).abs() < 1e-9);
    assert_eq!(h.assistant.pipeline().scheduler().active_count(), 2);

    h.assistant.on_ended(started[0].id);
    assert_eq!(h.assistant.pipeline().scheduler().active_count(), 1);
}

#[tokio::test]
async fn test_model_text_lands_in_chat() {
    let mut h = connected(SessionSettings::default()).await;

    h.assistant
        .handle_event(Some(common::text_message(&["Hello", "there "])));
    h.assistant.handle_event(Some(common::text_message(&["   "])));

    let messages = h.assistant.state().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "Hello there");
    assert!(!messages[0].is_user);
    assert!(!messages[0].is_search_result);
}

#[tokio::test]
async fn test_interruption_silences_queued_audio() {
    let mut h = connected(SessionSettings::default()).await;
    h.output.set_now(1.0);

    h.assistant.handle_event(Some(model_audio(0.5)));
    h.assistant.handle_event(Some(model_audio(0.5)));
    h.assistant
        .handle_event(Some(common::interrupted_message()));

    assert_eq!(h.output.stopped().len(), 2);
    let scheduler = h.assistant.pipeline().scheduler();
    assert_eq!(scheduler.active_count(), 0);
    assert!(scheduler.cursor().abs() < 1e-9);

    // Fresh audio after the barge-in starts at the current clock
    h.output.set_now(1.2);
    h.assistant.handle_event(Some(model_audio(0.1)));
    let started = h.output.started();
    assert!((started[2].at - 1.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_undecodable_audio_reports_error() {
    let mut h = connected(SessionSettings::default()).await;

    let bad = voice_tutor::PcmPacket {
        mime_type: pcm::pcm_mime(OUTPUT_SAMPLE_RATE),
        data: "AAAA".to_string(),
    };
    h.assistant.handle_event(Some(common::audio_message(&bad)));

    assert!(h.output.started().is_empty());
    assert!(h.assistant.state().error().starts_with("Could not play audio"));
    assert!(h.assistant.is_connected());
}

#[tokio::test]
async fn test_session_close_and_error_events() {
    let mut h = connected(SessionSettings::default()).await;

    h.assistant
        .handle_event(Some(SessionEvent::Error("socket hiccup".to_string())));
    assert_eq!(h.assistant.state().error(), "socket hiccup");
    assert!(h.assistant.is_connected());

    h.assistant
        .handle_event(Some(SessionEvent::Closed("going away".to_string())));
    assert!(!h.assistant.is_connected());
    assert!(!h.assistant.state().is_session_ready());
    assert_eq!(h.assistant.state().status(), "Connection closed.");
    assert!(h.assistant.state().error().is_empty());
}

#[tokio::test]
async fn test_recording_streams_16k_frames() {
    let mut h = connected(SessionSettings::default()).await;

    assert!(h.assistant.handle_command(Command::ToggleRecording).await);
    assert!(h.assistant.state().is_recording());
    assert_eq!(h.assistant.state().status(), "Recording... speak now.");
    assert_eq!(h.mic.starts(), 1);

    let mut frame = common::sine(440.0, 0.1, 0.5, INPUT_SAMPLE_RATE);
    frame.truncate(256);
    h.assistant.send_frame(frame.clone()).await;

    let packets = h.connector.packets();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].mime_type, "audio/pcm;rate=16000");
    assert_eq!(packets[0], pcm::encode(&frame));

    assert!(h.assistant.handle_command(Command::ToggleRecording).await);
    assert!(!h.assistant.state().is_recording());
    assert_eq!(h.assistant.state().status(), "Ready");

    // Frames after stopping are dropped
    h.assistant.send_frame(frame).await;
    assert_eq!(h.connector.packets().len(), 1);
}

#[tokio::test]
async fn test_microphone_failure_keeps_error_visible() {
    let mut h = connected(SessionSettings::default()).await;
    h.mic.break_device();

    h.assistant.start_recording();

    let state = h.assistant.state();
    assert!(!state.is_recording());
    assert!(state.error().starts_with("Failed to start recording"));
    assert!(state.error().contains("permission denied"));
}

#[tokio::test]
async fn test_teaching_toggle_reconnects_with_instructions() {
    let settings = SessionSettings {
        language: Language::Pt,
        ..SessionSettings::default()
    };
    let mut h = connected(settings).await;

    assert!(h.assistant.handle_command(Command::ToggleTeaching).await);

    let connects = h.connector.connects();
    assert_eq!(connects.len(), 2);
    assert!(connects[1].teaching_mode);
    assert_eq!(connects[1].language, Language::Pt);
    assert!(connects[1].system_instruction().is_some());
    assert_eq!(h.connector.closed(), 1);

    let texts: Vec<_> = h
        .assistant
        .state()
        .messages()
        .iter()
        .map(|m| m.text.clone())
        .collect();
    assert_eq!(texts[0], "Teaching mode on! You are now studying Portuguese.");

    h.assistant.handle_event(Some(SessionEvent::Open));
    assert_eq!(
        h.assistant.state().status(),
        "Ready - teaching mode (Portuguese)"
    );
}

#[tokio::test]
async fn test_language_change_only_reconnects_when_teaching() {
    let mut h = connected(SessionSettings::default()).await;

    h.assistant
        .handle_command(Command::SetLanguage(Language::Fr))
        .await;
    assert_eq!(h.connector.connects().len(), 1);
    assert_eq!(h.assistant.settings().language, Language::Fr);
    assert!(h.assistant.state().messages().is_empty());

    h.assistant.handle_command(Command::ToggleTeaching).await;
    h.assistant
        .handle_command(Command::SetLanguage(Language::Ja))
        .await;

    let connects = h.connector.connects();
    assert_eq!(connects.len(), 3);
    assert_eq!(connects[2].language, Language::Ja);
    let last = h.assistant.state().messages().last().unwrap();
    assert_eq!(last.text, "Language changed to Japanese.");
}

#[tokio::test]
async fn test_quit_command_returns_false() {
    let mut h = connected(SessionSettings::default()).await;
    assert!(!h.assistant.handle_command(Command::Quit).await);
}

#[tokio::test]
async fn test_run_loop_dispatches_everything() {
    let mut h = harness(SessionSettings::default());
    let connector = h.connector.clone();
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let (_ended_tx, ended_rx) = mpsc::unbounded_channel();
    let mut lines = Vec::new();

    let driver = async move {
        let events = loop {
            if let Some(events) = connector.events() {
                break events;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        events.send(SessionEvent::Open).await.unwrap();
        events
            .send(common::text_message(&["Bonjour"]))
            .await
            .unwrap();
        cmd_tx.send(Command::Search("rust".to_string())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cmd_tx.send(Command::Quit).await.unwrap();
    };

    let run = h.assistant.run(cmd_rx, ended_rx, |new| lines.extend(new));
    tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(run, driver) })
        .await
        .expect("assistant stopped");

    assert!(lines.iter().any(|l| l == "[status] Ready"));
    assert!(lines.iter().any(|l| l.ends_with("tutor: Bonjour")));
    assert!(lines.iter().any(|l| l.contains("search: Searching for: \"rust\"...")));
    assert!(lines.iter().any(|l| l.contains("Summary: all about rust")));
    assert!(!h.assistant.state().is_searching());
    assert!(!h.assistant.is_connected());
    assert_eq!(h.connector.closed(), 1);
}

#[tokio::test]
async fn test_search_failure_is_reported_in_chat() {
    let mut h = harness(SessionSettings::default());
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let (_ended_tx, ended_rx) = mpsc::unbounded_channel();

    cmd_tx.send(Command::Search("fail".to_string())).await.unwrap();
    let driver = async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cmd_tx.send(Command::Quit).await.unwrap();
    };

    let run = h.assistant.run(cmd_rx, ended_rx, |_| {});
    tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(run, driver) })
        .await
        .expect("assistant stopped");

    let last = h.assistant.state().messages().last().unwrap();
    assert!(last.is_search_result);
    assert!(last.text.starts_with("Search failed:"));
}
