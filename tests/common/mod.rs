//! Shared test utilities
//!
//! In-memory stand-ins for the audio device, the live session and the
//! search service. Each fake is a cheap clone around shared state, so a
//! test keeps one handle while the assistant owns another.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use voice_tutor::audio::{AudioFrame, Microphone, OutputClock, PlaybackOutput};
use voice_tutor::session::{LiveSession, Uplink};
use voice_tutor::{
    AudioBuffer, Error, LiveConnector, PcmPacket, Result, SearchBackend, SessionEvent,
    SessionSettings, SourceId,
};

/// Generate sine wave samples at `rate`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn sine(frequency: f32, duration_secs: f32, amplitude: f32, rate: u32) -> Vec<f32> {
    let num_samples = (rate as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// A source started on the fake output
#[derive(Debug, Clone)]
pub struct Started {
    pub id: SourceId,
    pub at: f64,
    pub duration: f64,
}

#[derive(Debug, Default)]
struct OutputLog {
    now: f64,
    started: Vec<Started>,
    stopped: Vec<SourceId>,
}

/// Output with a hand-driven clock that records every start and stop
#[derive(Debug, Clone, Default)]
pub struct FakeOutput {
    log: Arc<Mutex<OutputLog>>,
}

impl FakeOutput {
    pub fn set_now(&self, now: f64) {
        self.log.lock().unwrap().now = now;
    }

    pub fn started(&self) -> Vec<Started> {
        self.log.lock().unwrap().started.clone()
    }

    pub fn stopped(&self) -> Vec<SourceId> {
        self.log.lock().unwrap().stopped.clone()
    }
}

impl OutputClock for FakeOutput {
    fn now(&self) -> f64 {
        self.log.lock().unwrap().now
    }
}

impl PlaybackOutput for FakeOutput {
    fn start(&mut self, id: SourceId, buffer: Arc<AudioBuffer>, at: f64) {
        self.log.lock().unwrap().started.push(Started {
            id,
            at,
            duration: buffer.duration(),
        });
    }

    fn stop(&mut self, id: SourceId) {
        self.log.lock().unwrap().stopped.push(id);
    }
}

#[derive(Debug, Default)]
struct SessionLog {
    settings: Vec<SessionSettings>,
    events: Vec<mpsc::Sender<SessionEvent>>,
    packets: Vec<PcmPacket>,
    closed: usize,
    refuse: bool,
}

/// Connector whose sessions are plain channels
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    log: Arc<Mutex<SessionLog>>,
}

impl FakeConnector {
    /// Make every following connect fail
    pub fn refuse(&self) {
        self.log.lock().unwrap().refuse = true;
    }

    /// Settings of every connect, oldest first
    pub fn connects(&self) -> Vec<SessionSettings> {
        self.log.lock().unwrap().settings.clone()
    }

    /// Event sender of the most recent session
    pub fn events(&self) -> Option<mpsc::Sender<SessionEvent>> {
        self.log.lock().unwrap().events.last().cloned()
    }

    /// Audio sent on any session
    pub fn packets(&self) -> Vec<PcmPacket> {
        self.log.lock().unwrap().packets.clone()
    }

    /// Number of sessions closed by the assistant
    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed
    }
}

#[async_trait]
impl LiveConnector for FakeConnector {
    async fn connect(&self, settings: &SessionSettings) -> Result<LiveSession> {
        let mut log = self.log.lock().unwrap();
        if log.refuse {
            return Err(Error::Session("connection refused".to_string()));
        }

        let (tx, events) = mpsc::channel(16);
        log.settings.push(settings.clone());
        log.events.push(tx);

        Ok(LiveSession {
            uplink: Box::new(FakeUplink {
                log: Arc::clone(&self.log),
            }),
            events,
        })
    }
}

struct FakeUplink {
    log: Arc<Mutex<SessionLog>>,
}

#[async_trait]
impl Uplink for FakeUplink {
    async fn send_audio(&mut self, packet: PcmPacket) -> Result<()> {
        self.log.lock().unwrap().packets.push(packet);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MicLog {
    frames: Option<mpsc::Sender<AudioFrame>>,
    starts: usize,
    stops: usize,
    broken: bool,
}

/// Microphone fed by the test
#[derive(Debug, Clone, Default)]
pub struct FakeMic {
    log: Arc<Mutex<MicLog>>,
}

impl FakeMic {
    /// Make every following start fail like a denied permission
    pub fn break_device(&self) {
        self.log.lock().unwrap().broken = true;
    }

    /// Sender feeding the current capture, if started
    pub fn frames(&self) -> Option<mpsc::Sender<AudioFrame>> {
        self.log.lock().unwrap().frames.clone()
    }

    pub fn starts(&self) -> usize {
        self.log.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.log.lock().unwrap().stops
    }
}

impl Microphone for FakeMic {
    fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let mut log = self.log.lock().unwrap();
        if log.broken {
            return Err(Error::Audio("permission denied".to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        log.frames = Some(tx);
        log.starts += 1;
        Ok(rx)
    }

    fn stop(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.frames = None;
        log.stops += 1;
    }
}

/// Search backend answering every query with a canned line
#[derive(Debug, Default)]
pub struct FakeSearch;

#[async_trait]
impl SearchBackend for FakeSearch {
    async fn search(&self, query: &str) -> Result<String> {
        if query == "fail" {
            return Err(Error::Search("service unavailable".to_string()));
        }
        Ok(format!("Title: {query}\nSummary: all about {query}"))
    }
}

/// Server message carrying one audio part
pub fn audio_message(packet: &PcmPacket) -> SessionEvent {
    server_event(&serde_json::json!({
        "serverContent": {
            "modelTurn": {
                "parts": [{ "inlineData": packet }]
            }
        }
    }))
}

/// Server message carrying text parts
pub fn text_message(parts: &[&str]) -> SessionEvent {
    let parts: Vec<_> = parts.iter().map(|t| serde_json::json!({ "text": t })).collect();
    server_event(&serde_json::json!({
        "serverContent": { "modelTurn": { "parts": parts } }
    }))
}

/// Server message announcing an interruption
pub fn interrupted_message() -> SessionEvent {
    server_event(&serde_json::json!({ "serverContent": { "interrupted": true } }))
}

fn server_event(value: &serde_json::Value) -> SessionEvent {
    let msg = serde_json::from_value(value.clone()).expect("valid server message");
    SessionEvent::Message(Box::new(msg))
}
