//! Audio playback to speakers
//!
//! Scheduled buffers are mixed onto a sample-accurate timeline driven by
//! the output callback. The frames rendered so far are the output clock.

use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;

use super::pcm::{AudioBuffer, OUTPUT_SAMPLE_RATE};
use super::scheduler::{OutputClock, PlaybackOutput, SourceId};
use crate::{Error, Result};

/// A buffer placed at a fixed frame on the timeline
struct Voice {
    id: SourceId,
    samples: Vec<f32>,
    start_frame: u64,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Sample-accurate mixer shared between the output callback and the scheduler
///
/// Voices are kept ordered by start frame.
pub struct Timeline {
    voices: Vec<Voice>,
    rendered: u64,
    sample_rate: u32,
    mix: Vec<f32>,
    ended: mpsc::UnboundedSender<SourceId>,
}

impl Timeline {
    /// Create an empty timeline; finished sources are reported on `ended`
    #[must_use]
    pub const fn new(sample_rate: u32, ended: mpsc::UnboundedSender<SourceId>) -> Self {
        Self {
            voices: Vec::new(),
            rendered: 0,
            sample_rate,
            mix: Vec::new(),
            ended,
        }
    }

    /// Current time in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn now(&self) -> f64 {
        self.rendered as f64 / f64::from(self.sample_rate)
    }

    /// Place `buffer` at time `at`
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn add(&mut self, id: SourceId, buffer: &AudioBuffer, at: f64) {
        if buffer.sample_rate() != self.sample_rate {
            tracing::warn!(
                %id,
                buffer_rate = buffer.sample_rate(),
                output_rate = self.sample_rate,
                "buffer sample rate differs from output, playing at output rate"
            );
        }
        let start_frame = (at.max(0.0) * f64::from(self.sample_rate)).round() as u64;
        let pos = self.voices.partition_point(|v| v.start_frame <= start_frame);
        self.voices.insert(
            pos,
            Voice {
                id,
                samples: buffer.to_mono(),
                start_frame,
            },
        );
    }

    /// Drop `id` without reporting completion
    pub fn remove(&mut self, id: SourceId) {
        self.voices.retain(|v| v.id != id);
    }

    /// Mix the next `out.len() / channels` frames into `out`
    ///
    /// The mono mix is copied to every channel. Only voices overlapping
    /// this block are touched; the scan stops at the first voice starting
    /// after it. Voices whose last frame has been rendered are removed and
    /// reported.
    #[allow(clippy::cast_possible_truncation)]
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frames = out.len().div_ceil(channels);
        let first = self.rendered;
        let last = first + frames as u64;

        self.mix.clear();
        self.mix.resize(frames, 0.0);

        for voice in &self.voices {
            if voice.start_frame >= last {
                break;
            }
            let from = voice.start_frame.max(first);
            let to = voice.end_frame().min(last);
            if from >= to {
                continue;
            }
            let src = &voice.samples
                [(from - voice.start_frame) as usize..(to - voice.start_frame) as usize];
            let dst = &mut self.mix[(from - first) as usize..(to - first) as usize];
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }

        for (frame, &mixed) in out.chunks_mut(channels).zip(&self.mix) {
            frame.fill(mixed);
        }
        self.rendered = last;

        let rendered = self.rendered;
        let ended = &self.ended;
        self.voices.retain(|voice| {
            let done = voice.end_frame() <= rendered;
            if done {
                // receiver gone means the session is shutting down
                let _ = ended.send(voice.id);
            }
            !done
        });
    }
}

impl OutputClock for Timeline {
    fn now(&self) -> f64 {
        Self::now(self)
    }
}

impl PlaybackOutput for Timeline {
    fn start(&mut self, id: SourceId, buffer: Arc<AudioBuffer>, at: f64) {
        self.add(id, &buffer, at);
    }

    fn stop(&mut self, id: SourceId) {
        self.remove(id);
    }
}

/// Plays scheduled audio on the default output device
pub struct AudioPlayback {
    timeline: Arc<Mutex<Timeline>>,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl AudioPlayback {
    /// Open the default output device at the model output rate
    ///
    /// Returns the playback handle and the channel on which naturally
    /// finished sources are reported.
    ///
    /// # Errors
    ///
    /// Returns error if no suitable output device can be opened
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<SourceId>)> {
        Self::with_sample_rate(OUTPUT_SAMPLE_RATE)
    }

    /// Open the default output device at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns error if no suitable output device can be opened
    pub fn with_sample_rate(
        sample_rate: u32,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SourceId>)> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
            c.channels() == channels
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        };

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| supports(c, 1))
            .or_else(|| {
                // Fallback: try stereo
                device
                    .supported_output_configs()
                    .ok()?
                    .find(|c| supports(c, 2))
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "audio playback initialized"
        );

        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let timeline = Arc::new(Mutex::new(Timeline::new(sample_rate, ended_tx)));

        let mut playback = Self {
            timeline,
            config,
            stream: None,
        };
        playback.open_stream(&device)?;

        Ok((playback, ended_rx))
    }

    fn open_stream(&mut self, device: &cpal::Device) -> Result<()> {
        let timeline = Arc::clone(&self.timeline);
        let channels = usize::from(self.config.channels);

        let stream = device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if let Ok(mut timeline) = timeline.lock() {
                        timeline.render(data, channels);
                    } else {
                        data.fill(0.0);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Output channel count
    #[must_use]
    pub const fn channels(&self) -> u16 {
        self.config.channels
    }

    fn with_timeline<R>(&self, f: impl FnOnce(&mut Timeline) -> R) -> R {
        let mut guard = self
            .timeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl OutputClock for AudioPlayback {
    fn now(&self) -> f64 {
        self.with_timeline(|t| t.now())
    }
}

impl PlaybackOutput for AudioPlayback {
    fn start(&mut self, id: SourceId, buffer: Arc<AudioBuffer>, at: f64) {
        self.with_timeline(|t| t.add(id, &buffer, at));
    }

    fn stop(&mut self, id: SourceId) {
        self.with_timeline(|t| t.remove(id));
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio playback stopped");
        }
    }
}
