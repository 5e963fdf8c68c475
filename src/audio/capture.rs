//! Audio capture from microphone
//!
//! The input callback slices incoming audio into fixed-size frames and
//! hands them off without blocking. A frame the consumer has no room for
//! is dropped and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;

use super::pcm::INPUT_SAMPLE_RATE;
use crate::{Error, Result};

/// Default samples per capture frame
pub const DEFAULT_FRAME_SIZE: usize = 256;

/// Frames buffered between the capture callback and the dispatcher
const FRAME_QUEUE: usize = 64;

/// One capture callback's worth of mono samples
pub type AudioFrame = Vec<f32>;

/// Splits a sample stream into frames of exactly `frame_size` samples
#[derive(Debug)]
pub struct Framer {
    frame_size: usize,
    pending: Vec<f32>,
}

impl Framer {
    /// Create a framer; a zero size is treated as one sample
    #[must_use]
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size),
        }
    }

    /// Feed samples, calling `emit` for every completed frame
    pub fn push(&mut self, mut samples: &[f32], mut emit: impl FnMut(AudioFrame)) {
        while !samples.is_empty() {
            let take = (self.frame_size - self.pending.len()).min(samples.len());
            self.pending.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.pending.len() == self.frame_size {
                let frame =
                    std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_size));
                emit(frame);
            }
        }
    }

    /// Samples waiting for the current frame to fill
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// A source of capture frames that can be switched on and off
pub trait Microphone {
    /// Begin capturing; frames arrive on the returned receiver
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened or started
    fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing and release the device
    fn stop(&mut self);
}

/// Default input device, opened on each start and released on stop
pub struct DeviceMicrophone {
    frame_size: usize,
    capture: Option<AudioCapture>,
}

impl DeviceMicrophone {
    /// Microphone delivering frames of `frame_size` samples
    #[must_use]
    pub const fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            capture: None,
        }
    }
}

impl Microphone for DeviceMicrophone {
    fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        self.stop();
        let mut capture = AudioCapture::new(self.frame_size)?;
        let frames = capture.start()?;
        self.capture = Some(capture);
        Ok(frames)
    }

    fn stop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
    }
}

/// Captures audio from the default input device
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    frame_size: usize,
    dropped: Arc<AtomicU64>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new(frame_size: usize) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(INPUT_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(INPUT_SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(INPUT_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = INPUT_SAMPLE_RATE,
            frame_size,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            frame_size,
            dropped: Arc::new(AtomicU64::new(0)),
            stream: None,
        })
    }

    /// Start capturing; frames arrive on the returned receiver
    ///
    /// # Errors
    ///
    /// Returns error if capture fails or is already running
    pub fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.stream.is_some() {
            return Err(Error::Audio("capture already running".to_string()));
        }

        let (tx, rx) = mpsc::channel(FRAME_QUEUE);
        let dropped = Arc::clone(&self.dropped);
        let mut framer = Framer::new(self.frame_size);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    framer.push(data, |frame| {
                        if tx.try_send(frame).is_err() {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    });
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(rx)
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!(
                dropped_frames = self.dropped_frames(),
                "audio capture stopped"
            );
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Frames discarded because the consumer fell behind
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        INPUT_SAMPLE_RATE
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
