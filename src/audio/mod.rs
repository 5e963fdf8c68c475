//! Audio pipeline
//!
//! Microphone frames are encoded to 16-bit PCM for the live session; model
//! audio is decoded and laid onto the output timeline by the scheduler.

mod capture;
pub mod pcm;
mod playback;
mod scheduler;

pub use capture::{
    AudioCapture, AudioFrame, DEFAULT_FRAME_SIZE, DeviceMicrophone, Framer, Microphone,
};
pub use pcm::{AudioBuffer, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE, PcmPacket};
pub use playback::{AudioPlayback, Timeline};
pub use scheduler::{OutputClock, PlaybackOutput, PlaybackScheduler, ScheduledSource, SourceId};

use crate::{Error, Result};

/// Convert f32 samples to mono 16-bit WAV bytes
///
/// Uses the same quantization as the live-session encoder.
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(pcm::quantize(sample))
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Root-mean-square level of `samples`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
