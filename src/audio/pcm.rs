//! 16-bit PCM encoding and decoding
//!
//! Outbound microphone frames are quantized to signed 16-bit little-endian
//! PCM and base64 encoded. Inbound model audio takes the reverse path into
//! an [`AudioBuffer`] ready for the playback scheduler.
//!
//! Scaling is asymmetric on purpose: samples are multiplied by 32768 and
//! reduced modulo 2^16 without clamping, so `1.0` wraps to `-32768`.
//! Decoding divides by 32768.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Sample rate of outbound microphone audio
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of inbound model audio unless the mime tag says otherwise
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

const SCALE: f64 = 32_768.0;
const WRAP: f64 = 65_536.0;

/// Base64 PCM payload with its mime tag, as carried by the live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcmPacket {
    /// Mime tag, e.g. `audio/pcm;rate=16000`
    pub mime_type: String,
    /// Base64 encoded little-endian i16 samples
    pub data: String,
}

impl PcmPacket {
    /// Sample rate declared by the mime tag, if any
    #[must_use]
    pub fn sample_rate(&self) -> Option<u32> {
        parse_rate(&self.mime_type)
    }
}

/// Build the mime tag for raw PCM at `rate`
#[must_use]
pub fn pcm_mime(rate: u32) -> String {
    format!("audio/pcm;rate={rate}")
}

/// Extract `rate=N` from a PCM mime tag
fn parse_rate(mime: &str) -> Option<u32> {
    let mut parts = mime.split(';').map(str::trim);
    let kind = parts.next()?;
    if !kind.eq_ignore_ascii_case("audio/pcm") {
        return None;
    }
    parts
        .filter_map(|p| p.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, v)| v.trim().parse().ok())
}

/// Quantize one float sample to i16
///
/// `round(s * 32768)` reduced modulo 2^16. Out-of-range input wraps and
/// non-finite input maps to 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantize(sample: f32) -> i16 {
    let scaled = (f64::from(sample) * SCALE).round();
    if !scaled.is_finite() {
        return 0;
    }
    // rem_euclid keeps the value in [0, 65536), exactly what a u16 holds
    scaled.rem_euclid(WRAP) as u16 as i16
}

/// Convert one i16 sample back to float
#[must_use]
pub fn dequantize(sample: i16) -> f32 {
    f32::from(sample) / 32_768.0
}

/// Convert float samples to little-endian 16-bit PCM bytes
#[must_use]
pub fn samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&quantize(s).to_le_bytes());
    }
    bytes
}

/// Encode an audio frame as a base64 PCM packet tagged with `rate`
#[must_use]
pub fn encode_at(frame: &[f32], rate: u32) -> PcmPacket {
    PcmPacket {
        mime_type: pcm_mime(rate),
        data: STANDARD.encode(samples_to_bytes(frame)),
    }
}

/// Encode a microphone frame at the fixed 16 kHz input rate
#[must_use]
pub fn encode(frame: &[f32]) -> PcmPacket {
    encode_at(frame, INPUT_SAMPLE_RATE)
}

/// Decoded audio, one sample vector per channel
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Build a mono buffer
    #[must_use]
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    /// Build a buffer from per-channel sample vectors
    ///
    /// # Errors
    ///
    /// Returns error if there are no channels or the channels differ in length
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let Some(first) = channels.first() else {
            return Err(Error::MalformedPcm("buffer needs at least one channel".to_string()));
        };
        let frames = first.len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(Error::MalformedPcm("channel lengths differ".to_string()));
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Samples per channel
    #[must_use]
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Number of channels
    #[must_use]
    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Samples of channel `index`
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Average all channels down to one
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_mono(&self) -> Vec<f32> {
        match self.channels.as_slice() {
            [] => Vec::new(),
            [only] => only.clone(),
            many => {
                let n = many.len() as f32;
                (0..self.frames())
                    .map(|i| many.iter().map(|c| c[i]).sum::<f32>() / n)
                    .collect()
            }
        }
    }
}

/// Decode raw little-endian PCM bytes into an audio buffer
///
/// A channel count of 0 or 1 yields a mono buffer. Larger counts treat
/// the input as interleaved.
///
/// # Errors
///
/// Returns [`Error::MalformedPcm`] if the byte length is odd or the sample
/// count does not divide evenly by the channel count
pub fn decode_bytes(bytes: &[u8], sample_rate: u32, channel_count: usize) -> Result<AudioBuffer> {
    if bytes.len() % 2 != 0 {
        return Err(Error::MalformedPcm(format!(
            "odd byte length {}",
            bytes.len()
        )));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| dequantize(i16::from_le_bytes([pair[0], pair[1]])))
        .collect();

    if channel_count <= 1 {
        return Ok(AudioBuffer::mono(samples, sample_rate));
    }

    if samples.len() % channel_count != 0 {
        return Err(Error::MalformedPcm(format!(
            "{} samples do not split into {channel_count} channels",
            samples.len()
        )));
    }

    Ok(AudioBuffer {
        channels: deinterleave(&samples, channel_count),
        sample_rate,
    })
}

/// Split interleaved samples: channel `c` takes every `count`-th sample from `c`
fn deinterleave(samples: &[f32], count: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / count;
    let mut channels = vec![Vec::with_capacity(frames); count];
    for frame in samples.chunks_exact(count) {
        for (channel, &s) in channels.iter_mut().zip(frame) {
            channel.push(s);
        }
    }
    channels
}

/// Decode a base64 PCM packet
///
/// # Errors
///
/// Returns [`Error::MalformedPcm`] on invalid base64 or malformed PCM
pub fn decode(packet: &PcmPacket, sample_rate: u32, channel_count: usize) -> Result<AudioBuffer> {
    let bytes = STANDARD
        .decode(packet.data.as_bytes())
        .map_err(|e| Error::MalformedPcm(format!("invalid base64: {e}")))?;
    decode_bytes(&bytes, sample_rate, channel_count)
}
