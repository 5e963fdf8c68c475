//! Inbound model audio: decode, schedule, interrupt

use super::protocol::ServerMessage;
use crate::audio::{
    OUTPUT_SAMPLE_RATE, OutputClock, PcmPacket, PlaybackOutput, PlaybackScheduler,
    ScheduledSource, SourceId, pcm,
};
use crate::{Error, Result};

/// What applying one server message did
#[derive(Debug, Default)]
pub struct MessageOutcome {
    /// Audio placed on the timeline
    pub scheduled: Option<ScheduledSource>,
    /// Audio that could not be decoded
    pub decode_error: Option<Error>,
    /// Transcript text for the chat
    pub text: Option<String>,
    /// Sources stopped by an interruption
    pub stopped: Option<usize>,
}

/// Decoder and scheduler bound to one audio output
pub struct AudioPipeline<O> {
    scheduler: PlaybackScheduler,
    output: O,
}

impl<O: PlaybackOutput + OutputClock> AudioPipeline<O> {
    /// Pipeline for model audio at the fixed 24 kHz output rate
    pub fn new(output: O) -> Self {
        Self {
            scheduler: PlaybackScheduler::new(),
            output,
        }
    }

    /// Decode `packet` as 24 kHz mono PCM and schedule it
    ///
    /// The output plays at 24 kHz; a different rate in the mime tag is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPcm`] if the packet cannot be decoded; the
    /// scheduler is untouched in that case
    pub fn play(&mut self, packet: &PcmPacket) -> Result<ScheduledSource> {
        if let Some(rate) = packet.sample_rate().filter(|&r| r != OUTPUT_SAMPLE_RATE) {
            tracing::debug!(rate, "ignoring packet rate tag, decoding at output rate");
        }
        let buffer = pcm::decode(packet, OUTPUT_SAMPLE_RATE, 1)?;
        let now = self.output.now();
        Ok(self.scheduler.schedule(&mut self.output, buffer, now))
    }

    /// Apply a server message: audio first, then text, then interruption
    pub fn apply(&mut self, msg: &ServerMessage) -> MessageOutcome {
        let mut outcome = MessageOutcome::default();

        if let Some(packet) = msg.audio() {
            match self.play(packet) {
                Ok(source) => outcome.scheduled = Some(source),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping undecodable model audio");
                    outcome.decode_error = Some(e);
                }
            }
        }

        outcome.text = msg.text();

        if msg.is_interrupted() {
            outcome.stopped = Some(self.interrupt());
        }

        outcome
    }

    /// Stop all playback and reset the cursor
    pub fn interrupt(&mut self) -> usize {
        self.scheduler.interrupt(&mut self.output)
    }

    /// Forward a natural completion from the output
    pub fn on_ended(&mut self, id: SourceId) -> bool {
        self.scheduler.on_ended(id)
    }

    #[must_use]
    pub const fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    #[must_use]
    pub const fn output(&self) -> &O {
        &self.output
    }

    pub const fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }
}
