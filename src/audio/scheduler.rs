//! Gapless playback scheduling with immediate interruption
//!
//! Decoded buffers are laid end to end on the output clock. The cursor
//! marks where the next buffer starts; it is pulled forward to "now" when
//! playback has fallen idle, and reset to zero on interruption.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::pcm::AudioBuffer;

/// Identifier of a scheduled source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(u64);

impl SourceId {
    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src-{}", self.0)
    }
}

/// Time source of the audio output, in seconds
pub trait OutputClock {
    /// Current output time; never decreases
    fn now(&self) -> f64;
}

/// Audio output able to start buffers at a future time and stop them early
///
/// Natural completion is reported back out of band; the owner feeds those
/// ids into [`PlaybackScheduler::on_ended`].
pub trait PlaybackOutput {
    /// Begin playing `buffer` at output time `at`
    fn start(&mut self, id: SourceId, buffer: Arc<AudioBuffer>, at: f64);

    /// Stop `id` immediately
    fn stop(&mut self, id: SourceId);
}

/// A buffer placed on the output timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSource {
    /// Source identifier
    pub id: SourceId,
    /// Start time on the output clock
    pub start: f64,
    /// Duration in seconds
    pub duration: f64,
}

impl ScheduledSource {
    /// Time the source finishes
    #[must_use]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Playback cursor plus the set of active sources
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    cursor: f64,
    active: BTreeMap<SourceId, ScheduledSource>,
    next_id: u64,
}

impl PlaybackScheduler {
    /// Create an idle scheduler with the cursor at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `buffer` right after everything already queued
    ///
    /// If the cursor lags behind `now` the buffer starts at `now` instead.
    pub fn schedule<O: PlaybackOutput + ?Sized>(
        &mut self,
        output: &mut O,
        buffer: AudioBuffer,
        now: f64,
    ) -> ScheduledSource {
        self.cursor = self.cursor.max(now);

        let id = SourceId(self.next_id);
        self.next_id += 1;

        let source = ScheduledSource {
            id,
            start: self.cursor,
            duration: buffer.duration(),
        };

        output.start(id, Arc::new(buffer), source.start);
        self.cursor += source.duration;
        self.active.insert(id, source);

        tracing::trace!(
            %id,
            start = source.start,
            duration = source.duration,
            cursor = self.cursor,
            "scheduled source"
        );

        source
    }

    /// Record that `id` finished playing on its own
    ///
    /// Returns `false` if the source was already gone.
    pub fn on_ended(&mut self, id: SourceId) -> bool {
        let removed = self.active.remove(&id).is_some();
        if removed {
            tracing::trace!(%id, remaining = self.active.len(), "source ended");
        }
        removed
    }

    /// Stop every active source and reset the cursor to zero
    ///
    /// Returns the number of sources stopped.
    pub fn interrupt<O: PlaybackOutput + ?Sized>(&mut self, output: &mut O) -> usize {
        let stopped = std::mem::take(&mut self.active);
        for id in stopped.keys() {
            output.stop(*id);
        }
        self.cursor = 0.0;

        tracing::debug!(stopped = stopped.len(), "playback interrupted");
        stopped.len()
    }

    /// Next free start time
    #[must_use]
    pub const fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Number of scheduled or playing sources
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Whether `id` is still scheduled or playing
    #[must_use]
    pub fn is_active(&self, id: SourceId) -> bool {
        self.active.contains_key(&id)
    }
}
