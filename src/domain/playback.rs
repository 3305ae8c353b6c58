//! Video-watch completion detection. Fed by periodic player samples.

use std::time::Duration;

/// Completion fires once the position is within this much of the end.
pub const END_TOLERANCE_MS: u64 = 500;

/// Fraction of the clip after which the user may mark the exercise done by hand.
pub const MANUAL_COMPLETE_FRACTION: f64 = 0.8;

/// How often the player is sampled.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One observation of the media player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSample {
    pub position_ms: u64,
    pub duration_ms: u64,
    pub playing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Nothing changed.
    Progress,
    /// The clip was watched to the end. Reported once per detector.
    Completed,
}

/// Tracks one clip's playback and reports when it has been watched through.
#[derive(Debug, Default)]
pub struct CompletionDetector {
    completed: bool,
    last: Option<PlaybackSample>,
}

impl CompletionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, sample: PlaybackSample) -> PlaybackEvent {
        let sample = PlaybackSample {
            duration_ms: sample.duration_ms.max(1),
            ..sample
        };
        self.last = Some(sample);
        if self.completed {
            return PlaybackEvent::Progress;
        }
        let threshold = sample.duration_ms.saturating_sub(END_TOLERANCE_MS);
        if sample.position_ms > threshold {
            self.completed = true;
            return PlaybackEvent::Completed;
        }
        PlaybackEvent::Progress
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Manual "mark complete" becomes available once 80% of the clip was reached.
    pub fn can_mark_complete(&self) -> bool {
        self.completed
            || self.last.is_some_and(|s| {
                s.position_ms as f64 > s.duration_ms as f64 * MANUAL_COMPLETE_FRACTION
            })
    }

    /// Watched fraction in `[0.0, 1.0]`.
    pub fn progress(&self) -> f64 {
        self.last
            .map(|s| (s.position_ms as f64 / s.duration_ms as f64).clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }
}
