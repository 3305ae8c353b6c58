//! Implements MediaPlayerPort without decoding anything: position follows the wall clock.
//!
//! Stands in for the platform player in the terminal front-end.

use crate::domain::{DomainError, PlaybackSample};
use crate::ports::MediaPlayerPort;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

pub struct SimulatedPlayer {
    source: PathBuf,
    duration: Duration,
    /// Playback rate; 1.0 is real time.
    speed: f64,
    started: Instant,
    released: AtomicBool,
}

impl SimulatedPlayer {
    pub fn open(source: impl AsRef<Path>, duration: Duration, speed: f64) -> Self {
        let source = source.as_ref().to_path_buf();
        debug!(source = %source.display(), duration_ms = duration.as_millis() as u64, "player opened");
        Self {
            source,
            duration,
            speed: if speed > 0.0 { speed } else { 1.0 },
            started: Instant::now(),
            released: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Stop and free the player. Later samples report `None`.
    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl MediaPlayerPort for SimulatedPlayer {
    async fn sample(&self) -> Result<Option<PlaybackSample>, DomainError> {
        if self.released.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let duration_ms = self.duration.as_millis() as u64;
        let elapsed_ms = (self.started.elapsed().as_millis() as f64 * self.speed) as u64;
        let position_ms = elapsed_ms.min(duration_ms);
        Ok(Some(PlaybackSample {
            position_ms,
            duration_ms,
            playing: position_ms < duration_ms,
        }))
    }
}
