//! Polls the media player while an exercise video plays and completes the
//! exercise once the clip has been watched to the end.

use crate::domain::playback::POLL_INTERVAL;
use crate::domain::{CompletionDetector, DomainError, Exercise, PlaybackEvent};
use crate::ports::MediaPlayerPort;
use crate::usecases::exercise_controller::ExerciseController;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

/// File the media collaborator should open for `exercise`.
pub fn video_path(media_dir: &Path, exercise: &Exercise) -> PathBuf {
    let path = media_dir.join(&exercise.video_file_name);
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(DEFAULT_VIDEO_EXTENSION)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    /// Watched to the end; the exercise moved to completed.
    Completed(Exercise),
    /// Watched to the end, but the exercise was already completed.
    AlreadyCompleted,
    /// Player released before the end.
    Stopped {
        watched: f64,
        can_mark_complete: bool,
    },
}

pub struct PlaybackMonitor {
    controller: Arc<ExerciseController>,
    interval: Duration,
}

impl PlaybackMonitor {
    pub fn new(controller: Arc<ExerciseController>) -> Self {
        Self::with_interval(controller, POLL_INTERVAL)
    }

    pub fn with_interval(controller: Arc<ExerciseController>, interval: Duration) -> Self {
        Self {
            controller,
            interval,
        }
    }

    /// Sample `player` until the clip completes or the player is released.
    pub async fn watch(
        &self,
        player: &dyn MediaPlayerPort,
        exercise: &Exercise,
    ) -> Result<PlaybackOutcome, DomainError> {
        let mut detector = CompletionDetector::new();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(sample) = player.sample().await? else {
                debug!(exercise_id = exercise.id, watched = detector.progress(), "player released");
                return Ok(PlaybackOutcome::Stopped {
                    watched: detector.progress(),
                    can_mark_complete: detector.can_mark_complete(),
                });
            };
            if detector.observe(sample) == PlaybackEvent::Completed {
                info!(exercise_id = exercise.id, "video watched to the end");
                return Ok(match self.controller.mark_exercise_completed(exercise).await? {
                    Some(updated) => PlaybackOutcome::Completed(updated),
                    None => PlaybackOutcome::AlreadyCompleted,
                });
            }
        }
    }

    /// Manual "mark complete" after playback stopped early. Only allowed once
    /// enough of the clip was watched; `None` when already completed.
    pub async fn mark_watched(
        &self,
        exercise: &Exercise,
        outcome: &PlaybackOutcome,
    ) -> Result<Option<Exercise>, DomainError> {
        match outcome {
            PlaybackOutcome::Stopped {
                can_mark_complete: true,
                ..
            } => self.controller.mark_exercise_completed(exercise).await,
            PlaybackOutcome::Stopped { watched, .. } => Err(DomainError::Playback(format!(
                "only {:.0}% of the video was watched",
                watched * 100.0
            ))),
            PlaybackOutcome::Completed(_) | PlaybackOutcome::AlreadyCompleted => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::FixedClock;
    use crate::adapters::media::SimulatedPlayer;
    use crate::adapters::persistence::SqliteStore;
    use crate::domain::{DayBoundary, PlaybackSample};
    use crate::ports::{Clock, ExerciseStore};
    use crate::usecases::ExerciseRepository;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays fixed samples, then reports released.
    struct ScriptedPlayer {
        samples: Mutex<VecDeque<PlaybackSample>>,
    }

    impl ScriptedPlayer {
        fn new(positions: &[u64], duration_ms: u64) -> Self {
            Self {
                samples: Mutex::new(
                    positions
                        .iter()
                        .map(|&position_ms| PlaybackSample {
                            position_ms,
                            duration_ms,
                            playing: true,
                        })
                        .collect(),
                ),
            }
        }
    }

    #[async_trait::async_trait]
    impl MediaPlayerPort for ScriptedPlayer {
        async fn sample(&self) -> Result<Option<PlaybackSample>, DomainError> {
            Ok(self.samples.lock().unwrap().pop_front())
        }
    }

    async fn controller(dir: &TempDir) -> Arc<ExerciseController> {
        let store = SqliteStore::connect(dir.path()).await.unwrap();
        let repo = ExerciseRepository::new(
            Arc::new(store) as Arc<dyn ExerciseStore>,
            Arc::new(FixedClock::new(Utc::now())) as Arc<dyn Clock>,
            DayBoundary::Local,
        );
        Arc::new(ExerciseController::start(Arc::new(repo)).await.unwrap())
    }

    async fn first_exercise(controller: &ExerciseController) -> Exercise {
        controller
            .repository()
            .list_exercises(crate::domain::ExerciseFilter::All)
            .await
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_video_path_defaults_extension() {
        let mut e = Exercise::new(
            "Knee bend",
            "exercise_1",
            crate::domain::ExerciseCategory::KneeRehabilitation,
            crate::domain::DifficultyLevel::Easy,
        );
        assert_eq!(
            video_path(Path::new("media"), &e),
            PathBuf::from("media/exercise_1.mp4")
        );
        e.video_file_name = "knee.webm".into();
        assert_eq!(
            video_path(Path::new("media"), &e),
            PathBuf::from("media/knee.webm")
        );
    }

    #[tokio::test]
    async fn test_watching_to_end_completes_exercise() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir).await;
        let exercise = first_exercise(&controller).await;
        let monitor = PlaybackMonitor::with_interval(Arc::clone(&controller), Duration::from_millis(1));

        let player = ScriptedPlayer::new(&[0, 10_000, 25_000, 29_600, 30_000], 30_000);
        let updated = match monitor.watch(&player, &exercise).await.unwrap() {
            PlaybackOutcome::Completed(updated) => updated,
            other => panic!("expected completion, got {other:?}"),
        };
        assert!(updated.completed);
        assert_eq!(updated.completion_count, 1);
        // Detector stopped polling at the first sample past the threshold.
        assert_eq!(player.samples.lock().unwrap().len(), 1);

        let again = ScriptedPlayer::new(&[30_000], 30_000);
        assert_eq!(
            monitor.watch(&again, &updated).await.unwrap(),
            PlaybackOutcome::AlreadyCompleted
        );
        assert_eq!(controller.repository().count_completed().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stopping_early_leaves_exercise_open() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir).await;
        let exercise = first_exercise(&controller).await;
        let monitor = PlaybackMonitor::with_interval(Arc::clone(&controller), Duration::from_millis(1));

        let player = ScriptedPlayer::new(&[1_000, 25_000], 30_000);
        match monitor.watch(&player, &exercise).await.unwrap() {
            PlaybackOutcome::Stopped {
                watched,
                can_mark_complete,
            } => {
                assert!(watched > 0.8);
                assert!(can_mark_complete);
            }
            other => panic!("expected stop, got {other:?}"),
        }
        assert_eq!(controller.repository().count_completed().await.unwrap(), 0);

        let marked = monitor
            .mark_watched(&exercise, &outcome_after(0.85))
            .await
            .unwrap()
            .unwrap();
        assert!(marked.completed);
        assert_eq!(controller.repository().count_completed().await.unwrap(), 1);
    }

    fn outcome_after(watched: f64) -> PlaybackOutcome {
        PlaybackOutcome::Stopped {
            watched,
            can_mark_complete: watched > crate::domain::playback::MANUAL_COMPLETE_FRACTION,
        }
    }

    #[tokio::test]
    async fn test_mark_watched_refused_before_threshold() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir).await;
        let exercise = first_exercise(&controller).await;
        let monitor = PlaybackMonitor::new(Arc::clone(&controller));

        let err = monitor
            .mark_watched(&exercise, &outcome_after(0.4))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Playback(_)));
        assert_eq!(controller.repository().count_completed().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_released_player_stops_watch() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir).await;
        let exercise = first_exercise(&controller).await;
        let monitor = PlaybackMonitor::with_interval(Arc::clone(&controller), Duration::from_millis(5));

        let player = Arc::new(SimulatedPlayer::open("exercise_1", Duration::from_secs(60), 1.0));
        let stopper = {
            let player = Arc::clone(&player);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                player.release();
            })
        };

        let outcome = tokio::time::timeout(Duration::from_secs(5), monitor.watch(&*player, &exercise))
            .await
            .unwrap()
            .unwrap();
        stopper.await.unwrap();
        match outcome {
            PlaybackOutcome::Stopped {
                watched,
                can_mark_complete,
            } => {
                assert!(watched < 0.5);
                assert!(!can_mark_complete);
            }
            other => panic!("expected stop, got {other:?}"),
        }
        assert_eq!(controller.repository().count_completed().await.unwrap(), 0);
    }
}
