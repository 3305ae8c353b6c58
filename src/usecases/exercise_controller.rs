//! View-state controller. Bridges UI intents to the repository and keeps one
//! observable snapshot of the exercise list.
//!
//! The snapshot mirrors the repository's change feed in a background task; the
//! task is cancelled on `shutdown` or drop, so it never outlives the controller.

use crate::domain::{DifficultyLevel, DomainError, Exercise, ExerciseCategory, ExerciseFilter};
use crate::usecases::exercise_repository::ExerciseRepository;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Number of sample exercises created on first run.
pub const SAMPLE_EXERCISE_COUNT: i32 = 13;

/// First-run catalog: "Exercise 1".."Exercise 13", one per bundled video.
pub fn sample_exercises() -> Vec<Exercise> {
    (1..=SAMPLE_EXERCISE_COUNT)
        .map(|i| Exercise {
            description: "Rehabilitation exercise".into(),
            instructions: "Perform slowly and smoothly, following the video".into(),
            thumbnail_file_name: Some(format!("thumb_exercise_{i}")),
            order_index: i,
            ..Exercise::new(
                format!("Exercise {i}"),
                format!("exercise_{i}"),
                ExerciseCategory::KneeRehabilitation,
                DifficultyLevel::Easy,
            )
        })
        .collect()
}

pub struct ExerciseController {
    repo: Arc<ExerciseRepository>,
    snapshot: watch::Receiver<Vec<Exercise>>,
    mirror: Option<JoinHandle<()>>,
}

impl ExerciseController {
    /// Subscribe to the full exercise list and seed the sample catalog when the
    /// store is empty.
    pub async fn start(repo: Arc<ExerciseRepository>) -> Result<Self, DomainError> {
        let (tx, rx) = watch::channel(Vec::new());
        let mut feed = repo.watch_exercises(ExerciseFilter::All);
        let mirror = tokio::spawn(async move {
            while let Some(item) = feed.next().await {
                match item {
                    // Latest emission replaces the snapshot wholesale.
                    Ok(list) => {
                        tx.send_replace(list);
                    }
                    Err(e) => warn!(error = %e, "exercise feed query failed"),
                }
            }
            debug!("exercise feed closed");
        });

        let controller = Self {
            repo,
            snapshot: rx,
            mirror: Some(mirror),
        };
        controller.seed_if_empty().await?;
        Ok(controller)
    }

    async fn seed_if_empty(&self) -> Result<(), DomainError> {
        if self.repo.count_exercises().await? > 0 {
            return Ok(());
        }
        let ids = self.repo.insert_exercises(&sample_exercises()).await?;
        info!(count = ids.len(), "seeded sample exercises");
        Ok(())
    }

    pub fn repository(&self) -> &Arc<ExerciseRepository> {
        &self.repo
    }

    /// Observable snapshot for rendering.
    pub fn exercises(&self) -> watch::Receiver<Vec<Exercise>> {
        self.snapshot.clone()
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Vec<Exercise> {
        self.snapshot.borrow().clone()
    }

    /// Flip completion. Turning it on stamps now and bumps the counter; turning it
    /// off leaves both alone. Returns the record as written.
    pub async fn toggle_exercise_completion(
        &self,
        exercise: &Exercise,
    ) -> Result<Exercise, DomainError> {
        let updated = exercise.toggled(self.repo.now());
        self.repo.update_exercise(&updated).await?;
        Ok(updated)
    }

    /// Complete the exercise unless it already is (e.g. video watched to the end).
    pub async fn mark_exercise_completed(
        &self,
        exercise: &Exercise,
    ) -> Result<Option<Exercise>, DomainError> {
        let Some(updated) = exercise.completed_at(self.repo.now()) else {
            return Ok(None);
        };
        self.repo.update_exercise(&updated).await?;
        Ok(Some(updated))
    }

    /// Clear every exercise the snapshot shows as completed, whatever day it was done.
    pub async fn start_new_day(&self) -> Result<usize, DomainError> {
        let completed: Vec<Exercise> = self
            .snapshot
            .borrow()
            .iter()
            .filter(|e| e.completed)
            .cloned()
            .collect();
        for exercise in &completed {
            self.repo.update_exercise(&exercise.cleared()).await?;
        }
        info!(cleared = completed.len(), "started new day");
        Ok(completed.len())
    }

    /// Age-based reset: clears completions from before today.
    pub async fn reset_daily_progress(&self) -> Result<usize, DomainError> {
        self.repo.reset_daily_progress().await
    }

    pub async fn add_exercise(&self, exercise: &Exercise) -> Result<i64, DomainError> {
        self.repo.insert_exercise(exercise).await
    }

    pub async fn update_exercise(&self, exercise: &Exercise) -> Result<(), DomainError> {
        self.repo.update_exercise(exercise).await
    }

    pub async fn delete_exercise(&self, exercise: &Exercise) -> Result<bool, DomainError> {
        self.repo.delete_exercise(exercise).await
    }

    pub async fn completion_percentage(&self) -> Result<u32, DomainError> {
        self.repo.completion_percentage().await
    }

    pub async fn streak_days(&self) -> Result<u32, DomainError> {
        self.repo.streak_days().await
    }

    pub async fn average_completion_rate(&self) -> Result<f64, DomainError> {
        self.repo.average_completion_rate().await
    }

    pub async fn delete_old_progress(&self, retention_days: u32) -> Result<u64, DomainError> {
        self.repo.delete_old_progress(retention_days).await
    }

    /// Stop mirroring and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.mirror.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for ExerciseController {
    fn drop(&mut self) {
        if let Some(handle) = self.mirror.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::FixedClock;
    use crate::adapters::persistence::SqliteStore;
    use crate::domain::DayBoundary;
    use crate::ports::{Clock, ExerciseStore};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::TempDir;

    const WAIT: std::time::Duration = std::time::Duration::from_secs(5);

    async fn repository(dir: &TempDir, clock: Arc<FixedClock>) -> Arc<ExerciseRepository> {
        let store = SqliteStore::connect(dir.path()).await.unwrap();
        Arc::new(ExerciseRepository::new(
            Arc::new(store) as Arc<dyn ExerciseStore>,
            clock as Arc<dyn Clock>,
            DayBoundary::Utc,
        ))
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).single().unwrap()
    }

    async fn wait_for(
        rx: &mut watch::Receiver<Vec<Exercise>>,
        pred: impl FnMut(&Vec<Exercise>) -> bool,
    ) -> Vec<Exercise> {
        tokio::time::timeout(WAIT, rx.wait_for(pred))
            .await
            .unwrap()
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn test_seeds_thirteen_exercises_once() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::new(noon()));
        let controller = ExerciseController::start(repository(&dir, Arc::clone(&clock)).await)
            .await
            .unwrap();

        let mut rx = controller.exercises();
        let list = wait_for(&mut rx, |l| l.len() == 13).await;
        for (i, e) in list.iter().enumerate() {
            let n = i as i32 + 1;
            assert_eq!(e.order_index, n);
            assert_eq!(e.title, format!("Exercise {n}"));
            assert_eq!(e.video_file_name, format!("exercise_{n}"));
            assert_eq!(e.category, ExerciseCategory::KneeRehabilitation);
            assert_eq!(e.difficulty, DifficultyLevel::Easy);
            assert_eq!((e.duration_seconds, e.repetitions, e.sets), (30, 10, 3));
            assert!(!e.completed);
        }
        controller.shutdown().await;

        // Second start against a populated store adds nothing.
        let controller = ExerciseController::start(repository(&dir, clock).await)
            .await
            .unwrap();
        assert_eq!(controller.repository().count_exercises().await.unwrap(), 13);
    }

    #[tokio::test]
    async fn test_existing_data_is_not_seeded() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::new(noon()));
        let repo = repository(&dir, clock).await;
        repo.insert_exercise(&sample_exercises()[0]).await.unwrap();

        let controller = ExerciseController::start(repo).await.unwrap();
        assert_eq!(controller.repository().count_exercises().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_toggle_on_then_off() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::new(noon()));
        let controller = ExerciseController::start(repository(&dir, Arc::clone(&clock)).await)
            .await
            .unwrap();
        let mut rx = controller.exercises();
        let first = wait_for(&mut rx, |l| l.len() == 13).await[0].clone();

        let on = controller.toggle_exercise_completion(&first).await.unwrap();
        assert!(on.completed);
        assert_eq!(on.completion_count, 1);
        assert_eq!(on.last_completed_at, Some(noon()));

        clock.advance(Duration::minutes(10));
        let off = controller.toggle_exercise_completion(&on).await.unwrap();
        assert!(!off.completed);
        assert_eq!(off.completion_count, 1);
        assert_eq!(off.last_completed_at, Some(noon()));

        let stored = controller
            .repository()
            .get_exercise(first.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, off);
        let log = controller
            .repository()
            .list_progress_for_exercise(first.id)
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_completed_is_noop_when_done() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::new(noon()));
        let controller = ExerciseController::start(repository(&dir, clock).await)
            .await
            .unwrap();
        let mut rx = controller.exercises();
        let first = wait_for(&mut rx, |l| l.len() == 13).await[0].clone();

        let done = controller
            .mark_exercise_completed(&first)
            .await
            .unwrap()
            .unwrap();
        assert!(controller.mark_exercise_completed(&done).await.unwrap().is_none());
        assert_eq!(controller.repository().count_completed().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_start_new_day_clears_snapshot_completions() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::new(noon()));
        let controller = ExerciseController::start(repository(&dir, clock).await)
            .await
            .unwrap();
        let mut rx = controller.exercises();
        let list = wait_for(&mut rx, |l| l.len() == 13).await;

        controller.toggle_exercise_completion(&list[0]).await.unwrap();
        controller.toggle_exercise_completion(&list[5]).await.unwrap();
        wait_for(&mut rx, |l| l.iter().filter(|e| e.completed).count() == 2).await;

        assert_eq!(controller.start_new_day().await.unwrap(), 2);
        let after = wait_for(&mut rx, |l| l.iter().all(|e| !e.completed)).await;
        assert_eq!(after[0].completion_count, 1);
        assert_eq!(after[5].completion_count, 1);
        assert!(after[0].last_completed_at.is_some());
        assert_eq!(controller.completion_percentage().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_and_delete_reflected_in_snapshot() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::new(noon()));
        let controller = ExerciseController::start(repository(&dir, clock).await)
            .await
            .unwrap();
        let mut rx = controller.exercises();
        wait_for(&mut rx, |l| l.len() == 13).await;

        let mut extra = Exercise::new(
            "Side plank",
            "placeholder",
            ExerciseCategory::Strength,
            DifficultyLevel::Hard,
        );
        extra.order_index = 999;
        extra.id = controller.add_exercise(&extra).await.unwrap();
        let list = wait_for(&mut rx, |l| l.len() == 14).await;
        assert_eq!(list.last().unwrap().title, "Side plank");

        assert!(controller.delete_exercise(&extra).await.unwrap());
        wait_for(&mut rx, |l| l.len() == 13).await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_mirroring() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::new(noon()));
        let controller = ExerciseController::start(repository(&dir, clock).await)
            .await
            .unwrap();
        let mut rx = controller.exercises();
        wait_for(&mut rx, |l| l.len() == 13).await;
        rx.borrow_and_update();

        controller.shutdown().await;
        assert!(rx.changed().await.is_err());
    }
}
