//! Exercise repository: composes the store's query surface into domain operations.
//!
//! - Logs a DailyProgress entry on each Incomplete -> Completed transition (read-before-write)
//! - Clears yesterday's completions on a new calendar day
//! - Exposes change feeds: restartable streams of full snapshots

use crate::domain::{
    CompletionState, DailyProgress, DayBoundary, DomainError, Exercise, ExerciseFilter,
};
use crate::ports::{Clock, ExerciseStore, StoreChange};
use chrono::{DateTime, Duration, Utc};
use futures::stream::BoxStream;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

/// Streak statistics look back this many days from now.
pub const STREAK_LOOKBACK_DAYS: i64 = 30;

/// Default retention window for the progress log.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Live list of exercises. First item is the current snapshot.
pub type ExerciseFeed = BoxStream<'static, Result<Vec<Exercise>, DomainError>>;

/// Live list of progress entries. First item is the current snapshot.
pub type ProgressFeed = BoxStream<'static, Result<Vec<DailyProgress>, DomainError>>;

pub struct ExerciseRepository {
    store: Arc<dyn ExerciseStore>,
    clock: Arc<dyn Clock>,
    day_boundary: DayBoundary,
}

impl ExerciseRepository {
    pub fn new(store: Arc<dyn ExerciseStore>, clock: Arc<dyn Clock>, day_boundary: DayBoundary) -> Self {
        Self {
            store,
            clock,
            day_boundary,
        }
    }

    pub fn day_boundary(&self) -> DayBoundary {
        self.day_boundary
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Exercises
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn list_exercises(&self, filter: ExerciseFilter) -> Result<Vec<Exercise>, DomainError> {
        self.store.list_exercises(filter).await
    }

    /// Change feed over `list_exercises(filter)`. Dropping the stream unsubscribes.
    pub fn watch_exercises(&self, filter: ExerciseFilter) -> ExerciseFeed {
        change_feed(
            Arc::clone(&self.store),
            StoreChange::Exercises,
            move |store| async move { store.list_exercises(filter).await },
        )
    }

    pub async fn get_exercise(&self, id: i64) -> Result<Option<Exercise>, DomainError> {
        self.store.get_exercise(id).await
    }

    pub async fn insert_exercise(&self, exercise: &Exercise) -> Result<i64, DomainError> {
        self.store.insert_exercise(exercise).await
    }

    pub async fn insert_exercises(&self, exercises: &[Exercise]) -> Result<Vec<i64>, DomainError> {
        self.store.insert_exercises(exercises).await
    }

    /// Replace the stored record. When this moves the exercise from incomplete to
    /// completed, one progress entry is appended with the exercise's configured
    /// sets/repetitions. Repeating an update that is already completed appends nothing.
    pub async fn update_exercise(&self, exercise: &Exercise) -> Result<(), DomainError> {
        let previous = self
            .store
            .get_exercise(exercise.id)
            .await?
            .ok_or(DomainError::ExerciseNotFound(exercise.id))?;
        self.store.update_exercise(exercise).await?;

        if previous.state() == CompletionState::Incomplete
            && exercise.state() == CompletionState::Completed
        {
            let progress = DailyProgress::for_exercise(exercise, self.clock.now());
            self.store.insert_progress(&progress).await?;
            info!(
                exercise_id = exercise.id,
                completion_count = exercise.completion_count,
                "exercise completed"
            );
        }
        Ok(())
    }

    pub async fn delete_exercise(&self, exercise: &Exercise) -> Result<bool, DomainError> {
        self.store.delete_exercise(exercise).await
    }

    /// Unconditionally clear every completed flag.
    pub async fn reset_all_completions(&self) -> Result<u64, DomainError> {
        self.store.reset_all_completions().await
    }

    pub async fn count_exercises(&self) -> Result<u64, DomainError> {
        self.store.count_exercises().await
    }

    pub async fn count_completed(&self) -> Result<u64, DomainError> {
        self.store.count_completed().await
    }

    /// Clear the completed flag of every exercise last completed before today.
    /// Exercises completed today stay completed. Returns how many were reset.
    pub async fn reset_daily_progress(&self) -> Result<usize, DomainError> {
        let today_start = self.day_boundary.start_of_day(self.clock.now());
        let completed = self.store.list_exercises(ExerciseFilter::Completed).await?;

        let mut reset = 0usize;
        for exercise in completed
            .iter()
            .filter(|e| e.last_completed_at.is_some_and(|t| t < today_start))
        {
            match self.update_exercise(&exercise.cleared()).await {
                Ok(()) => reset += 1,
                // Deleted between the read and the write; nothing to reset.
                Err(DomainError::ExerciseNotFound(id)) => debug!(id, "exercise vanished during reset"),
                Err(e) => return Err(e),
            }
        }

        info!(reset, today_start = %today_start, "daily progress reset");
        Ok(reset)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Progress log
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn list_progress_for_exercise(
        &self,
        exercise_id: i64,
    ) -> Result<Vec<DailyProgress>, DomainError> {
        self.store.list_progress_for_exercise(exercise_id).await
    }

    /// Change feed over `list_progress_for_exercise`, newest first.
    pub fn watch_progress_for_exercise(&self, exercise_id: i64) -> ProgressFeed {
        change_feed(
            Arc::clone(&self.store),
            StoreChange::Progress,
            move |store| async move { store.list_progress_for_exercise(exercise_id).await },
        )
    }

    pub async fn list_progress_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailyProgress>, DomainError> {
        self.store.list_progress_between(start, end).await
    }

    pub fn watch_progress_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> ProgressFeed {
        change_feed(
            Arc::clone(&self.store),
            StoreChange::Progress,
            move |store| async move { store.list_progress_between(start, end).await },
        )
    }

    /// Retention sweep: drop progress older than `retention_days` before now.
    pub async fn delete_old_progress(&self, retention_days: u32) -> Result<u64, DomainError> {
        let cutoff = self.clock.now() - Duration::days(i64::from(retention_days));
        let removed = self.store.delete_progress_before(cutoff).await?;
        info!(retention_days, removed, "retention sweep done");
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statistics
    // ─────────────────────────────────────────────────────────────────────────

    /// Days with at least one completion in the last 30 days.
    pub async fn streak_days(&self) -> Result<u32, DomainError> {
        let since = self.clock.now() - Duration::days(STREAK_LOOKBACK_DAYS);
        self.store.streak_days(since, self.day_boundary).await
    }

    pub async fn average_completion_rate(&self) -> Result<f64, DomainError> {
        self.store.average_completion_rate().await
    }

    /// `completed * 100 / total`, rounded down. 0 for an empty catalog.
    pub async fn completion_percentage(&self) -> Result<u32, DomainError> {
        let total = self.store.count_exercises().await?;
        if total == 0 {
            return Ok(0);
        }
        let completed = self.store.count_completed().await?;
        Ok((completed * 100 / total) as u32)
    }
}

/// Stream that yields `query` now and again after every change to `table`.
/// Subscribes before the first query so no write slips between the two.
fn change_feed<T, F, Fut>(
    store: Arc<dyn ExerciseStore>,
    table: StoreChange,
    query: F,
) -> BoxStream<'static, Result<T, DomainError>>
where
    T: Send + 'static,
    F: Fn(Arc<dyn ExerciseStore>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, DomainError>> + Send,
{
    let mut changes = store.subscribe_changes();
    Box::pin(async_stream::stream! {
        'feed: loop {
            yield query(Arc::clone(&store)).await;
            loop {
                match changes.recv().await {
                    Ok(change) if change == table => break,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "change feed lagged; re-querying");
                        break;
                    }
                    Err(RecvError::Closed) => break 'feed,
                }
            }
        }
    })
}
