//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{DailyProgress, DayBoundary, DomainError, Exercise, ExerciseFilter, PlaybackSample};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Which table a committed write touched. Sent on the store's change channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Exercises,
    Progress,
}

/// Query surface over the local store. Fixed set of reads/writes on the
/// `exercises` and `daily_progress` tables.
#[async_trait::async_trait]
pub trait ExerciseStore: Send + Sync {
    /// Exercises matching `filter`, ordered by `order_index` then insertion order.
    async fn list_exercises(&self, filter: ExerciseFilter) -> Result<Vec<Exercise>, DomainError>;

    /// Single exercise by id. `Ok(None)` when missing.
    async fn get_exercise(&self, id: i64) -> Result<Option<Exercise>, DomainError>;

    /// Upsert by id (last write wins). An unassigned id lets the store pick one.
    /// Returns the record's id.
    async fn insert_exercise(&self, exercise: &Exercise) -> Result<i64, DomainError>;

    /// Upsert many in one transaction: either every row lands or none does.
    async fn insert_exercises(&self, exercises: &[Exercise]) -> Result<Vec<i64>, DomainError>;

    /// Replace the full record. `ExerciseNotFound` when the id is not stored.
    async fn update_exercise(&self, exercise: &Exercise) -> Result<(), DomainError>;

    /// Remove by id. Returns false when nothing matched.
    async fn delete_exercise(&self, exercise: &Exercise) -> Result<bool, DomainError>;

    /// Clear the completed flag on every exercise. Returns rows touched.
    async fn reset_all_completions(&self) -> Result<u64, DomainError>;

    async fn count_exercises(&self) -> Result<u64, DomainError>;

    async fn count_completed(&self) -> Result<u64, DomainError>;

    /// Append a progress entry. Returns its id.
    async fn insert_progress(&self, progress: &DailyProgress) -> Result<i64, DomainError>;

    /// Progress for one exercise, newest first.
    async fn list_progress_for_exercise(
        &self,
        exercise_id: i64,
    ) -> Result<Vec<DailyProgress>, DomainError>;

    /// Progress with `start <= completed_at <= end`, oldest first.
    async fn list_progress_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailyProgress>, DomainError>;

    /// Delete progress strictly older than `cutoff`. Returns rows removed.
    async fn delete_progress_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;

    /// Distinct calendar days (per `boundary`) with progress at or after `since`.
    async fn streak_days(
        &self,
        since: DateTime<Utc>,
        boundary: DayBoundary,
    ) -> Result<u32, DomainError>;

    /// Mean lifetime completion count; 0.0 for an empty table.
    async fn average_completion_rate(&self) -> Result<f64, DomainError>;

    /// Notifications fired after each committed write.
    fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange>;
}

/// Source of "now". Injected so day boundaries can be tested.
pub trait Clock: Send + Sync {
    /// Current instant at millisecond precision (what the store can hold).
    fn now(&self) -> DateTime<Utc>;
}

/// Delivers the daily reminder.
#[async_trait::async_trait]
pub trait NotifierPort: Send + Sync {
    /// Show a notification. `DomainError::Permission` when the platform refuses.
    async fn notify(&self, title: &str, body: &str) -> Result<(), DomainError>;
}

/// Platform media player playing an exercise video. Decoding is its business.
#[async_trait::async_trait]
pub trait MediaPlayerPort: Send + Sync {
    /// Current position/duration. `None` once the player has been released.
    async fn sample(&self) -> Result<Option<PlaybackSample>, DomainError>;
}
