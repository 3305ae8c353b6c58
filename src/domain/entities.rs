//! Domain entities. Pure data structures for the core business.
//!
//! No storage types here. The SQLite adapter maps rows into these.

use crate::domain::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Id value for a record the store has not assigned an id to yet.
pub const UNASSIGNED_ID: i64 = 0;

/// One rehabilitation exercise with its instructional video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    /// Store-assigned. `UNASSIGNED_ID` until inserted.
    pub id: i64,
    pub title: String,
    pub description: String,
    pub instructions: String,
    /// Video file name resolved by the media collaborator.
    pub video_file_name: String,
    pub thumbnail_file_name: Option<String>,
    pub category: ExerciseCategory,
    pub difficulty: DifficultyLevel,
    pub duration_seconds: u32,
    pub repetitions: u32,
    pub sets: u32,
    pub completed: bool,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub completion_count: u32,
    pub favorite: bool,
    pub equipment_needed: Option<String>,
    pub precautions: Option<String>,
    pub order_index: i32,
}

impl Exercise {
    /// New, never-completed exercise with default targets (30 s, 10 reps, 3 sets).
    /// The id is assigned by the store on insert.
    pub fn new(
        title: impl Into<String>,
        video_file_name: impl Into<String>,
        category: ExerciseCategory,
        difficulty: DifficultyLevel,
    ) -> Self {
        Self {
            id: UNASSIGNED_ID,
            title: title.into(),
            description: String::new(),
            instructions: String::new(),
            video_file_name: video_file_name.into(),
            thumbnail_file_name: None,
            category,
            difficulty,
            duration_seconds: 30,
            repetitions: 10,
            sets: 3,
            completed: false,
            last_completed_at: None,
            completion_count: 0,
            favorite: false,
            equipment_needed: None,
            precautions: None,
            order_index: 0,
        }
    }

    pub fn state(&self) -> CompletionState {
        if self.completed {
            CompletionState::Completed
        } else {
            CompletionState::Incomplete
        }
    }

    /// Incomplete -> Completed: stamps `now` and bumps the lifetime counter.
    /// Returns `None` when already completed (no transition).
    pub fn completed_at(&self, now: DateTime<Utc>) -> Option<Exercise> {
        if self.completed {
            return None;
        }
        Some(Exercise {
            completed: true,
            last_completed_at: Some(now),
            completion_count: self.completion_count.saturating_add(1),
            ..self.clone()
        })
    }

    /// Completed -> Incomplete. Timestamp and counter are history and stay as they are.
    pub fn cleared(&self) -> Exercise {
        Exercise {
            completed: false,
            ..self.clone()
        }
    }

    /// Flip the completion flag (user toggle).
    pub fn toggled(&self, now: DateTime<Utc>) -> Exercise {
        self.completed_at(now).unwrap_or_else(|| self.cleared())
    }
}

/// Per-exercise completion state machine. Initial state is `Incomplete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    Incomplete,
    Completed,
}

/// Append-only log entry for one completion event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub id: i64,
    /// Logical reference to `Exercise::id` (not enforced by the store).
    pub exercise_id: i64,
    pub completed_at: DateTime<Utc>,
    pub sets_completed: u32,
    pub repetitions_completed: u32,
    pub notes: Option<String>,
}

impl DailyProgress {
    /// Progress entry for completing `exercise` at `now` with its configured targets.
    pub fn for_exercise(exercise: &Exercise, now: DateTime<Utc>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            exercise_id: exercise.id,
            completed_at: now,
            sets_completed: exercise.sets,
            repetitions_completed: exercise.repetitions,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseCategory {
    KneeRehabilitation,
    Strength,
    Flexibility,
    Balance,
    WarmUp,
    CoolDown,
}

impl ExerciseCategory {
    pub const ALL: [ExerciseCategory; 6] = [
        ExerciseCategory::KneeRehabilitation,
        ExerciseCategory::Strength,
        ExerciseCategory::Flexibility,
        ExerciseCategory::Balance,
        ExerciseCategory::WarmUp,
        ExerciseCategory::CoolDown,
    ];

    /// Stored name. Persisted as text, never as an ordinal.
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseCategory::KneeRehabilitation => "KNEE_REHABILITATION",
            ExerciseCategory::Strength => "STRENGTH",
            ExerciseCategory::Flexibility => "FLEXIBILITY",
            ExerciseCategory::Balance => "BALANCE",
            ExerciseCategory::WarmUp => "WARM_UP",
            ExerciseCategory::CoolDown => "COOL_DOWN",
        }
    }
}

impl FromStr for ExerciseCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExerciseCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::InvalidData(format!("unknown exercise category: {s}")))
    }
}

impl fmt::Display for ExerciseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DifficultyLevel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLevel {
    pub const ALL: [DifficultyLevel; 3] = [
        DifficultyLevel::Easy,
        DifficultyLevel::Medium,
        DifficultyLevel::Hard,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DifficultyLevel::Easy => "EASY",
            DifficultyLevel::Medium => "MEDIUM",
            DifficultyLevel::Hard => "HARD",
        }
    }
}

impl FromStr for DifficultyLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DifficultyLevel::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| DomainError::InvalidData(format!("unknown difficulty level: {s}")))
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which exercises a list query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseFilter {
    All,
    Category(ExerciseCategory),
    Completed,
    Favorite,
}
