//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod calendar;
pub mod entities;
pub mod errors;
pub mod playback;

pub use calendar::DayBoundary;
pub use entities::{
    CompletionState, DailyProgress, DifficultyLevel, Exercise, ExerciseCategory, ExerciseFilter,
    UNASSIGNED_ID,
};
pub use errors::DomainError;
pub use playback::{CompletionDetector, PlaybackEvent, PlaybackSample};
