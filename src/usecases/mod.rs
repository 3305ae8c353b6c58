//! Application use cases. Orchestrate domain logic via ports.

pub mod exercise_controller;
pub mod exercise_repository;
pub mod playback_monitor;
pub mod reminder_service;

pub use exercise_controller::ExerciseController;
pub use exercise_repository::ExerciseRepository;
pub use playback_monitor::{PlaybackMonitor, PlaybackOutcome};
pub use reminder_service::ReminderService;
