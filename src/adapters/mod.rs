//! Infrastructure adapters. Implement outbound ports.
//!
//! SQLite storage, clocks, notifications, media playback, terminal UI. Map errors to DomainError.

pub mod clock;
pub mod media;
pub mod notifications;
pub mod persistence;
pub mod ui;
