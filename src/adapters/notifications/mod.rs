//! Notification adapters. Implement NotifierPort.

pub mod log_notifier;

pub use log_notifier::LogNotifier;
