//! Implements NotifierPort by writing the reminder to the log.
//!
//! Terminal builds have no system tray; the reminder shows up in the tracing output.

use crate::domain::DomainError;
use crate::ports::NotifierPort;
use tracing::info;

pub struct LogNotifier {
    /// Reminders are suppressed (reported as a permission failure) when false.
    allowed: bool,
}

impl LogNotifier {
    pub fn new(allowed: bool) -> Self {
        Self { allowed }
    }
}

#[async_trait::async_trait]
impl NotifierPort for LogNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<(), DomainError> {
        if !self.allowed {
            return Err(DomainError::Permission("notifications disabled".into()));
        }
        info!(title, body, "reminder");
        Ok(())
    }
}
