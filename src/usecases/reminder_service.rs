//! Daily reminder: one alarm per day at a fixed local wall-clock time.
//!
//! Sleeps until the next slot, notifies, reschedules. Uses tokio::time::sleep; never blocks.
//! The storage day boundary does not apply here; the reminder always follows local time.

use crate::domain::{DayBoundary, DomainError};
use crate::ports::{Clock, NotifierPort};
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

pub const REMINDER_TITLE: &str = "Time for your exercises";
pub const REMINDER_BODY: &str = "Your daily rehabilitation exercises are waiting.";

pub struct ReminderService {
    notifier: Arc<dyn NotifierPort>,
    clock: Arc<dyn Clock>,
    at: NaiveTime,
}

impl ReminderService {
    pub fn new(notifier: Arc<dyn NotifierPort>, clock: Arc<dyn Clock>, at: NaiveTime) -> Self {
        Self {
            notifier,
            clock,
            at,
        }
    }

    /// Next reminder in local time: today if the slot is still ahead, else tomorrow.
    pub fn next_fire(&self) -> DateTime<Utc> {
        DayBoundary::Local.next_occurrence(self.clock.now(), self.at)
    }

    /// Deliver one reminder. A refused permission is logged and swallowed.
    pub async fn fire(&self) -> Result<(), DomainError> {
        match self.notifier.notify(REMINDER_TITLE, REMINDER_BODY).await {
            Ok(()) => {
                info!("daily reminder delivered");
                Ok(())
            }
            Err(DomainError::Permission(reason)) => {
                warn!(reason = %reason, "daily reminder not delivered: permission denied");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Run until a delivery fails for a reason other than permissions.
    pub async fn run_loop(&self) -> Result<(), DomainError> {
        loop {
            let next = self.next_fire();
            let wait = (next - self.clock.now()).to_std().unwrap_or_default();
            info!(next = %next, wait_secs = wait.as_secs(), "reminder scheduled");
            tokio::time::sleep(wait).await;
            self.fire().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::FixedClock;
    use crate::adapters::notifications::LogNotifier;
    use chrono::{Duration, Local, TimeZone};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl NotifierPort for RecordingNotifier {
        async fn notify(&self, title: &str, _body: &str) -> Result<(), DomainError> {
            self.sent.lock().unwrap().push(title.to_string());
            Ok(())
        }
    }

    struct BrokenNotifier;

    #[async_trait::async_trait]
    impl NotifierPort for BrokenNotifier {
        async fn notify(&self, _title: &str, _body: &str) -> Result<(), DomainError> {
            Err(DomainError::Notification("channel missing".into()))
        }
    }

    fn eight() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    }

    fn clock_at(now: DateTime<Utc>) -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(now))
    }

    fn service(now: DateTime<Utc>) -> ReminderService {
        ReminderService::new(Arc::new(RecordingNotifier::default()), clock_at(now), eight())
    }

    #[test]
    fn test_next_fire_rolls_to_tomorrow() {
        let today = Local::now().date_naive();
        let local = |h: u32| DayBoundary::Local.at(today, NaiveTime::from_hms_opt(h, 0, 0).unwrap());

        assert_eq!(service(local(7)).next_fire(), local(8));

        let tomorrow = today.succ_opt().unwrap();
        assert_eq!(
            service(local(9)).next_fire(),
            DayBoundary::Local.at(tomorrow, eight())
        );
    }

    #[test]
    fn test_next_fire_is_local_eight_whatever_the_utc_hour() {
        // Instants spread over a whole UTC day; each must land on a local 08:00.
        let start = Utc.with_ymd_and_hms(2026, 10, 16, 2, 0, 0).single().unwrap();
        for h in 0..24 {
            let now = start + Duration::hours(h);
            let next = service(now).next_fire();
            assert!(next > now);
            assert!(next - now <= Duration::hours(25));
            assert_eq!(next.with_timezone(&Local).time(), eight());
        }
    }

    #[tokio::test]
    async fn test_fire_delivers() {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = ReminderService::new(
            Arc::clone(&notifier) as Arc<dyn NotifierPort>,
            clock_at(Utc::now()),
            eight(),
        );
        service.fire().await.unwrap();
        assert_eq!(notifier.sent.lock().unwrap().as_slice(), [REMINDER_TITLE]);
    }

    #[tokio::test]
    async fn test_permission_denied_is_swallowed() {
        let service = ReminderService::new(
            Arc::new(LogNotifier::new(false)),
            clock_at(Utc::now()),
            eight(),
        );
        assert!(service.fire().await.is_ok());
    }

    #[tokio::test]
    async fn test_other_failures_propagate() {
        let service = ReminderService::new(Arc::new(BrokenNotifier), clock_at(Utc::now()), eight());
        assert!(matches!(
            service.fire().await,
            Err(DomainError::Notification(_))
        ));
    }
}
