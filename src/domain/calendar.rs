//! Calendar-day helpers. One timezone policy drives both the daily reset and streak bucketing.

use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use serde::Deserialize;
use std::str::FromStr;

/// Where a calendar day starts and ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayBoundary {
    /// Midnight in the process's local timezone.
    #[default]
    Local,
    /// Midnight UTC. Stable across device timezone changes.
    Utc,
}

impl FromStr for DayBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(DayBoundary::Local),
            "utc" => Ok(DayBoundary::Utc),
            other => Err(format!("unknown day boundary '{other}' (expected local or utc)")),
        }
    }
}

impl DayBoundary {
    /// Calendar date that `instant` falls on.
    pub fn date_of(self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            DayBoundary::Local => instant.with_timezone(&Local).date_naive(),
            DayBoundary::Utc => instant.date_naive(),
        }
    }

    /// First instant of the calendar day containing `now`.
    pub fn start_of_day(self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.at(self.date_of(now), NaiveTime::MIN)
    }

    /// `date` at wall-clock `time` under this policy, as a UTC instant.
    pub fn at(self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let naive = date.and_time(time);
        match self {
            DayBoundary::Utc => naive.and_utc(),
            DayBoundary::Local => resolve_local(naive),
        }
    }

    /// Next instant strictly after `now` whose wall-clock time is `time`.
    /// Today if the slot is still ahead, otherwise tomorrow.
    pub fn next_occurrence(self, now: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
        let today = self.date_of(now);
        let candidate = self.at(today, time);
        if candidate > now {
            return candidate;
        }
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        self.at(tomorrow, time)
    }
}

/// Local wall-clock time to UTC. A time skipped by a DST jump falls back to the
/// offset in effect just before the gap.
fn resolve_local(naive: NaiveDateTime) -> DateTime<Utc> {
    match naive.and_local_timezone(Local).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        None => {
            let offset = Local.offset_from_utc_datetime(&naive).fix();
            (naive - chrono::Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).single().unwrap()
    }

    #[test]
    fn test_utc_start_of_day() {
        let now = utc(2026, 3, 14, 17, 45, 12);
        assert_eq!(DayBoundary::Utc.start_of_day(now), utc(2026, 3, 14, 0, 0, 0));
    }

    #[test]
    fn test_local_start_of_day_is_local_midnight() {
        let now = Utc::now();
        let start = DayBoundary::Local.start_of_day(now);
        let local = start.with_timezone(&Local);
        assert_eq!(local.time(), NaiveTime::MIN);
        assert_eq!(local.date_naive(), now.with_timezone(&Local).date_naive());
        assert!(start <= now);
    }

    #[test]
    fn test_next_occurrence_today_or_tomorrow() {
        let eight = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let early = utc(2026, 5, 1, 6, 0, 0);
        assert_eq!(
            DayBoundary::Utc.next_occurrence(early, eight),
            utc(2026, 5, 1, 8, 0, 0)
        );
        let exactly = utc(2026, 5, 1, 8, 0, 0);
        assert_eq!(
            DayBoundary::Utc.next_occurrence(exactly, eight),
            utc(2026, 5, 2, 8, 0, 0)
        );
        let late = utc(2026, 5, 31, 21, 30, 0);
        assert_eq!(
            DayBoundary::Utc.next_occurrence(late, eight),
            utc(2026, 6, 1, 8, 0, 0)
        );
    }

    #[test]
    fn test_parse_day_boundary() {
        assert_eq!("local".parse::<DayBoundary>().unwrap(), DayBoundary::Local);
        assert_eq!(" UTC ".parse::<DayBoundary>().unwrap(), DayBoundary::Utc);
        assert!("gmt".parse::<DayBoundary>().is_err());
    }
}
