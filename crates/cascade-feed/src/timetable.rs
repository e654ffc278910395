//! Timetable focus check: while a scheduled class is in progress, the feed
//! switches to that class's subject.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// One recurring class slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
  pub subject: String,
  /// Weekday name, e.g. `"Monday"` or `"mon"`; case-insensitive.
  pub day:     String,
  #[serde(with = "hhmm")]
  pub start:   NaiveTime,
  #[serde(with = "hhmm")]
  pub end:     NaiveTime,
}

impl ScheduleEntry {
  pub fn weekday(&self) -> Option<Weekday> { self.day.trim().parse().ok() }

  /// Whether `now` falls inside this slot. Both bounds are inclusive at
  /// minute resolution.
  pub fn is_ongoing(&self, now: NaiveDateTime) -> bool {
    let Some(day) = self.weekday() else {
      return false;
    };
    let minute = now.time().with_second(0).and_then(|t| t.with_nanosecond(0));
    let Some(minute) = minute else {
      return false;
    };
    day == now.weekday() && self.start <= minute && minute <= self.end
  }
}

/// The first entry in progress at `now`, if any.
pub fn ongoing_class(
  schedule: &[ScheduleEntry],
  now: NaiveDateTime,
) -> Option<&ScheduleEntry> {
  schedule.iter().find(|e| e.is_ongoing(now))
}

/// Interrupts the feed at most once: after the first intervention the
/// learner has been redirected and further checks stay quiet.
#[derive(Debug, Clone, Default)]
pub struct FocusInterrupter {
  schedule:  Vec<ScheduleEntry>,
  dismissed: bool,
}

impl FocusInterrupter {
  pub fn new(schedule: Vec<ScheduleEntry>) -> Self {
    Self { schedule, dismissed: false }
  }

  pub fn is_dismissed(&self) -> bool { self.dismissed }

  /// Check the timetable; returns the subject to switch to on the first
  /// match.
  pub fn check(&mut self, now: NaiveDateTime) -> Option<String> {
    if self.dismissed {
      return None;
    }
    let entry = ongoing_class(&self.schedule, now)?;
    tracing::info!(subject = %entry.subject, day = %entry.day, "scheduled class in progress");
    self.dismissed = true;
    Some(entry.subject.clone())
  }
}

mod hhmm {
  use chrono::NaiveTime;
  use serde::{Deserialize, Deserializer, Serializer, de::Error};

  const FORMAT: &str = "%H:%M";

  pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&t.format(FORMAT))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
    let raw = String::deserialize(d)?;
    NaiveTime::parse_from_str(raw.trim(), FORMAT).map_err(D::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn entry(subject: &str, day: &str, start: &str, end: &str) -> ScheduleEntry {
    ScheduleEntry {
      subject: subject.into(),
      day:     day.into(),
      start:   NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
      end:     NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
    }
  }

  // 2026-10-19 is a Monday.
  fn monday_at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
      .unwrap()
      .and_hms_opt(h, m, s)
      .unwrap()
  }

  #[test]
  fn matches_day_case_insensitively_with_inclusive_bounds() {
    let schedule = vec![entry("physics", "MONDAY", "09:00", "10:30")];
    assert!(ongoing_class(&schedule, monday_at(9, 0, 0)).is_some());
    assert!(ongoing_class(&schedule, monday_at(10, 30, 59)).is_some());
    assert!(ongoing_class(&schedule, monday_at(10, 31, 0)).is_none());
    assert!(ongoing_class(&schedule, monday_at(8, 59, 59)).is_none());
  }

  #[test]
  fn other_days_and_garbage_days_never_match() {
    let schedule = vec![
      entry("history", "Tuesday", "00:00", "23:59"),
      entry("art", "someday", "00:00", "23:59"),
    ];
    assert!(ongoing_class(&schedule, monday_at(12, 0, 0)).is_none());
  }

  #[test]
  fn interrupter_fires_once() {
    let mut f = FocusInterrupter::new(vec![entry("chemistry", "mon", "13:00", "14:00")]);
    assert_eq!(f.check(monday_at(12, 59, 0)), None);
    assert_eq!(f.check(monday_at(13, 15, 0)), Some("chemistry".into()));
    assert!(f.is_dismissed());
    assert_eq!(f.check(monday_at(13, 16, 0)), None);
  }

  #[test]
  fn entries_deserialize_from_hhmm_strings() {
    let e: ScheduleEntry = serde_json::from_str(
      r#"{"subject":"maths","day":"Friday","start":"08:15","end":"09:45"}"#,
    )
    .unwrap();
    assert_eq!(e.start, NaiveTime::from_hms_opt(8, 15, 0).unwrap());
    assert_eq!(e.weekday(), Some(Weekday::Fri));
    assert!(serde_json::to_string(&e).unwrap().contains(r#""end":"09:45""#));
  }
}
