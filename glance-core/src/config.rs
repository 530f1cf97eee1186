//! Calendar configuration snapshot.
//!
//! A `CalendarConfig` captures everything locale-dependent the engine needs:
//! first weekday, time zone, week-numbering system and the weekend-day set.
//! It is an immutable snapshot; the engine asks its `DateProvider` for a
//! fresh one whenever the locale change notification fires.

use chrono::Weekday;
use chrono_tz::Tz;

/// Week-of-year numbering rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekNumbering {
    /// ISO-8601: week 1 contains the year's first Thursday. Early-January
    /// dates can belong to week 52/53 of the previous year and vice versa.
    Iso8601,
    /// Week 1 is the week containing January 1st, counted with the
    /// configured first weekday.
    Gregorian,
}

impl WeekNumbering {
    /// Derive the numbering rule from a calendar identifier string
    /// (e.g. "iso8601" vs "gregorian").
    pub fn from_calendar_identifier(identifier: &str) -> Self {
        if identifier.eq_ignore_ascii_case("iso8601") {
            WeekNumbering::Iso8601
        } else {
            WeekNumbering::Gregorian
        }
    }
}

/// Immutable locale snapshot driving grid construction and week metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarConfig {
    pub first_weekday: Weekday,
    pub time_zone: Tz,
    pub week_numbering: WeekNumbering,
    /// Which weekdays count as weekend. Defaults to Sat/Sun but some
    /// locales differ, so nothing downstream may hardcode the pair.
    pub weekend_days: Vec<Weekday>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig {
            first_weekday: Weekday::Mon,
            time_zone: Tz::UTC,
            week_numbering: WeekNumbering::Iso8601,
            weekend_days: vec![Weekday::Sat, Weekday::Sun],
        }
    }
}

impl CalendarConfig {
    /// Replace the first weekday from a 1-based index (1 = Sunday ...
    /// 7 = Saturday). Out-of-range values are clamped rather than rejected,
    /// since they originate from system preferences outside our control.
    pub fn with_first_weekday_index(mut self, index: u32) -> Self {
        self.first_weekday = weekday_from_index(index);
        self
    }

    pub fn with_time_zone(mut self, tz: Tz) -> Self {
        self.time_zone = tz;
        self
    }

    pub fn with_week_numbering(mut self, numbering: WeekNumbering) -> Self {
        self.week_numbering = numbering;
        self
    }

    pub fn is_weekend(&self, weekday: Weekday) -> bool {
        self.weekend_days.contains(&weekday)
    }
}

/// Map a 1-based first-weekday index (1 = Sunday) to a `Weekday`,
/// clamping out-of-range input.
pub fn weekday_from_index(index: u32) -> Weekday {
    match index.clamp(1, 7) {
        1 => Weekday::Sun,
        2 => Weekday::Mon,
        3 => Weekday::Tue,
        4 => Weekday::Wed,
        5 => Weekday::Thu,
        6 => Weekday::Fri,
        _ => Weekday::Sat,
    }
}
