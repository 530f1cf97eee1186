//! Source-neutral calendar and event types.
//!
//! These types represent calendars and events in a source-agnostic way.
//! Sources convert whatever they read (ICS files, system calendar APIs)
//! into these types, and the engine works exclusively with them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A calendar known to a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarModel {
    /// Stable identifier, unique within a source.
    pub id: String,
    /// Account the calendar belongs to (e.g. "iCloud", "local").
    pub account: String,
    pub title: String,
    /// Indicator color as a CSS-style hex string (e.g. "#1badf8").
    pub color: String,
}

/// Start or end of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    /// Whole-day value with no time-of-day component.
    Date(NaiveDate),
    /// An absolute instant.
    Utc(DateTime<Utc>),
    /// Wall-clock time with no zone, interpreted in the configured zone.
    Floating(NaiveDateTime),
}

impl EventTime {
    /// The calendar day this value falls on, in the given zone.
    pub fn date_in(&self, tz: Tz) -> NaiveDate {
        match self {
            EventTime::Date(d) => *d,
            EventTime::Utc(dt) => dt.with_timezone(&tz).date_naive(),
            EventTime::Floating(dt) => dt.date(),
        }
    }

    /// The instant this value resolves to in the given zone.
    ///
    /// All-day values resolve to midnight, which sorts them before any
    /// timed event of the same day.
    pub fn instant_in(&self, tz: Tz) -> DateTime<Utc> {
        match self {
            EventTime::Date(d) => resolve_local(tz, d.and_hms_opt(0, 0, 0).unwrap()),
            EventTime::Utc(dt) => *dt,
            EventTime::Floating(dt) => resolve_local(tz, *dt),
        }
    }
}

/// Resolve a wall-clock time in a zone, taking the earlier mapping when the
/// time is ambiguous (DST fold) and shifting forward when it doesn't exist.
pub(crate) fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.with_timezone(&Utc)
        }
        chrono::LocalResult::None => {
            // Spring-forward gap: the hour after maps cleanly.
            resolve_local(tz, local + chrono::Duration::hours(1))
        }
    }
}

/// A calendar event as the engine sees it.
///
/// Identity is the `id`: a multi-day event is one `EventModel` that appears
/// in several day groups, never several copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventModel {
    pub id: String,
    /// The calendar this event belongs to.
    pub calendar: CalendarModel,
    pub title: String,
    pub start: EventTime,
    pub end: EventTime,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    /// Not yet confirmed (tentative / needs action).
    pub pending: bool,
}

impl EventModel {
    pub fn is_all_day(&self) -> bool {
        matches!(self.start, EventTime::Date(_))
    }
}
