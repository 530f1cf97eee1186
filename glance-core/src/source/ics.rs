//! ICS file parsing using the icalendar crate's parser.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Property, read_calendar, unfold},
};

use crate::model::{CalendarModel, EventModel, EventTime, resolve_local};

/// A parsed VEVENT: the source-neutral event plus the recurrence data the
/// directory source needs for expansion.
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    pub event: EventModel,
    pub rrule: Option<String>,
    pub exdates: Vec<EventTime>,
}

/// Parse ICS content into a [`ParsedEvent`].
///
/// Returns `None` for content without a usable VEVENT; cancelled events
/// are dropped here so sources never serve them.
pub fn parse_event(content: &str, calendar: &CalendarModel) -> Option<ParsedEvent> {
    let unfolded = unfold(content);
    let parsed = read_calendar(&unfolded).ok()?;
    let vevent = parsed.components.iter().find(|c| c.name == "VEVENT")?;

    let status = vevent
        .find_prop("STATUS")
        .map(|p| p.val.to_string())
        .unwrap_or_default();
    if status == "CANCELLED" {
        return None;
    }

    let id = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let title = vevent
        .find_prop("SUMMARY")
        .map(|p| p.val.to_string())
        .unwrap_or_else(|| "(No title)".to_string());

    let start = to_event_time(DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?);
    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_event_time)
        .map(|end| normalize_end(&start, end))
        .unwrap_or_else(|| start.clone());

    let location = vevent.find_prop("LOCATION").map(|p| p.val.to_string());
    let notes = vevent.find_prop("DESCRIPTION").map(|p| p.val.to_string());
    let url = vevent.find_prop("URL").map(|p| p.val.to_string());
    let pending = status == "TENTATIVE";

    let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());
    let exdates: Vec<EventTime> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(parse_exdate_property)
        .collect();

    Some(ParsedEvent {
        event: EventModel {
            id,
            calendar: calendar.clone(),
            title,
            start,
            end,
            location,
            notes,
            url,
            pending,
        },
        rrule,
        exdates,
    })
}

fn to_event_time(value: DatePerhapsTime) -> EventTime {
    match value {
        DatePerhapsTime::Date(date) => EventTime::Date(date),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => EventTime::Utc(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(dt)) => EventTime::Floating(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            match tzid.parse::<Tz>() {
                Ok(tz) => EventTime::Utc(resolve_local(tz, date_time)),
                // Unknown zone: keep the wall clock rather than guessing.
                Err(_) => EventTime::Floating(date_time),
            }
        }
    }
}

/// ICS all-day DTEND is exclusive; the model's end date is inclusive.
fn normalize_end(start: &EventTime, end: EventTime) -> EventTime {
    match (start, end) {
        (EventTime::Date(s), EventTime::Date(e)) => EventTime::Date((e - Duration::days(1)).max(*s)),
        (_, end) => end,
    }
}

/// Parse one EXDATE property, which may hold several comma-separated
/// values and an optional TZID parameter.
fn parse_exdate_property(prop: &Property) -> Vec<EventTime> {
    let tzid: Option<Tz> = prop
        .params
        .iter()
        .find(|param| param.key == "TZID")
        .and_then(|param| param.val.as_ref())
        .and_then(|val| val.as_ref().parse().ok());

    prop.val
        .as_ref()
        .split(',')
        .filter_map(|raw| parse_exdate_value(raw.trim(), tzid))
        .collect()
}

fn parse_exdate_value(raw: &str, tzid: Option<Tz>) -> Option<EventTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%SZ") {
        return Some(EventTime::Utc(dt.and_utc()));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S") {
        return Some(match tzid {
            Some(tz) => EventTime::Utc(resolve_local(tz, dt)),
            None => EventTime::Floating(dt),
        });
    }
    NaiveDate::parse_from_str(raw, "%Y%m%d").ok().map(EventTime::Date)
}
