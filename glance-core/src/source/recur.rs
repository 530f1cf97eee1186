//! RRULE expansion for recurring events.
//!
//! Expands a recurring master into individual instances overlapping a day
//! span, respecting EXDATEs. Expansion lives in the source, never in the
//! engine: the engine only ever sees concrete instances.

use chrono::{Duration, TimeZone, Utc};
use rrule::RRuleSet;

use crate::error::{GlanceError, GlanceResult};
use crate::grid::GridSpan;
use crate::model::{EventModel, EventTime};

use super::ics::ParsedEvent;

/// Upper bound on instances per master within one span; a month grid can
/// never show more than 42 days of daily occurrences.
const MAX_INSTANCES: u16 = 100;

/// Build an iCalendar-format rule block for the rrule crate's parser.
fn build_rrule_string(start: &EventTime, rrule: &str, exdates: &[EventTime]) -> String {
    let mut lines = vec![dt_line("DTSTART", start), format!("RRULE:{}", rrule)];
    lines.extend(exdates.iter().map(|ex| dt_line("EXDATE", ex)));
    lines.join("\n")
}

fn dt_line(name: &str, value: &EventTime) -> String {
    match value {
        EventTime::Date(d) => format!("{}:{}T000000Z", name, d.format("%Y%m%d")),
        EventTime::Utc(dt) => format!("{}:{}", name, dt.format("%Y%m%dT%H%M%SZ")),
        EventTime::Floating(dt) => format!("{}:{}Z", name, dt.format("%Y%m%dT%H%M%S")),
    }
}

/// Expand a recurring master into instances whose day span can overlap
/// `span`. The master itself is not included. Non-recurring input expands
/// to nothing.
pub fn expand_recurring_event(
    master: &ParsedEvent,
    span: GridSpan,
) -> GlanceResult<Vec<EventModel>> {
    let Some(rrule) = &master.rrule else {
        return Ok(Vec::new());
    };

    let rrule_str = build_rrule_string(&master.event.start, rrule, &master.exdates);
    let rrule_set: RRuleSet = rrule_str.parse().map_err(|e| {
        GlanceError::IcsParse(format!(
            "Failed to parse RRULE for event '{}': {}",
            master.event.id, e
        ))
    })?;

    // Occurrences are filtered by their start. Widen the window backwards
    // by the master's length so instances that begin before the span but
    // reach into it still come out.
    let length_days = (master.event.end.date_in(chrono_tz::Tz::UTC)
        - master.event.start.date_in(chrono_tz::Tz::UTC))
    .num_days()
    .max(0);
    let tz: rrule::Tz = Utc.into();
    let window_start = span.first - Duration::days(length_days + 1);
    let window_end = span.last + Duration::days(1);
    let after = Utc
        .from_utc_datetime(&window_start.and_hms_opt(0, 0, 0).unwrap())
        .with_timezone(&tz);
    let before = Utc
        .from_utc_datetime(&window_end.and_hms_opt(23, 59, 59).unwrap())
        .with_timezone(&tz);

    let result = rrule_set.after(after).before(before).all(MAX_INSTANCES);

    // Instance end keeps the master's duration and time representation.
    let duration = master.event.end.instant_in(chrono_tz::Tz::UTC)
        - master.event.start.instant_in(chrono_tz::Tz::UTC);

    let mut instances = Vec::new();
    for occurrence in &result.dates {
        let start = match &master.event.start {
            EventTime::Date(_) => EventTime::Date(occurrence.date_naive()),
            EventTime::Utc(_) => EventTime::Utc(occurrence.with_timezone(&Utc)),
            EventTime::Floating(_) => EventTime::Floating(occurrence.naive_local()),
        };
        let end = match (&master.event.start, &master.event.end) {
            (EventTime::Date(_), _) => {
                EventTime::Date(occurrence.date_naive() + Duration::days(length_days))
            }
            (EventTime::Utc(_), _) => {
                EventTime::Utc(occurrence.with_timezone(&Utc) + duration)
            }
            (EventTime::Floating(_), _) => {
                EventTime::Floating(occurrence.naive_local() + duration)
            }
        };

        instances.push(EventModel {
            // Each instance gets its own identity for per-day grouping.
            id: format!("{}:{}", master.event.id, occurrence.format("%Y%m%dT%H%M%S")),
            calendar: master.event.calendar.clone(),
            title: master.event.title.clone(),
            start,
            end,
            location: master.event.location.clone(),
            notes: master.event.notes.clone(),
            url: master.event.url.clone(),
            pending: master.event.pending,
        });
    }

    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CalendarModel;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn master(rrule: &str, exdates: Vec<EventTime>) -> ParsedEvent {
        let calendar = CalendarModel {
            id: "home".to_string(),
            account: "local".to_string(),
            title: "Home".to_string(),
            color: "#1badf8".to_string(),
        };
        ParsedEvent {
            event: EventModel {
                id: "weekly".to_string(),
                calendar,
                title: "Weekly".to_string(),
                start: EventTime::Utc(
                    Utc.from_utc_datetime(&date(2021, 1, 4).and_hms_opt(10, 0, 0).unwrap()),
                ),
                end: EventTime::Utc(
                    Utc.from_utc_datetime(&date(2021, 1, 4).and_hms_opt(11, 0, 0).unwrap()),
                ),
                location: None,
                notes: None,
                url: None,
                pending: false,
            },
            rrule: Some(rrule.to_string()),
            exdates,
        }
    }

    #[test]
    fn test_weekly_rule_expands_within_span() {
        let span = GridSpan {
            first: date(2020, 12, 27),
            last: date(2021, 2, 6),
        };
        let instances =
            expand_recurring_event(&master("FREQ=WEEKLY;BYDAY=MO", Vec::new()), span)
                .expect("should expand");

        // Mondays Jan 4 .. Feb 1.
        let days: Vec<NaiveDate> = instances
            .iter()
            .map(|e| e.start.date_in(chrono_tz::Tz::UTC))
            .collect();
        assert_eq!(
            days,
            vec![
                date(2021, 1, 4),
                date(2021, 1, 11),
                date(2021, 1, 18),
                date(2021, 1, 25),
                date(2021, 2, 1),
            ]
        );
    }

    #[test]
    fn test_exdate_removes_an_occurrence() {
        let span = GridSpan {
            first: date(2020, 12, 27),
            last: date(2021, 2, 6),
        };
        let exdate = EventTime::Utc(
            Utc.from_utc_datetime(&date(2021, 1, 11).and_hms_opt(10, 0, 0).unwrap()),
        );
        let instances =
            expand_recurring_event(&master("FREQ=WEEKLY;BYDAY=MO", vec![exdate]), span)
                .expect("should expand");

        let days: Vec<NaiveDate> = instances
            .iter()
            .map(|e| e.start.date_in(chrono_tz::Tz::UTC))
            .collect();
        assert!(!days.contains(&date(2021, 1, 11)), "EXDATE must be honored");
        assert_eq!(days.len(), 4);
    }

    #[test]
    fn test_instances_have_distinct_ids() {
        let span = GridSpan {
            first: date(2020, 12, 27),
            last: date(2021, 2, 6),
        };
        let instances =
            expand_recurring_event(&master("FREQ=WEEKLY;BYDAY=MO", Vec::new()), span)
                .expect("should expand");

        let mut ids: Vec<&str> = instances.iter().map(|e| e.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), instances.len());
    }

    #[test]
    fn test_non_recurring_master_expands_to_nothing() {
        let mut event = master("FREQ=WEEKLY", Vec::new());
        event.rrule = None;
        let span = GridSpan {
            first: date(2020, 12, 27),
            last: date(2021, 2, 6),
        };
        assert!(expand_recurring_event(&event, span).unwrap().is_empty());
    }
}
