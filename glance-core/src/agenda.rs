//! Event aggregation: grouping a source's events by calendar day.
//!
//! The engine requests the closed day span covered by the grid, then this
//! module regroups the returned events per day and derives the indicator
//! colors for each day cell.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Timelike};
use chrono_tz::Tz;

use crate::grid::GridSpan;
use crate::model::{EventModel, EventTime};

/// Closed day range `[first, last]` an event covers in the given zone.
///
/// All-day events are inclusive on both ends. Timed events cover every day
/// touched by `[start, end)`: an end at exactly midnight does not touch the
/// day it lands on.
pub fn event_day_span(event: &EventModel, tz: Tz) -> (NaiveDate, NaiveDate) {
    let first = event.start.date_in(tz);

    let last = if event.is_all_day() {
        event.end.date_in(tz)
    } else {
        end_day_exclusive_midnight(&event.end, tz)
    };

    (first, last.max(first))
}

fn end_day_exclusive_midnight(end: &EventTime, tz: Tz) -> NaiveDate {
    match end {
        EventTime::Date(d) => *d,
        EventTime::Utc(dt) => {
            let local = dt.with_timezone(&tz);
            if local.time().num_seconds_from_midnight() == 0 {
                local.date_naive() - Duration::days(1)
            } else {
                local.date_naive()
            }
        }
        EventTime::Floating(dt) => {
            if dt.time().num_seconds_from_midnight() == 0 {
                dt.date() - Duration::days(1)
            } else {
                dt.date()
            }
        }
    }
}

/// Sort events for display within a day: all-day first, then start time
/// ascending, ties broken by calendar id for stability.
pub fn sort_for_display(events: &mut [EventModel], tz: Tz) {
    events.sort_by(|a, b| {
        b.is_all_day()
            .cmp(&a.is_all_day())
            .then_with(|| a.start.instant_in(tz).cmp(&b.start.instant_in(tz)))
            .then_with(|| a.calendar.id.cmp(&b.calendar.id))
    });
}

/// Group events by every day they overlap within `span`.
///
/// A single multi-day event appears once per overlapped day; each day's
/// list keeps the display ordering from [`sort_for_display`].
pub fn group_by_day(
    mut events: Vec<EventModel>,
    span: GridSpan,
    tz: Tz,
) -> BTreeMap<NaiveDate, Vec<EventModel>> {
    sort_for_display(&mut events, tz);

    let mut groups: BTreeMap<NaiveDate, Vec<EventModel>> = BTreeMap::new();
    for event in events {
        let (first, last) = event_day_span(&event, tz);
        let mut day = first.max(span.first);
        let until = last.min(span.last);
        while day <= until {
            groups.entry(day).or_default().push(event.clone());
            day += Duration::days(1);
        }
    }
    groups
}

/// Distinct indicator colors for one day's events, deduplicated, in the
/// day's display order.
pub fn dot_colors(events: &[EventModel]) -> Vec<String> {
    let mut colors: Vec<String> = Vec::new();
    for event in events {
        if !colors.iter().any(|c| c == &event.calendar.color) {
            colors.push(event.calendar.color.clone());
        }
    }
    colors
}
