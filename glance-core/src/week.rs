//! Week metadata: weekday header labels and per-row week numbers.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::{CalendarConfig, WeekNumbering};
use crate::grid::GridSlot;

/// One column header of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekDay {
    /// Short display title ("Mon", "Tue", ...).
    pub title: String,
    pub is_weekend: bool,
}

/// Week-of-year number for one 7-cell grid row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekNumber {
    pub value: u32,
}

/// Column headers, one per weekday, starting at the configured
/// first weekday.
pub fn week_days(config: &CalendarConfig) -> Vec<WeekDay> {
    let mut weekday = config.first_weekday;
    (0..7)
        .map(|_| {
            let day = WeekDay {
                title: short_title(weekday).to_string(),
                is_weekend: config.is_weekend(weekday),
            };
            weekday = weekday.succ();
            day
        })
        .collect()
}

/// Week numbers, one per 7-cell row of the grid.
///
/// Each row is represented by its middle day: with a Sunday-first grid an
/// ISO row straddles two ISO weeks, and the middle day lands in the week
/// the row visually shows (the week containing its Thursday).
pub fn week_numbers(grid: &[GridSlot], config: &CalendarConfig) -> Vec<WeekNumber> {
    grid.chunks(7)
        .filter(|row| row.len() == 7)
        .map(|row| {
            let representative = row[3].date;
            let value = match config.week_numbering {
                WeekNumbering::Iso8601 => representative.iso_week().week(),
                WeekNumbering::Gregorian => {
                    gregorian_week(representative, config.first_weekday)
                }
            };
            WeekNumber { value }
        })
        .collect()
}

fn short_title(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// Week-of-year where week 1 contains January 1st and weeks start on
/// `first_weekday`.
fn gregorian_week(date: NaiveDate, first_weekday: Weekday) -> u32 {
    let jan_first = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap();
    let anchor = start_of_week(jan_first, first_weekday);
    let week_start = start_of_week(date, first_weekday);
    ((week_start - anchor).num_days() / 7 + 1) as u32
}

fn start_of_week(mut date: NaiveDate, first_weekday: Weekday) -> NaiveDate {
    while date.weekday() != first_weekday {
        date -= Duration::days(1);
    }
    date
}
