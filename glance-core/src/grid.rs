//! Month grid construction.
//!
//! The grid is the full set of day slots shown for a month view: every day
//! of the reference month, padded on both sides to complete weeks that
//! start on the configured first weekday.

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::CalendarConfig;

/// One cell of the raw grid: a date and whether it belongs to the
/// reference month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSlot {
    pub date: NaiveDate,
    pub in_month: bool,
}

/// Closed day range `[first, last]` covered by a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl GridSpan {
    /// The span of a non-empty grid.
    pub fn of(grid: &[GridSlot]) -> GridSpan {
        GridSpan {
            first: grid.first().map(|s| s.date).unwrap_or_default(),
            last: grid.last().map(|s| s.date).unwrap_or_default(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }
}

/// Build the visible grid for the month containing `reference`.
///
/// Total over any valid configuration: walks back from the 1st to the
/// nearest configured first weekday (0 to 6 days), then emits consecutive
/// dates until the count is a multiple of 7 and the month's last day has
/// been covered. Months that already start on the first weekday get no
/// leading padding; a 28-day February starting on it produces exactly
/// 28 slots.
pub fn build_grid(reference: NaiveDate, config: &CalendarConfig) -> Vec<GridSlot> {
    // with_day(1) and the one-month step are valid for any chrono date.
    let month_first = reference.with_day(1).unwrap();
    let month_last = month_first + Months::new(1) - Duration::days(1);

    let mut cursor = month_first;
    while cursor.weekday() != config.first_weekday {
        cursor -= Duration::days(1);
    }

    let mut slots = Vec::with_capacity(42);
    loop {
        slots.push(GridSlot {
            date: cursor,
            in_month: cursor.year() == reference.year() && cursor.month() == reference.month(),
        });
        if slots.len() % 7 == 0 && cursor >= month_last {
            break;
        }
        cursor += Duration::days(1);
    }
    slots
}
