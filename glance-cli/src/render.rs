//! Terminal rendering for the month view.
//!
//! Extension-trait based colored rendering over the engine's view model
//! using owo_colors: the grid with today/selection highlighting and event
//! dots, plus an agenda list for the selected day.

use chrono_tz::Tz;
use glance_core::{CalendarEngine, DayCell, EventModel, EventTime, WeekDay, WeekNumber};
use owo_colors::OwoColorize;

/// Extension trait for colored terminal rendering.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for WeekDay {
    fn render(&self) -> String {
        // Two-letter column header, dimmed on weekends.
        let short: String = self.title.chars().take(2).collect();
        if self.is_weekend {
            short.dimmed().to_string()
        } else {
            short.to_string()
        }
    }
}

impl Render for WeekNumber {
    fn render(&self) -> String {
        format!("{:>2}", self.value).dimmed().to_string()
    }
}

impl Render for DayCell {
    fn render(&self) -> String {
        use chrono::Datelike;

        let day = format!("{:>2}", self.date.day());
        let styled = if self.is_today {
            day.bold().reversed().to_string()
        } else if self.is_selected {
            day.bold().underline().to_string()
        } else if !self.in_month {
            day.dimmed().to_string()
        } else {
            day
        };

        let marker = match self.dots.first() {
            Some(color) => dot(color),
            None => " ".to_string(),
        };
        format!("{styled}{marker}")
    }
}

/// A colored indicator dot, falling back to plain when the hex color
/// doesn't parse.
fn dot(color: &str) -> String {
    match parse_hex(color) {
        Some((r, g, b)) => "•".truecolor(r, g, b).to_string(),
        None => "•".to_string(),
    }
}

fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

fn fmt_clock(time: &EventTime, tz: Tz) -> String {
    match time {
        EventTime::Date(d) => d.format("%Y-%m-%d").to_string(),
        EventTime::Utc(dt) => dt.with_timezone(&tz).format("%H:%M").to_string(),
        EventTime::Floating(dt) => dt.format("%H:%M").to_string(),
    }
}

fn render_event_time(event: &EventModel, tz: Tz) -> String {
    if event.is_all_day() {
        return "all-day".to_string();
    }
    format!(
        "{}–{}",
        fmt_clock(&event.start, tz),
        fmt_clock(&event.end, tz)
    )
}

fn render_event(event: &EventModel, tz: Tz) -> String {
    let mut line = format!(
        "  {} {} {}",
        dot(&event.calendar.color),
        event.title,
        render_event_time(event, tz).dimmed()
    );
    if event.pending {
        line.push_str(&format!(" {}", "(pending)".dimmed()));
    }
    if let Some(location) = &event.location {
        line.push_str(&format!("  {}", location.dimmed()));
    }
    line
}

/// Render the whole month: title, weekday header, day rows and the agenda
/// of the selected day.
pub fn render_month(engine: &CalendarEngine, show_week_numbers: bool) -> String {
    let cells = engine.day_cells();
    let week_days = engine.week_days();
    let week_numbers = engine.week_numbers();
    let reference = engine.reference_date();
    let tz = engine.configuration().time_zone;

    let mut lines = Vec::new();

    let title = reference.format("%B %Y").to_string();
    let gutter = if show_week_numbers { "   " } else { "" };
    lines.push(format!("{gutter}{}", title.bold()));

    let header: Vec<String> = week_days.iter().map(Render::render).collect();
    lines.push(format!("{gutter}{}", header.join("  ")));

    for (row_index, row) in cells.chunks(7).enumerate() {
        let mut line = String::new();
        if show_week_numbers {
            let number = week_numbers
                .get(row_index)
                .map(Render::render)
                .unwrap_or_else(|| "  ".to_string());
            line.push_str(&format!("{number} "));
        }
        let rendered: Vec<String> = row.iter().map(Render::render).collect();
        line.push_str(&rendered.join(" "));
        lines.push(line);
    }

    let selected: Vec<&DayCell> = cells.iter().filter(|c| c.is_selected).collect();
    for cell in selected {
        if cell.events.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("{}", reference.format("%A, %B %-d").bold()));
        for event in &cell.events {
            lines.push(render_event(event, tz));
        }
    }

    lines.join("\n")
}
