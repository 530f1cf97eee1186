//! Directory-backed calendar source.
//!
//! A root directory whose subdirectories are calendars: each subdirectory
//! holds `.ics` event files and an optional `calendar.toml` with display
//! metadata. This is the bundled [`CalendarSource`]; platform-native
//! sources implement the same trait elsewhere.

mod ics;
mod recur;

pub use ics::{ParsedEvent, parse_event};
pub use recur::expand_recurring_event;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{GlanceError, GlanceResult};
use crate::grid::GridSpan;
use crate::model::{CalendarModel, EventModel};
use crate::provider::CalendarSource;
use crate::signal::Signal;

/// Fallback indicator colors, assigned to calendars without a configured
/// one in slug order.
const DEFAULT_COLORS: [&str; 6] = [
    "#1badf8", "#ff3b30", "#34c759", "#ff9500", "#af52de", "#5856d6",
];

/// Optional per-calendar metadata stored in `<calendar>/calendar.toml`.
#[derive(Debug, Default, Deserialize)]
struct CalendarMeta {
    title: Option<String>,
    account: Option<String>,
    color: Option<String>,
}

impl CalendarMeta {
    fn load(dir: &Path) -> CalendarMeta {
        let path = dir.join("calendar.toml");
        if !path.exists() {
            return CalendarMeta::default();
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring malformed calendar.toml");
                CalendarMeta::default()
            }),
            Err(_) => CalendarMeta::default(),
        }
    }
}

/// A `CalendarSource` over a directory tree of `.ics` files.
pub struct DirectorySource {
    root: PathBuf,
    changes: Signal<()>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectorySource {
            root: root.into(),
            changes: Signal::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fired when the underlying files are known to have changed. The
    /// source does not watch the filesystem itself; whoever does (an OS
    /// watcher, a sync job) calls [`DirectorySource::notify_changed`].
    pub fn changes(&self) -> &Signal<()> {
        &self.changes
    }

    pub fn notify_changed(&self) {
        self.changes.emit(());
    }

    fn calendar_dirs(&self) -> GlanceResult<Vec<(String, PathBuf)>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            GlanceError::Source(format!(
                "Cannot read calendar directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut dirs: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter_map(|path| {
                let slug = path.file_name()?.to_str()?.to_string();
                (!slug.starts_with('.')).then_some((slug, path))
            })
            .collect();

        dirs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(dirs)
    }

    fn calendar_model(&self, index: usize, slug: &str, dir: &Path) -> CalendarModel {
        let meta = CalendarMeta::load(dir);
        CalendarModel {
            id: slug.to_string(),
            account: meta.account.unwrap_or_else(|| "local".to_string()),
            title: meta.title.unwrap_or_else(|| slug.to_string()),
            color: meta
                .color
                .unwrap_or_else(|| DEFAULT_COLORS[index % DEFAULT_COLORS.len()].to_string()),
        }
    }

    fn events_for_calendar(
        &self,
        calendar: &CalendarModel,
        dir: &Path,
        span: GridSpan,
    ) -> Vec<EventModel> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            warn!(dir = %dir.display(), "calendar directory vanished, serving no events");
            return Vec::new();
        };

        let mut events = Vec::new();
        for path in entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "ics"))
        {
            let Ok(content) = std::fs::read_to_string(&path) else {
                warn!(path = %path.display(), "unreadable ICS file skipped");
                continue;
            };
            let Some(parsed) = parse_event(&content, calendar) else {
                debug!(path = %path.display(), "no usable VEVENT, skipped");
                continue;
            };

            if parsed.rrule.is_some() {
                match expand_recurring_event(&parsed, span) {
                    Ok(instances) => events.extend(instances),
                    Err(error) => {
                        warn!(path = %path.display(), %error, "recurrence expansion failed");
                    }
                }
            } else {
                events.push(parsed.event);
            }
        }

        events
            .into_iter()
            .filter(|event| overlaps_with_slack(event, span))
            .collect()
    }
}

/// Day-granularity overlap check with one day of slack on both sides.
///
/// The source has no time zone of its own; the aggregator regroups in the
/// configured zone and drops anything outside the grid, so serving a
/// slightly generous superset is correct while never dropping a
/// boundary-day event.
fn overlaps_with_slack(event: &EventModel, span: GridSpan) -> bool {
    let utc = chrono_tz::Tz::UTC;
    let first = event.start.date_in(utc);
    let last = event.end.date_in(utc).max(first);
    first <= span.last + Duration::days(1) && last >= span.first - Duration::days(1)
}

impl CalendarSource for DirectorySource {
    fn calendars(&self) -> GlanceResult<Vec<CalendarModel>> {
        Ok(self
            .calendar_dirs()?
            .iter()
            .enumerate()
            .map(|(index, (slug, dir))| self.calendar_model(index, slug, dir))
            .collect())
    }

    fn events(
        &self,
        span: GridSpan,
        calendars: &BTreeSet<String>,
    ) -> GlanceResult<Vec<EventModel>> {
        let mut events = Vec::new();
        for (index, (slug, dir)) in self.calendar_dirs()?.iter().enumerate() {
            if !calendars.contains(slug) {
                continue;
            }
            let model = self.calendar_model(index, slug, dir);
            events.extend(self.events_for_calendar(&model, dir, span));
        }
        debug!(
            count = events.len(),
            from = %span.first,
            to = %span.last,
            "served events from directory source"
        );
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn span(from: NaiveDate, to: NaiveDate) -> GridSpan {
        GridSpan {
            first: from,
            last: to,
        }
    }

    fn write_event(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).expect("write ics");
    }

    fn timed_ics(uid: &str, start: &str, end: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:TEST\r\nBEGIN:VEVENT\r\n\
             UID:{uid}\r\nSUMMARY:{uid}\r\nDTSTART:{start}\r\nDTEND:{end}\r\n\
             END:VEVENT\r\nEND:VCALENDAR"
        )
    }

    #[test]
    fn test_discovers_calendars_in_slug_order() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("work")).unwrap();
        fs::create_dir(tmp.path().join("home")).unwrap();
        fs::write(
            tmp.path().join("home/calendar.toml"),
            "title = \"Home\"\ncolor = \"#ff0000\"\n",
        )
        .unwrap();

        let source = DirectorySource::new(tmp.path());
        let calendars = source.calendars().expect("should list");

        assert_eq!(calendars.len(), 2);
        assert_eq!(calendars[0].id, "home");
        assert_eq!(calendars[0].title, "Home");
        assert_eq!(calendars[0].color, "#ff0000");
        assert_eq!(calendars[1].id, "work");
        assert_eq!(calendars[1].account, "local");
    }

    #[test]
    fn test_events_restricted_to_enabled_calendars() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["home", "work"] {
            let dir = tmp.path().join(name);
            fs::create_dir(&dir).unwrap();
            write_event(
                &dir,
                "e.ics",
                &timed_ics(
                    &format!("{name}-1"),
                    "20210105T090000Z",
                    "20210105T100000Z",
                ),
            );
        }

        let source = DirectorySource::new(tmp.path());
        let only_home: BTreeSet<String> = ["home".to_string()].into();
        let events = source
            .events(span(date(2021, 1, 1), date(2021, 1, 31)), &only_home)
            .expect("should serve");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].calendar.id, "home");
    }

    #[test]
    fn test_events_outside_span_are_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("home");
        fs::create_dir(&dir).unwrap();
        write_event(
            &dir,
            "in.ics",
            &timed_ics("in", "20210105T090000Z", "20210105T100000Z"),
        );
        write_event(
            &dir,
            "out.ics",
            &timed_ics("out", "20210605T090000Z", "20210605T100000Z"),
        );

        let source = DirectorySource::new(tmp.path());
        let enabled: BTreeSet<String> = ["home".to_string()].into();
        let events = source
            .events(span(date(2021, 1, 1), date(2021, 1, 31)), &enabled)
            .expect("should serve");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "in");
    }

    #[test]
    fn test_recurring_event_is_expanded_not_served_raw() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("home");
        fs::create_dir(&dir).unwrap();
        write_event(
            &dir,
            "weekly.ics",
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:TEST\r\nBEGIN:VEVENT\r\n\
             UID:weekly\r\nSUMMARY:Weekly\r\nDTSTART:20210104T100000Z\r\n\
             DTEND:20210104T110000Z\r\nRRULE:FREQ=WEEKLY;BYDAY=MO\r\n\
             END:VEVENT\r\nEND:VCALENDAR",
        );

        let source = DirectorySource::new(tmp.path());
        let enabled: BTreeSet<String> = ["home".to_string()].into();
        // The padded Sunday-first grid span for January 2021.
        let events = source
            .events(span(date(2020, 12, 27), date(2021, 2, 6)), &enabled)
            .expect("should serve");

        let mut days: Vec<NaiveDate> = events
            .iter()
            .map(|e| e.start.date_in(chrono_tz::Tz::UTC))
            .collect();
        days.sort_unstable();
        assert_eq!(
            days,
            vec![
                date(2020, 12, 28),
                date(2021, 1, 4),
                date(2021, 1, 11),
                date(2021, 1, 18),
                date(2021, 1, 25),
                date(2021, 2, 1),
            ],
            "one instance per Monday of the padded grid"
        );
        assert!(events.iter().all(|e| e.title == "Weekly"));
    }

    #[test]
    fn test_missing_root_is_an_error_not_a_panic() {
        let source = DirectorySource::new("/nonexistent/glance-test");
        let enabled = BTreeSet::new();
        assert!(source
            .events(span(date(2021, 1, 1), date(2021, 1, 31)), &enabled)
            .is_err());
    }

    #[test]
    fn test_unparseable_file_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("home");
        fs::create_dir(&dir).unwrap();
        write_event(&dir, "junk.ics", "this is not an ICS file");
        write_event(
            &dir,
            "ok.ics",
            &timed_ics("ok", "20210105T090000Z", "20210105T100000Z"),
        );

        let source = DirectorySource::new(tmp.path());
        let enabled: BTreeSet<String> = ["home".to_string()].into();
        let events = source
            .events(span(date(2021, 1, 1), date(2021, 1, 31)), &enabled)
            .expect("should serve");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "ok");
    }
}
