//! The calendar view-model engine.
//!
//! Merges grid cells, per-day event groups and cursor state into the final
//! day-cell sequence, and re-emits it whenever any dependency changes.
//! Each input change recomputes only its dependent fields:
//!
//! - reference date: rebuild grid, re-request events, today/selected flags
//! - hover cursor: flip `is_hovered` only, no grid rebuild, no request
//! - enabled calendars: re-request events for the current span only
//! - "now" / day rollover: recompute `is_today` only
//! - locale configuration: rebuild everything and re-request
//!
//! All state lives on one logical thread behind `Rc<RefCell>`; collaborator
//! change notifications are bound with [`CalendarEngine::bind_data_changes`]
//! and [`CalendarEngine::bind_locale_changes`].

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agenda;
use crate::config::CalendarConfig;
use crate::grid::{GridSlot, GridSpan, build_grid};
use crate::model::EventModel;
use crate::provider::{CalendarSource, DateProvider};
use crate::signal::{Signal, SubscriptionSet};
use crate::week::{WeekDay, WeekNumber, week_days, week_numbers};

/// One fully merged cell of the month view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub in_month: bool,
    pub is_today: bool,
    pub is_selected: bool,
    pub is_hovered: bool,
    /// All-day events first, then by start time, then calendar id.
    pub events: Vec<EventModel>,
    /// Distinct indicator colors of the day's calendars.
    pub dots: Vec<String>,
}

struct State {
    provider: Rc<dyn DateProvider>,
    source: Rc<dyn CalendarSource>,
    config: CalendarConfig,
    today: NaiveDate,
    reference: NaiveDate,
    hovered: Option<NaiveDate>,
    enabled: BTreeSet<String>,
    grid: Vec<GridSlot>,
    events_by_day: BTreeMap<NaiveDate, Vec<EventModel>>,
    cells: Vec<DayCell>,
    week_day_row: Vec<WeekDay>,
    week_number_rows: Vec<WeekNumber>,
}

#[derive(Clone)]
struct Outputs {
    cells: Signal<Vec<DayCell>>,
    week_days: Signal<Vec<WeekDay>>,
    week_numbers: Signal<Vec<WeekNumber>>,
}

/// The reactive month-view engine.
pub struct CalendarEngine {
    state: Rc<RefCell<State>>,
    out: Outputs,
    bindings: RefCell<SubscriptionSet>,
}

impl CalendarEngine {
    /// Build an engine over the given collaborators.
    ///
    /// The initial reference date is "today" in the configured zone and
    /// all known calendars start enabled. Initial state is computed
    /// eagerly, so accessors are valid before any signal fires.
    pub fn new(provider: Rc<dyn DateProvider>, source: Rc<dyn CalendarSource>) -> Self {
        let config = provider.configuration();
        let today = provider.now().with_timezone(&config.time_zone).date_naive();

        let enabled: BTreeSet<String> = match source.calendars() {
            Ok(calendars) => calendars.into_iter().map(|c| c.id).collect(),
            Err(error) => {
                warn!(%error, "calendar listing failed; starting with none enabled");
                BTreeSet::new()
            }
        };

        let grid = build_grid(today, &config);
        let week_day_row = week_days(&config);
        let week_number_rows = week_numbers(&grid, &config);

        let state = Rc::new(RefCell::new(State {
            provider,
            source,
            config,
            today,
            reference: today,
            hovered: None,
            enabled,
            grid,
            events_by_day: BTreeMap::new(),
            cells: Vec::new(),
            week_day_row,
            week_number_rows,
        }));
        let out = Outputs {
            cells: Signal::new(),
            week_days: Signal::new(),
            week_numbers: Signal::new(),
        };

        refresh_events(&state, &out);

        CalendarEngine {
            state,
            out,
            bindings: RefCell::new(SubscriptionSet::new()),
        }
    }

    // =========================================================================
    // Input sinks
    // =========================================================================

    /// Move the view to the month containing `reference` and select it.
    ///
    /// Selecting another day of the same month keeps the span, so only the
    /// `is_selected` flags change and no event request is issued.
    pub fn set_reference_date(&self, reference: NaiveDate) {
        let same_span = {
            let mut s = self.state.borrow_mut();
            if s.reference == reference {
                return;
            }
            s.reference = reference;
            let grid = build_grid(reference, &s.config);
            let same_span = GridSpan::of(&grid) == GridSpan::of(&s.grid);
            s.grid = grid;
            if same_span {
                for cell in &mut s.cells {
                    cell.is_selected = cell.date == reference;
                }
            }
            same_span
        };
        if same_span {
            emit_cells(&self.state, &self.out);
        } else {
            sync_week_metadata(&self.state, &self.out);
            refresh_events(&self.state, &self.out);
        }
    }

    /// Move or clear the hover cursor. Flips only the `is_hovered` flags:
    /// at most one cell is hovered, and the old and new flag change in the
    /// same emitted snapshot.
    pub fn set_hovered(&self, hovered: Option<NaiveDate>) {
        let changed = {
            let mut s = self.state.borrow_mut();
            if s.hovered == hovered {
                false
            } else {
                s.hovered = hovered;
                for cell in &mut s.cells {
                    cell.is_hovered = Some(cell.date) == hovered;
                }
                true
            }
        };
        if changed {
            emit_cells(&self.state, &self.out);
        }
    }

    /// Replace the enabled-calendar set. Re-requests events for the
    /// current span; the grid and flags are untouched.
    pub fn set_enabled_calendars(&self, enabled: BTreeSet<String>) {
        {
            let mut s = self.state.borrow_mut();
            if s.enabled == enabled {
                return;
            }
            s.enabled = enabled;
        }
        refresh_events(&self.state, &self.out);
    }

    /// Re-read "now" from the provider and recompute the `is_today` flags.
    /// Call on a timer tick or a day-rollover notification; nothing is
    /// emitted unless the current day actually changed.
    pub fn refresh_now(&self) {
        let changed = {
            let mut s = self.state.borrow_mut();
            let today = s.provider.now().with_timezone(&s.config.time_zone).date_naive();
            if s.today == today {
                false
            } else {
                s.today = today;
                for cell in &mut s.cells {
                    cell.is_today = cell.date == today;
                }
                true
            }
        };
        if changed {
            emit_cells(&self.state, &self.out);
        }
    }

    /// Re-read the locale configuration from the provider, rebuild the
    /// grid and week metadata and re-request events for the new span.
    pub fn reload_configuration(&self) {
        reload_configuration(&self.state, &self.out);
    }

    /// The underlying event/calendar data mutated externally: re-request
    /// events for the current span and enabled set.
    pub fn data_changed(&self) {
        refresh_events(&self.state, &self.out);
    }

    /// Merge an events response for the request keyed by `(span, enabled)`.
    ///
    /// The fetch path goes through this as well; callers wrapping the
    /// source asynchronously deliver late responses here, and a response
    /// whose key no longer matches the engine's current request is
    /// discarded so it cannot overwrite newer state.
    pub fn apply_events_response(
        &self,
        span: GridSpan,
        enabled: &BTreeSet<String>,
        events: Vec<EventModel>,
    ) {
        apply_events(&self.state, &self.out, span, enabled, events);
    }

    // =========================================================================
    // Change-notification bindings
    // =========================================================================

    /// Subscribe to a data source's change notifications for the lifetime
    /// of this engine.
    pub fn bind_data_changes(&self, changes: &Signal<()>) {
        let state = Rc::downgrade(&self.state);
        let out = self.out.clone();
        let sub = changes.subscribe(move |_| {
            if let Some(state) = state.upgrade() {
                refresh_events(&state, &out);
            }
        });
        self.bindings.borrow_mut().insert(sub);
    }

    /// Subscribe to locale-affecting preference change notifications for
    /// the lifetime of this engine.
    pub fn bind_locale_changes(&self, changes: &Signal<()>) {
        let state = Rc::downgrade(&self.state);
        let out = self.out.clone();
        let sub = changes.subscribe(move |_| {
            if let Some(state) = state.upgrade() {
                reload_configuration(&state, &out);
            }
        });
        self.bindings.borrow_mut().insert(sub);
    }

    // =========================================================================
    // Outputs
    // =========================================================================

    /// Full day-cell snapshots, one per update.
    pub fn cells_signal(&self) -> &Signal<Vec<DayCell>> {
        &self.out.cells
    }

    /// Weekday header rows; re-emitted only when the configuration changes.
    pub fn week_days_signal(&self) -> &Signal<Vec<WeekDay>> {
        &self.out.week_days
    }

    /// Per-row week numbers; re-emitted when the visible rows change.
    pub fn week_numbers_signal(&self) -> &Signal<Vec<WeekNumber>> {
        &self.out.week_numbers
    }

    pub fn day_cells(&self) -> Vec<DayCell> {
        self.state.borrow().cells.clone()
    }

    pub fn week_days(&self) -> Vec<WeekDay> {
        self.state.borrow().week_day_row.clone()
    }

    pub fn week_numbers(&self) -> Vec<WeekNumber> {
        self.state.borrow().week_number_rows.clone()
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.state.borrow().reference
    }

    pub fn hovered(&self) -> Option<NaiveDate> {
        self.state.borrow().hovered
    }

    pub fn enabled_calendars(&self) -> BTreeSet<String> {
        self.state.borrow().enabled.clone()
    }

    pub fn configuration(&self) -> CalendarConfig {
        self.state.borrow().config.clone()
    }

    /// Day span currently covered by the grid.
    pub fn span(&self) -> GridSpan {
        GridSpan::of(&self.state.borrow().grid)
    }
}

// =============================================================================
// Update paths
// =============================================================================

fn reload_configuration(state: &Rc<RefCell<State>>, out: &Outputs) {
    {
        let mut s = state.borrow_mut();
        s.config = s.provider.configuration();
        s.today = s.provider.now().with_timezone(&s.config.time_zone).date_naive();
        s.grid = build_grid(s.reference, &s.config);
    }
    sync_week_metadata(state, out);
    refresh_events(state, out);
}

fn refresh_events(state: &Rc<RefCell<State>>, out: &Outputs) {
    let (span, enabled, source) = {
        let s = state.borrow();
        (GridSpan::of(&s.grid), s.enabled.clone(), Rc::clone(&s.source))
    };

    debug!(
        from = %span.first,
        to = %span.last,
        calendars = enabled.len(),
        "requesting events"
    );
    let events = match source.events(span, &enabled) {
        Ok(events) => events,
        Err(error) => {
            // An unreachable source must not block cell rendering.
            warn!(%error, "event request failed, rendering without events");
            Vec::new()
        }
    };

    apply_events(state, out, span, &enabled, events);
}

fn apply_events(
    state: &Rc<RefCell<State>>,
    out: &Outputs,
    span: GridSpan,
    enabled: &BTreeSet<String>,
    events: Vec<EventModel>,
) {
    {
        let mut s = state.borrow_mut();
        if GridSpan::of(&s.grid) != span || &s.enabled != enabled {
            debug!(
                from = %span.first,
                to = %span.last,
                "discarding stale events response"
            );
            return;
        }
        s.events_by_day = agenda::group_by_day(events, span, s.config.time_zone);
        rebuild_cells(&mut s);
    }
    emit_cells(state, out);
}

fn rebuild_cells(s: &mut State) {
    s.cells = s
        .grid
        .iter()
        .map(|slot| {
            let events = s.events_by_day.get(&slot.date).cloned().unwrap_or_default();
            let dots = agenda::dot_colors(&events);
            DayCell {
                date: slot.date,
                in_month: slot.in_month,
                is_today: slot.date == s.today,
                is_selected: slot.date == s.reference,
                is_hovered: Some(slot.date) == s.hovered,
                events,
                dots,
            }
        })
        .collect();
}

fn sync_week_metadata(state: &Rc<RefCell<State>>, out: &Outputs) {
    let (days, numbers) = {
        let mut s = state.borrow_mut();
        let days = week_days(&s.config);
        let numbers = week_numbers(&s.grid, &s.config);
        let days = (days != s.week_day_row).then(|| {
            s.week_day_row = days.clone();
            days
        });
        let numbers = (numbers != s.week_number_rows).then(|| {
            s.week_number_rows = numbers.clone();
            numbers
        });
        (days, numbers)
    };
    if let Some(days) = days {
        out.week_days.emit(days);
    }
    if let Some(numbers) = numbers {
        out.week_numbers.emit(numbers);
    }
}

fn emit_cells(state: &Rc<RefCell<State>>, out: &Outputs) {
    let snapshot = state.borrow().cells.clone();
    out.cells.emit(snapshot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GlanceResult;
    use crate::model::{CalendarModel, EventTime};
    use chrono::{DateTime, TimeZone, Utc};
    use std::cell::Cell;

    struct StubProvider {
        now: Cell<DateTime<Utc>>,
        config: RefCell<CalendarConfig>,
    }

    impl StubProvider {
        fn new(now: DateTime<Utc>, config: CalendarConfig) -> Rc<Self> {
            Rc::new(StubProvider {
                now: Cell::new(now),
                config: RefCell::new(config),
            })
        }
    }

    impl DateProvider for StubProvider {
        fn now(&self) -> DateTime<Utc> {
            self.now.get()
        }

        fn configuration(&self) -> CalendarConfig {
            self.config.borrow().clone()
        }
    }

    struct StubSource {
        calendars: Vec<CalendarModel>,
        events: RefCell<Vec<EventModel>>,
        requests: RefCell<Vec<(GridSpan, BTreeSet<String>)>>,
        fail: Cell<bool>,
    }

    impl StubSource {
        fn new(calendars: Vec<CalendarModel>) -> Rc<Self> {
            Rc::new(StubSource {
                calendars,
                events: RefCell::new(Vec::new()),
                requests: RefCell::new(Vec::new()),
                fail: Cell::new(false),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }

        fn last_request(&self) -> (GridSpan, BTreeSet<String>) {
            self.requests.borrow().last().cloned().expect("no requests made")
        }
    }

    impl CalendarSource for StubSource {
        fn calendars(&self) -> GlanceResult<Vec<CalendarModel>> {
            Ok(self.calendars.clone())
        }

        fn events(
            &self,
            span: GridSpan,
            calendars: &BTreeSet<String>,
        ) -> GlanceResult<Vec<EventModel>> {
            self.requests.borrow_mut().push((span, calendars.clone()));
            if self.fail.get() {
                return Err(crate::error::GlanceError::Source("unreachable".into()));
            }
            Ok(self
                .events
                .borrow()
                .iter()
                .filter(|e| calendars.contains(&e.calendar.id))
                .cloned()
                .collect())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calendar(id: &str, color: &str) -> CalendarModel {
        CalendarModel {
            id: id.to_string(),
            account: "local".to_string(),
            title: id.to_string(),
            color: color.to_string(),
        }
    }

    fn all_day(id: &str, cal: &CalendarModel, from: NaiveDate, to: NaiveDate) -> EventModel {
        EventModel {
            id: id.to_string(),
            calendar: cal.clone(),
            title: id.to_string(),
            start: EventTime::Date(from),
            end: EventTime::Date(to),
            location: None,
            notes: None,
            url: None,
            pending: false,
        }
    }

    fn engine_for_jan_2021() -> (CalendarEngine, Rc<StubProvider>, Rc<StubSource>) {
        let provider = StubProvider::new(
            Utc.with_ymd_and_hms(2021, 1, 15, 12, 0, 0).unwrap(),
            CalendarConfig::default().with_first_weekday_index(1),
        );
        let source = StubSource::new(vec![calendar("home", "#ff0000")]);
        let engine = CalendarEngine::new(provider.clone(), source.clone());
        (engine, provider, source)
    }

    #[test]
    fn test_initial_state_covers_reference_month() {
        let (engine, _provider, source) = engine_for_jan_2021();

        let cells = engine.day_cells();
        assert_eq!(cells.len(), 42);
        assert_eq!(cells[0].date, date(2020, 12, 27));
        assert_eq!(source.request_count(), 1);

        let today: Vec<_> = cells.iter().filter(|c| c.is_today).collect();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].date, date(2021, 1, 15));
    }

    #[test]
    fn test_hover_flips_exactly_one_or_two_flags() {
        let (engine, _provider, source) = engine_for_jan_2021();
        let baseline_requests = source.request_count();

        engine.set_hovered(Some(date(2021, 1, 5)));
        let hovered: Vec<NaiveDate> = engine
            .day_cells()
            .iter()
            .filter(|c| c.is_hovered)
            .map(|c| c.date)
            .collect();
        assert_eq!(hovered, vec![date(2021, 1, 5)]);

        engine.set_hovered(Some(date(2021, 1, 9)));
        let hovered: Vec<NaiveDate> = engine
            .day_cells()
            .iter()
            .filter(|c| c.is_hovered)
            .map(|c| c.date)
            .collect();
        assert_eq!(hovered, vec![date(2021, 1, 9)], "old hover must clear");

        engine.set_hovered(None);
        assert!(engine.day_cells().iter().all(|c| !c.is_hovered));

        assert_eq!(
            source.request_count(),
            baseline_requests,
            "hover must never trigger an event request"
        );
    }

    #[test]
    fn test_hover_emission_is_atomic() {
        let (engine, _provider, _source) = engine_for_jan_2021();
        engine.set_hovered(Some(date(2021, 1, 5)));

        let counts = Rc::new(RefCell::new(Vec::new()));
        let sub = {
            let counts = Rc::clone(&counts);
            engine.cells_signal().subscribe(move |cells: &Vec<DayCell>| {
                counts
                    .borrow_mut()
                    .push(cells.iter().filter(|c| c.is_hovered).count());
            })
        };

        engine.set_hovered(Some(date(2021, 1, 9)));
        engine.set_hovered(None);

        // Every observed snapshot has zero or one hovered cell, and the
        // transition from old to new hover is a single emission.
        assert_eq!(*counts.borrow(), vec![1, 0]);
        drop(sub);
    }

    #[test]
    fn test_refresh_now_moves_today_without_request() {
        let (engine, provider, source) = engine_for_jan_2021();
        let baseline_requests = source.request_count();

        // Advance across the month boundary without touching the reference.
        provider
            .now
            .set(Utc.with_ymd_and_hms(2021, 2, 1, 0, 30, 0).unwrap());
        engine.refresh_now();

        let cells = engine.day_cells();
        let today: Vec<NaiveDate> = cells.iter().filter(|c| c.is_today).map(|c| c.date).collect();
        // Feb 1st is within the padded January grid.
        assert_eq!(today, vec![date(2021, 2, 1)]);
        assert_eq!(source.request_count(), baseline_requests);
        assert_eq!(engine.reference_date(), date(2021, 1, 15));
    }

    #[test]
    fn test_refresh_now_suppresses_no_op_ticks() {
        let (engine, provider, _source) = engine_for_jan_2021();

        let emissions = Rc::new(Cell::new(0));
        let sub = {
            let emissions = Rc::clone(&emissions);
            engine
                .cells_signal()
                .subscribe(move |_: &Vec<DayCell>| emissions.set(emissions.get() + 1))
        };

        provider
            .now
            .set(Utc.with_ymd_and_hms(2021, 1, 15, 18, 0, 0).unwrap());
        engine.refresh_now();
        assert_eq!(emissions.get(), 0, "same day: no emission");
        drop(sub);
    }

    #[test]
    fn test_enabled_calendar_change_requests_same_span() {
        let (engine, _provider, source) = engine_for_jan_2021();
        let (span_before, _) = source.last_request();

        engine.set_enabled_calendars(BTreeSet::new());
        let (span_after, enabled) = source.last_request();

        assert_eq!(span_before, span_after, "span must not be recomputed");
        assert!(enabled.is_empty());
    }

    #[test]
    fn test_stale_events_response_is_discarded() {
        let (engine, _provider, _source) = engine_for_jan_2021();
        let cal = calendar("home", "#ff0000");
        let enabled = engine.enabled_calendars();

        // A response for a span we are no longer showing.
        let stale_span = GridSpan {
            first: date(2020, 11, 1),
            last: date(2020, 12, 12),
        };
        engine.apply_events_response(
            stale_span,
            &enabled,
            vec![all_day("ghost", &cal, date(2020, 11, 2), date(2020, 11, 2))],
        );
        assert!(
            engine.day_cells().iter().all(|c| c.events.is_empty()),
            "stale span response must not merge"
        );

        // A response keyed by an outdated enabled set.
        let mut other_enabled = enabled.clone();
        other_enabled.insert("work".to_string());
        engine.apply_events_response(
            engine.span(),
            &other_enabled,
            vec![all_day("ghost", &cal, date(2021, 1, 5), date(2021, 1, 5))],
        );
        assert!(
            engine.day_cells().iter().all(|c| c.events.is_empty()),
            "stale calendar-set response must not merge"
        );

        // The matching key merges.
        engine.apply_events_response(
            engine.span(),
            &enabled,
            vec![all_day("real", &cal, date(2021, 1, 5), date(2021, 1, 5))],
        );
        let cell = engine
            .day_cells()
            .into_iter()
            .find(|c| c.date == date(2021, 1, 5))
            .unwrap();
        assert_eq!(cell.events.len(), 1);
    }

    #[test]
    fn test_source_failure_renders_empty_groups() {
        let (engine, _provider, source) = engine_for_jan_2021();
        let cal = calendar("home", "#ff0000");
        source
            .events
            .borrow_mut()
            .push(all_day("meeting", &cal, date(2021, 1, 5), date(2021, 1, 5)));

        engine.data_changed();
        assert!(
            engine
                .day_cells()
                .iter()
                .any(|c| !c.events.is_empty()),
            "sanity: event visible while source healthy"
        );

        source.fail.set(true);
        engine.data_changed();

        let cells = engine.day_cells();
        assert_eq!(cells.len(), 42, "grid still renders on failure");
        assert!(cells.iter().all(|c| c.events.is_empty()));
    }

    #[test]
    fn test_same_month_reference_change_suppresses_request() {
        let (engine, _provider, source) = engine_for_jan_2021();
        let baseline = source.request_count();

        engine.set_reference_date(date(2021, 1, 20));
        assert_eq!(
            source.request_count(),
            baseline,
            "unchanged span must not re-request"
        );

        engine.set_reference_date(date(2021, 2, 1));
        assert_eq!(source.request_count(), baseline + 1, "new span must request");
        assert_eq!(engine.span().first, date(2021, 1, 31));
    }

    #[test]
    fn test_selected_follows_reference_date() {
        let (engine, _provider, _source) = engine_for_jan_2021();

        engine.set_reference_date(date(2021, 1, 20));
        let selected: Vec<NaiveDate> = engine
            .day_cells()
            .iter()
            .filter(|c| c.is_selected)
            .map(|c| c.date)
            .collect();
        assert_eq!(selected, vec![date(2021, 1, 20)]);
    }
}
