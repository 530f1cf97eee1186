//! Collaborator capabilities the engine is constructed over.
//!
//! The engine never reads ambient global state: "now", the locale snapshot
//! and the event data all come in through these traits, which keeps the
//! engine deterministic and testable.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::config::CalendarConfig;
use crate::error::GlanceResult;
use crate::grid::GridSpan;
use crate::model::{CalendarModel, EventModel};

/// Supplies the current instant and the user's calendar configuration.
pub trait DateProvider {
    /// Current instant, re-read on demand; never cached across a locale
    /// change notification.
    fn now(&self) -> DateTime<Utc>;

    /// Fresh locale snapshot (first weekday, time zone, week numbering).
    fn configuration(&self) -> CalendarConfig;
}

/// Supplies calendar metadata and events.
///
/// `events` must return every event overlapping any day of the closed span
/// `[span.first, span.last]` at day granularity in the configured zone,
/// restricted to the given calendar ids. Implementations decide how
/// (files, system APIs, network) and own recurrence expansion.
pub trait CalendarSource {
    fn calendars(&self) -> GlanceResult<Vec<CalendarModel>>;

    fn events(
        &self,
        span: GridSpan,
        calendars: &BTreeSet<String>,
    ) -> GlanceResult<Vec<EventModel>>;
}

/// `DateProvider` over the system clock and a fixed configuration snapshot.
///
/// The configuration is supplied by whoever detects the platform locale
/// (the CLI does this with `iana-time-zone`); re-creating the provider is
/// how a locale change is modeled.
#[derive(Debug, Clone)]
pub struct SystemDateProvider {
    config: CalendarConfig,
}

impl SystemDateProvider {
    pub fn new(config: CalendarConfig) -> Self {
        SystemDateProvider { config }
    }
}

impl DateProvider for SystemDateProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn configuration(&self) -> CalendarConfig {
        self.config.clone()
    }
}
