//! Core engine for the glance month-view calendar.
//!
//! This crate turns a reference date, a locale configuration and a set of
//! enabled calendars into the per-day view model a month view renders:
//! - `grid` builds the padded day grid for a month
//! - `week` derives weekday headers and week numbers
//! - `agenda` groups a source's events by calendar day
//! - `engine` merges everything into reactive [`DayCell`] snapshots
//! - `source` provides a directory-of-ICS-files [`CalendarSource`]
//!
//! Collaborators (clock, locale, event data) are injected through the
//! traits in `provider`; nothing reads ambient global state.

pub mod agenda;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod model;
pub mod provider;
pub mod signal;
pub mod source;
pub mod week;

pub use config::{CalendarConfig, WeekNumbering};
pub use engine::{CalendarEngine, DayCell};
pub use error::{GlanceError, GlanceResult};
pub use grid::{GridSlot, GridSpan, build_grid};
pub use model::{CalendarModel, EventModel, EventTime};
pub use provider::{CalendarSource, DateProvider, SystemDateProvider};
pub use signal::{Signal, Subscription, SubscriptionSet};
pub use source::DirectorySource;
pub use week::{WeekDay, WeekNumber};
