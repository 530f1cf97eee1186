mod render;
mod settings;

use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use chrono_tz::Tz;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use glance_core::{
    CalendarConfig, CalendarEngine, DirectorySource, SystemDateProvider, WeekNumbering,
    config::weekday_from_index,
};

use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "glance",
    version,
    about = "Month view over a directory of ICS calendars"
)]
struct Cli {
    /// Reference date (YYYY-MM-DD); defaults to today
    #[arg(short, long)]
    date: Option<String>,

    /// Calendar directory with one subdirectory per calendar
    #[arg(long)]
    calendar_dir: Option<PathBuf>,

    /// Only show this calendar (repeatable)
    #[arg(short, long = "calendar")]
    calendars: Vec<String>,

    /// First weekday, 1 = Sunday .. 7 = Saturday
    #[arg(long)]
    first_weekday: Option<u32>,

    /// IANA time zone name, e.g. Europe/Berlin
    #[arg(long)]
    timezone: Option<String>,

    /// Show the week-number column
    #[arg(short = 'w', long)]
    weeks: bool,

    /// Use ISO-8601 week numbering regardless of settings
    #[arg(long)]
    iso_weeks: bool,

    /// Settings file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    quiet: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let settings = Settings::load(cli.config.as_deref())?;
    let config = resolve_config(&cli, &settings)?;
    debug!(?config, "resolved calendar configuration");

    let calendar_dir = cli
        .calendar_dir
        .clone()
        .unwrap_or_else(|| settings.data_path());

    let provider = Rc::new(SystemDateProvider::new(config));
    let source = Rc::new(DirectorySource::new(calendar_dir));
    let engine = CalendarEngine::new(provider, source);

    if let Some(date) = &cli.date {
        let reference = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| anyhow!("Invalid date '{}'. Expected YYYY-MM-DD", date))?;
        engine.set_reference_date(reference);
    }

    let requested: Vec<String> = if cli.calendars.is_empty() {
        settings.calendars.clone()
    } else {
        cli.calendars.clone()
    };
    if !requested.is_empty() {
        let known = engine.enabled_calendars();
        for slug in &requested {
            if !known.contains(slug) {
                let available: Vec<&str> = known.iter().map(String::as_str).collect();
                anyhow::bail!(
                    "Calendar '{}' not found. Available: {}",
                    slug,
                    available.join(", ")
                );
            }
        }
        engine.set_enabled_calendars(requested.into_iter().collect::<BTreeSet<String>>());
    }

    let show_week_numbers = cli.weeks || settings.show_week_numbers;
    println!("{}", render::render_month(&engine, show_week_numbers));
    Ok(())
}

/// Merge settings-file values and CLI flags into the engine's
/// configuration snapshot. CLI wins over file, file over defaults.
fn resolve_config(cli: &Cli, settings: &Settings) -> Result<CalendarConfig> {
    let timezone = cli.timezone.as_ref().or(settings.timezone.as_ref());
    let time_zone: Tz = match timezone {
        Some(name) => name
            .parse()
            .map_err(|_| anyhow!("Unknown time zone '{}'", name))?,
        None => system_time_zone()?,
    };

    let mut config = CalendarConfig::default().with_time_zone(time_zone);

    if let Some(index) = cli.first_weekday.or(settings.first_weekday) {
        config.first_weekday = weekday_from_index(index);
    }

    if cli.iso_weeks {
        config.week_numbering = WeekNumbering::Iso8601;
    } else if let Some(identifier) = &settings.week_numbering {
        config.week_numbering = WeekNumbering::from_calendar_identifier(identifier);
    }

    Ok(config)
}

fn system_time_zone() -> Result<Tz> {
    let name = iana_time_zone::get_timezone().context("Could not detect system time zone")?;
    name.parse()
        .map_err(|_| anyhow!("System time zone '{}' is not a known IANA zone", name))
}

fn init_tracing(verbose: u8, quiet: u8) -> Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
        .map_err(|e| anyhow!("tracing init failed: {e}"))?;

    Ok(())
}
