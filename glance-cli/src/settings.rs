//! User settings for the glance CLI.
//!
//! Loaded from `~/.config/glance/config.toml` (created with defaults on
//! first run). Command-line flags override file values, which override
//! the built-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;

static DEFAULT_CALENDAR_DIR: &str = "~/calendar";

fn default_calendar_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CALENDAR_DIR)
}

/// Settings file contents. Every field has a default so a missing or
/// empty file is valid.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Directory with one subdirectory per calendar.
    #[serde(default = "default_calendar_dir")]
    pub calendar_dir: PathBuf,

    /// Calendars to show; empty means all discovered calendars.
    #[serde(default)]
    pub calendars: Vec<String>,

    /// First weekday, 1 = Sunday .. 7 = Saturday.
    pub first_weekday: Option<u32>,

    /// IANA time zone name; defaults to the system zone.
    pub timezone: Option<String>,

    /// Week numbering calendar identifier ("iso8601" or "gregorian").
    pub week_numbering: Option<String>,

    /// Always show the week-number column.
    #[serde(default)]
    pub show_week_numbers: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            calendar_dir: default_calendar_dir(),
            calendars: Vec::new(),
            first_weekday: None,
            timezone: None,
            week_numbering: None,
            show_week_numbers: false,
        }
    }
}

impl Settings {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("glance");
        Ok(config_dir.join("config.toml"))
    }

    /// Load settings from `path`, or from the default location, creating
    /// a commented default file there on first run.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::config_path()?;
                if !path.exists() {
                    Self::write_default(&path)?;
                }
                path
            }
        };

        Config::builder()
            .add_source(File::from(path.clone()).required(false))
            .build()
            .with_context(|| format!("Invalid settings file {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }

    fn write_default(path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(
            path,
            "# glance settings\n\
             #\n\
             # calendar_dir = \"~/calendar\"\n\
             # calendars = [\"home\", \"work\"]\n\
             # first_weekday = 2      # 1 = Sunday .. 7 = Saturday\n\
             # timezone = \"Europe/Berlin\"\n\
             # week_numbering = \"iso8601\"\n\
             # show_week_numbers = false\n",
        )?;
        Ok(())
    }

    /// The calendar directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.calendar_dir.to_string_lossy()).into_owned();
        PathBuf::from(expanded)
    }
}
