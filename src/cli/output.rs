//! Console output shared by every command
//!
//! All user-facing lines go to stderr with a dimmed `[HH:MM:SS]` prefix.

use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// `[HH:MM:SS]` in the time's own zone
pub fn timestamp_at<Tz>(time: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    time.format("[%H:%M:%S]").to_string()
}

fn line(message: impl AsRef<str>) {
    eprintln!(
        "{} {}",
        timestamp_at(&Local::now()).dimmed(),
        message.as_ref()
    );
}

/// Opening line of every command
pub fn banner(command: &str) {
    line(format!(
        "{} {} {}",
        "kiln".bold().cyan(),
        command.bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    ));
}

pub fn info(message: impl AsRef<str>) {
    line(format!("{} {}", "→".blue(), message.as_ref()));
}

pub fn success(message: impl AsRef<str>) {
    line(format!("{} {}", "✓".green().bold(), message.as_ref()));
}

pub fn failure(message: impl AsRef<str>) {
    line(format!("{} {}", "✗".red().bold(), message.as_ref()));
}

pub fn warning(message: impl AsRef<str>) {
    line(format!(
        "{} {}",
        " WARNING ".black().on_yellow(),
        message.as_ref().yellow()
    ));
}

/// Print a multi-line block (a code frame) indented under the previous line
pub fn frame(text: &str) {
    for row in text.lines() {
        eprintln!("    {}", row.dimmed());
    }
}

/// Warn that `@babel/runtime` is missing from the runtime dependencies
pub fn runtime_helper_warning() {
    warning(
        "@babel/runtime is not a dependency of this package. Compiled output \
         imports its helpers; add it with `npm install @babel/runtime`.",
    );
}

/// Check if running in a CI environment
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS", "BUILD_NUMBER"]
        .iter()
        .any(|key| std::env::var_os(key).is_some())
}

/// Spinner shown while long tasks run; silent when stderr is not a terminal
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = if console::user_attended_stderr() && !is_ci() {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["◐", "◓", "◑", "◒", "●"]);
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    /// Remove the spinner so result lines print cleanly
    pub fn clear(self) {
        self.pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_timestamp_uses_local_offset() {
        let noon_utc = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        assert_eq!(timestamp_at(&noon_utc), "[12:00:00]");
        assert_eq!(timestamp_at(&noon_utc.with_timezone(&plus_two)), "[14:00:00]");
    }

    #[test]
    fn test_timestamp_pads_fields() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 3, 7, 9).unwrap();
        assert_eq!(timestamp_at(&time), "[03:07:09]");
    }
}
