//! Durable-storage naming convention.
//!
//! Results are grouped into one folder per event day and numbered within
//! the folder:
//!
//! ```text
//! Event_day_05_03_25/result_001.jpg
//! Event_day_05_03_25/result_002.jpg
//! ```
//!
//! The next number is the highest existing number plus one, so gaps left by
//! deleted files are never refilled.

use chrono::{Datelike, NaiveDate};
use regex::Regex;

/// Filename prefix used for try-on results.
pub const RESULT_PREFIX: &str = "result";

/// Daily folder for the given date: `Event_day_{dd}_{mm}_{yy}`.
///
/// ```
/// use chrono::NaiveDate;
/// use fitbooth_core::naming::daily_folder_name;
///
/// let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
/// assert_eq!(daily_folder_name(date), "Event_day_05_03_25");
/// ```
pub fn daily_folder_name(date: NaiveDate) -> String {
    format!(
        "Event_day_{:02}_{:02}_{:02}",
        date.day(),
        date.month(),
        date.year().rem_euclid(100)
    )
}

/// Daily folder for today in the kiosk's local timezone.
pub fn today_folder_name() -> String {
    daily_folder_name(chrono::Local::now().date_naive())
}

/// Next sequence number for `prefix` given the file names already in the
/// folder. Matching is case-insensitive on `{prefix}_{digits}.` and ignores
/// everything else. An empty folder yields `1`.
pub fn next_sequence<'a, I>(names: I, prefix: &str) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    let pattern = format!(r"(?i)^{}_(\d+)\.", regex::escape(prefix));
    let Ok(re) = Regex::new(&pattern) else {
        return 1;
    };

    let max = names
        .into_iter()
        .filter_map(|name| re.captures(name))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .max()
        .unwrap_or(0);

    max.saturating_add(1)
}

/// `{prefix}_{sequence:03}.jpg`
pub fn sequenced_filename(prefix: &str, sequence: u32) -> String {
    format!("{prefix}_{sequence:03}.jpg")
}

/// Name used once when the sequenced name collides with an existing object:
/// `{prefix}_{sequence:03}_{unix_millis}.jpg`.
pub fn collision_filename(prefix: &str, sequence: u32, unix_millis: i64) -> String {
    format!("{prefix}_{sequence:03}_{unix_millis}.jpg")
}

/// Join a folder and a file name into an object path.
pub fn object_path(folder: &str, file_name: &str) -> String {
    if folder.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", folder.trim_end_matches('/'), file_name)
    }
}
