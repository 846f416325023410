//! Serde helpers for chrono date types plus the timestamp formats shared by
//! every table write.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Deserializer};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Row timestamp with microseconds. created_at ordering decides which bill
/// counts as the latest, so second resolution is not enough.
pub fn now_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Business date with the current wall-clock time. Reports match on the
/// leading "YYYY-MM-DD" prefix.
pub fn date_stamp(date: NaiveDate) -> String {
    format!("{} {}", date.format(DATE_FORMAT), Local::now().format("%H:%M:%S"))
}

/// Deserialize NaiveDate from "YYYY-MM-DD" string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(serde::de::Error::custom)
}
