//! Event calendar files.
//!
//! JSON: an array of entries, each with a `name`, either a single `date` or a
//! list of `dates`, and optional `lower_window` / `upper_window` (days,
//! default 0):
//!
//! ```json
//! [
//!   {"name": "lockdown", "dates": ["2020-03-15", "2020-12-15"], "upper_window": 1},
//!   {"name": "christmas", "date": "2020-12-25", "lower_window": -1, "upper_window": 1}
//! ]
//! ```
//!
//! CSV: `name,date,lower_window,upper_window` with the window columns optional.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::domain::Event;
use crate::error::{ForecastError, Result};
use crate::io::prepare::parse_date;
use crate::models::EventCalendar;

#[derive(Debug, Deserialize)]
struct EventEntry {
    name: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    dates: Vec<String>,
    #[serde(default)]
    lower_window: Option<i64>,
    #[serde(default)]
    upper_window: Option<i64>,
}

impl EventEntry {
    fn into_events(self) -> Result<Vec<Event>> {
        let raw: Vec<String> = self.date.into_iter().chain(self.dates).collect();
        if raw.is_empty() {
            return Err(ForecastError::InvalidConfig(format!("event '{}' has no date", self.name)));
        }
        let (lower, upper) = (self.lower_window.unwrap_or(0), self.upper_window.unwrap_or(0));
        raw.iter()
            .map(|s| {
                let date = parse_date(s).ok_or_else(|| {
                    ForecastError::InvalidConfig(format!("event '{}': unparseable date '{s}'", self.name))
                })?;
                Ok(Event::new(self.name.clone(), date).with_window(lower, upper))
            })
            .collect()
    }
}

/// Load a calendar, choosing the parser from the file extension (`.csv`,
/// anything else is read as JSON).
pub fn load_calendar(path: &Path) -> Result<EventCalendar> {
    let content = fs::read_to_string(path)
        .map_err(|e| ForecastError::io(format!("failed to read events file '{}'", path.display()), e))?;
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let calendar = if is_csv { parse_csv(&content)? } else { parse_json(&content)? };
    info!(
        path = %path.display(),
        events = calendar.len(),
        names = calendar.names().len(),
        "event calendar loaded"
    );
    Ok(calendar)
}

pub fn parse_json(content: &str) -> Result<EventCalendar> {
    let entries: Vec<EventEntry> = serde_json::from_str(content)
        .map_err(|e| ForecastError::InvalidConfig(format!("invalid events JSON: {e}")))?;
    build(entries)
}

pub fn parse_csv(content: &str) -> Result<EventCalendar> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let entries = reader
        .deserialize::<EventEntry>()
        .enumerate()
        .map(|(idx, row)| {
            row.map_err(|e| ForecastError::InvalidConfig(format!("events CSV line {}: {e}", idx + 2)))
        })
        .collect::<Result<Vec<_>>>()?;
    build(entries)
}

fn build(entries: Vec<EventEntry>) -> Result<EventCalendar> {
    let mut calendar = EventCalendar::new();
    for entry in entries {
        for event in entry.into_events()? {
            calendar.register(event)?;
        }
    }
    Ok(calendar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, day).unwrap()
    }

    #[test]
    fn json_supports_single_and_multiple_dates() {
        let json = r#"[
            {"name": "lockdown", "dates": ["2020-03-15", "12/15/20"], "upper_window": 1},
            {"name": "christmas", "date": "2020-12-25", "lower_window": -1, "upper_window": 1}
        ]"#;
        let cal = parse_json(json).unwrap();
        assert_eq!(cal.len(), 3);
        assert_eq!(cal.names(), vec!["christmas".to_string(), "lockdown".to_string()]);
        assert!(cal.effect_at(d(3, 16)).contains("lockdown"));
        assert!(cal.effect_at(d(12, 24)).contains("christmas"));
    }

    #[test]
    fn csv_windows_default_to_zero() {
        let csv = "name,date,lower_window,upper_window\nholi,2020-03-10,0,1\ndiwali,2020-11-14,,\n";
        let cal = parse_csv(csv).unwrap();
        assert_eq!(cal.len(), 2);
        let diwali = cal.events().iter().find(|e| e.name == "diwali").unwrap();
        assert_eq!((diwali.lower_window, diwali.upper_window), (0, 0));
    }

    #[test]
    fn inverted_window_is_invalid_config() {
        let err = parse_json(r#"[{"name": "x", "date": "2020-03-01", "lower_window": 2}]"#).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidConfig(_)));
    }

    #[test]
    fn oversized_window_is_invalid_config() {
        let err = parse_json(r#"[{"name": "x", "date": "2020-03-01", "upper_window": 9000000000000}]"#).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidConfig(_)));
    }

    #[test]
    fn entry_without_date_is_rejected() {
        let err = parse_json(r#"[{"name": "x"}]"#).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidConfig(_)));
    }

    #[test]
    fn load_picks_parser_from_extension() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "name,date\nholi,2020-03-10\n").unwrap();
        let cal = load_calendar(file.path()).unwrap();
        assert_eq!(cal.names(), vec!["holi".to_string()]);
    }
}
