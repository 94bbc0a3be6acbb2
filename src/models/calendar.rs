//! Calendar of named events (holidays, lockdowns) with effect windows.
//!
//! Every distinct event name becomes one 0/1 indicator column in the design
//! matrix. Several registrations may share a name (e.g. three lockdown dates);
//! they then share the column and the fitted coefficient. Column order is the
//! sorted name order, so fits do not depend on registration order.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::Event;
use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventCalendar {
    events: Vec<Event>,
}

impl EventCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a calendar from a list of events, validating each.
    pub fn from_events(events: impl IntoIterator<Item = Event>) -> Result<Self> {
        let mut calendar = Self::new();
        for event in events {
            calendar.register(event)?;
        }
        Ok(calendar)
    }

    /// Register an event. Events are immutable once registered.
    pub fn register(&mut self, event: Event) -> Result<()> {
        if event.name.trim().is_empty() {
            return Err(ForecastError::InvalidConfig("event name must not be empty".to_string()));
        }
        if event.lower_window > event.upper_window {
            return Err(ForecastError::InvalidConfig(format!(
                "event '{}' on {}: lower window {} exceeds upper window {}",
                event.name, event.date, event.lower_window, event.upper_window
            )));
        }
        if !event.window_in_range() {
            return Err(ForecastError::InvalidConfig(format!(
                "event '{}' on {}: window [{}, {}] leaves the supported date range",
                event.name, event.date, event.lower_window, event.upper_window
            )));
        }
        self.events.push(event);
        Ok(())
    }

    /// Names of every event whose window contains `date`.
    pub fn effect_at(&self, date: NaiveDate) -> BTreeSet<String> {
        self.events
            .iter()
            .filter(|e| e.covers(date))
            .map(|e| e.name.clone())
            .collect()
    }

    /// Distinct event names in column order.
    pub fn names(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|e| e.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Append one indicator per name in `names` (1.0 if any event with that
    /// name covers `date`).
    pub fn fill_indicators(&self, date: NaiveDate, names: &[String], out: &mut Vec<f64>) {
        let active = self.effect_at(date);
        out.extend(names.iter().map(|n| if active.contains(n) { 1.0 } else { 0.0 }));
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
