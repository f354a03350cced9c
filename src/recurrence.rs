//! Expands repeating chores into dated occurrences and removes the future
//! part of a series.

use std::sync::Arc;

use chrono::{Duration, Months, NaiveDate};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::chores::ChoreStore;
use crate::error::Result;
use crate::models::{fields, parse_day, weekday_label, Chore, GroupKey, RepetitionTime, DAY_FORMAT};
use crate::storage::{chores_collection, DocumentStore};

/// Days after `start`, up to and including one year after it, on which a
/// chore repeating every `repetition` falls. `start` itself is excluded.
///
/// Monthly and yearly steps are counted from `start` so a chore on the 31st
/// lands on the last day of shorter months without drifting.
pub fn occurrence_dates(start: NaiveDate, repetition: &RepetitionTime) -> Vec<NaiveDate> {
    let Some(end) = start.checked_add_months(Months::new(12)) else {
        return Vec::new();
    };
    let step = |n: u32| -> Option<NaiveDate> {
        match repetition {
            RepetitionTime::Daily => start.checked_add_signed(Duration::days(n as i64)),
            RepetitionTime::Weekly => start.checked_add_signed(Duration::weeks(n as i64)),
            RepetitionTime::Monthly => start.checked_add_months(Months::new(n)),
            RepetitionTime::Yearly => start.checked_add_months(Months::new(12 * n)),
            RepetitionTime::None | RepetitionTime::Unrecognized(_) => None,
        }
    };

    let mut dates = Vec::new();
    let mut n = 1;
    while let Some(date) = step(n) {
        if date > end {
            break;
        }
        dates.push(date);
        n += 1;
    }
    dates
}

/// Builds the concrete occurrence of `template` on `date`.
fn occurrence(template: &Chore, date: NaiveDate, series_id: &str) -> Chore {
    Chore {
        id: String::new(),
        date: date.format(DAY_FORMAT).to_string(),
        day: weekday_label(date),
        completed: false,
        completed_by: None,
        completed_at: None,
        votes: 0,
        voters: Vec::new(),
        proposal: false,
        series_id: series_id.to_string(),
        ..template.clone()
    }
}

#[derive(Clone)]
pub struct RecurrenceGenerator {
    backend: Arc<dyn DocumentStore>,
    chores: ChoreStore,
}

impl RecurrenceGenerator {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        let chores = ChoreStore::new(Arc::clone(&backend));
        Self { backend, chores }
    }

    /// Writes one chore per repetition step after `chore.date`, all sharing
    /// `series_id`. Non-repeating chores and unparseable dates produce
    /// nothing.
    ///
    /// Every occurrence is a separate write; a daily chore yields 365
    /// documents.
    pub fn generate(&self, chore: &Chore, group: GroupKey, series_id: &str) -> Result<Vec<Chore>> {
        if !chore.repetition.is_repeating() {
            return Ok(Vec::new());
        }
        if let RepetitionTime::Unrecognized(other) = &chore.repetition {
            warn!(chore = %chore.id, repetition = %other, "unknown repetition, nothing generated");
            return Ok(Vec::new());
        }
        let start = match parse_day(&chore.date) {
            Ok(d) => d,
            Err(e) => {
                warn!(chore = %chore.id, error = %e, "cannot generate series");
                return Ok(Vec::new());
            }
        };

        let mut created = Vec::new();
        for date in occurrence_dates(start, &chore.repetition) {
            created.push(self.chores.create(&occurrence(chore, date, series_id), group)?);
        }
        info!(
            group = %group,
            series = series_id,
            repetition = %chore.repetition,
            count = created.len(),
            "series generated"
        );
        Ok(created)
    }

    /// Deletes every chore of `series_id` dated on or after `from_date`, in
    /// one batch. Returns how many were removed.
    ///
    /// Dates are compared as strings, which orders correctly only because
    /// they are zero-padded `yyyy-MM-dd`; `from_date` is checked for that
    /// shape first.
    pub fn delete_future_occurrences(&self, series_id: &str, from_date: &str, group: GroupKey) -> Result<usize> {
        if series_id.is_empty() {
            return Ok(0);
        }
        parse_day(from_date)?;

        let collection = chores_collection(group);
        let doomed: Vec<String> = self
            .backend
            .query_eq(&collection, fields::SERIES_ID, &Value::from(series_id))?
            .into_iter()
            .filter(|(_, doc)| {
                doc.get(fields::DATE)
                    .and_then(Value::as_str)
                    .is_some_and(|date| date >= from_date)
            })
            .map(|(id, _)| id)
            .collect();

        let removed = self.backend.delete_batch(&collection, &doomed)?;
        debug!(group = %group, series = series_id, from = from_date, removed, "future occurrences deleted");
        Ok(removed)
    }
}
