//! Study ledger.
//!
//! Per-date study hours, their derived total, task completion flags and a
//! coarse elapsed-minutes counter. Every mutation hands an immutable snapshot
//! to a background writer and returns without waiting for it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, ValidationError};
use crate::events::{Event, EventBus};
use crate::storage::LedgerStore;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Most hours a single date may hold.
pub const MAX_HOURS_PER_DATE: f64 = 24.0;

/// Persisted ledger document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerData {
    #[serde(default)]
    pub study_hours: BTreeMap<String, f64>,
    #[serde(default)]
    pub tasks_completed: BTreeMap<String, bool>,
    /// Sum of `study_hours`. Always recomputed, never set directly.
    #[serde(default)]
    pub total_hours: f64,
}

impl LedgerData {
    fn recompute_total(&mut self) {
        self.total_hours = self.study_hours.values().sum();
    }
}

/// Handle to an in-flight background save.
///
/// Dropping it detaches the writer.
#[derive(Debug)]
pub struct PendingSave {
    handle: Option<JoinHandle<Result<(), PersistenceError>>>,
    spawn_error: Option<PersistenceError>,
}

impl PendingSave {
    /// Block until the write has landed.
    pub fn wait(self) -> Result<(), PersistenceError> {
        if let Some(err) = self.spawn_error {
            return Err(err);
        }
        match self.handle {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(PersistenceError::WriterPanicked)),
            None => Ok(()),
        }
    }
}

pub struct StudyLedger {
    data: LedgerData,
    elapsed_minutes: u64,
    store: Arc<dyn LedgerStore>,
    /// Generation of the newest snapshot handed to a writer.
    generation: u64,
    /// Generation of the newest snapshot actually written.
    written: Arc<Mutex<u64>>,
    bus: EventBus,
}

impl StudyLedger {
    /// Empty ledger backed by `store`. Nothing is loaded.
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            data: LedgerData::default(),
            elapsed_minutes: 0,
            store,
            generation: 0,
            written: Arc::new(Mutex::new(0)),
            bus: EventBus::new(),
        }
    }

    /// Ledger with stored data merged over the defaults.
    ///
    /// Load failures are logged and the ledger starts empty.
    pub fn open(store: Arc<dyn LedgerStore>) -> Self {
        let mut ledger = Self::new(store);
        match ledger.store.load() {
            Ok(Some(stored)) => ledger.merge(stored),
            Ok(None) => tracing::debug!("no stored ledger; starting empty"),
            Err(e) => tracing::warn!(error = %e, "failed to load ledger; starting empty"),
        }
        ledger
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn data(&self) -> &LedgerData {
        &self.data
    }

    pub fn total_hours(&self) -> f64 {
        self.data.total_hours
    }

    pub fn hours_on(&self, date: &str) -> Option<f64> {
        self.data.study_hours.get(date).copied()
    }

    pub fn is_task_flagged(&self, task_id: &str) -> bool {
        self.data.tasks_completed.get(task_id).copied().unwrap_or(false)
    }

    pub fn elapsed_minutes(&self) -> u64 {
        self.elapsed_minutes
    }

    /// Minutes into the current hour, for an hourly progress bar.
    pub fn minute_progress(&self) -> u64 {
        self.elapsed_minutes % 60
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Overwrite the hours recorded for `date` (`YYYY-MM-DD`).
    pub fn set_hours(&mut self, date: &str, hours: f64) -> Result<PendingSave, ValidationError> {
        let date = parse_date(date)?;
        self.set_hours_on(date, hours)
    }

    pub fn set_hours_on(&mut self, date: NaiveDate, hours: f64) -> Result<PendingSave, ValidationError> {
        validate_hours(hours)?;
        let key = date.format(DATE_FORMAT).to_string();
        tracing::debug!(date = %key, hours, "study hours set");
        self.data.study_hours.insert(key, hours);
        self.data.recompute_total();
        Ok(self.commit())
    }

    /// Record an auxiliary completion flag for a task.
    pub fn complete_task_flag(&mut self, task_id: &str) -> PendingSave {
        self.data.tasks_completed.insert(task_id.to_string(), true);
        self.commit()
    }

    /// Called once per simulated minute by the clock driver.
    pub fn tick_minute(&mut self) {
        self.elapsed_minutes += 1;
    }

    pub fn reset_minutes(&mut self) {
        self.elapsed_minutes = 0;
    }

    /// Write the current snapshot on the calling thread.
    ///
    /// Any in-flight background save of an older snapshot is then skipped.
    pub fn flush(&mut self) -> Result<(), PersistenceError> {
        self.generation += 1;
        write_snapshot(self.store.as_ref(), &self.written, self.generation, &self.data)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn commit(&mut self) -> PendingSave {
        let pending = self.persist();
        self.bus.publish(Event::DataUpdated {
            data: self.data.clone(),
        });
        pending
    }

    fn persist(&mut self) -> PendingSave {
        self.generation += 1;
        let generation = self.generation;
        let snapshot = self.data.clone();
        let store = Arc::clone(&self.store);
        let written = Arc::clone(&self.written);

        let spawned = std::thread::Builder::new()
            .name("evergreen-ledger-save".into())
            .spawn(move || write_snapshot(store.as_ref(), &written, generation, &snapshot));

        match spawned {
            Ok(handle) => PendingSave {
                handle: Some(handle),
                spawn_error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to spawn ledger writer");
                PendingSave {
                    handle: None,
                    spawn_error: Some(PersistenceError::Unavailable(format!(
                        "cannot spawn writer: {e}"
                    ))),
                }
            }
        }
    }

    fn merge(&mut self, stored: LedgerData) {
        for (date, hours) in stored.study_hours {
            if parse_date(&date).is_err() || validate_hours(hours).is_err() {
                tracing::warn!(
                    target: "evergreen::invariant",
                    date = %date,
                    hours,
                    "skipping invalid stored study hours"
                );
                continue;
            }
            self.data.study_hours.insert(date, hours);
        }
        self.data.tasks_completed.extend(stored.tasks_completed);
        self.data.recompute_total();
        tracing::debug!(
            dates = self.data.study_hours.len(),
            total_hours = self.data.total_hours,
            "ledger loaded"
        );
    }
}

impl std::fmt::Debug for StudyLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudyLedger")
            .field("data", &self.data)
            .field("elapsed_minutes", &self.elapsed_minutes)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Runs on the writer thread. Older snapshots never overwrite newer ones.
fn write_snapshot(
    store: &dyn LedgerStore,
    written: &Mutex<u64>,
    generation: u64,
    snapshot: &LedgerData,
) -> Result<(), PersistenceError> {
    let mut last = written.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if generation <= *last {
        tracing::debug!(generation, last = *last, "skipping stale ledger snapshot");
        return Ok(());
    }
    match store.save(snapshot) {
        Ok(()) => {
            *last = generation;
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, generation, "failed to save ledger");
            Err(e)
        }
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        value: value.to_string(),
    })
}

pub(crate) fn validate_hours(hours: f64) -> Result<(), ValidationError> {
    if !hours.is_finite() {
        return Err(ValidationError::InvalidHours {
            hours,
            message: "must be a finite number".into(),
        });
    }
    if hours < 0.0 {
        return Err(ValidationError::InvalidHours {
            hours,
            message: "must not be negative".into(),
        });
    }
    if hours > MAX_HOURS_PER_DATE {
        return Err(ValidationError::InvalidHours {
            hours,
            message: format!("at most {MAX_HOURS_PER_DATE} hours fit in one day"),
        });
    }
    Ok(())
}
