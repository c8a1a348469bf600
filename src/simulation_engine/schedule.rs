use crate::error::EngineError;
use crate::shared_data::ScheduleEntry;
use crate::trains::TrainId;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Read-only departure feed polled by the engine once per tick.
pub trait ScheduleSource: Send + Sync {
    /// All entries, ordered by departure time.
    fn load(&self) -> Result<Vec<ScheduleEntry>, EngineError>;
}

/// Schedule held in memory, editable while the simulation runs.
#[derive(Debug, Clone, Default)]
pub struct InMemorySchedule {
    entries: Arc<Mutex<Vec<ScheduleEntry>>>,
}

impl InMemorySchedule {
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        let schedule = Self::default();
        for entry in entries {
            schedule.upsert(entry);
        }
        schedule
    }

    /// Inserts the entry, replacing any entry with the same id.
    pub fn upsert(&self, entry: ScheduleEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|e| e.id != entry.id);
        entries.push(entry);
        entries.sort_by_key(|e| e.departure_time_seconds);
    }

    /// Returns false if no entry had this id.
    pub fn remove(&self, id: &TrainId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| &e.id != id);
        entries.len() != before
    }
}

impl ScheduleSource for InMemorySchedule {
    fn load(&self) -> Result<Vec<ScheduleEntry>, EngineError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// Schedule read from a CSV file with the columns of `ScheduleEntry`.
/// The file is re-read on every load so edits are picked up while running.
#[derive(Debug, Clone)]
pub struct CsvSchedule {
    path: PathBuf,
}

impl CsvSchedule {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ScheduleSource for CsvSchedule {
    fn load(&self) -> Result<Vec<ScheduleEntry>, EngineError> {
        let mut rdr = csv::Reader::from_path(&self.path)
            .map_err(|e| EngineError::Schedule(format!("{}: {}", self.path.display(), e)))?;
        let mut entries = Vec::new();
        for result in rdr.deserialize() {
            let entry: ScheduleEntry =
                result.map_err(|e| EngineError::Schedule(e.to_string()))?;
            entries.push(entry);
        }
        entries.sort_by_key(|e| e.departure_time_seconds);
        Ok(entries)
    }
}
