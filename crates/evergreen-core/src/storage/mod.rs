mod config;

pub use config::{
    Config, GrowthSettings, PlanBudget, PomodoroSettings, SessionSettings, StorageSettings,
    TaskSettings, ThresholdStrategy,
};

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::PersistenceError;
use crate::ledger::LedgerData;

pub const DATA_FILE_NAME: &str = "evergreen_data.json";

/// Returns `~/.config/evergreen[-dev]/` based on EVERGREEN_ENV.
///
/// Set EVERGREEN_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("EVERGREEN_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("evergreen-dev")
    } else {
        base_dir.join("evergreen")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Durable home for the ledger snapshot.
///
/// Implementations are called from background writer threads.
pub trait LedgerStore: Send + Sync {
    fn save(&self, data: &LedgerData) -> Result<(), PersistenceError>;

    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<LedgerData>, PersistenceError>;
}

/// Pretty-printed JSON file, replaced atomically on each save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/evergreen_data.json`.
    pub fn default_location() -> Result<Self, PersistenceError> {
        let dir = data_dir().map_err(|source| PersistenceError::Io {
            path: PathBuf::from("~/.config/evergreen"),
            source,
        })?;
        Ok(Self::at(dir.join(DATA_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl LedgerStore for JsonFileStore {
    fn save(&self, data: &LedgerData) -> Result<(), PersistenceError> {
        let content = serde_json::to_string_pretty(data)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        tracing::debug!(path = %self.path.display(), "ledger saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<LedgerData>, PersistenceError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}

/// In-memory slot. Used by tests and ephemeral CLI runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<MemorySlot>,
    failing: bool,
}

#[derive(Debug, Default)]
struct MemorySlot {
    data: Option<LedgerData>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every save and load fails.
    pub fn failing() -> Self {
        Self {
            slot: Mutex::default(),
            failing: true,
        }
    }

    /// Seed the slot without counting a save.
    pub fn put(&self, data: LedgerData) {
        self.lock().data = Some(data);
    }

    pub fn snapshot(&self) -> Option<LedgerData> {
        self.lock().data.clone()
    }

    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LedgerStore for MemoryStore {
    fn save(&self, data: &LedgerData) -> Result<(), PersistenceError> {
        if self.failing {
            return Err(PersistenceError::Unavailable("memory store set to fail".into()));
        }
        let mut slot = self.lock();
        slot.data = Some(data.clone());
        slot.saves += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<LedgerData>, PersistenceError> {
        if self.failing {
            return Err(PersistenceError::Unavailable("memory store set to fail".into()));
        }
        Ok(self.lock().data.clone())
    }
}
