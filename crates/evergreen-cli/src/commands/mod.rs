pub mod config;
pub mod growth;
pub mod study;
pub mod timer;

use std::sync::Arc;

use evergreen_core::error::Result;
use evergreen_core::{Config, JsonFileStore, LedgerStore};

/// The ledger file named by the config, or the default location.
pub fn ledger_store(config: &Config) -> Result<Arc<dyn LedgerStore>> {
    let store = match config.data_file() {
        Some(path) => JsonFileStore::at(path),
        None => JsonFileStore::default_location()?,
    };
    tracing::debug!(path = %store.path().display(), "using ledger file");
    Ok(Arc::new(store))
}

/// `YYYY-MM-DD` for the local date, or `date` if given.
pub fn date_or_today(date: Option<String>) -> String {
    date.unwrap_or_else(|| {
        chrono::Local::now()
            .date_naive()
            .format(evergreen_core::ledger::DATE_FORMAT)
            .to_string()
    })
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
