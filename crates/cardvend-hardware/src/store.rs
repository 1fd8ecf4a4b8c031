//! Durable configuration store implementations.
//!
//! The kiosk persists its whole configuration record synchronously on every
//! mutation, so the store is written often and must never leave a torn
//! record behind a power cut.

use crate::error::{HardwareError, Result};
use crate::traits::ConfigStore;
use cardvend_core::KioskConfig;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// JSON-file backed configuration store.
///
/// Saves go through a temporary file, an fsync and an atomic rename: a
/// reader only ever sees the previous complete record or the new complete
/// record.
///
/// # Example
///
/// ```no_run
/// use cardvend_hardware::store::JsonFileStore;
/// use cardvend_hardware::traits::ConfigStore;
/// use cardvend_core::KioskConfig;
///
/// # fn main() -> cardvend_hardware::Result<()> {
/// let mut store = JsonFileStore::new("/var/lib/cardvend/config.json")?;
///
/// let config = store.load()?.unwrap_or_default();
/// store.save(&config)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store over the given file path, creating parent directories
    /// as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if a missing parent directory cannot be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                HardwareError::initialization_failed(format!(
                    "Failed to create config directory: {}",
                    e
                ))
            })?;
        }

        Ok(Self { path })
    }

    /// The file path this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&mut self) -> Result<Option<KioskConfig>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let config = serde_json::from_str(&raw)
            .map_err(|e| HardwareError::invalid_data(format!("Malformed config record: {}", e)))?;

        Ok(Some(config))
    }

    fn save(&mut self, config: &KioskConfig) -> Result<()> {
        let raw = serde_json::to_string_pretty(config)
            .map_err(|e| HardwareError::invalid_data(format!("Unwritable config record: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(raw.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "Config record saved");
        Ok(())
    }
}

/// In-memory configuration store (primarily for testing).
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Option<KioskConfig>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a record.
    pub fn with_record(config: KioskConfig) -> Self {
        Self {
            record: Some(config),
        }
    }
}

impl ConfigStore for MemoryStore {
    fn load(&mut self) -> Result<Option<KioskConfig>> {
        Ok(self.record.clone())
    }

    fn save(&mut self, config: &KioskConfig) -> Result<()> {
        self.record = Some(config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("config.json")).unwrap();

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("config.json")).unwrap();

        let mut config = KioskConfig::default();
        config.card_price = 10_000;
        config.balance = 2_000;
        config.total_cards = 42;

        store.save(&config).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut store = JsonFileStore::new(path.clone()).unwrap();

        store.save(&KioskConfig::default()).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_save_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("config.json")).unwrap();

        let mut config = KioskConfig::default();
        store.save(&config).unwrap();

        config.balance = 7_000;
        store.save(&config).unwrap();

        assert_eq!(store.load().unwrap().unwrap().balance, 7_000);
    }

    #[test]
    fn test_malformed_record_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let mut store = JsonFileStore::new(path).unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, HardwareError::InvalidData { .. }));
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deep/nested/config.json");

        let mut store = JsonFileStore::new(nested.clone()).unwrap();
        store.save(&KioskConfig::default()).unwrap();

        assert!(nested.exists());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());

        let mut config = KioskConfig::default();
        config.card_price = 5_000;
        store.save(&config).unwrap();

        assert_eq!(store.load().unwrap().unwrap(), config);
    }
}
