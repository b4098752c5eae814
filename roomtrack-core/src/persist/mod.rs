//! Persistence adapter: reads and migrates stored data, writes the envelope,
//! and debounces write-back through [`SaveScheduler`].
mod memory;
mod scheduler;

pub use memory::{MemoryStorage, MemoryStorageError};
pub use scheduler::SaveScheduler;

use crate::StorageBackend;
use crate::catalog::SortPreference;
use crate::constants::{
    DATA_KEY, LEGACY_CURRENT_DAY_KEY, LEGACY_DATA_KEY, LEGACY_SORT_KEY, PREFS_KEY,
};
use crate::error::{ParseError, PersistenceError};
use crate::migrate::{Migrated, decode_stored, migrate_with_legacy_day};
use crate::model::{Envelope, Preferences, TrackerState};

/// Everything recovered from storage by a single read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub migrated: Migrated,
    pub preferences: Preferences,
    /// Key the data was read from, if any was present.
    pub source_key: Option<&'static str>,
    /// Legacy keys that were read and should be deleted once the migrated
    /// state has been written.
    pub consumed_keys: Vec<&'static str>,
}

impl LoadOutcome {
    /// Whether storage must be rewritten to reach the canonical layout.
    #[must_use]
    pub fn needs_write_back(&self) -> bool {
        self.migrated.was_migrated || !self.consumed_keys.is_empty()
    }
}

fn parse_preferences(raw: Option<&str>) -> Preferences {
    let Some(raw) = raw else {
        return Preferences::default();
    };
    serde_json::from_str(raw).unwrap_or_else(|err| {
        log::warn!("stored preferences unreadable ({err}); using defaults");
        Preferences::default()
    })
}

#[derive(Debug)]
pub struct PersistenceAdapter<B> {
    backend: B,
    scheduler: SaveScheduler,
}

impl<B: StorageBackend> PersistenceAdapter<B> {
    pub fn new(backend: B) -> Self {
        Self::with_scheduler(backend, SaveScheduler::default())
    }

    pub const fn with_scheduler(backend: B, scheduler: SaveScheduler) -> Self {
        Self { backend, scheduler }
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub const fn scheduler(&self) -> &SaveScheduler {
        &self.scheduler
    }

    /// Read every relevant key and run the migrator.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the backend cannot be read or the stored
    /// payload is not decodable JSON.
    pub fn read(&self) -> Result<LoadOutcome, ParseError> {
        let mut consumed_keys = Vec::new();
        let (source_key, raw) = match self.get(DATA_KEY)? {
            Some(raw) => (Some(DATA_KEY), Some(raw)),
            None => match self.get(LEGACY_DATA_KEY)? {
                Some(raw) => {
                    consumed_keys.push(LEGACY_DATA_KEY);
                    (Some(LEGACY_DATA_KEY), Some(raw))
                }
                None => (None, None),
            },
        };

        let legacy_day = self.get(LEGACY_CURRENT_DAY_KEY)?;
        if legacy_day.is_some() {
            consumed_keys.push(LEGACY_CURRENT_DAY_KEY);
        }

        let migrated = match (source_key, raw) {
            (Some(key), Some(raw)) => {
                let (value, double_encoded) = decode_stored(key, &raw)?;
                let mut migrated = migrate_with_legacy_day(&value, legacy_day.as_deref());
                migrated.was_migrated |= double_encoded;
                migrated
            }
            _ => Migrated::absent(),
        };

        let stored_prefs = self.get(PREFS_KEY)?;
        let has_prefs = stored_prefs.is_some();
        let mut preferences = parse_preferences(stored_prefs.as_deref());
        if let Some(raw) = self.get(LEGACY_SORT_KEY)? {
            consumed_keys.push(LEGACY_SORT_KEY);
            match SortPreference::from_legacy(&raw) {
                Some(sort) if !has_prefs => preferences.sort = sort,
                Some(_) => {}
                None => log::warn!("ignoring unknown legacy sort preference `{raw}`"),
            }
        }

        Ok(LoadOutcome {
            migrated,
            preferences,
            source_key,
            consumed_keys,
        })
    }

    fn get(&self, key: &str) -> Result<Option<String>, ParseError> {
        self.backend
            .get_item(key)
            .map_err(|err| ParseError::Backend(err.to_string()))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.backend.set_item(key, value).map_err(|err| {
            if B::is_quota_exceeded(&err) {
                PersistenceError::QuotaExceeded(key.to_string())
            } else {
                PersistenceError::Backend {
                    key: key.to_string(),
                    message: err.to_string(),
                }
            }
        })
    }

    /// Serialize `state` (without empty cells) into the envelope key.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if serialization or the backend write fails.
    pub fn write(&mut self, state: &TrackerState) -> Result<(), PersistenceError> {
        let result = serde_json::to_string(&Envelope::wrap(state))
            .map_err(PersistenceError::from)
            .and_then(|json| self.put(DATA_KEY, &json));
        self.scheduler.record_result(result.is_ok());
        if let Err(err) = &result {
            log::error!("saving tracker state failed: {err}");
        }
        result
    }

    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the backend write fails.
    pub fn write_preferences(&self, preferences: Preferences) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(&preferences)?;
        self.put(PREFS_KEY, &json)
    }

    /// Delete keys whose contents now live in the envelope.
    pub fn remove_keys(&self, keys: &[&'static str]) {
        for key in keys {
            if let Err(err) = self.backend.remove_item(key) {
                log::warn!("could not remove storage key `{key}`: {err}");
            } else {
                log::info!("removed storage key `{key}`");
            }
        }
    }

    /// Drop any pending or failed save; the in-memory state it belonged to is gone.
    pub fn discard_pending(&mut self) {
        self.scheduler.reset();
    }

    /// Remove every key the tracker owns or has ever owned.
    pub fn wipe(&mut self) {
        self.scheduler.reset();
        self.remove_keys(&[
            DATA_KEY,
            PREFS_KEY,
            LEGACY_DATA_KEY,
            LEGACY_CURRENT_DAY_KEY,
            LEGACY_SORT_KEY,
        ]);
    }

    /// Note a settled mutation; the write happens once the debounce window
    /// passes without another request.
    pub fn request_save(&mut self, now_ms: u64) -> u64 {
        self.scheduler.request(now_ms)
    }

    /// Write `state` if the debounce deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the due write fails.
    pub fn save_if_due(&mut self, state: &TrackerState, now_ms: u64) -> Result<bool, PersistenceError> {
        if self.scheduler.take_due(now_ms) {
            self.write(state).map(|()| true)
        } else {
            Ok(false)
        }
    }

    /// Cancel any pending debounced write and write `state` right away.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the write fails.
    pub fn save_now(&mut self, state: &TrackerState) -> Result<(), PersistenceError> {
        if self.scheduler.cancel() {
            log::debug!("pending debounced save superseded by immediate save");
        }
        self.write(state)
    }

    /// Write now if a debounced save is pending or the last one failed.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the write fails.
    pub fn flush(&mut self, state: &TrackerState) -> Result<bool, PersistenceError> {
        if self.scheduler.is_settled() {
            return Ok(false);
        }
        self.save_now(state).map(|()| true)
    }
}
