//! Application-instance owner tying the store to its persistence.
use crate::StorageBackend;
use crate::aggregate::{Frequencies, compute_frequencies, compute_selections};
use crate::catalog::{RoomCatalog, SortPreference};
use crate::cell::CellId;
use crate::error::{PersistenceError, TrackerError, ValidationError};
use crate::migrate::Migrated;
use crate::model::{CellRecord, Preferences, TrackerState};
use crate::persist::{LoadOutcome, PersistenceAdapter, SaveScheduler};
use crate::store::RoomStore;
use crate::transfer::{ImportWarning, export_json, parse_import};

/// Where the tracker is in its load lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPhase {
    /// Constructed; nothing read yet. The caller shows a loading state.
    Unloaded,
    Ready,
    /// Stored data could not be parsed. Holds the error message.
    Failed(String),
}

/// One tracker per application instance.
///
/// Mutations are refused until [`Tracker::load`] succeeds, so defaults can
/// never overwrite data that has not been read yet. Ordinary mutations
/// schedule a debounced save; clearing, importing, resetting and a migrating
/// load write immediately.
///
/// A `PersistenceError` returned from a mutation means the change was applied
/// in memory but not written; the next save retries it.
#[derive(Debug)]
pub struct Tracker<B: StorageBackend> {
    store: RoomStore,
    persistence: PersistenceAdapter<B>,
    phase: LoadPhase,
    preferences: Preferences,
    last_load: Option<Migrated>,
}

impl<B: StorageBackend> Tracker<B> {
    pub fn new(backend: B) -> Self {
        Self::with_scheduler(backend, SaveScheduler::default())
    }

    pub fn with_scheduler(backend: B, scheduler: SaveScheduler) -> Self {
        Self {
            store: RoomStore::new(),
            persistence: PersistenceAdapter::with_scheduler(backend, scheduler),
            phase: LoadPhase::Unloaded,
            preferences: Preferences::default(),
            last_load: None,
        }
    }

    pub const fn phase(&self) -> &LoadPhase {
        &self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == LoadPhase::Ready
    }

    pub const fn store(&self) -> &RoomStore {
        &self.store
    }

    pub const fn state(&self) -> &TrackerState {
        self.store.state()
    }

    pub const fn backend(&self) -> &B {
        self.persistence.backend()
    }

    /// Result of the most recent successful load, for diagnostics.
    pub const fn last_load(&self) -> Option<&Migrated> {
        self.last_load.as_ref()
    }

    /// Read storage, migrate, and adopt the result. Returns `was_migrated`.
    ///
    /// When migration changed anything, or legacy keys were read, the
    /// canonical envelope is written immediately and the legacy keys are then
    /// deleted. A failed write-back keeps the legacy keys so nothing is lost.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Parse`] when stored data cannot be decoded; the
    /// tracker then stays unusable until [`Tracker::retry_load`] or
    /// [`Tracker::reset_storage`]. A [`TrackerError::Persistence`] means the
    /// load succeeded but the write-back did not.
    pub fn load(&mut self) -> Result<bool, TrackerError> {
        let outcome = match self.persistence.read() {
            Ok(outcome) => outcome,
            Err(err) => {
                log::error!("loading tracker data failed: {err}");
                self.phase = LoadPhase::Failed(err.to_string());
                return Err(err.into());
            }
        };
        let needs_write_back = outcome.needs_write_back();
        let LoadOutcome {
            migrated,
            preferences,
            source_key,
            consumed_keys,
        } = outcome;
        let was_migrated = migrated.was_migrated;
        log::info!(
            "loaded {} cells from {} ({:?})",
            migrated.state.room_data.len(),
            source_key.unwrap_or("nothing"),
            migrated.format
        );
        self.persistence.discard_pending();
        self.store.hydrate(migrated.state.clone());
        self.preferences = preferences;
        self.phase = LoadPhase::Ready;
        self.last_load = Some(migrated);

        if needs_write_back {
            self.persistence.save_now(self.store.state())?;
            if consumed_keys.contains(&crate::constants::LEGACY_SORT_KEY) {
                self.persistence.write_preferences(self.preferences)?;
            }
            self.persistence.remove_keys(&consumed_keys);
        }
        Ok(was_migrated)
    }

    /// Try loading again after a [`LoadPhase::Failed`] load. Once the
    /// tracker is ready this does nothing and returns `false`, so unsaved
    /// changes are never replaced by what storage holds.
    ///
    /// # Errors
    ///
    /// Same as [`Tracker::load`].
    pub fn retry_load(&mut self) -> Result<bool, TrackerError> {
        if self.is_ready() {
            log::debug!("retry_load ignored: tracker is already loaded");
            return Ok(false);
        }
        self.load()
    }

    /// Destructive recovery: wipe every tracker key and start from defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] if the fresh envelope cannot be written.
    pub fn reset_storage(&mut self) -> Result<(), TrackerError> {
        log::warn!("wiping tracker storage at user request");
        self.persistence.wipe();
        self.store.clear_all();
        self.preferences = Preferences::default();
        self.phase = LoadPhase::Ready;
        self.last_load = Some(Migrated::absent());
        self.persistence.save_now(self.store.state())?;
        Ok(())
    }

    fn ensure_ready(&self) -> Result<(), TrackerError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(TrackerError::NotLoaded)
        }
    }

    fn settle(&mut self, changed: bool, now_ms: u64) {
        if changed {
            self.persistence.request_save(now_ms);
        }
    }

    /// See [`RoomStore::upsert_day`]. Schedules a debounced save.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Validation`] for rejected input, or
    /// [`TrackerError::NotLoaded`] before the initial load.
    pub fn upsert_day(
        &mut self,
        cell_id: &str,
        day: u32,
        offered: &[String],
        selected: Option<&str>,
        letter: Option<&str>,
        now_ms: u64,
    ) -> Result<bool, TrackerError> {
        self.ensure_ready()?;
        let changed = self
            .store
            .upsert_day(cell_id, day, offered, selected, letter)?;
        self.settle(changed, now_ms);
        Ok(changed)
    }

    /// # Errors
    ///
    /// Returns [`TrackerError::NotLoaded`] before the initial load.
    pub fn delete_day(&mut self, cell_id: &str, day: u32, now_ms: u64) -> Result<bool, TrackerError> {
        self.ensure_ready()?;
        let changed = self.store.delete_day(cell_id, day);
        self.settle(changed, now_ms);
        Ok(changed)
    }

    /// # Errors
    ///
    /// Returns [`TrackerError::Validation`] for a fixed cell or invalid letter.
    pub fn set_letter(
        &mut self,
        cell_id: &str,
        letter: Option<&str>,
        now_ms: u64,
    ) -> Result<bool, TrackerError> {
        self.ensure_ready()?;
        let changed = self.store.set_letter(cell_id, letter)?;
        self.settle(changed, now_ms);
        Ok(changed)
    }

    /// # Errors
    ///
    /// Returns [`TrackerError::Validation`] when `day` is 0.
    pub fn set_current_day(&mut self, day: u32, now_ms: u64) -> Result<bool, TrackerError> {
        self.ensure_ready()?;
        let changed = self.store.set_current_day(day)?;
        self.settle(changed, now_ms);
        Ok(changed)
    }

    /// Reset to an empty tracker and write immediately.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] if the write fails; the in-memory
    /// state is cleared regardless.
    pub fn clear_all(&mut self) -> Result<(), TrackerError> {
        self.ensure_ready()?;
        self.store.clear_all();
        self.persistence.save_now(self.store.state())?;
        Ok(())
    }

    /// Replace all data with an import file's contents and write immediately.
    /// Rejected imports change nothing.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Validation`] for a malformed file, or
    /// [`TrackerError::Persistence`] if the accepted import cannot be written.
    pub fn import_json(&mut self, text: &str) -> Result<Option<ImportWarning>, TrackerError> {
        self.ensure_ready()?;
        let payload = parse_import(text)?;
        self.store
            .replace_all(payload.room_data, payload.current_day)?;
        log::info!(
            "imported {} cells at day {}",
            self.store.room_data().len(),
            self.store.current_day()
        );
        self.persistence.save_now(self.store.state())?;
        Ok(payload.warning)
    }

    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] if serialization fails.
    pub fn export_json(&self) -> Result<String, TrackerError> {
        export_json(self.store.state()).map_err(|err| PersistenceError::from(err).into())
    }

    /// Perform the debounced save if its window has passed.
    ///
    /// # Errors
    ///
    /// Returns the [`PersistenceError`] of a failed write.
    pub fn tick(&mut self, now_ms: u64) -> Result<bool, PersistenceError> {
        if !self.is_ready() {
            return Ok(false);
        }
        self.persistence.save_if_due(self.store.state(), now_ms)
    }

    /// Write any pending or previously failed save right away.
    ///
    /// # Errors
    ///
    /// Returns the [`PersistenceError`] of a failed write.
    pub fn flush(&mut self) -> Result<bool, PersistenceError> {
        if !self.is_ready() {
            return Ok(false);
        }
        self.persistence.flush(self.store.state())
    }

    /// Deadline of the pending debounced save, if one is armed.
    pub const fn save_deadline(&self) -> Option<u64> {
        self.persistence.scheduler().deadline()
    }

    /// No save is pending and the last write succeeded.
    pub const fn is_settled(&self) -> bool {
        self.persistence.scheduler().is_settled()
    }

    pub fn cell(&self, cell_id: &str) -> Option<&CellRecord> {
        self.store.cell(cell_id)
    }

    pub fn frequencies(&self, cell_id: &str) -> Option<Frequencies> {
        self.store.cell(cell_id).and_then(compute_frequencies)
    }

    pub fn selections(&self, cell_id: &str) -> Option<Frequencies> {
        self.store.cell(cell_id).and_then(compute_selections)
    }

    /// Room names offered for `cell_id`, ordered by the saved sort preference.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Validation`] for an unrecognized cell id.
    pub fn room_names(&self, cell_id: &str) -> Result<Vec<&'static str>, TrackerError> {
        let cell: CellId = cell_id.parse().map_err(ValidationError::from)?;
        Ok(RoomCatalog::default_catalog().ordered_room_names(cell, self.preferences.sort))
    }

    pub const fn sort_preference(&self) -> SortPreference {
        self.preferences.sort
    }

    /// # Errors
    ///
    /// Returns [`TrackerError::NotLoaded`] before the initial load, or
    /// [`TrackerError::Persistence`] if the preference cannot be written.
    pub fn set_sort_preference(&mut self, sort: SortPreference) -> Result<(), TrackerError> {
        self.ensure_ready()?;
        self.preferences.sort = sort;
        self.persistence.write_preferences(self.preferences)?;
        Ok(())
    }
}
