//! Room Tracker Core
//!
//! Platform-agnostic data model, migration, aggregation and persistence logic
//! for tracking which rooms were offered in each cell of the house grid.
//! This crate has no UI or browser dependencies; hosts plug in storage through
//! [`StorageBackend`].

pub mod aggregate;
pub mod catalog;
pub mod cell;
pub mod constants;
pub mod error;
pub mod migrate;
pub mod model;
pub mod numbers;
pub mod persist;
pub mod store;
pub mod tracker;
pub mod transfer;

// Re-export commonly used types
pub use aggregate::{Frequencies, RoomFrequency, compute_frequencies, compute_selections};
pub use catalog::{RoomCatalog, RoomColor, RoomDefinition, SortPreference};
pub use cell::{CellId, CellIdError};
pub use error::{ParseError, PersistenceError, TrackerError, ValidationError};
pub use migrate::{MigrationReport, Migrated, StoredFormat, migrate_value};
pub use model::{CellRecord, DayEntry, Envelope, Preferences, RoomData, TrackerState};
pub use persist::{
    LoadOutcome, MemoryStorage, MemoryStorageError, PersistenceAdapter, SaveScheduler,
};
pub use store::RoomStore;
pub use tracker::{LoadPhase, Tracker};
pub use transfer::{ImportPayload, ImportWarning, export_file_name, export_json, parse_import};

/// Trait for abstracting a string key/value store such as browser `localStorage`.
/// Platform-specific implementations should provide this
pub trait StorageBackend {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Store `value` under `key`, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set_item(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Delete `key`; deleting a missing key is not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the removal.
    fn remove_item(&self, key: &str) -> Result<(), Self::Error>;

    /// Whether `error` means the backend ran out of space.
    fn is_quota_exceeded(_error: &Self::Error) -> bool {
        false
    }
}
