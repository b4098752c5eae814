//! Centralized storage keys, schema versions and tuning constants.
//!
//! Every key the tracker reads from or writes to the storage backend lives
//! here, including the legacy keys that are only ever consumed by migration.

// Schema ------------------------------------------------------------------
/// Envelope version written by this build.
pub const CURRENT_VERSION: u32 = 1;

// Storage keys -------------------------------------------------------------
/// Key holding the current versioned envelope.
pub const DATA_KEY: &str = "roomTracker.data";
/// Key holding presentation preferences (`{ "sort": ... }`).
pub const PREFS_KEY: &str = "roomTracker.prefs";
/// Plain-script era data key; read only when [`DATA_KEY`] is absent.
pub const LEGACY_DATA_KEY: &str = "roomData";
/// Standalone current-day integer string from before the envelope existed.
pub const LEGACY_CURRENT_DAY_KEY: &str = "currentDay";
/// Standalone sort preference string (`"predefined"` or `"alphabetical"`).
pub const LEGACY_SORT_KEY: &str = "sortPreference";

// Persistence --------------------------------------------------------------
/// Window in which consecutive mutations collapse into a single write.
pub const SAVE_DEBOUNCE_MS: u64 = 500;

// Grid ---------------------------------------------------------------------
pub const GRID_RANKS: u8 = 9;
pub const GRID_COLUMNS: u8 = 5;
pub const OUTER_CELL_ID: &str = "OUTER";
pub const ENTRANCE_CELL_ID: &str = "ENTRANCE";
pub const ANTECHAMBER_CELL_ID: &str = "ANTECHAMBER";
/// `(rank, col)` squares occupied by the fixed rooms.
pub const ENTRANCE_POSITION: (u8, u8) = (1, 3);
pub const ANTECHAMBER_POSITION: (u8, u8) = (9, 3);

// Export -------------------------------------------------------------------
pub const EXPORT_FILE_PREFIX: &str = "room-tracker";
