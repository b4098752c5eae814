//! Replays a storage dump through the real load, migrate and save pipeline.
use anyhow::{Context, Result, bail};
use roomtrack_core::{
    CellId, Frequencies, MemoryStorage, MigrationReport, SortPreference, Tracker, TrackerError,
    TrackerState,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, Default)]
pub struct ReplayOptions {
    /// Cells to summarize; empty means every cell holding data.
    pub cells: Vec<String>,
    /// Export file contents to import after the load.
    pub import: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellSummary {
    pub cell: String,
    pub letter: Option<char>,
    pub days: usize,
    pub frequencies: Option<Frequencies>,
    pub selections: Option<Frequencies>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub format: &'static str,
    pub was_migrated: bool,
    pub migration: MigrationReport,
    pub current_day: u32,
    pub sort: SortPreference,
    pub import_warning: Option<String>,
    pub cells: Vec<CellSummary>,
    /// Keys present in storage once the replay finished.
    pub storage_keys: Vec<String>,
    pub settled: bool,
}

#[derive(Debug)]
pub struct Replay {
    pub report: ReplayReport,
    pub state: TrackerState,
}

/// Split a comma-separated argument, dropping blanks.
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Build storage from a dump such as `JSON.stringify(localStorage)`.
/// Non-string values are stored as their JSON text.
///
/// # Errors
///
/// Returns an error if the text is not a JSON object.
pub fn parse_dump(text: &str) -> Result<MemoryStorage> {
    let entries: Map<String, Value> =
        serde_json::from_str(text).context("storage dump must be a JSON object")?;
    Ok(MemoryStorage::from_entries(entries.into_iter().map(
        |(key, value)| match value {
            Value::String(raw) => (key, raw),
            other => (key, other.to_string()),
        },
    )))
}

/// # Errors
///
/// Returns an error if the file cannot be read or is not a dump.
pub fn read_dump(path: &Path) -> Result<MemoryStorage> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_dump(&text).with_context(|| format!("invalid storage dump {}", path.display()))
}

/// Dump of the storage contents, in the same shape [`parse_dump`] reads.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn write_dump(storage: &MemoryStorage) -> Result<String> {
    Ok(serde_json::to_string_pretty(&storage.snapshot())?)
}

/// Load `storage`, optionally import, save, and summarize the result.
///
/// # Errors
///
/// Fails when stored data cannot be parsed, a requested cell id is invalid,
/// or the import is rejected.
pub fn run(storage: &MemoryStorage, options: &ReplayOptions) -> Result<Replay> {
    let mut tracker = Tracker::new(storage.clone());
    match tracker.load() {
        Ok(_) => {}
        Err(TrackerError::Persistence(err)) => {
            log::warn!("loaded, but writing the migrated data failed: {err}");
        }
        Err(err) => return Err(err).context("stored data could not be loaded"),
    }
    let (format, was_migrated, migration) = tracker.last_load().map_or(
        ("absent", false, MigrationReport::default()),
        |loaded| (loaded.format.label(), loaded.was_migrated, loaded.report),
    );

    let import_warning = match &options.import {
        Some(text) => tracker
            .import_json(text)
            .context("import rejected")?
            .map(|warning| warning.to_string()),
        None => None,
    };
    tracker.flush().context("final save failed")?;

    let cells = if options.cells.is_empty() {
        tracker
            .state()
            .room_data
            .iter()
            .filter(|(_, record)| !record.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    } else {
        for id in &options.cells {
            if let Err(err) = id.parse::<CellId>() {
                bail!("invalid cell `{id}`: {err}");
            }
        }
        options.cells.clone()
    };
    let cells = cells
        .into_iter()
        .map(|cell| {
            let record = tracker.cell(&cell);
            CellSummary {
                letter: record.and_then(|record| record.letter),
                days: record.map_or(0, |record| record.days.len()),
                frequencies: tracker.frequencies(&cell),
                selections: tracker.selections(&cell),
                cell,
            }
        })
        .collect();

    let report = ReplayReport {
        format,
        was_migrated,
        migration,
        current_day: tracker.state().current_day,
        sort: tracker.sort_preference(),
        import_warning,
        cells,
        storage_keys: storage.snapshot().into_keys().collect(),
        settled: tracker.is_settled(),
    };
    Ok(Replay {
        report,
        state: tracker.state().clone(),
    })
}
