//! Record migration from every historical storage shape to the envelope.
//!
//! Migration is an ordered list of pure rules, tried most-specific first.
//! Each rule either claims the decoded value and returns canonical state, or
//! declines with [`RuleOutcome::NotApplicable`]. Values no rule claims are
//! treated as corrupt and replaced with the empty default. Nothing in this
//! module touches storage; the persistence adapter feeds it decoded values
//! and handles legacy keys.
//!
//! Anomalies inside a recognized shape (a malformed cell, an invalid letter,
//! an entry without a usable day) are logged, counted in [`MigrationReport`]
//! and folded into `was_migrated`. They never fail the load.
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cell::CellId;
use crate::constants::CURRENT_VERSION;
use crate::error::ParseError;
use crate::model::{CellRecord, DayEntry, Envelope, RoomData, TrackerState, normalize_letter};

/// Which stored shape a payload was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredFormat {
    /// Nothing stored yet.
    Absent,
    /// Current envelope, taken verbatim.
    Envelope,
    /// Envelope-like object that needed repair or has another version.
    RepairedEnvelope { version: Option<u64> },
    /// Cell ID mapped straight to an array of day objects.
    LegacyCellArrays,
    /// Cell ID mapped to `{ days, letter }` without an envelope.
    CellObjects,
    /// Not an object at all; everything was discarded.
    Corrupt,
}

impl StoredFormat {
    /// Formats that predate the envelope and so may have a standalone
    /// current-day key next to them.
    #[must_use]
    pub const fn is_pre_envelope(self) -> bool {
        matches!(self, Self::LegacyCellArrays | Self::CellObjects)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Envelope => "envelope",
            Self::RepairedEnvelope { .. } => "repaired-envelope",
            Self::LegacyCellArrays => "legacy-cell-arrays",
            Self::CellObjects => "cell-objects",
            Self::Corrupt => "corrupt",
        }
    }
}

/// Counters describing what migration had to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MigrationReport {
    pub cells_kept: usize,
    pub cells_dropped: usize,
    pub entries_dropped: usize,
    pub duplicate_days: usize,
    pub offers_unwrapped: usize,
    pub letters_adopted: usize,
    pub letters_discarded: usize,
}

/// Result of running the migrator over one stored payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migrated {
    pub state: TrackerState,
    pub was_migrated: bool,
    pub format: StoredFormat,
    pub report: MigrationReport,
}

impl Migrated {
    fn fresh(state: TrackerState, format: StoredFormat, report: MigrationReport) -> Self {
        Self {
            state,
            was_migrated: format != StoredFormat::Envelope && format != StoredFormat::Absent,
            format,
            report,
        }
    }

    /// Empty default used on first run.
    #[must_use]
    pub fn absent() -> Self {
        Self::fresh(
            TrackerState::default(),
            StoredFormat::Absent,
            MigrationReport::default(),
        )
    }
}

pub enum RuleOutcome {
    Applied(Migrated),
    NotApplicable,
}

/// A single recognizer in the migration chain.
pub struct MigrationRule {
    pub name: &'static str,
    pub apply: fn(&Value) -> RuleOutcome,
}

/// Rules in the order they are tried.
pub const RULES: &[MigrationRule] = &[
    MigrationRule {
        name: "current-envelope",
        apply: current_envelope,
    },
    MigrationRule {
        name: "repaired-envelope",
        apply: repaired_envelope,
    },
    MigrationRule {
        name: "legacy-cell-arrays",
        apply: legacy_cell_arrays,
    },
    MigrationRule {
        name: "cell-objects",
        apply: cell_objects,
    },
];

/// Decode raw stored text, unwrapping one level of double encoding. The flag
/// reports whether unwrapping happened, so the caller can rewrite the key.
///
/// # Errors
///
/// Returns [`ParseError::Json`] if `raw` is not JSON, or
/// [`ParseError::DoubleEncoded`] if it is a JSON string whose contents are not.
pub fn decode_stored(key: &'static str, raw: &str) -> Result<(Value, bool), ParseError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|source| ParseError::Json { key, source })?;
    match value {
        Value::String(inner) => {
            log::info!("payload under `{key}` is double-encoded; decoding again");
            serde_json::from_str(&inner)
                .map(|value| (value, true))
                .map_err(|source| ParseError::DoubleEncoded { key, source })
        }
        other => Ok((other, false)),
    }
}

/// Run the rule chain over a decoded payload.
#[must_use]
pub fn migrate_value(value: &Value) -> Migrated {
    for rule in RULES {
        if let RuleOutcome::Applied(migrated) = (rule.apply)(value) {
            if migrated.was_migrated {
                log::info!(
                    "stored data migrated by rule `{}`: {:?}",
                    rule.name,
                    migrated.report
                );
            }
            return migrated;
        }
    }
    log::warn!("stored data is not an object; discarding it and starting empty");
    Migrated::fresh(
        TrackerState::default(),
        StoredFormat::Corrupt,
        MigrationReport::default(),
    )
}

/// Run the rule chain and honor a standalone legacy current-day value when the
/// payload predates the envelope.
#[must_use]
pub fn migrate_with_legacy_day(value: &Value, legacy_day: Option<&str>) -> Migrated {
    let mut migrated = migrate_value(value);
    if migrated.format.is_pre_envelope() {
        if let Some(raw) = legacy_day {
            match parse_legacy_day(raw) {
                Some(day) => migrated.state.current_day = day,
                None => log::warn!("ignoring unusable legacy current day `{raw}`"),
            }
        }
    }
    migrated
}

/// Parse the standalone legacy current-day string.
#[must_use]
pub fn parse_legacy_day(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|day| *day >= 1)
}

fn current_envelope(value: &Value) -> RuleOutcome {
    let Some(object) = value.as_object() else {
        return RuleOutcome::NotApplicable;
    };
    let is_current = object.get("version").and_then(Value::as_u64) == Some(u64::from(CURRENT_VERSION));
    if !is_current || !object.contains_key("roomData") || !object.contains_key("currentDay") {
        return RuleOutcome::NotApplicable;
    }
    match serde_json::from_value::<Envelope>(value.clone()) {
        Ok(envelope) if is_canonical(&envelope) => {
            let report = MigrationReport {
                cells_kept: envelope.room_data.len(),
                ..MigrationReport::default()
            };
            RuleOutcome::Applied(Migrated::fresh(
                envelope.into_state(),
                StoredFormat::Envelope,
                report,
            ))
        }
        Ok(_) => {
            log::warn!("current envelope violates record invariants; repairing");
            RuleOutcome::NotApplicable
        }
        Err(err) => {
            log::warn!("current envelope does not decode cleanly ({err}); repairing");
            RuleOutcome::NotApplicable
        }
    }
}

fn is_canonical(envelope: &Envelope) -> bool {
    envelope.current_day >= 1
        && envelope.room_data.iter().all(|(id, record)| {
            editable_or_unknown(id)
                && !record.is_empty()
                && record.is_ordered()
                && record.days.first().is_none_or(|entry| entry.day >= 1)
                && record
                    .letter
                    .is_none_or(|letter| letter.is_ascii_uppercase())
                && record
                    .days
                    .iter()
                    .all(|entry| {
                        entry.offered.iter().all(|name| !name.trim().is_empty())
                            && entry
                                .selected
                                .as_deref()
                                .is_none_or(|pick| !pick.trim().is_empty())
                    })
        })
}

fn repaired_envelope(value: &Value) -> RuleOutcome {
    let Some(object) = value.as_object() else {
        return RuleOutcome::NotApplicable;
    };
    if !object.contains_key("roomData") {
        return RuleOutcome::NotApplicable;
    }
    let version = object.get("version").and_then(Value::as_u64);
    if version.is_some_and(|v| v > u64::from(CURRENT_VERSION)) {
        log::warn!(
            "stored envelope has version {} newer than supported {CURRENT_VERSION}; reading what is recognizable",
            version.unwrap_or_default()
        );
    }
    let mut report = MigrationReport::default();
    let room_data = match object.get("roomData") {
        Some(Value::Object(cells)) => normalize_cells(cells, &mut report),
        _ => {
            log::warn!("envelope `roomData` is not an object; discarding cells");
            RoomData::new()
        }
    };
    let current_day = object
        .get("currentDay")
        .and_then(day_number)
        .unwrap_or_else(|| {
            log::warn!("envelope `currentDay` is missing or invalid; resetting to 1");
            1
        });
    RuleOutcome::Applied(Migrated::fresh(
        TrackerState {
            room_data,
            current_day,
        },
        StoredFormat::RepairedEnvelope { version },
        report,
    ))
}

fn legacy_cell_arrays(value: &Value) -> RuleOutcome {
    match value.as_object() {
        Some(cells) if cells.values().any(Value::is_array) => {
            RuleOutcome::Applied(from_cell_map(cells, StoredFormat::LegacyCellArrays))
        }
        _ => RuleOutcome::NotApplicable,
    }
}

fn cell_objects(value: &Value) -> RuleOutcome {
    match value.as_object() {
        Some(cells) => RuleOutcome::Applied(from_cell_map(cells, StoredFormat::CellObjects)),
        None => RuleOutcome::NotApplicable,
    }
}

fn from_cell_map(cells: &Map<String, Value>, format: StoredFormat) -> Migrated {
    let mut report = MigrationReport::default();
    let room_data = normalize_cells(cells, &mut report);
    Migrated::fresh(
        TrackerState {
            room_data,
            current_day: 1,
        },
        format,
        report,
    )
}

fn editable_or_unknown(id: &str) -> bool {
    id.parse::<CellId>().map_or(true, CellId::is_editable)
}

fn normalize_cells(cells: &Map<String, Value>, report: &mut MigrationReport) -> RoomData {
    let mut room_data = RoomData::new();
    for (id, raw) in cells {
        if !editable_or_unknown(id) {
            log::warn!("dropping data stored against fixed cell `{id}`");
            report.cells_dropped += 1;
            continue;
        }
        let record = match raw {
            Value::Array(days) => Some(cell_from_day_array(id, days, report)),
            Value::Object(fields) => Some(cell_from_object(id, fields, report)),
            _ => None,
        };
        match record {
            Some(record) if record.is_empty() => {
                log::debug!("cell `{id}` holds nothing after normalization; dropping it");
                report.cells_dropped += 1;
            }
            Some(record) => {
                report.cells_kept += 1;
                room_data.insert(id.clone(), record);
            }
            None => {
                log::warn!("skipping cell `{id}`: expected an array or object");
                report.cells_dropped += 1;
            }
        }
    }
    room_data
}

/// Legacy shape: the cell is a bare array of days, and letters were stored
/// per day. The first valid one becomes the cell's letter.
fn cell_from_day_array(id: &str, days: &[Value], report: &mut MigrationReport) -> CellRecord {
    let mut record = CellRecord::default();
    for raw in days {
        if record.letter.is_none() {
            record.letter = cell_letter(id, raw.get("letter"), report);
            if record.letter.is_some() {
                report.letters_adopted += 1;
            }
        }
        push_entry(id, raw, &mut record, report);
    }
    record
}

fn cell_from_object(id: &str, fields: &Map<String, Value>, report: &mut MigrationReport) -> CellRecord {
    let mut record = CellRecord {
        days: Vec::new(),
        letter: cell_letter(id, fields.get("letter"), report),
    };
    match fields.get("days") {
        Some(Value::Array(days)) => {
            for raw in days {
                push_entry(id, raw, &mut record, report);
            }
        }
        None | Some(Value::Null) => {}
        Some(_) => {
            log::warn!("cell `{id}` has non-array `days`; treating as empty");
        }
    }
    record
}

fn cell_letter(id: &str, raw: Option<&Value>, report: &mut MigrationReport) -> Option<char> {
    match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(letter)) => {
            let normalized = normalize_letter(letter);
            if normalized.is_none() {
                log::warn!("discarding invalid letter `{letter}` on cell `{id}`");
                report.letters_discarded += 1;
            }
            normalized
        }
        Some(other) => {
            log::warn!("discarding non-string letter {other} on cell `{id}`");
            report.letters_discarded += 1;
            None
        }
    }
}

fn push_entry(id: &str, raw: &Value, record: &mut CellRecord, report: &mut MigrationReport) {
    let Some(entry) = normalize_entry(id, raw, report) else {
        report.entries_dropped += 1;
        return;
    };
    if record.entry(entry.day).is_some() {
        log::warn!("cell `{id}` has duplicate day {}; keeping the later entry", entry.day);
        report.duplicate_days += 1;
    }
    record.upsert(entry);
}

fn normalize_entry(id: &str, raw: &Value, report: &mut MigrationReport) -> Option<DayEntry> {
    let Some(fields) = raw.as_object() else {
        log::warn!("cell `{id}` has a non-object day entry; dropping it");
        return None;
    };
    let Some(day) = fields.get("day").and_then(day_number) else {
        log::warn!("cell `{id}` has an entry without a usable day; dropping it");
        return None;
    };
    let offered = match fields.get("offered") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| offered_name(item, report))
            .collect(),
        _ => Vec::new(),
    };
    let selected = fields.get("selected").and_then(room_name);
    Some(DayEntry {
        day,
        offered,
        selected,
    })
}

/// Older builds stored offers as `{ name, ... }` objects instead of strings.
fn offered_name(item: &Value, report: &mut MigrationReport) -> Option<String> {
    if item.is_object() {
        report.offers_unwrapped += 1;
    }
    room_name(item)
}

fn room_name(value: &Value) -> Option<String> {
    let name = match value {
        Value::String(name) => name.as_str(),
        Value::Object(fields) => fields.get("name").and_then(Value::as_str)?,
        _ => return None,
    };
    (!name.trim().is_empty()).then(|| name.to_string())
}

fn day_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .and_then(|day| u32::try_from(day).ok())
            .filter(|day| *day >= 1),
        Value::String(raw) => parse_legacy_day(raw),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_unwraps_one_level_of_string_encoding() {
        let inner = json!({"version": 1, "currentDay": 2, "roomData": {}}).to_string();
        let outer = serde_json::to_string(&inner).unwrap();
        let (value, double_encoded) = decode_stored("k", &outer).unwrap();
        assert_eq!(value["currentDay"], 2);
        assert!(double_encoded);
        assert!(!decode_stored("k", &inner).unwrap().1);
    }

    #[test]
    fn decode_reports_inner_failure_distinctly() {
        let outer = serde_json::to_string("{not json").unwrap();
        assert!(matches!(
            decode_stored("k", &outer),
            Err(ParseError::DoubleEncoded { .. })
        ));
        assert!(matches!(
            decode_stored("k", "{oops"),
            Err(ParseError::Json { .. })
        ));
    }

    #[test]
    fn each_rule_declines_foreign_shapes() {
        let scalar = json!(42);
        for rule in RULES {
            assert!(
                matches!((rule.apply)(&scalar), RuleOutcome::NotApplicable),
                "rule {} claimed a scalar",
                rule.name
            );
        }
        let legacy = json!({"R1C1": [{"day": 1}]});
        assert!(matches!(current_envelope(&legacy), RuleOutcome::NotApplicable));
        assert!(matches!(repaired_envelope(&legacy), RuleOutcome::NotApplicable));
        assert!(matches!(legacy_cell_arrays(&legacy), RuleOutcome::Applied(_)));
        let objects = json!({"R1C1": {"days": []}});
        assert!(matches!(legacy_cell_arrays(&objects), RuleOutcome::NotApplicable));
        assert!(matches!(cell_objects(&objects), RuleOutcome::Applied(_)));
    }

    #[test]
    fn current_envelope_passes_through() {
        let value = json!({
            "version": 1,
            "currentDay": 4,
            "roomData": {
                "R2C4": {"days": [{"day": 3, "offered": ["Den", "Nook"], "selected": null}], "letter": "K"}
            }
        });
        let migrated = migrate_value(&value);
        assert!(!migrated.was_migrated);
        assert_eq!(migrated.format, StoredFormat::Envelope);
        assert_eq!(migrated.state.current_day, 4);
        assert_eq!(migrated.state.room_data["R2C4"].letter, Some('K'));
    }

    #[test]
    fn lowercase_letter_in_envelope_is_repaired() {
        let value = json!({
            "version": 1,
            "currentDay": 1,
            "roomData": {"R2C4": {"days": [], "letter": "k"}}
        });
        let migrated = migrate_value(&value);
        assert!(migrated.was_migrated);
        assert_eq!(migrated.format, StoredFormat::RepairedEnvelope { version: Some(1) });
        assert_eq!(migrated.state.room_data["R2C4"].letter, Some('K'));
    }

    #[test]
    fn newer_version_is_read_best_effort() {
        let value = json!({
            "version": 7,
            "currentDay": 9,
            "roomData": {"OUTER": {"days": [{"day": 9, "offered": ["Shrine"], "selected": "Shrine"}], "letter": null}}
        });
        let migrated = migrate_value(&value);
        assert!(migrated.was_migrated);
        assert_eq!(migrated.state.current_day, 9);
        assert_eq!(migrated.state.room_data["OUTER"].days.len(), 1);
    }

    #[test]
    fn non_string_day_letter_is_counted_as_discarded() {
        let value = json!({
            "R3C2": [
                {"day": 1, "offered": ["Den"], "selected": null, "letter": 5},
                {"day": 2, "offered": ["Den"], "selected": null, "letter": "q"}
            ]
        });
        let migrated = migrate_value(&value);
        assert_eq!(migrated.state.room_data["R3C2"].letter, Some('Q'));
        assert_eq!(migrated.report.letters_discarded, 1);
        assert_eq!(migrated.report.letters_adopted, 1);
    }

    #[test]
    fn envelope_with_blank_selection_is_repaired() {
        let value = json!({
            "version": 1,
            "currentDay": 2,
            "roomData": {"R4C4": {"days": [
                {"day": 1, "offered": ["Den"], "selected": ""}
            ], "letter": null}}
        });
        let migrated = migrate_value(&value);
        assert!(migrated.was_migrated);
        assert_eq!(migrated.state.room_data["R4C4"].days[0].selected, None);
        assert!(!migrate_value(&json!({
            "version": 1,
            "currentDay": 2,
            "roomData": {"R4C4": {"days": [
                {"day": 1, "offered": ["Den"], "selected": null}
            ], "letter": null}}
        }))
        .was_migrated);
    }

    #[test]
    fn legacy_array_takes_first_valid_letter_and_strips_the_rest() {
        let value = json!({
            "R3C1": [
                {"day": 2, "offered": ["Attic"], "selected": null, "letter": "XY"},
                {"day": 1, "offered": [{"name": "Vault"}, {"name": ""}, {"id": 3}], "selected": "Vault", "letter": "m"},
                {"day": 3, "offered": [], "selected": null, "letter": "z"}
            ]
        });
        let migrated = migrate_value(&value);
        let record = &migrated.state.room_data["R3C1"];
        assert_eq!(record.letter, Some('M'));
        assert_eq!(record.days.iter().map(|e| e.day).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(record.days[0].offered, vec!["Vault".to_string()]);
        assert_eq!(migrated.report.letters_discarded, 1);
        assert_eq!(migrated.report.letters_adopted, 1);
        assert_eq!(migrated.report.offers_unwrapped, 3);
    }

    #[test]
    fn malformed_cells_and_entries_are_dropped() {
        let value = json!({
            "R1C1": "garbage",
            "R1C2": [{"offered": ["Den"]}, 17, {"day": 0}, {"day": "4", "offered": ["Den"]}],
            "ENTRANCE": [{"day": 1, "offered": ["Den"]}],
            "R5C5": {"days": "nope", "letter": 5}
        });
        let migrated = migrate_value(&value);
        assert!(migrated.was_migrated);
        assert!(!migrated.state.room_data.contains_key("R1C1"));
        assert!(!migrated.state.room_data.contains_key("ENTRANCE"));
        assert_eq!(migrated.state.room_data["R1C2"].days.len(), 1);
        assert_eq!(migrated.state.room_data["R1C2"].days[0].day, 4);
        assert!(!migrated.state.room_data.contains_key("R5C5"));
        assert_eq!(migrated.report.cells_dropped, 3);
        assert_eq!(migrated.report.entries_dropped, 3);
    }

    #[test]
    fn duplicate_days_keep_the_later_entry() {
        let value = json!({"R4C4": {"days": [
            {"day": 2, "offered": ["Den"], "selected": null},
            {"day": 2, "offered": ["Nook"], "selected": "Nook"}
        ]}});
        let migrated = migrate_value(&value);
        let record = &migrated.state.room_data["R4C4"];
        assert_eq!(record.days.len(), 1);
        assert_eq!(record.days[0].selected.as_deref(), Some("Nook"));
        assert_eq!(migrated.report.duplicate_days, 1);
    }

    #[test]
    fn non_object_payload_defaults() {
        for value in [json!([1, 2]), json!(null), json!("text"), json!(true)] {
            let migrated = migrate_value(&value);
            assert_eq!(migrated.format, StoredFormat::Corrupt);
            assert!(migrated.was_migrated);
            assert_eq!(migrated.state, TrackerState::default());
        }
    }

    #[test]
    fn legacy_day_only_applies_before_the_envelope() {
        let legacy = json!({"R1C1": [{"day": 1, "offered": ["Den"]}]});
        assert_eq!(migrate_with_legacy_day(&legacy, Some("6")).state.current_day, 6);
        assert_eq!(migrate_with_legacy_day(&legacy, Some("zero")).state.current_day, 1);
        let envelope = json!({"version": 1, "currentDay": 3, "roomData": {}});
        assert_eq!(migrate_with_legacy_day(&envelope, Some("6")).state.current_day, 3);
    }
}
