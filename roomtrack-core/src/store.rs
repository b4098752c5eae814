//! In-memory owner of the canonical tracker state.
//!
//! Every mutation validates its whole input before touching state, so a
//! rejected call leaves the store exactly as it was. Mutations report whether
//! anything changed so the caller knows when a save is needed.
use crate::cell::CellId;
use crate::error::ValidationError;
use crate::model::{CellRecord, DayEntry, RoomData, TrackerState, normalize_letter};

/// Validate a day number coming from an untyped boundary.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidDay`] when `raw` is below 1 or does not fit.
pub fn checked_day(raw: i64) -> Result<u32, ValidationError> {
    u32::try_from(raw)
        .ok()
        .filter(|day| *day >= 1)
        .ok_or(ValidationError::InvalidDay(raw))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomStore {
    state: TrackerState,
}

impl RoomStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn from_state(state: TrackerState) -> Self {
        Self { state }
    }

    #[must_use]
    pub const fn state(&self) -> &TrackerState {
        &self.state
    }

    #[must_use]
    pub const fn room_data(&self) -> &RoomData {
        &self.state.room_data
    }

    #[must_use]
    pub const fn current_day(&self) -> u32 {
        self.state.current_day
    }

    #[must_use]
    pub fn cell(&self, cell_id: &str) -> Option<&CellRecord> {
        self.state.room_data.get(cell_id)
    }

    /// State as it should be written: empty cells removed.
    #[must_use]
    pub fn pruned_snapshot(&self) -> TrackerState {
        self.state.pruned()
    }

    /// Wholesale swap used after a load; no validation, the migrator already
    /// produced canonical state.
    pub(crate) fn hydrate(&mut self, state: TrackerState) {
        self.state = state;
    }

    /// Record the offers (and pick) seen in a cell on `day`, and set its letter.
    ///
    /// Blank offer names are dropped. With no offers and no selection the
    /// submission clears that day instead. The letter is always applied,
    /// `None` removing it.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a non-editable or unknown cell, a day
    /// below 1, an invalid letter, or a selection missing from the offers.
    pub fn upsert_day(
        &mut self,
        cell_id: &str,
        day: u32,
        offered: &[String],
        selected: Option<&str>,
        letter: Option<&str>,
    ) -> Result<bool, ValidationError> {
        let cell = editable_cell(cell_id)?;
        let day = checked_day(i64::from(day))?;
        let letter = letter_input(letter)?;
        let offered: Vec<String> = offered
            .iter()
            .filter(|name| !name.trim().is_empty())
            .cloned()
            .collect();
        let selected = selected.filter(|name| !name.trim().is_empty());
        if let Some(pick) = selected {
            if !offered.iter().any(|name| name == pick) {
                return Err(ValidationError::SelectionNotOffered(pick.to_string()));
            }
        }

        let key = cell.to_string();
        let before = self.state.room_data.get(&key).cloned().unwrap_or_default();
        let record = self.state.room_data.entry(key).or_default();
        record.letter = letter;
        let entry = DayEntry {
            day,
            offered,
            selected: selected.map(ToString::to_string),
        };
        if entry.has_data() {
            record.upsert(entry);
        } else {
            record.remove(day);
        }
        Ok(before != *record)
    }

    /// Remove the entry for `day`; unknown cells and days are a no-op.
    pub fn delete_day(&mut self, cell_id: &str, day: u32) -> bool {
        self.state
            .room_data
            .get_mut(cell_id)
            .and_then(|record| record.remove(day))
            .is_some()
    }

    /// Set or clear a cell's letter without touching its days.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a non-editable cell or invalid letter.
    pub fn set_letter(&mut self, cell_id: &str, letter: Option<&str>) -> Result<bool, ValidationError> {
        let cell = editable_cell(cell_id)?;
        let letter = letter_input(letter)?;
        let record = self.state.room_data.entry(cell.to_string()).or_default();
        let changed = record.letter != letter;
        record.letter = letter;
        Ok(changed)
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDay`] when `day` is 0.
    pub fn set_current_day(&mut self, day: u32) -> Result<bool, ValidationError> {
        let day = checked_day(i64::from(day))?;
        let changed = self.state.current_day != day;
        self.state.current_day = day;
        Ok(changed)
    }

    pub fn clear_all(&mut self) {
        self.state = TrackerState::default();
    }

    /// Replace everything with imported data.
    ///
    /// Blank offer names and blank selections are dropped the same way
    /// [`RoomStore::upsert_day`] drops them, and cells left empty are skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if `current_day` is 0 or any record breaks
    /// the record invariants; the store is left untouched.
    pub fn replace_all(&mut self, room_data: RoomData, current_day: u32) -> Result<(), ValidationError> {
        let current_day = checked_day(i64::from(current_day))?;
        let mut cleaned = RoomData::new();
        for (id, mut record) in room_data {
            strip_blank_names(&mut record);
            validate_record(&id, &record)?;
            if !record.is_empty() {
                cleaned.insert(id, record);
            }
        }
        self.state = TrackerState {
            room_data: cleaned,
            current_day,
        };
        Ok(())
    }
}

fn editable_cell(cell_id: &str) -> Result<CellId, ValidationError> {
    let cell: CellId = cell_id.parse()?;
    if cell.is_editable() {
        Ok(cell)
    } else {
        Err(ValidationError::FixedCell(cell_id.to_string()))
    }
}

fn letter_input(letter: Option<&str>) -> Result<Option<char>, ValidationError> {
    match letter.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => normalize_letter(raw)
            .map(Some)
            .ok_or_else(|| ValidationError::InvalidLetter(raw.to_string())),
    }
}

fn strip_blank_names(record: &mut CellRecord) {
    for entry in &mut record.days {
        entry.offered.retain(|name| !name.trim().is_empty());
        entry.selected = entry.selected.take().filter(|name| !name.trim().is_empty());
    }
}

fn validate_record(id: &str, record: &CellRecord) -> Result<(), ValidationError> {
    let malformed = |reason: String| ValidationError::MalformedField {
        field: "roomData",
        reason,
    };
    if id.parse::<CellId>().is_ok_and(|cell| !cell.is_editable()) {
        return Err(ValidationError::FixedCell(id.to_string()));
    }
    if !record.is_ordered() || record.days.first().is_some_and(|entry| entry.day == 0) {
        return Err(malformed(format!(
            "cell `{id}` days must be unique, ascending and at least 1"
        )));
    }
    if let Some(letter) = record.letter {
        if !letter.is_ascii_uppercase() {
            return Err(ValidationError::InvalidLetter(letter.to_string()));
        }
    }
    let stray_pick = record.days.iter().find_map(|entry| {
        entry
            .selected
            .as_ref()
            .filter(|pick| !entry.offered.contains(pick))
    });
    if let Some(pick) = stray_pick {
        return Err(ValidationError::SelectionNotOffered(pick.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn upsert_inserts_replaces_and_sorts() {
        let mut store = RoomStore::new();
        store
            .upsert_day("R2C2", 5, &names(&["Den"]), None, None)
            .unwrap();
        store
            .upsert_day("R2C2", 2, &names(&["Nook", "Vault"]), Some("Vault"), Some("c"))
            .unwrap();
        store
            .upsert_day("R2C2", 5, &names(&["Attic"]), Some("Attic"), Some("C"))
            .unwrap();
        let record = store.cell("R2C2").unwrap();
        assert_eq!(record.days.iter().map(|e| e.day).collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(record.days[1].offered, names(&["Attic"]));
        assert_eq!(record.letter, Some('C'));
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut store = RoomStore::new();
        let offered = names(&["Den", "Nook"]);
        assert!(store.upsert_day("R1C1", 1, &offered, Some("Den"), Some("a")).unwrap());
        let once = store.clone();
        assert!(!store.upsert_day("R1C1", 1, &offered, Some("Den"), Some("a")).unwrap());
        assert_eq!(store, once);
    }

    #[test]
    fn blank_offers_are_filtered() {
        let mut store = RoomStore::new();
        store
            .upsert_day("R1C1", 1, &names(&["", "Den", "   "]), None, None)
            .unwrap();
        assert_eq!(store.cell("R1C1").unwrap().days[0].offered, names(&["Den"]));
    }

    #[test]
    fn empty_submission_clears_day_or_only_sets_letter() {
        let mut store = RoomStore::new();
        store
            .upsert_day("R3C3", 4, &names(&["Den"]), None, None)
            .unwrap();
        assert!(store.upsert_day("R3C3", 4, &[], None, None).unwrap());
        assert!(store.cell("R3C3").unwrap().is_empty());
        assert!(!store.upsert_day("R3C5", 4, &[], None, None).unwrap());

        store.upsert_day("R3C4", 4, &[], None, Some("q")).unwrap();
        let record = store.cell("R3C4").unwrap();
        assert!(record.days.is_empty());
        assert_eq!(record.letter, Some('Q'));
    }

    #[test]
    fn rejections_leave_state_untouched() {
        let mut store = RoomStore::new();
        store
            .upsert_day("R1C1", 1, &names(&["Den"]), None, Some("A"))
            .unwrap();
        let before = store.clone();
        assert_eq!(
            store.upsert_day("R1C1", 1, &names(&["Den"]), Some("Vault"), None),
            Err(ValidationError::SelectionNotOffered("Vault".into()))
        );
        assert!(matches!(
            store.upsert_day("R1C1", 1, &names(&["Den"]), None, Some("AB")),
            Err(ValidationError::InvalidLetter(_))
        ));
        assert!(matches!(
            store.upsert_day("R1C1", 0, &names(&["Den"]), None, None),
            Err(ValidationError::InvalidDay(0))
        ));
        assert!(matches!(
            store.upsert_day("ENTRANCE", 1, &names(&["Den"]), None, None),
            Err(ValidationError::FixedCell(_))
        ));
        assert!(matches!(
            store.upsert_day("nowhere", 1, &names(&["Den"]), None, None),
            Err(ValidationError::Cell(_))
        ));
        assert!(store.set_current_day(0).is_err());
        assert_eq!(store, before);
    }

    #[test]
    fn delete_day_is_lenient() {
        let mut store = RoomStore::new();
        assert!(!store.delete_day("R9C9", 3));
        store
            .upsert_day("R1C2", 3, &names(&["Den"]), None, None)
            .unwrap();
        assert!(!store.delete_day("R1C2", 4));
        assert!(store.delete_day("R1C2", 3));
        assert!(store.cell("R1C2").unwrap().days.is_empty());
    }

    #[test]
    fn clear_and_replace() {
        let mut store = RoomStore::new();
        store
            .upsert_day("R1C2", 3, &names(&["Den"]), None, None)
            .unwrap();
        store.set_current_day(8).unwrap();
        store.clear_all();
        assert!(store.room_data().is_empty());
        assert_eq!(store.current_day(), 1);

        let mut data = RoomData::new();
        data.insert(
            "R4C4".into(),
            CellRecord {
                days: vec![],
                letter: Some('Z'),
            },
        );
        store.replace_all(data.clone(), 3).unwrap();
        assert_eq!(store.current_day(), 3);
        assert!(store.replace_all(data, 0).is_err());
        assert_eq!(store.current_day(), 3);
    }

    #[test]
    fn replace_rejects_selection_missing_from_offers() {
        let mut store = RoomStore::new();
        store
            .upsert_day("R1C2", 1, &names(&["Den"]), None, None)
            .unwrap();
        let before = store.clone();
        let mut data = RoomData::new();
        data.insert(
            "R1C1".into(),
            CellRecord {
                days: vec![DayEntry {
                    day: 1,
                    offered: names(&["Den"]),
                    selected: Some("Vault".into()),
                }],
                letter: None,
            },
        );
        assert!(matches!(
            store.replace_all(data, 2),
            Err(ValidationError::SelectionNotOffered(pick)) if pick == "Vault"
        ));
        assert_eq!(store, before);
    }

    #[test]
    fn replace_drops_blank_names_and_empty_cells() {
        let mut store = RoomStore::new();
        let mut data = RoomData::new();
        data.insert(
            "R2C2".into(),
            CellRecord {
                days: vec![DayEntry {
                    day: 1,
                    offered: names(&["Den", "", "  "]),
                    selected: Some(String::new()),
                }],
                letter: None,
            },
        );
        data.insert("R2C3".into(), CellRecord::default());
        store.replace_all(data, 1).unwrap();
        let record = store.cell("R2C2").unwrap();
        assert_eq!(record.days[0].offered, names(&["Den"]));
        assert_eq!(record.days[0].selected, None);
        assert!(store.cell("R2C3").is_none());
    }

    #[test]
    fn empty_cells_linger_until_pruned_for_save() {
        let mut store = RoomStore::new();
        assert!(store.set_letter("R1C1", Some("b")).unwrap());
        assert!(store.set_letter("R1C1", None).unwrap());
        store.set_letter("R1C2", Some("b")).unwrap();
        assert_eq!(store.room_data().len(), 2);
        let pruned = store.pruned_snapshot();
        assert_eq!(pruned.room_data.len(), 1);
        assert!(pruned.room_data.contains_key("R1C2"));
    }

    #[test]
    fn checked_day_bounds() {
        assert_eq!(checked_day(1), Ok(1));
        assert!(checked_day(0).is_err());
        assert!(checked_day(-3).is_err());
        assert!(checked_day(i64::MAX).is_err());
    }
}
