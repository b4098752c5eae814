//! Canonical in-memory and persisted shapes.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::SortPreference;
use crate::constants::CURRENT_VERSION;

static LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]$").expect("valid letter pattern"));

/// Trim and uppercase `raw`, accepting it only if a single `A-Z` remains.
#[must_use]
pub fn normalize_letter(raw: &str) -> Option<char> {
    let upper = raw.trim().to_uppercase();
    if LETTER.is_match(&upper) {
        upper.chars().next()
    } else {
        None
    }
}

/// One day's offers for a cell and the room picked from them, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayEntry {
    pub day: u32,
    #[serde(default)]
    pub offered: Vec<String>,
    #[serde(default)]
    pub selected: Option<String>,
}

impl DayEntry {
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.offered.is_empty() || self.selected.is_some()
    }
}

/// Everything recorded against a single cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellRecord {
    /// Ascending by `day`, at most one entry per day.
    #[serde(default)]
    pub days: Vec<DayEntry>,
    #[serde(default)]
    pub letter: Option<char>,
}

impl CellRecord {
    /// Empty cells are pruned when the state is written out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty() && self.letter.is_none()
    }

    #[must_use]
    pub fn entry(&self, day: u32) -> Option<&DayEntry> {
        self.position(day).ok().map(|idx| &self.days[idx])
    }

    fn position(&self, day: u32) -> Result<usize, usize> {
        self.days.binary_search_by_key(&day, |entry| entry.day)
    }

    /// Replace the entry for `entry.day` or insert it in day order.
    pub fn upsert(&mut self, entry: DayEntry) {
        match self.position(entry.day) {
            Ok(idx) => self.days[idx] = entry,
            Err(idx) => self.days.insert(idx, entry),
        }
    }

    /// Returns the removed entry, if one existed.
    pub fn remove(&mut self, day: u32) -> Option<DayEntry> {
        self.position(day).ok().map(|idx| self.days.remove(idx))
    }

    /// Whether `days` is strictly ascending, i.e. sorted with unique days.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.days.windows(2).all(|pair| pair[0].day < pair[1].day)
    }
}

/// Cell ID to record. Key order carries no meaning; a sorted map keeps
/// serialized output stable.
pub type RoomData = BTreeMap<String, CellRecord>;

/// The full canonical state owned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    pub room_data: RoomData,
    pub current_day: u32,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            room_data: RoomData::new(),
            current_day: 1,
        }
    }
}

impl TrackerState {
    /// Copy of the state without empty cells.
    #[must_use]
    pub fn pruned(&self) -> Self {
        Self {
            room_data: self
                .room_data
                .iter()
                .filter(|(_, record)| !record.is_empty())
                .map(|(id, record)| (id.clone(), record.clone()))
                .collect(),
            current_day: self.current_day,
        }
    }
}

/// Versioned top-level structure written to storage and export files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub version: u32,
    pub current_day: u32,
    pub room_data: RoomData,
}

impl Envelope {
    #[must_use]
    pub fn wrap(state: &TrackerState) -> Self {
        let pruned = state.pruned();
        Self {
            version: CURRENT_VERSION,
            current_day: pruned.current_day,
            room_data: pruned.room_data,
        }
    }

    #[must_use]
    pub fn into_state(self) -> TrackerState {
        TrackerState {
            room_data: self.room_data,
            current_day: self.current_day,
        }
    }
}

/// Presentation preferences stored beside the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub sort: SortPreference,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: u32, offered: &[&str], selected: Option<&str>) -> DayEntry {
        DayEntry {
            day,
            offered: offered.iter().map(ToString::to_string).collect(),
            selected: selected.map(ToString::to_string),
        }
    }

    #[test]
    fn letters_normalize_or_reject() {
        assert_eq!(normalize_letter("b"), Some('B'));
        assert_eq!(normalize_letter("  q "), Some('Q'));
        assert_eq!(normalize_letter("XY"), None);
        assert_eq!(normalize_letter(""), None);
        assert_eq!(normalize_letter("7"), None);
        assert_eq!(normalize_letter("é"), None);
    }

    #[test]
    fn upsert_keeps_days_sorted_and_unique() {
        let mut record = CellRecord::default();
        record.upsert(entry(3, &["Den"], None));
        record.upsert(entry(1, &["Nook"], None));
        record.upsert(entry(2, &["Attic"], Some("Attic")));
        record.upsert(entry(1, &["Vault"], Some("Vault")));
        let days: Vec<u32> = record.days.iter().map(|e| e.day).collect();
        assert_eq!(days, vec![1, 2, 3]);
        assert_eq!(record.entry(1).unwrap().selected.as_deref(), Some("Vault"));
        assert!(record.is_ordered());
        assert!(record.remove(2).is_some());
        assert!(record.remove(2).is_none());
    }

    #[test]
    fn envelope_serializes_camel_case_and_prunes() {
        let mut state = TrackerState::default();
        state.room_data.insert("R1C1".into(), CellRecord::default());
        state.room_data.insert(
            "R2C2".into(),
            CellRecord {
                days: vec![entry(1, &["Library"], Some("Library"))],
                letter: Some('B'),
            },
        );
        let value = serde_json::to_value(Envelope::wrap(&state)).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["currentDay"], 1);
        assert!(value["roomData"].get("R1C1").is_none());
        assert_eq!(value["roomData"]["R2C2"]["letter"], "B");
        assert_eq!(value["roomData"]["R2C2"]["days"][0]["selected"], "Library");
    }
}
