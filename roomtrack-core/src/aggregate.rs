//! Derived, read-only statistics over a cell's recorded days.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::CellRecord;
use crate::numbers::{format_tenths, percent_tenths, tenths_to_f64};

/// How often one room appeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomFrequency {
    pub name: String,
    pub count: usize,
    /// Percentage of the total with one decimal, e.g. `"66.7"`.
    pub probability: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frequencies {
    pub total_offers: usize,
    /// Descending by count; ties stay in first-seen order.
    pub rooms: Vec<RoomFrequency>,
}

/// Count every non-empty offered room name across the cell's days.
///
/// Returns `None` when the cell has no days at all, so callers can tell
/// "nothing recorded" apart from "recorded, but no usable offers".
#[must_use]
pub fn compute_frequencies(record: &CellRecord) -> Option<Frequencies> {
    if record.days.is_empty() {
        return None;
    }
    let names = record
        .days
        .iter()
        .flat_map(|entry| entry.offered.iter())
        .map(String::as_str);
    Some(tally(names))
}

/// Same shape as [`compute_frequencies`], counting picks instead of offers.
/// `total_offers` is the number of days with a selection.
#[must_use]
pub fn compute_selections(record: &CellRecord) -> Option<Frequencies> {
    if record.days.is_empty() {
        return None;
    }
    let names = record
        .days
        .iter()
        .filter_map(|entry| entry.selected.as_deref());
    Some(tally(names))
}

fn tally<'a>(names: impl Iterator<Item = &'a str>) -> Frequencies {
    let mut order: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;
    for name in names.map(str::trim).filter(|name| !name.is_empty()) {
        total += 1;
        if let Some(&slot) = index.get(name) {
            order[slot].1 += 1;
        } else {
            index.insert(name, order.len());
            order.push((name, 1));
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    order.sort_by(|a, b| b.1.cmp(&a.1));
    let rooms = order
        .into_iter()
        .map(|(name, count)| RoomFrequency {
            name: name.to_string(),
            count,
            probability: format_tenths(percent_tenths(count, total)),
        })
        .collect();
    Frequencies {
        total_offers: total,
        rooms,
    }
}

impl Frequencies {
    /// Share of the most frequent room, or 0 when nothing was counted.
    #[must_use]
    pub fn top_share_pct(&self) -> f64 {
        self.rooms
            .first()
            .map_or(0.0, |room| tenths_to_f64(percent_tenths(room.count, self.total_offers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DayEntry;

    fn record(days: &[(u32, &[&str], Option<&str>)]) -> CellRecord {
        CellRecord {
            days: days
                .iter()
                .map(|(day, offered, selected)| DayEntry {
                    day: *day,
                    offered: offered.iter().map(ToString::to_string).collect(),
                    selected: selected.map(ToString::to_string),
                })
                .collect(),
            letter: None,
        }
    }

    #[test]
    fn counts_duplicates_and_sorts_descending() {
        let cell = record(&[(1, &["A", "B"], Some("A")), (2, &["B", "B"], None)]);
        let freq = compute_frequencies(&cell).unwrap();
        assert_eq!(freq.total_offers, 3);
        assert_eq!(freq.rooms.len(), 2);
        assert_eq!(freq.rooms[0].name, "B");
        assert_eq!(freq.rooms[0].count, 2);
        assert_eq!(freq.rooms[0].probability, "66.7");
        assert_eq!(freq.rooms[1].name, "A");
        assert_eq!(freq.rooms[1].probability, "33.3");
        assert!((freq.top_share_pct() - 66.7).abs() < 1e-9);
    }

    #[test]
    fn no_days_differs_from_no_offers() {
        assert_eq!(compute_frequencies(&CellRecord::default()), None);
        let blank = record(&[(1, &["", "  "], None)]);
        let freq = compute_frequencies(&blank).unwrap();
        assert_eq!(freq.total_offers, 0);
        assert!(freq.rooms.is_empty());
        assert!(freq.top_share_pct().abs() < f64::EPSILON);
    }

    #[test]
    fn names_are_trimmed_before_counting() {
        let cell = record(&[(1, &["Den ", " Den"], None)]);
        let freq = compute_frequencies(&cell).unwrap();
        assert_eq!(freq.rooms.len(), 1);
        assert_eq!(freq.rooms[0].count, 2);
        assert_eq!(freq.rooms[0].probability, "100.0");
    }

    #[test]
    fn ties_are_tolerated_in_either_order() {
        let cell = record(&[(1, &["Nook", "Den"], None)]);
        let freq = compute_frequencies(&cell).unwrap();
        let mut names: Vec<&str> = freq.rooms.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Den", "Nook"]);
        assert!(freq.rooms.iter().all(|r| r.probability == "50.0"));
    }

    #[test]
    fn selections_count_only_picked_days() {
        let cell = record(&[
            (1, &["Den", "Nook"], Some("Den")),
            (2, &["Den"], None),
            (3, &["Den", "Vault"], Some("Den")),
            (4, &["Vault"], Some("Vault")),
        ]);
        let picks = compute_selections(&cell).unwrap();
        assert_eq!(picks.total_offers, 3);
        assert_eq!(picks.rooms[0].name, "Den");
        assert_eq!(picks.rooms[0].probability, "66.7");
        assert_eq!(picks.rooms[1].probability, "33.3");
    }
}
