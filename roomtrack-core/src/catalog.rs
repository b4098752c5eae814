//! Static room catalog: names, display colors and where each room may appear.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::cell::CellId;

const DEFAULT_ROOM_DATA: &str = include_str!("../assets/rooms.json");

/// Symbolic color the presentation layer maps to a palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomColor {
    Blue,
    Green,
    Purple,
    Orange,
    Yellow,
    Red,
    Black,
}

impl RoomColor {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Purple => "purple",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Black => "black",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDefinition {
    pub name: String,
    pub color: RoomColor,
    /// Only draftable in the outer area, never inside the grid.
    #[serde(default)]
    pub outer: bool,
}

impl RoomDefinition {
    #[must_use]
    pub const fn applies_to(&self, cell: CellId) -> bool {
        match cell {
            CellId::Outer => self.outer,
            CellId::Grid { .. } => !self.outer,
            CellId::Entrance | CellId::Antechamber => false,
        }
    }
}

/// How offer lists are ordered when shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPreference {
    /// Catalog order, grouped by color.
    #[default]
    Predefined,
    Alphabetical,
}

impl SortPreference {
    /// Parse the bare string form used by the legacy preference key.
    #[must_use]
    pub fn from_legacy(raw: &str) -> Option<Self> {
        match raw.trim() {
            "predefined" => Some(Self::Predefined),
            "alphabetical" => Some(Self::Alphabetical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomCatalog {
    #[serde(default)]
    pub rooms: Vec<RoomDefinition>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl RoomCatalog {
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_ROOM_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn default_catalog() -> &'static Self {
        static CATALOG: OnceLock<RoomCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::load_from_static)
    }

    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a room catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut catalog: Self = serde_json::from_str(json)?;
        catalog.reindex();
        Ok(catalog)
    }

    fn reindex(&mut self) {
        self.index = self
            .rooms
            .iter()
            .enumerate()
            .map(|(idx, room)| (room.name.clone(), idx))
            .collect();
    }

    #[must_use]
    pub fn find_room(&self, name: &str) -> Option<&RoomDefinition> {
        self.index.get(name).and_then(|idx| self.rooms.get(*idx))
    }

    #[must_use]
    pub fn color_of(&self, name: &str) -> Option<RoomColor> {
        self.find_room(name).map(|room| room.color)
    }

    pub fn rooms_for_cell(&self, cell: CellId) -> impl Iterator<Item = &RoomDefinition> {
        self.rooms.iter().filter(move |room| room.applies_to(cell))
    }

    /// Names offered for `cell`, ordered per the player's preference.
    #[must_use]
    pub fn ordered_room_names(&self, cell: CellId, sort: SortPreference) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .rooms_for_cell(cell)
            .map(|room| room.name.as_str())
            .collect();
        if sort == SortPreference::Alphabetical {
            names.sort_by_key(|name| name.to_lowercase());
        }
        names
    }
}
