//! Cell identifiers for the house grid and its sentinel areas.
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::constants::{
    ANTECHAMBER_CELL_ID, ANTECHAMBER_POSITION, ENTRANCE_CELL_ID, ENTRANCE_POSITION, GRID_COLUMNS,
    GRID_RANKS, OUTER_CELL_ID,
};

static GRID_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^R([1-9][0-9]*)C([1-9][0-9]*)$").expect("valid cell id pattern")
});

/// A position the tracker can record data against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellId {
    /// Grid position, both coordinates 1-based.
    Grid { rank: u8, col: u8 },
    /// The non-grid outer area.
    Outer,
    /// Fixed starting room; never carries user data.
    Entrance,
    /// Fixed goal room; never carries user data.
    Antechamber,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CellIdError {
    #[error("unrecognized cell id `{0}`")]
    Unrecognized(String),
    #[error("cell `{id}` lies outside the {ranks}x{cols} grid")]
    OutOfBounds { id: String, ranks: u8, cols: u8 },
}

impl CellId {
    /// Whether the presentation layer may attach offers and letters here.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        !matches!(self, Self::Entrance | Self::Antechamber)
    }

    #[must_use]
    pub const fn is_outer(self) -> bool {
        matches!(self, Self::Outer)
    }

    /// Cell at a grid position; the fixed rooms' squares map to their sentinels.
    #[must_use]
    pub const fn at(rank: u8, col: u8) -> Self {
        if rank == ENTRANCE_POSITION.0 && col == ENTRANCE_POSITION.1 {
            Self::Entrance
        } else if rank == ANTECHAMBER_POSITION.0 && col == ANTECHAMBER_POSITION.1 {
            Self::Antechamber
        } else {
            Self::Grid { rank, col }
        }
    }

    /// Every editable cell in rank-major order followed by the outer area.
    pub fn editable() -> impl Iterator<Item = Self> {
        (1..=GRID_RANKS)
            .flat_map(|rank| (1..=GRID_COLUMNS).map(move |col| Self::at(rank, col)))
            .filter(|cell| cell.is_editable())
            .chain(std::iter::once(Self::Outer))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grid { rank, col } => write!(f, "R{rank}C{col}"),
            Self::Outer => f.write_str(OUTER_CELL_ID),
            Self::Entrance => f.write_str(ENTRANCE_CELL_ID),
            Self::Antechamber => f.write_str(ANTECHAMBER_CELL_ID),
        }
    }
}

impl FromStr for CellId {
    type Err = CellIdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            OUTER_CELL_ID => return Ok(Self::Outer),
            ENTRANCE_CELL_ID => return Ok(Self::Entrance),
            ANTECHAMBER_CELL_ID => return Ok(Self::Antechamber),
            _ => {}
        }
        let caps = GRID_ID
            .captures(raw)
            .ok_or_else(|| CellIdError::Unrecognized(raw.to_string()))?;
        let out_of_bounds = || CellIdError::OutOfBounds {
            id: raw.to_string(),
            ranks: GRID_RANKS,
            cols: GRID_COLUMNS,
        };
        let rank: u8 = caps[1].parse().map_err(|_| out_of_bounds())?;
        let col: u8 = caps[2].parse().map_err(|_| out_of_bounds())?;
        if rank > GRID_RANKS || col > GRID_COLUMNS {
            return Err(out_of_bounds());
        }
        Ok(Self::at(rank, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_grid_and_sentinels() {
        assert_eq!("R1C1".parse(), Ok(CellId::Grid { rank: 1, col: 1 }));
        assert_eq!("R9C5".parse(), Ok(CellId::Grid { rank: 9, col: 5 }));
        assert_eq!("OUTER".parse(), Ok(CellId::Outer));
        assert_eq!("ENTRANCE".parse(), Ok(CellId::Entrance));
        assert_eq!("ANTECHAMBER".parse(), Ok(CellId::Antechamber));
    }

    #[test]
    fn fixed_squares_resolve_to_sentinels() {
        assert_eq!("R1C3".parse(), Ok(CellId::Entrance));
        assert_eq!("R9C3".parse(), Ok(CellId::Antechamber));
        assert_eq!(CellId::at(1, 3).to_string(), "ENTRANCE");
    }

    #[test]
    fn rejects_malformed_and_out_of_range() {
        assert!(matches!(
            "r1c1".parse::<CellId>(),
            Err(CellIdError::Unrecognized(_))
        ));
        assert!(matches!(
            "R0C1".parse::<CellId>(),
            Err(CellIdError::Unrecognized(_))
        ));
        assert!(matches!(
            "R10C1".parse::<CellId>(),
            Err(CellIdError::OutOfBounds { .. })
        ));
        assert!(matches!(
            "R1C999".parse::<CellId>(),
            Err(CellIdError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn display_round_trips() {
        for cell in CellId::editable() {
            assert_eq!(cell.to_string().parse(), Ok(cell));
        }
        assert_eq!(CellId::editable().count(), 44);
        assert!(!CellId::Entrance.is_editable());
        assert!(CellId::Outer.is_outer());
    }
}
