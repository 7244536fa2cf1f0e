//! Auditorium seating layout and seat records
//!
//! Layout (rows are 1-indexed):
//! - Left: 14 rows, row 1 has 6 seats, rows 2-14 have 7 (97 seats)
//! - Middle: 14 rows, row 1 has 12 seats, rows 2-14 have 13 (181 seats)
//! - Right: 13 rows, row 1 has 6 seats, rows 2-13 have 7 (90 seats)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Total seats across all sections
pub const TOTAL_SEATS: u32 = 368;

/// Seating section; shares its wire keys with the matching headcount zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionName {
    Left,
    Middle,
    Right,
}

impl SectionName {
    pub const ALL: [SectionName; 3] = [SectionName::Left, SectionName::Middle, SectionName::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionName::Left => "left",
            SectionName::Middle => "middle",
            SectionName::Right => "right",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SectionName::Left => "Left",
            SectionName::Middle => "Middle",
            SectionName::Right => "Right",
        }
    }

    pub fn layout(&self) -> &'static SectionLayout {
        match self {
            SectionName::Left => &SECTIONS[0],
            SectionName::Middle => &SECTIONS[1],
            SectionName::Right => &SECTIONS[2],
        }
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SectionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(SectionName::Left),
            "middle" => Ok(SectionName::Middle),
            "right" => Ok(SectionName::Right),
            other => Err(format!("unknown section '{}'", other)),
        }
    }
}

/// Row/seat shape of one section
#[derive(Debug)]
pub struct SectionLayout {
    pub name: SectionName,
    pub rows: u32,
    first_row_seats: u32,
    other_row_seats: u32,
}

impl SectionLayout {
    /// Seats in a row, or None if the row is outside the section
    pub fn seats_in_row(&self, row: u32) -> Option<u32> {
        match row {
            0 => None,
            1 => Some(self.first_row_seats),
            r if r <= self.rows => Some(self.other_row_seats),
            _ => None,
        }
    }

    pub fn total_seats(&self) -> u32 {
        (1..=self.rows).filter_map(|row| self.seats_in_row(row)).sum()
    }

    /// Every seat id in this section, row-major
    pub fn seat_ids(&self) -> impl Iterator<Item = SeatId> + '_ {
        (1..=self.rows).flat_map(move |row| {
            let seats = self.seats_in_row(row).unwrap_or(0);
            (1..=seats).map(move |col| SeatId { section: self.name, row, col })
        })
    }
}

pub static SECTIONS: [SectionLayout; 3] = [
    SectionLayout { name: SectionName::Left, rows: 14, first_row_seats: 6, other_row_seats: 7 },
    SectionLayout { name: SectionName::Middle, rows: 14, first_row_seats: 12, other_row_seats: 13 },
    SectionLayout { name: SectionName::Right, rows: 13, first_row_seats: 6, other_row_seats: 7 },
];

/// Every seat id in the auditorium
pub fn all_seat_ids() -> Vec<SeatId> {
    SECTIONS.iter().flat_map(|section| section.seat_ids()).collect()
}

/// Seat position, rendered `{section}-{row}-{col}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatId {
    pub section: SectionName,
    pub row: u32,
    pub col: u32,
}

impl SeatId {
    /// Parse a seat id, rejecting ids that fall outside the layout
    pub fn parse(id: &str) -> Option<Self> {
        let mut parts = id.split('-');
        let section = parts.next()?.parse::<SectionName>().ok()?;
        let row = parts.next()?.parse::<u32>().ok()?;
        let col = parts.next()?.parse::<u32>().ok()?;
        if parts.next().is_some() {
            return None;
        }
        let seat = Self { section, row, col };
        seat.is_in_layout().then_some(seat)
    }

    pub fn is_in_layout(&self) -> bool {
        self.section.layout().seats_in_row(self.row).is_some_and(|seats| self.col >= 1 && self.col <= seats)
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.section, self.row, self.col)
    }
}

impl TryFrom<String> for SeatId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SeatId::parse(&value).ok_or_else(|| format!("invalid seat id '{}'", value))
    }
}

impl From<SeatId> for String {
    fn from(id: SeatId) -> Self {
        id.to_string()
    }
}

/// Occupancy state of one seat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub occupied: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Seat {
    pub fn vacant(id: SeatId) -> Self {
        Self { id, occupied: false, updated_at: None }
    }
}

/// Availability of one row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeatSummary {
    pub section: SectionName,
    pub row: u32,
    pub total_seats: u32,
    pub available_seats: u32,
    pub occupied_seats: u32,
}
