//! Slot domain entity

use chrono::{DateTime, Utc};

use crate::domain::vehicle::{Plate, VehicleCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Available,
    Occupied,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Occupied => "Occupied",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(Self::Available),
            "Occupied" => Some(Self::Occupied),
            _ => None,
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The vehicle a slot is reserved for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    pub plate: Plate,
    pub category: VehicleCategory,
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub lot_id: i32,
    /// Slot number, unique within the lot, starting at 1.
    pub number: i32,
    pub status: SlotStatus,
    pub occupant: Option<Occupant>,
    pub occupied_since: Option<DateTime<Utc>>,
}

impl Slot {
    pub fn available(lot_id: i32, number: i32) -> Self {
        Self {
            lot_id,
            number,
            status: SlotStatus::Available,
            occupant: None,
            occupied_since: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }

    /// Compare-and-swap Available -> Occupied. Returns false when the slot
    /// was already taken.
    pub fn try_occupy(&mut self, occupant: &Occupant, at: DateTime<Utc>) -> bool {
        if !self.is_available() {
            return false;
        }
        self.status = SlotStatus::Occupied;
        self.occupant = Some(occupant.clone());
        self.occupied_since = Some(at);
        true
    }

    /// Compare-and-swap Occupied -> Available. Returns false when the slot
    /// was not occupied.
    pub fn try_free(&mut self) -> bool {
        if self.is_available() {
            return false;
        }
        self.status = SlotStatus::Available;
        self.occupant = None;
        self.occupied_since = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupant() -> Occupant {
        Occupant {
            plate: Plate::parse("RAF123E").unwrap(),
            category: VehicleCategory::Sedan,
        }
    }

    #[test]
    fn occupy_then_free() {
        let mut slot = Slot::available(1, 1);
        assert!(slot.try_occupy(&occupant(), Utc::now()));
        assert_eq!(slot.status, SlotStatus::Occupied);
        assert!(slot.occupant.is_some());

        assert!(slot.try_free());
        assert!(slot.is_available());
        assert!(slot.occupant.is_none());
        assert!(slot.occupied_since.is_none());
    }

    #[test]
    fn occupied_slot_cannot_be_taken_twice() {
        let mut slot = Slot::available(1, 1);
        assert!(slot.try_occupy(&occupant(), Utc::now()));
        assert!(!slot.try_occupy(&occupant(), Utc::now()));
    }

    #[test]
    fn free_slot_cannot_be_freed_again() {
        let mut slot = Slot::available(1, 1);
        assert!(!slot.try_free());
    }

    #[test]
    fn status_roundtrip() {
        for s in [SlotStatus::Available, SlotStatus::Occupied] {
            assert_eq!(SlotStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(SlotStatus::from_str("Broken"), None);
    }
}
