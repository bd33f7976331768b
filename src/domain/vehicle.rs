//! Vehicle identity: plate number and category.

use serde::{Deserialize, Serialize};

use crate::shared::errors::DomainError;

pub const PLATE_MIN_LEN: usize = 2;
pub const PLATE_MAX_LEN: usize = 12;

/// A validated plate number: ASCII alphanumeric, upper-cased, whitespace
/// removed, `PLATE_MIN_LEN..=PLATE_MAX_LEN` characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Plate(String);

impl Plate {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let plate: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if plate.len() < PLATE_MIN_LEN || plate.len() > PLATE_MAX_LEN {
            return Err(DomainError::InvalidPlate(format!(
                "'{}' must be {}-{} characters",
                raw, PLATE_MIN_LEN, PLATE_MAX_LEN
            )));
        }
        if !plate.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::InvalidPlate(format!(
                "'{}' must be alphanumeric",
                raw
            )));
        }
        Ok(Self(plate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Plate {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Plate> for String {
    fn from(plate: Plate) -> Self {
        plate.0
    }
}

impl std::fmt::Display for Plate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vehicle category recorded at entry. Billing is per minute regardless of
/// category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleCategory {
    Sedan,
    Suv,
    Motorcycle,
    Taxi,
    Hilux,
    Truck,
    Minibus,
}

impl VehicleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sedan => "Sedan",
            Self::Suv => "SUV",
            Self::Motorcycle => "Motorcycle",
            Self::Taxi => "Taxi",
            Self::Hilux => "Hilux",
            Self::Truck => "Truck",
            Self::Minibus => "Minibus",
        }
    }

    /// Case-insensitive parse. The legacy form values `ikamyo` (truck),
    /// `dyna_daihatsu` and `lifani` (light trucks) are accepted as aliases.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sedan" => Ok(Self::Sedan),
            "suv" => Ok(Self::Suv),
            "motorcycle" | "moto" => Ok(Self::Motorcycle),
            "taxi" => Ok(Self::Taxi),
            "hilux" => Ok(Self::Hilux),
            "truck" | "ikamyo" | "dyna_daihatsu" | "lifani" => Ok(Self::Truck),
            "minibus" => Ok(Self::Minibus),
            _ => Err(DomainError::InvalidCategory(raw.to_string())),
        }
    }
}

impl std::fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
