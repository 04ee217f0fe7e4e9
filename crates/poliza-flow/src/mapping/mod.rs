//! Pre-selecting master-data catalog entries from scanned document text.

mod catalog;
mod engine;
mod selection;

pub use catalog::{read_catalog_csv, CatalogEntry, MasterDataCatalogs};
pub(crate) use catalog::{id_as_string, optional_id_as_string};
pub use engine::{MappingEngine, MappingOutcome};
pub use selection::{MasterDataSelection, SelectionPatch};

use crate::extraction::{FreeTextField, PolicyField};
use serde::{Deserialize, Serialize};

/// A catalog-backed choice in the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSlot {
    Fuel,
    Category,
    Destination,
    Department,
    Quality,
    Tariff,
}

/// Where the mapping engine reads the text it matches for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSource {
    FreeText(FreeTextField),
    Field(PolicyField),
}

impl SelectionSlot {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Fuel,
            Self::Category,
            Self::Destination,
            Self::Department,
            Self::Quality,
            Self::Tariff,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Fuel => "Combustible",
            Self::Category => "Categoría",
            Self::Destination => "Destino",
            Self::Department => "Departamento",
            Self::Quality => "Calidad",
            Self::Tariff => "Tarifa",
        }
    }

    pub const fn source(self) -> SlotSource {
        match self {
            Self::Fuel => SlotSource::FreeText(FreeTextField::Fuel),
            Self::Category => SlotSource::FreeText(FreeTextField::Category),
            Self::Destination => SlotSource::FreeText(FreeTextField::Destination),
            Self::Department => SlotSource::Field(PolicyField::InsuredDepartment),
            Self::Quality => SlotSource::FreeText(FreeTextField::Quality),
            Self::Tariff => SlotSource::FreeText(FreeTextField::Tariff),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fuel" | "combustible" => Some(Self::Fuel),
            "category" | "categoria" => Some(Self::Category),
            "destination" | "destino" => Some(Self::Destination),
            "department" | "departamento" => Some(Self::Department),
            "quality" | "calidad" => Some(Self::Quality),
            "tariff" | "tarifa" => Some(Self::Tariff),
            _ => None,
        }
    }
}
