use serde::{Deserialize, Deserializer, Serialize};
use std::io::Read;

use super::SelectionSlot;

/// One row of a back-office reference list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(alias = "nombre", alias = "descripcion")]
    pub name: String,
    #[serde(default, alias = "codigo", deserialize_with = "empty_as_none")]
    pub code: Option<String>,
    #[serde(
        default,
        alias = "companiaId",
        alias = "compania_id",
        deserialize_with = "optional_id_as_string"
    )]
    pub company_id: Option<String>,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: None,
            company_id: None,
        }
    }

    pub fn for_company(mut self, company_id: impl Into<String>) -> Self {
        self.company_id = Some(company_id.into());
        self
    }
}

/// Master data loaded from the back office for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MasterDataCatalogs {
    #[serde(alias = "combustibles")]
    pub fuels: Vec<CatalogEntry>,
    #[serde(alias = "categorias")]
    pub categories: Vec<CatalogEntry>,
    #[serde(alias = "destinos")]
    pub destinations: Vec<CatalogEntry>,
    #[serde(alias = "departamentos")]
    pub departments: Vec<CatalogEntry>,
    #[serde(alias = "calidades")]
    pub qualities: Vec<CatalogEntry>,
    #[serde(alias = "tarifas")]
    pub tariffs: Vec<CatalogEntry>,
}

impl MasterDataCatalogs {
    /// Entries offered for a slot. Tariffs are restricted to the selected
    /// insurer; without one no tariff is offered.
    pub fn options(&self, slot: SelectionSlot, company_id: Option<&str>) -> Vec<&CatalogEntry> {
        match slot {
            SelectionSlot::Fuel => self.fuels.iter().collect(),
            SelectionSlot::Category => self.categories.iter().collect(),
            SelectionSlot::Destination => self.destinations.iter().collect(),
            SelectionSlot::Department => self.departments.iter().collect(),
            SelectionSlot::Quality => self.qualities.iter().collect(),
            SelectionSlot::Tariff => self.tariffs_for_company(company_id),
        }
    }

    pub fn tariffs_for_company(&self, company_id: Option<&str>) -> Vec<&CatalogEntry> {
        let Some(company_id) = company_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return Vec::new();
        };
        self.tariffs
            .iter()
            .filter(|entry| entry.company_id.as_deref().map(str::trim) == Some(company_id))
            .collect()
    }

    pub fn entries_mut(&mut self, slot: SelectionSlot) -> &mut Vec<CatalogEntry> {
        match slot {
            SelectionSlot::Fuel => &mut self.fuels,
            SelectionSlot::Category => &mut self.categories,
            SelectionSlot::Destination => &mut self.destinations,
            SelectionSlot::Department => &mut self.departments,
            SelectionSlot::Quality => &mut self.qualities,
            SelectionSlot::Tariff => &mut self.tariffs,
        }
    }

    pub fn find(&self, slot: SelectionSlot, id: &str) -> Option<&CatalogEntry> {
        let entries = match slot {
            SelectionSlot::Fuel => &self.fuels,
            SelectionSlot::Category => &self.categories,
            SelectionSlot::Destination => &self.destinations,
            SelectionSlot::Department => &self.departments,
            SelectionSlot::Quality => &self.qualities,
            SelectionSlot::Tariff => &self.tariffs,
        };
        entries.iter().find(|entry| entry.id == id)
    }
}

/// Read catalog rows from a CSV export with `id,nombre[,codigo][,companiaId]` headers.
pub fn read_catalog_csv<R: Read>(reader: R) -> Result<Vec<CatalogEntry>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut entries = Vec::new();
    for record in csv_reader.deserialize::<CatalogEntry>() {
        let entry = record?;
        if entry.id.is_empty() {
            continue;
        }
        entries.push(entry);
    }
    Ok(entries)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(text) => text.trim().to_string(),
            RawId::Integer(value) => value.to_string(),
            RawId::Float(value) => value.to_string(),
        }
    }
}

pub(crate) fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(RawId::into_string)
}

pub(crate) fn optional_id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawId>::deserialize(deserializer)?;
    Ok(raw.map(RawId::into_string).filter(|id| !id.is_empty()))
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
