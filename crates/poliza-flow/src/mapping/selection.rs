use serde::{Deserialize, Serialize};

use super::SelectionSlot;

/// Choices the user makes against the master-data catalogs, in the shape
/// the back office expects them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterDataSelection {
    #[serde(rename = "combustibleId", skip_serializing_if = "Option::is_none")]
    pub fuel_id: Option<String>,
    #[serde(rename = "categoriaId", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(rename = "destinoId", skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<String>,
    #[serde(rename = "departamentoId", skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(rename = "calidadId", skip_serializing_if = "Option::is_none")]
    pub quality_id: Option<String>,
    #[serde(rename = "tarifaId", skip_serializing_if = "Option::is_none")]
    pub tariff_id: Option<String>,
    #[serde(rename = "observaciones")]
    pub notes: String,
    #[serde(rename = "cantidadCuotas", skip_serializing_if = "Option::is_none")]
    pub installment_count: Option<u32>,
}

impl MasterDataSelection {
    /// Selected id for a slot; blank ids count as unset.
    pub fn get(&self, slot: SelectionSlot) -> Option<&str> {
        let value = match slot {
            SelectionSlot::Fuel => &self.fuel_id,
            SelectionSlot::Category => &self.category_id,
            SelectionSlot::Destination => &self.destination_id,
            SelectionSlot::Department => &self.department_id,
            SelectionSlot::Quality => &self.quality_id,
            SelectionSlot::Tariff => &self.tariff_id,
        };
        value.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    pub fn is_set(&self, slot: SelectionSlot) -> bool {
        self.get(slot).is_some()
    }

    pub fn set(&mut self, slot: SelectionSlot, id: Option<String>) {
        let target = match slot {
            SelectionSlot::Fuel => &mut self.fuel_id,
            SelectionSlot::Category => &mut self.category_id,
            SelectionSlot::Destination => &mut self.destination_id,
            SelectionSlot::Department => &mut self.department_id,
            SelectionSlot::Quality => &mut self.quality_id,
            SelectionSlot::Tariff => &mut self.tariff_id,
        };
        *target = id;
    }

    /// Copy every slot the patch carries into a slot that is still blank.
    /// Slots that already hold a value are never touched.
    pub fn merge(&mut self, patch: &SelectionPatch) -> Vec<SelectionSlot> {
        let mut applied = Vec::new();
        for (slot, id) in patch.iter() {
            if !self.is_set(slot) {
                self.set(slot, Some(id.to_string()));
                applied.push(slot);
            }
        }
        applied
    }
}

/// The slots a mapping run changed, and nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPatch {
    entries: Vec<(SelectionSlot, String)>,
}

impl SelectionPatch {
    pub(crate) fn insert(&mut self, slot: SelectionSlot, id: String) {
        self.entries.retain(|(existing, _)| *existing != slot);
        self.entries.push((slot, id));
    }

    pub fn get(&self, slot: SelectionSlot) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == slot)
            .map(|(_, id)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (SelectionSlot, &str)> {
        self.entries.iter().map(|(slot, id)| (*slot, id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The patch as a sparse selection, handy for serializing to the wire shape.
    pub fn to_selection(&self) -> MasterDataSelection {
        let mut selection = MasterDataSelection::default();
        for (slot, id) in self.iter() {
            selection.set(slot, Some(id.to_string()));
        }
        selection
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
