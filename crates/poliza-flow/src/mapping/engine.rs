use tracing::{debug, info};

use super::catalog::{CatalogEntry, MasterDataCatalogs};
use super::selection::{MasterDataSelection, SelectionPatch};
use super::{SelectionSlot, SlotSource};
use crate::extraction::{CandidateKeyTable, ExtractedFieldSet};

/// Result of one mapping run: the slots that were filled and their labels
/// for the "auto-mapping applied" indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingOutcome {
    pub patch: SelectionPatch,
    pub auto_filled: Vec<&'static str>,
}

impl MappingOutcome {
    pub fn is_empty(&self) -> bool {
        self.patch.is_empty()
    }
}

/// Matches free text from a scanned document against catalog display names.
#[derive(Debug, Clone)]
pub struct MappingEngine {
    keys: CandidateKeyTable,
    slots: Vec<SelectionSlot>,
}

impl MappingEngine {
    pub fn new(keys: CandidateKeyTable, slots: &[SelectionSlot]) -> Self {
        Self {
            keys,
            slots: slots.to_vec(),
        }
    }

    pub fn slots(&self) -> &[SelectionSlot] {
        &self.slots
    }

    /// Propose catalog ids for every blank slot whose document text matches
    /// an entry. Slots already set in `current` are skipped outright.
    pub fn map(
        &self,
        extracted: &ExtractedFieldSet,
        current: &MasterDataSelection,
        catalogs: &MasterDataCatalogs,
        company_id: Option<&str>,
    ) -> MappingOutcome {
        let mut outcome = MappingOutcome::default();

        for slot in &self.slots {
            let slot = *slot;
            if current.is_set(slot) {
                continue;
            }

            let candidate = match slot.source() {
                SlotSource::FreeText(field) => self.keys.locate_free_text(extracted, field),
                SlotSource::Field(field) => self.keys.locate_field(extracted, field),
            };
            if candidate.is_empty() {
                continue;
            }

            let options = catalogs.options(slot, company_id);
            match first_match(&candidate, &options) {
                Some(entry) => {
                    debug!(slot = slot.label(), candidate = %candidate, id = %entry.id, name = %entry.name, "catalog match");
                    outcome.patch.insert(slot, entry.id.clone());
                    outcome.auto_filled.push(slot.label());
                }
                None => {
                    debug!(slot = slot.label(), candidate = %candidate, options = options.len(), "no catalog match");
                }
            }
        }

        if !outcome.is_empty() {
            info!(filled = ?outcome.auto_filled, "auto-mapping applied");
        }
        outcome
    }
}

/// First entry (in catalog order) whose name contains the candidate or is
/// contained in it, ignoring case.
fn first_match<'a>(candidate: &str, entries: &[&'a CatalogEntry]) -> Option<&'a CatalogEntry> {
    let candidate = candidate.trim().to_lowercase();
    if candidate.is_empty() {
        return None;
    }

    entries.iter().copied().find(|entry| {
        let name = entry.name.trim().to_lowercase();
        !name.is_empty() && (name.contains(&candidate) || candidate.contains(&name))
    })
}
