//! Step-advance guards. Pure functions of the flow state; nothing here
//! mutates or performs I/O.

use super::state::{FlowState, FlowStep, ScanStatus};
use crate::mapping::SelectionSlot;

/// Step 1: a client plus the flow's context (company and section for new
/// policies, the prior policy for renewals and changes).
pub fn search_complete(state: &FlowState) -> bool {
    state.context.missing_for(state.kind).is_none()
}

/// Step 2: the scan finished and its confidence reaches the threshold.
pub fn upload_complete(state: &FlowState, confidence_threshold: f64) -> bool {
    matches!(state.scan, ScanStatus::Completed { confidence } if confidence >= confidence_threshold)
}

/// Step 3: extracted data is present and fuel and category were chosen.
pub fn review_complete(state: &FlowState) -> bool {
    !state.fields.is_empty()
        && state.selection.is_set(SelectionSlot::Fuel)
        && state.selection.is_set(SelectionSlot::Category)
}

/// Whether the current step may be left forward. The last step has no
/// successor and never advances.
pub fn can_advance(state: &FlowState, confidence_threshold: f64) -> bool {
    if state.is_busy() {
        return false;
    }
    match state.step {
        FlowStep::Search => search_complete(state),
        FlowStep::Upload => upload_complete(state, confidence_threshold),
        FlowStep::Review => review_complete(state),
        FlowStep::Confirm => false,
    }
}

pub fn can_go_back(state: &FlowState) -> bool {
    !state.is_busy() && state.step.previous().is_some()
}

pub fn can_submit(state: &FlowState) -> bool {
    !state.is_busy() && search_complete(state) && review_complete(state)
}
