use serde::{Deserialize, Serialize};

use super::FlowKind;
use crate::backoffice::{AttentionItem, ClientSummary, PolicySummary};
use crate::extraction::{CanonicalPolicyFields, ExtractedFieldSet};
use crate::mapping::{MasterDataSelection, SelectionSlot};

/// Wizard pages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Search,
    Upload,
    Review,
    Confirm,
}

impl FlowStep {
    pub const fn number(self) -> u8 {
        match self {
            Self::Search => 1,
            Self::Upload => 2,
            Self::Review => 3,
            Self::Confirm => 4,
        }
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Search => Some(Self::Upload),
            Self::Upload => Some(Self::Review),
            Self::Review => Some(Self::Confirm),
            Self::Confirm => None,
        }
    }

    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Search => None,
            Self::Upload => Some(Self::Search),
            Self::Review => Some(Self::Upload),
            Self::Confirm => Some(Self::Review),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Search => "Búsqueda",
            Self::Upload => "Documento",
            Self::Review => "Validación",
            Self::Confirm => "Confirmación",
        }
    }
}

/// Who and what the flow is about, chosen on the search step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowContext {
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub company_id: Option<String>,
    pub section_id: Option<String>,
    /// Policy being renewed or changed.
    pub prior_policy_id: Option<String>,
}

impl FlowContext {
    pub fn new_policy(
        client: &ClientSummary,
        company_id: impl Into<String>,
        section_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: Some(client.id.clone()),
            client_name: Some(client.name.clone()),
            company_id: Some(company_id.into()),
            section_id: Some(section_id.into()),
            prior_policy_id: None,
        }
    }

    /// Context for renewing or changing `policy`; company and section are
    /// inherited from it.
    pub fn from_policy(client: &ClientSummary, policy: &PolicySummary) -> Self {
        Self {
            client_id: Some(client.id.clone()),
            client_name: Some(client.name.clone()),
            company_id: policy.company_id.clone(),
            section_id: policy.section_id.clone(),
            prior_policy_id: Some(policy.id.clone()),
        }
    }

    pub fn client(&self) -> Option<&str> {
        non_blank(&self.client_id)
    }

    pub fn company(&self) -> Option<&str> {
        non_blank(&self.company_id)
    }

    pub fn section(&self) -> Option<&str> {
        non_blank(&self.section_id)
    }

    pub fn prior_policy(&self) -> Option<&str> {
        non_blank(&self.prior_policy_id)
    }

    /// Name of the first piece of context the flow still needs, if any.
    pub fn missing_for(&self, kind: FlowKind) -> Option<&'static str> {
        if self.client().is_none() {
            return Some("client");
        }
        if kind.requires_prior_policy() {
            if self.prior_policy().is_none() {
                return Some("policy");
            }
        } else {
            if self.company().is_none() {
                return Some("company");
            }
            if self.section().is_none() {
                return Some("section");
            }
        }
        None
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// The file the user picked, plus the id the back office assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedDocument {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanStatus {
    Idle,
    Uploading,
    Scanning,
    Completed { confidence: f64 },
    Failed { message: String },
}

impl ScanStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Uploading | Self::Scanning)
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            Self::Completed { confidence } => Some(*confidence),
            _ => None,
        }
    }
}

/// What the back office reported after creating, renewing or changing a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    pub policy_number: Option<String>,
    pub policy_id: Option<String>,
    pub message: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitStatus {
    Idle,
    Submitting,
    Submitted { result: SubmissionResult },
    Failed { message: String },
}

/// Lifecycle position derived from the state, for display and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    Idle,
    ContextSelected,
    Uploading,
    Scanning,
    ScanFailed,
    Reviewing,
    Submitting,
    Submitted,
    SubmitFailed,
}

/// Everything one wizard run holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowState {
    pub kind: FlowKind,
    pub step: FlowStep,
    pub context: FlowContext,
    pub document: Option<UploadedDocument>,
    pub scan: ScanStatus,
    #[serde(skip)]
    pub extracted: ExtractedFieldSet,
    pub attention: Vec<AttentionItem>,
    pub fields: CanonicalPolicyFields,
    pub selection: MasterDataSelection,
    /// Slots the mapping engine filled and the user has not touched since.
    pub auto_filled: Vec<SelectionSlot>,
    /// The installment count was taken from the scanned document.
    pub installments_from_scan: bool,
    pub submit: SubmitStatus,
}

impl FlowState {
    pub fn new(kind: FlowKind) -> Self {
        Self {
            kind,
            step: FlowStep::Search,
            context: FlowContext::default(),
            document: None,
            scan: ScanStatus::Idle,
            extracted: ExtractedFieldSet::default(),
            attention: Vec::new(),
            fields: CanonicalPolicyFields::default(),
            selection: MasterDataSelection::default(),
            auto_filled: Vec::new(),
            installments_from_scan: false,
            submit: SubmitStatus::Idle,
        }
    }

    /// A request is outstanding; navigation and actions are disabled.
    pub fn is_busy(&self) -> bool {
        self.scan.is_pending() || matches!(self.submit, SubmitStatus::Submitting)
    }

    pub fn phase(&self) -> FlowPhase {
        match &self.submit {
            SubmitStatus::Submitting => return FlowPhase::Submitting,
            SubmitStatus::Submitted { .. } => return FlowPhase::Submitted,
            SubmitStatus::Failed { .. } => return FlowPhase::SubmitFailed,
            SubmitStatus::Idle => {}
        }

        match &self.scan {
            ScanStatus::Uploading => FlowPhase::Uploading,
            ScanStatus::Scanning => FlowPhase::Scanning,
            ScanStatus::Failed { .. } => FlowPhase::ScanFailed,
            ScanStatus::Completed { .. } => FlowPhase::Reviewing,
            ScanStatus::Idle if self.context.missing_for(self.kind).is_none() => {
                FlowPhase::ContextSelected
            }
            ScanStatus::Idle => FlowPhase::Idle,
        }
    }
}
