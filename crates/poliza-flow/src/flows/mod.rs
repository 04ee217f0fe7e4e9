//! Wizard state machines for the new-policy, renewal and change flows.
//!
//! All three flows share one state shape and one session type; what differs
//! per flow (accepted files, extra candidate keys, mappable slots, required
//! context, finalize endpoint) hangs off [`FlowKind`].

pub mod guards;
mod session;
mod state;
mod upload;


pub use session::FlowSession;
pub use state::{
    FlowContext, FlowPhase, FlowState, FlowStep, ScanStatus, SubmissionResult, SubmitStatus,
    UploadedDocument,
};
pub use upload::DocumentUpload;

use mime::Mime;
use serde::{Deserialize, Serialize};

use crate::backoffice::GatewayError;
use crate::extraction::{CandidateKeyTable, PolicyField};
use crate::mapping::SelectionSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    NewPolicy,
    Renewal,
    Change,
}

impl FlowKind {
    pub const fn ordered() -> [Self; 3] {
        [Self::NewPolicy, Self::Renewal, Self::Change]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::NewPolicy => "Nueva póliza",
            Self::Renewal => "Renovación",
            Self::Change => "Cambio",
        }
    }

    /// Value of the `flujo` field sent with uploads.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::NewPolicy => "nueva",
            Self::Renewal => "renovacion",
            Self::Change => "cambio",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" | "new-policy" | "new_policy" | "nueva" => Some(Self::NewPolicy),
            "renewal" | "renew" | "renovacion" => Some(Self::Renewal),
            "change" | "cambio" | "endoso" => Some(Self::Change),
            _ => None,
        }
    }

    /// Renewals and changes start from an existing policy instead of a
    /// company and section.
    pub const fn requires_prior_policy(self) -> bool {
        matches!(self, Self::Renewal | Self::Change)
    }

    pub fn accepted_types(self) -> Vec<Mime> {
        match self {
            Self::Renewal => vec![mime::APPLICATION_PDF],
            Self::NewPolicy | Self::Change => {
                vec![mime::APPLICATION_PDF, mime::IMAGE_JPEG, mime::IMAGE_PNG]
            }
        }
    }

    pub fn key_table(self) -> CandidateKeyTable {
        let table = CandidateKeyTable::standard();
        match self {
            Self::NewPolicy => table,
            Self::Renewal => table
                .with_keys(
                    PolicyField::PolicyNumber,
                    &["renovacion.numeroPoliza", "renovacion.numero", "polizaRenovada.numero"],
                )
                .with_keys(PolicyField::ValidFrom, &["renovacion.vigencia.desde", "renovacionDesde"])
                .with_keys(PolicyField::ValidTo, &["renovacion.vigencia.hasta", "renovacionHasta"])
                .with_keys(PolicyField::Premium, &["renovacion.premio", "renovacionPremio"]),
            Self::Change => table
                .with_keys(
                    PolicyField::PolicyNumber,
                    &["endoso.numeroPoliza", "cambio.numeroPoliza", "endoso.poliza"],
                )
                .with_keys(PolicyField::ValidFrom, &["endoso.vigencia.desde", "cambio.fechaVigencia"])
                .with_keys(PolicyField::ValidTo, &["endoso.vigencia.hasta"])
                .with_keys(PolicyField::Premium, &["endoso.premio", "cambio.premio"]),
        }
    }

    /// Catalog slots the mapping engine may pre-select in this flow.
    pub const fn mappable_slots(self) -> &'static [SelectionSlot] {
        match self {
            Self::NewPolicy => &[
                SelectionSlot::Fuel,
                SelectionSlot::Category,
                SelectionSlot::Destination,
                SelectionSlot::Department,
                SelectionSlot::Quality,
                SelectionSlot::Tariff,
            ],
            Self::Renewal => &[
                SelectionSlot::Fuel,
                SelectionSlot::Category,
                SelectionSlot::Destination,
                SelectionSlot::Department,
            ],
            Self::Change => &[
                SelectionSlot::Fuel,
                SelectionSlot::Destination,
                SelectionSlot::Department,
            ],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("select a {0} before continuing")]
    MissingContext(&'static str),
    #[error("file type {0} is not accepted by this flow")]
    UnsupportedFileType(String),
    #[error("file is {size} bytes, the limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("file is empty")]
    EmptyFile,
    #[error("no document has been uploaded")]
    NoDocument,
    #[error("step {} is not complete", .0.number())]
    StepBlocked(FlowStep),
    #[error("another request is still in progress")]
    Busy,
    #[error("policy was already submitted")]
    AlreadySubmitted,
    #[error("back office refused the submission: {0}")]
    Rejected(String),
    #[error("session expired; sign in again")]
    Unauthorized,
    #[error(transparent)]
    Gateway(GatewayError),
}

impl From<GatewayError> for FlowError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::Unauthorized => Self::Unauthorized,
            other => Self::Gateway(other),
        }
    }
}

impl FlowError {
    /// Validation failures are raised before any request leaves the client.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingContext(_)
                | Self::UnsupportedFileType(_)
                | Self::FileTooLarge { .. }
                | Self::EmptyFile
                | Self::NoDocument
                | Self::StepBlocked(_)
        )
    }
}
