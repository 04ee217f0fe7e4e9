//! REST access to the Velneo back office.

mod auth;
mod http;
mod models;

pub use auth::{FileTokenStore, StaticToken, TokenProvider};
pub use http::{error_message_from_body, HttpBackOffice};
pub use models::{
    AttentionItem, AttentionSeverity, BillingInstallment, ClientSummary, CompanySummary,
    DocumentReceipt, FinalizeResponse, PolicySummary, ScanResult, SectionSummary,
    SubmissionRequest,
};

use async_trait::async_trait;

use crate::flows::{DocumentUpload, FlowContext, FlowKind};
use crate::mapping::MasterDataCatalogs;

/// Everything the wizard needs from the back office. The HTTP client is the
/// production implementation; tests substitute in-memory fakes.
#[async_trait]
pub trait BackOfficeGateway: Send + Sync {
    async fn search_clients(&self, term: &str) -> Result<Vec<ClientSummary>, GatewayError>;
    async fn client_policies(&self, client_id: &str) -> Result<Vec<PolicySummary>, GatewayError>;
    async fn companies(&self) -> Result<Vec<CompanySummary>, GatewayError>;
    async fn sections(&self) -> Result<Vec<SectionSummary>, GatewayError>;
    async fn master_data(&self, company_id: &str) -> Result<MasterDataCatalogs, GatewayError>;
    async fn upload_document(
        &self,
        kind: FlowKind,
        context: &FlowContext,
        document: &DocumentUpload,
    ) -> Result<DocumentReceipt, GatewayError>;
    async fn scan_document(&self, document_id: &str) -> Result<ScanResult, GatewayError>;
    async fn finalize(
        &self,
        kind: FlowKind,
        request: &SubmissionRequest,
    ) -> Result<FinalizeResponse, GatewayError>;
    async fn billing(&self, policy_id: &str) -> Result<Vec<BillingInstallment>, GatewayError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("back office rejected the credentials")]
    Unauthorized,
    #[error("back office answered {status}: {message}")]
    Http { status: u16, message: String },
    #[error("back office unreachable: {0}")]
    Transport(String),
    #[error("unexpected back-office response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Text to show the user: the server's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Unauthorized => "La sesión expiró. Inicie sesión nuevamente.".to_string(),
            GatewayError::Http { message, .. } if !message.trim().is_empty() => {
                message.trim().to_string()
            }
            GatewayError::Http { status, .. } => {
                format!("El servidor respondió con un error ({status}).")
            }
            GatewayError::Transport(_) => {
                "No se pudo conectar con el servidor. Intente nuevamente.".to_string()
            }
            GatewayError::Decode(_) => "El servidor devolvió una respuesta inesperada.".to_string(),
        }
    }
}
