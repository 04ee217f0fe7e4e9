use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::auth::{FileTokenStore, TokenProvider};
use super::models::{
    BillingInstallment, ClientSummary, CompanySummary, DocumentReceipt, FinalizeResponse,
    PolicySummary, ScanEnvelope, ScanResult, SectionSummary, SubmissionRequest,
};
use super::{BackOfficeGateway, GatewayError};
use crate::config::BackOfficeConfig;
use crate::flows::{DocumentUpload, FlowContext, FlowKind};
use crate::mapping::MasterDataCatalogs;

/// reqwest-backed client for the back-office REST API.
#[derive(Debug, Clone)]
pub struct HttpBackOffice {
    client: Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpBackOffice {
    pub fn new(base_url: Url, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            tokens,
        }
    }

    pub fn from_config(config: &BackOfficeConfig) -> Self {
        let tokens = Arc::new(FileTokenStore::new(config.token_path.clone()));
        Self::new(config.base_url.clone(), tokens)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|err| GatewayError::Transport(format!("invalid endpoint {path}: {err}")))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "back office rejected the token");
            self.tokens.invalidate();
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            let url = response.url().clone();
            let body = response.text().await.unwrap_or_default();
            let message = error_message_from_body(&body);
            warn!(%url, status = status.as_u16(), message = %message, "back-office request failed");
            return Err(GatewayError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = self.execute(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        serde_json::from_slice(&body).map_err(|err| GatewayError::Decode(err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, GatewayError> {
        debug!(%url, "GET");
        self.fetch_json(self.client.get(url)).await
    }
}

#[async_trait]
impl BackOfficeGateway for HttpBackOffice {
    async fn search_clients(&self, term: &str) -> Result<Vec<ClientSummary>, GatewayError> {
        let mut url = self.endpoint("api/clientes")?;
        url.query_pairs_mut().append_pair("busqueda", term.trim());
        self.get_json(url).await
    }

    async fn client_policies(&self, client_id: &str) -> Result<Vec<PolicySummary>, GatewayError> {
        let url = self.endpoint(&format!("api/clientes/{}/polizas", client_id.trim()))?;
        self.get_json(url).await
    }

    async fn companies(&self) -> Result<Vec<CompanySummary>, GatewayError> {
        self.get_json(self.endpoint("api/companias")?).await
    }

    async fn sections(&self) -> Result<Vec<SectionSummary>, GatewayError> {
        self.get_json(self.endpoint("api/secciones")?).await
    }

    async fn master_data(&self, company_id: &str) -> Result<MasterDataCatalogs, GatewayError> {
        let mut url = self.endpoint("api/maestros")?;
        url.query_pairs_mut().append_pair("companiaId", company_id.trim());
        self.get_json(url).await
    }

    async fn upload_document(
        &self,
        kind: FlowKind,
        context: &FlowContext,
        document: &DocumentUpload,
    ) -> Result<DocumentReceipt, GatewayError> {
        let url = self.endpoint("api/documentos/upload")?;
        let part = Part::bytes(document.bytes.clone())
            .file_name(document.file_name.clone())
            .mime_str(document.content_type.as_ref())
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let mut form = Form::new()
            .part("file", part)
            .text("flujo", kind.wire_name());
        let ids = [
            ("clienteId", context.client()),
            ("companiaId", context.company()),
            ("seccionId", context.section()),
            ("polizaAnteriorId", context.prior_policy()),
        ];
        for (name, value) in ids {
            if let Some(value) = value {
                form = form.text(name, value.to_string());
            }
        }

        info!(
            flow = kind.wire_name(),
            file = %document.file_name,
            size = document.bytes.len(),
            "uploading document"
        );
        let envelope: ScanEnvelope = self
            .fetch_json(self.client.post(url).multipart(form))
            .await?;
        let document_id = envelope
            .documento_id
            .clone()
            .ok_or_else(|| GatewayError::Decode("upload response carries no document id".to_string()))?;

        Ok(DocumentReceipt {
            scan: envelope.scan(),
            document_id,
        })
    }

    async fn scan_document(&self, document_id: &str) -> Result<ScanResult, GatewayError> {
        let url = self.endpoint(&format!("api/documentos/{}/escanear", document_id.trim()))?;
        info!(document_id, "requesting scan");
        let envelope: ScanEnvelope = self.fetch_json(self.client.post(url)).await?;
        envelope
            .scan()
            .ok_or_else(|| GatewayError::Decode("scan response carries no extracted data".to_string()))
    }

    async fn finalize(
        &self,
        kind: FlowKind,
        request: &SubmissionRequest,
    ) -> Result<FinalizeResponse, GatewayError> {
        let url = self.endpoint(finalize_path(kind))?;
        info!(flow = kind.wire_name(), client = %request.cliente_id, "finalizing in back office");
        self.fetch_json(self.client.post(url).json(request)).await
    }

    async fn billing(&self, policy_id: &str) -> Result<Vec<BillingInstallment>, GatewayError> {
        let url = self.endpoint(&format!("api/polizas/{}/cuotas", policy_id.trim()))?;
        self.get_json(url).await
    }
}

fn finalize_path(kind: FlowKind) -> &'static str {
    match kind {
        FlowKind::NewPolicy => "api/polizas/crear-en-velneo",
        FlowKind::Renewal => "api/renovaciones/renovar-en-velneo",
        FlowKind::Change => "api/cambios/modificar-en-velneo",
    }
}

/// Pull a human-readable message out of an error body: JSON `message`-like
/// fields, validation-problem `errors`, or short plain text. HTML pages and
/// oversized bodies yield an empty string.
pub fn error_message_from_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        for key in ["message", "mensaje", "error"] {
            if let Some(text) = value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
            {
                return text.to_string();
            }
        }

        if let Some(errors) = value.get("errors").and_then(Value::as_object) {
            let messages: Vec<&str> = errors
                .values()
                .filter_map(Value::as_array)
                .flatten()
                .filter_map(Value::as_str)
                .collect();
            if !messages.is_empty() {
                return messages.join("; ");
            }
        }

        for key in ["detail", "title"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return text.trim().to_string();
            }
        }

        return match value {
            Value::String(text) => text.trim().to_string(),
            _ => String::new(),
        };
    }

    if trimmed.starts_with('<') || trimmed.chars().count() > 300 {
        return String::new();
    }
    trimmed.to_string()
}
