use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::backoffice::{
    AttentionItem, BackOfficeGateway, BillingInstallment, ClientSummary, CompanySummary,
    DocumentReceipt, FinalizeResponse, GatewayError, PolicySummary, ScanResult, SectionSummary,
    SubmissionRequest,
};
use crate::config::FlowConfig;
use crate::extraction::ExtractedFieldSet;
use crate::flows::{DocumentUpload, FlowContext, FlowKind, FlowSession};
use crate::mapping::{CatalogEntry, MasterDataCatalogs};

#[derive(Debug, Clone)]
pub(super) enum Failure {
    Unauthorized,
    Http(u16, &'static str),
}

impl Failure {
    fn into_error(self) -> GatewayError {
        match self {
            Failure::Unauthorized => GatewayError::Unauthorized,
            Failure::Http(status, message) => GatewayError::Http {
                status,
                message: message.to_string(),
            },
        }
    }
}

/// Scripted back office. Records every call it receives.
#[derive(Debug, Default)]
pub(super) struct FakeBackOffice {
    pub(super) scan: ScanResult,
    pub(super) inline_scan: bool,
    pub(super) hang_upload: bool,
    pub(super) hang_finalize: bool,
    pub(super) upload_failure: Option<Failure>,
    pub(super) catalogs: MasterDataCatalogs,
    pub(super) scan_script: Mutex<VecDeque<ScanResult>>,
    pub(super) finalize_script: Mutex<VecDeque<Result<FinalizeResponse, Failure>>>,
    pub(super) calls: Mutex<Vec<&'static str>>,
    pub(super) submitted: Mutex<Vec<(FlowKind, SubmissionRequest)>>,
}

impl FakeBackOffice {
    pub(super) fn scanning(scan: ScanResult) -> Self {
        Self {
            scan,
            inline_scan: true,
            catalogs: catalogs(),
            ..Self::default()
        }
    }

    pub(super) fn script_finalize(&self, reply: Result<FinalizeResponse, Failure>) {
        self.finalize_script
            .lock()
            .expect("script lock")
            .push_back(reply);
    }

    /// Queue a scan result; once the queue runs dry `scan` is returned.
    pub(super) fn script_scan(&self, scan: ScanResult) {
        self.scan_script
            .lock()
            .expect("script lock")
            .push_back(scan);
    }

    pub(super) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(super) fn submitted(&self) -> Vec<(FlowKind, SubmissionRequest)> {
        self.submitted.lock().expect("submitted lock").clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn next_scan(&self) -> ScanResult {
        self.scan_script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| self.scan.clone())
    }
}

#[async_trait]
impl BackOfficeGateway for FakeBackOffice {
    async fn search_clients(&self, term: &str) -> Result<Vec<ClientSummary>, GatewayError> {
        self.record("search_clients");
        Ok(vec![client()]
            .into_iter()
            .filter(|client| client.name.to_lowercase().contains(&term.to_lowercase()))
            .collect())
    }

    async fn client_policies(&self, _client_id: &str) -> Result<Vec<PolicySummary>, GatewayError> {
        self.record("client_policies");
        Ok(vec![prior_policy()])
    }

    async fn companies(&self) -> Result<Vec<CompanySummary>, GatewayError> {
        self.record("companies");
        Ok(Vec::new())
    }

    async fn sections(&self) -> Result<Vec<SectionSummary>, GatewayError> {
        self.record("sections");
        Ok(Vec::new())
    }

    async fn master_data(&self, _company_id: &str) -> Result<MasterDataCatalogs, GatewayError> {
        self.record("master_data");
        Ok(self.catalogs.clone())
    }

    async fn upload_document(
        &self,
        _kind: FlowKind,
        _context: &FlowContext,
        _document: &DocumentUpload,
    ) -> Result<DocumentReceipt, GatewayError> {
        self.record("upload");
        if self.hang_upload {
            std::future::pending::<()>().await;
        }
        if let Some(failure) = self.upload_failure.clone() {
            return Err(failure.into_error());
        }
        Ok(DocumentReceipt {
            document_id: "doc-1".to_string(),
            scan: self.inline_scan.then(|| self.next_scan()),
        })
    }

    async fn scan_document(&self, _document_id: &str) -> Result<ScanResult, GatewayError> {
        self.record("scan");
        Ok(self.next_scan())
    }

    async fn finalize(
        &self,
        kind: FlowKind,
        request: &SubmissionRequest,
    ) -> Result<FinalizeResponse, GatewayError> {
        self.record("finalize");
        self.submitted
            .lock()
            .expect("submitted lock")
            .push((kind, request.clone()));
        if self.hang_finalize {
            std::future::pending::<()>().await;
        }
        let scripted = self
            .finalize_script
            .lock()
            .expect("script lock")
            .pop_front();
        match scripted {
            Some(Ok(response)) => Ok(response),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Ok(accepted("4411-2025")),
        }
    }

    async fn billing(&self, _policy_id: &str) -> Result<Vec<BillingInstallment>, GatewayError> {
        self.record("billing");
        Ok(Vec::new())
    }
}

pub(super) fn accepted(number: &str) -> FinalizeResponse {
    FinalizeResponse {
        success: true,
        message: "Póliza registrada".to_string(),
        numero_poliza: Some(number.to_string()),
        poliza_id: Some("88".to_string()),
        advertencias: vec!["Verificar padrón".to_string()],
    }
}

pub(super) fn client() -> ClientSummary {
    ClientSummary {
        id: "10".to_string(),
        name: "María Pérez".to_string(),
        document: Some("1.234.567-8".to_string()),
    }
}

pub(super) fn prior_policy() -> PolicySummary {
    PolicySummary {
        id: "900".to_string(),
        number: "AU-55120".to_string(),
        company_id: Some("2".to_string()),
        section_id: Some("4".to_string()),
        valid_to: Some("2025-09-30".to_string()),
    }
}

pub(super) fn new_policy_context() -> FlowContext {
    FlowContext::new_policy(&client(), "2", "4")
}

pub(super) fn catalogs() -> MasterDataCatalogs {
    MasterDataCatalogs {
        fuels: vec![CatalogEntry::new("1", "Gasoil"), CatalogEntry::new("3", "Nafta")],
        categories: vec![
            CatalogEntry::new("20", "Automóvil"),
            CatalogEntry::new("21", "Camioneta"),
        ],
        destinations: vec![CatalogEntry::new("30", "Particular")],
        departments: vec![CatalogEntry::new("1", "Montevideo")],
        qualities: vec![CatalogEntry::new("40", "Propietario")],
        tariffs: vec![CatalogEntry::new("50", "Tarifa Full").for_company("2")],
    }
}

pub(super) fn extracted() -> ExtractedFieldSet {
    [
        ("poliza.numero", "PÓLIZA NRO: 4411-2025"),
        ("poliza.vigencia.desde", "01/10/2025"),
        ("poliza.vigencia.hasta", "01/10/2026"),
        ("costo.premio", "$ 12.450,00"),
        ("pago.cantidad_cuotas", "3"),
        ("vehiculo.marca", "MARCA\nVOLKSWAGEN"),
        ("vehiculo.modelo", "GOL TREND"),
        ("vehiculo.combustible", "COMBUSTIBLE\nNAFTA"),
        ("vehiculo.categoria", "AUTOMÓVIL"),
        ("vehiculo.destino", "PARTICULAR"),
        ("asegurado.nombre", "MARÍA PÉREZ"),
        ("asegurado.departamento", "MONTEVIDEO"),
    ]
    .into_iter()
    .collect()
}

pub(super) fn scan_result(confidence: f64) -> ScanResult {
    ScanResult {
        extracted: extracted(),
        confidence,
        requires_attention: Vec::new(),
    }
}

pub(super) fn scan_with(
    pairs: &[(&str, &str)],
    attention: Vec<AttentionItem>,
    confidence: f64,
) -> ScanResult {
    ScanResult {
        extracted: pairs.iter().copied().collect(),
        confidence,
        requires_attention: attention,
    }
}

pub(super) fn pdf() -> DocumentUpload {
    DocumentUpload::new("poliza.pdf", mime::APPLICATION_PDF, b"%PDF-1.4 test".to_vec())
}

pub(super) fn session(
    kind: FlowKind,
    gateway: &Arc<FakeBackOffice>,
) -> FlowSession<FakeBackOffice> {
    FlowSession::new(kind, Arc::clone(gateway), FlowConfig::default())
}
