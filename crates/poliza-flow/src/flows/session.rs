use std::sync::Arc;

use tracing::{debug, info, warn};

use super::guards;
use super::state::{
    FlowContext, FlowPhase, FlowState, FlowStep, ScanStatus, SubmissionResult, SubmitStatus,
    UploadedDocument,
};
use super::upload::DocumentUpload;
use super::{FlowError, FlowKind};
use crate::backoffice::{
    AttentionItem, AttentionSeverity, BackOfficeGateway, GatewayError, ScanResult,
    SubmissionRequest,
};
use crate::config::FlowConfig;
use crate::extraction::{CandidateKeyTable, CanonicalPolicyFields, PolicyField};
use crate::mapping::{MappingEngine, MasterDataCatalogs, MasterDataSelection, SelectionSlot};

const MISSING_FIELD_REASON: &str = "No se pudo extraer del documento";
const REJECTED_FALLBACK: &str = "El servidor rechazó la operación.";

/// One run of a wizard. Owned by a single caller; every action takes
/// `&mut self`, so at most one request is outstanding at a time.
pub struct FlowSession<G: ?Sized> {
    gateway: Arc<G>,
    config: FlowConfig,
    keys: CandidateKeyTable,
    engine: MappingEngine,
    catalogs: MasterDataCatalogs,
    state: FlowState,
}

impl<G> FlowSession<G>
where
    G: BackOfficeGateway + ?Sized,
{
    pub fn new(kind: FlowKind, gateway: Arc<G>, config: FlowConfig) -> Self {
        let keys = kind.key_table();
        let engine = MappingEngine::new(keys.clone(), kind.mappable_slots());
        Self {
            gateway,
            config,
            keys,
            engine,
            catalogs: MasterDataCatalogs::default(),
            state: FlowState::new(kind),
        }
    }

    pub fn kind(&self) -> FlowKind {
        self.state.kind
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn phase(&self) -> FlowPhase {
        self.state.phase()
    }

    pub fn catalogs(&self) -> &MasterDataCatalogs {
        &self.catalogs
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn can_advance(&self) -> bool {
        guards::can_advance(&self.state, self.config.confidence_threshold)
    }

    pub fn can_submit(&self) -> bool {
        guards::can_submit(&self.state)
    }

    pub fn select_context(&mut self, context: FlowContext) -> Result<(), FlowError> {
        self.ensure_idle()?;
        if self.state.context.company() != context.company()
            && self.state.selection.is_set(SelectionSlot::Tariff)
        {
            debug!("company changed, clearing tariff");
            self.state.selection.set(SelectionSlot::Tariff, None);
        }
        self.state.context = context;
        info!(
            flow = self.state.kind.wire_name(),
            client = ?self.state.context.client(),
            company = ?self.state.context.company(),
            prior_policy = ?self.state.context.prior_policy(),
            "flow context selected"
        );
        Ok(())
    }

    /// Install catalogs obtained elsewhere (files, cache) and re-run mapping.
    pub fn set_catalogs(&mut self, catalogs: MasterDataCatalogs) {
        self.catalogs = catalogs;
        self.apply_mapping();
    }

    pub async fn load_master_data(&mut self) -> Result<(), FlowError> {
        let company = self
            .state
            .context
            .company()
            .map(str::to_string)
            .ok_or(FlowError::MissingContext("company"))?;

        let fetched = self.gateway.master_data(&company).await;
        let catalogs = match fetched {
            Ok(catalogs) => catalogs,
            Err(err) => return Err(self.gateway_failure(err)),
        };
        info!(
            company = %company,
            fuels = catalogs.fuels.len(),
            categories = catalogs.categories.len(),
            tariffs = catalogs.tariffs.len(),
            "master data loaded"
        );
        self.set_catalogs(catalogs);
        Ok(())
    }

    /// Fill blank catalog slots from the scanned text. Returns the slots
    /// that changed.
    pub fn apply_mapping(&mut self) -> Vec<SelectionSlot> {
        let outcome = self.engine.map(
            &self.state.extracted,
            &self.state.selection,
            &self.catalogs,
            self.state.context.company(),
        );
        let filled = self.state.selection.merge(&outcome.patch);
        for slot in &filled {
            if !self.state.auto_filled.contains(slot) {
                self.state.auto_filled.push(*slot);
            }
        }
        filled
    }

    /// Validate, upload and scan a document. A pending status left behind
    /// by an interrupted call is discarded and the upload starts over.
    pub async fn upload(&mut self, document: DocumentUpload) -> Result<(), FlowError> {
        if matches!(self.state.submit, SubmitStatus::Submitted { .. }) {
            return Err(FlowError::AlreadySubmitted);
        }
        if let Some(missing) = self.state.context.missing_for(self.state.kind) {
            return Err(FlowError::MissingContext(missing));
        }
        document.validate(self.state.kind, self.config.max_upload_bytes())?;

        if self.state.scan.is_pending() {
            warn!("discarding interrupted upload");
        }
        self.clear_document();
        self.state.document = Some(UploadedDocument {
            file_name: document.file_name.clone(),
            content_type: document.content_type.essence_str().to_string(),
            size: document.size(),
            document_id: None,
        });
        self.state.scan = ScanStatus::Uploading;

        let context = self.state.context.clone();
        let uploaded = self
            .gateway
            .upload_document(self.state.kind, &context, &document)
            .await;
        let receipt = match uploaded {
            Ok(receipt) => receipt,
            Err(err) => return Err(self.scan_failed(err)),
        };
        debug!(document_id = %receipt.document_id, scanned = receipt.scan.is_some(), "document stored");
        if let Some(stored) = self.state.document.as_mut() {
            stored.document_id = Some(receipt.document_id.clone());
        }

        let scan = match receipt.scan {
            Some(scan) => scan,
            None => {
                self.state.scan = ScanStatus::Scanning;
                let scanned = self.gateway.scan_document(&receipt.document_id).await;
                match scanned {
                    Ok(scan) => scan,
                    Err(err) => return Err(self.scan_failed(err)),
                }
            }
        };
        self.apply_scan(scan);
        Ok(())
    }

    /// Run the scan again for the stored document.
    pub async fn rescan(&mut self) -> Result<(), FlowError> {
        if matches!(self.state.submit, SubmitStatus::Submitted { .. }) {
            return Err(FlowError::AlreadySubmitted);
        }
        self.ensure_idle()?;
        let document_id = self
            .state
            .document
            .as_ref()
            .and_then(|document| document.document_id.clone())
            .ok_or(FlowError::NoDocument)?;

        self.state.scan = ScanStatus::Scanning;
        let scanned = self.gateway.scan_document(&document_id).await;
        match scanned {
            Ok(scan) => {
                self.forget_scanned_selections();
                self.apply_scan(scan);
                Ok(())
            }
            Err(err) => Err(self.scan_failed(err)),
        }
    }

    pub fn update_fields<F>(&mut self, edit: F)
    where
        F: FnOnce(&mut CanonicalPolicyFields),
    {
        edit(&mut self.state.fields);
    }

    pub fn set_field(&mut self, field: PolicyField, value: impl Into<String>) {
        self.state.fields.set(field, value);
    }

    /// Manual selection. The slot stops counting as auto-filled.
    pub fn select(&mut self, slot: SelectionSlot, id: Option<String>) {
        self.state.selection.set(slot, id);
        self.state.auto_filled.retain(|filled| *filled != slot);
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.state.selection.notes = notes.into();
    }

    pub fn set_installments(&mut self, count: Option<u32>) {
        self.state.selection.installment_count = count.filter(|count| *count > 0);
        self.state.installments_from_scan = false;
    }

    pub fn advance(&mut self) -> Result<FlowStep, FlowError> {
        self.ensure_idle()?;
        let current = self.state.step;
        let next = match current.next() {
            Some(next) if self.can_advance() => next,
            _ => {
                debug!(step = current.number(), "advance refused");
                return Err(FlowError::StepBlocked(current));
            }
        };
        self.state.step = next;
        info!(flow = self.state.kind.wire_name(), step = next.number(), "step advanced");
        Ok(next)
    }

    /// Step back; on the first step this is a no-op.
    pub fn back(&mut self) -> Result<FlowStep, FlowError> {
        self.ensure_idle()?;
        if let Some(previous) = self.state.step.previous() {
            self.state.step = previous;
            debug!(step = previous.number(), "step back");
        }
        Ok(self.state.step)
    }

    /// Send the assembled request to the flow's finalize endpoint. A failed
    /// submission may be retried by calling this again.
    pub async fn submit(&mut self) -> Result<SubmissionResult, FlowError> {
        if matches!(self.state.submit, SubmitStatus::Submitted { .. }) {
            return Err(FlowError::AlreadySubmitted);
        }
        if self.state.scan.is_pending() {
            return Err(FlowError::Busy);
        }
        let request = self.build_request()?;
        let kind = self.state.kind;

        self.state.submit = SubmitStatus::Submitting;
        info!(flow = kind.wire_name(), "submitting");

        let finalized = self.gateway.finalize(kind, &request).await;
        match finalized {
            Ok(response) if response.success => {
                let result = SubmissionResult {
                    policy_number: response.numero_poliza,
                    policy_id: response.poliza_id,
                    message: response.message,
                    warnings: response.advertencias,
                };
                info!(
                    flow = kind.wire_name(),
                    policy = ?result.policy_number,
                    warnings = result.warnings.len(),
                    "submission accepted"
                );
                self.state.submit = SubmitStatus::Submitted {
                    result: result.clone(),
                };
                Ok(result)
            }
            Ok(response) => {
                let message = match response.message.trim() {
                    "" => REJECTED_FALLBACK.to_string(),
                    text => text.to_string(),
                };
                warn!(flow = kind.wire_name(), message = %message, "submission rejected");
                self.state.submit = SubmitStatus::Failed {
                    message: message.clone(),
                };
                Err(FlowError::Rejected(message))
            }
            Err(GatewayError::Unauthorized) => Err(self.expire_session()),
            Err(err) => {
                warn!(flow = kind.wire_name(), error = %err, "submission failed");
                self.state.submit = SubmitStatus::Failed {
                    message: err.user_message(),
                };
                Err(FlowError::Gateway(err))
            }
        }
    }

    /// Clear statuses left pending by a request whose future was dropped.
    /// Returns whether anything was pending.
    pub fn cancel_pending(&mut self) -> bool {
        let mut cancelled = false;
        if self.state.scan.is_pending() {
            self.state.scan = ScanStatus::Idle;
            self.state.document = None;
            cancelled = true;
        }
        if matches!(self.state.submit, SubmitStatus::Submitting) {
            self.state.submit = SubmitStatus::Idle;
            cancelled = true;
        }
        if cancelled {
            info!(flow = self.state.kind.wire_name(), "pending request cancelled");
        }
        cancelled
    }

    pub fn reset(&mut self) {
        self.state = FlowState::new(self.state.kind);
        info!(flow = self.state.kind.wire_name(), "flow reset");
    }

    fn build_request(&self) -> Result<SubmissionRequest, FlowError> {
        let context = &self.state.context;
        if let Some(missing) = context.missing_for(self.state.kind) {
            return Err(FlowError::MissingContext(missing));
        }
        if !guards::review_complete(&self.state) {
            return Err(FlowError::StepBlocked(FlowStep::Review));
        }
        let client = context.client().ok_or(FlowError::MissingContext("client"))?;

        Ok(SubmissionRequest {
            cliente_id: client.to_string(),
            compania_id: context.company().map(str::to_string),
            seccion_id: context.section().map(str::to_string),
            poliza_anterior_id: context.prior_policy().map(str::to_string),
            documento_id: self
                .state
                .document
                .as_ref()
                .and_then(|document| document.document_id.clone()),
            campos: self.state.fields.clone(),
            seleccion: MasterDataSelection {
                installment_count: self
                    .state
                    .selection
                    .installment_count
                    .or_else(|| scanned_installments(&self.state.fields)),
                ..self.state.selection.clone()
            },
        })
    }

    fn apply_scan(&mut self, scan: ScanResult) {
        let fields = self.keys.canonical_fields(&scan.extracted);

        let mut attention = scan.requires_attention;
        for field in fields.missing_required() {
            if !already_flagged(&self.keys, &attention, field) {
                attention.push(AttentionItem::new(
                    field.label(),
                    MISSING_FIELD_REASON,
                    AttentionSeverity::Warning,
                ));
            }
        }

        if self.state.selection.installment_count.is_none() {
            self.state.selection.installment_count = scanned_installments(&fields);
            self.state.installments_from_scan = self.state.selection.installment_count.is_some();
        }

        let (filled, total) = fields.coverage();
        self.state.fields = fields;
        self.state.extracted = scan.extracted;
        self.state.attention = attention;
        self.state.scan = ScanStatus::Completed {
            confidence: scan.confidence,
        };
        let mapped = self.apply_mapping();

        info!(
            flow = self.state.kind.wire_name(),
            confidence = scan.confidence,
            filled,
            total,
            attention = self.state.attention.len(),
            mapped = mapped.len(),
            "scan completed"
        );
        if scan.confidence < self.config.confidence_threshold {
            warn!(
                confidence = scan.confidence,
                threshold = self.config.confidence_threshold,
                "scan confidence below threshold"
            );
        }
    }

    /// Drop everything derived from the current document, including the
    /// selections it pre-filled. Manual choices stay.
    fn clear_document(&mut self) {
        self.state.document = None;
        self.state.scan = ScanStatus::Idle;
        self.state.extracted = Default::default();
        self.state.fields = CanonicalPolicyFields::default();
        self.state.attention.clear();
        self.forget_scanned_selections();
        self.state.submit = SubmitStatus::Idle;
    }

    fn forget_scanned_selections(&mut self) {
        for slot in std::mem::take(&mut self.state.auto_filled) {
            self.state.selection.set(slot, None);
        }
        if std::mem::take(&mut self.state.installments_from_scan) {
            self.state.selection.installment_count = None;
        }
    }

    fn scan_failed(&mut self, err: GatewayError) -> FlowError {
        if matches!(err, GatewayError::Unauthorized) {
            return self.expire_session();
        }
        warn!(flow = self.state.kind.wire_name(), error = %err, "upload or scan failed");
        self.state.scan = ScanStatus::Failed {
            message: err.user_message(),
        };
        FlowError::Gateway(err)
    }

    fn gateway_failure(&mut self, err: GatewayError) -> FlowError {
        if matches!(err, GatewayError::Unauthorized) {
            return self.expire_session();
        }
        FlowError::Gateway(err)
    }

    fn expire_session(&mut self) -> FlowError {
        warn!(flow = self.state.kind.wire_name(), "credentials rejected, resetting flow");
        self.reset();
        FlowError::Unauthorized
    }

    fn ensure_idle(&self) -> Result<(), FlowError> {
        if self.state.is_busy() {
            Err(FlowError::Busy)
        } else {
            Ok(())
        }
    }
}

fn scanned_installments(fields: &CanonicalPolicyFields) -> Option<u32> {
    fields
        .cantidad_cuotas
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|count| *count > 0)
}

fn already_flagged(keys: &CandidateKeyTable, items: &[AttentionItem], field: PolicyField) -> bool {
    items.iter().any(|item| {
        let name = item.field.trim();
        name.eq_ignore_ascii_case(field.label())
            || keys
                .keys(field)
                .iter()
                .any(|key| key.eq_ignore_ascii_case(name))
    })
}
