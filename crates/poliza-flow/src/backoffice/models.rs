use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::extraction::{CanonicalPolicyFields, ExtractedFieldSet};
use crate::mapping::{id_as_string, optional_id_as_string, MasterDataSelection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "documento")]
    pub document: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySummary {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "codigo")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSummary {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(alias = "nombre")]
    pub name: String,
}

/// An existing policy of a client, the starting point of renewals and changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(alias = "numeroPoliza", alias = "numero")]
    pub number: String,
    #[serde(
        default,
        alias = "companiaId",
        deserialize_with = "optional_id_as_string"
    )]
    pub company_id: Option<String>,
    #[serde(
        default,
        alias = "seccionId",
        deserialize_with = "optional_id_as_string"
    )]
    pub section_id: Option<String>,
    #[serde(default, alias = "vigenciaHasta")]
    pub valid_to: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionSeverity {
    #[default]
    Info,
    #[serde(alias = "advertencia")]
    Warning,
    #[serde(alias = "error", alias = "critico")]
    Critical,
}

/// A field the user should double-check before submitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionItem {
    #[serde(alias = "campo")]
    pub field: String,
    #[serde(default, alias = "motivo")]
    pub reason: String,
    #[serde(default, alias = "severidad")]
    pub severity: AttentionSeverity,
}

impl AttentionItem {
    pub fn new(field: impl Into<String>, reason: impl Into<String>, severity: AttentionSeverity) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
            severity,
        }
    }
}

/// OCR output for one document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanResult {
    pub extracted: ExtractedFieldSet,
    /// Percentage, 0 to 100.
    pub confidence: f64,
    pub requires_attention: Vec<AttentionItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentReceipt {
    pub document_id: String,
    /// Present when the back office scanned the file as part of the upload.
    pub scan: Option<ScanResult>,
}

/// Upload and scan endpoints answer with the same envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScanEnvelope {
    #[serde(
        default,
        alias = "documentId",
        alias = "id",
        deserialize_with = "optional_id_as_string"
    )]
    pub documento_id: Option<String>,
    #[serde(default, alias = "extractedData")]
    pub datos_extraidos: Option<Value>,
    #[serde(default, alias = "confidence", deserialize_with = "confidence_percent")]
    pub confianza: f64,
    #[serde(default, alias = "requiresAttention")]
    pub requiere_atencion: Vec<AttentionItem>,
}

impl ScanEnvelope {
    pub(crate) fn scan(&self) -> Option<ScanResult> {
        let data = self.datos_extraidos.as_ref().filter(|value| !value.is_null())?;
        let extracted = match data {
            // Some producers send the bag as a JSON string.
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .map(|parsed| ExtractedFieldSet::from_json(&parsed))
                .unwrap_or_default(),
            other => ExtractedFieldSet::from_json(other),
        };
        Some(ScanResult {
            extracted,
            confidence: self.confianza,
            requires_attention: self.requiere_atencion.clone(),
        })
    }
}

// Confidence arrives either as a 0..1 ratio or a 0..100 percentage. A bare
// 1 is read as one percent; only fractions below 1 are ratios.
fn confidence_percent<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or_default();
    Ok(if raw > 0.0 && raw < 1.0 { raw * 100.0 } else { raw })
}

/// Body sent to the flow-specific finalize endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub cliente_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compania_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seccion_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poliza_anterior_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documento_id: Option<String>,
    /// `cantidadCuotas` is written once, from `seleccion`.
    #[serde(flatten, serialize_with = "fields_without_installment_count")]
    pub campos: CanonicalPolicyFields,
    #[serde(flatten)]
    pub seleccion: MasterDataSelection,
}

const INSTALLMENT_COUNT_KEY: &str = "cantidadCuotas";

fn fields_without_installment_count<S>(
    fields: &CanonicalPolicyFields,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut value = serde_json::to_value(fields).map_err(S::Error::custom)?;
    if let Value::Object(map) = &mut value {
        map.remove(INSTALLMENT_COUNT_KEY);
    }
    value.serialize(serializer)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, alias = "mensaje")]
    pub message: String,
    #[serde(default, deserialize_with = "optional_id_as_string")]
    pub numero_poliza: Option<String>,
    #[serde(default, deserialize_with = "optional_id_as_string")]
    pub poliza_id: Option<String>,
    #[serde(default, alias = "warnings")]
    pub advertencias: Vec<String>,
}

/// One row of a policy's payment schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingInstallment {
    #[serde(alias = "numero", alias = "numeroCuota")]
    pub number: u32,
    #[serde(default, alias = "vencimiento", alias = "fechaVencimiento")]
    pub due_date: String,
    #[serde(default, alias = "monto", alias = "importe")]
    pub amount: f64,
    #[serde(default, alias = "estado")]
    pub status: String,
}
