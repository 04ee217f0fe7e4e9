use chrono::NaiveDate;
use poliza_flow::backoffice::BillingInstallment;
use poliza_flow::error::AppError;
use poliza_flow::extraction::normalizer::normalize_date;
use poliza_flow::extraction::ExtractedFieldSet;
use poliza_flow::flows::FlowKind;
use poliza_flow::mapping::{read_catalog_csv, MasterDataCatalogs, SelectionSlot};
use serde_json::Value;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_flow(raw: &str) -> Result<FlowKind, String> {
    FlowKind::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = FlowKind::ordered()
            .into_iter()
            .map(FlowKind::wire_name)
            .collect();
        format!("unknown flow '{raw}' (use one of: {})", known.join(", "))
    })
}

/// `combustible=3`, `tariff=51`, ...
pub(crate) fn parse_selection(raw: &str) -> Result<(SelectionSlot, String), String> {
    let (slot, id) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SLOT=ID, got '{raw}'"))?;
    let slot = SelectionSlot::parse(slot).ok_or_else(|| format!("unknown catalog slot '{slot}'"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing id in '{raw}'"));
    }
    Ok((slot, id.to_string()))
}

/// Read a file, or stdin when the path is `-`.
pub(crate) fn read_input(path: &Path) -> Result<String, AppError> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    Ok(fs::read_to_string(path)?)
}

/// Extracted data as the back office returns it, either the bare bag or the
/// whole scan envelope with a `datosExtraidos` member.
pub(crate) fn load_extracted(path: &Path) -> Result<ExtractedFieldSet, AppError> {
    let raw = read_input(path)?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|err| AppError::Input(format!("{}: {err}", path.display())))?;
    let bag = value.get("datosExtraidos").unwrap_or(&value);
    Ok(ExtractedFieldSet::from_json(bag))
}

fn catalog_file_name(slot: SelectionSlot) -> &'static str {
    match slot {
        SelectionSlot::Fuel => "combustibles.csv",
        SelectionSlot::Category => "categorias.csv",
        SelectionSlot::Destination => "destinos.csv",
        SelectionSlot::Department => "departamentos.csv",
        SelectionSlot::Quality => "calidades.csv",
        SelectionSlot::Tariff => "tarifas.csv",
    }
}

/// Catalogs from a JSON export or from a directory of per-slot CSV files.
/// Missing CSV files leave their catalog empty.
pub(crate) fn load_catalogs(path: &Path) -> Result<MasterDataCatalogs, AppError> {
    if !path.is_dir() {
        let raw = read_input(path)?;
        return serde_json::from_str(&raw)
            .map_err(|err| AppError::Input(format!("{}: {err}", path.display())));
    }

    let mut catalogs = MasterDataCatalogs::default();
    for slot in SelectionSlot::ordered() {
        let file = path.join(catalog_file_name(slot));
        if !file.exists() {
            continue;
        }
        let entries = read_catalog_csv(File::open(&file)?)
            .map_err(|err| AppError::Input(format!("{}: {err}", file.display())))?;
        *catalogs.entries_mut(slot) = entries;
    }
    Ok(catalogs)
}

/// Unpaid installment whose due date is before `today`.
pub(crate) fn is_overdue(installment: &BillingInstallment, today: NaiveDate) -> bool {
    let status = installment.status.trim().to_lowercase();
    if matches!(status.as_str(), "pagada" | "paga" | "cobrada" | "paid") {
        return false;
    }
    NaiveDate::parse_from_str(&normalize_date(&installment.due_date), "%Y-%m-%d")
        .map(|due| due < today)
        .unwrap_or(false)
}
