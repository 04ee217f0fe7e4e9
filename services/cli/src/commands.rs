use crate::infra::{
    is_overdue, load_catalogs, load_extracted, parse_date, parse_flow, parse_selection,
};
use chrono::{Local, NaiveDate};
use clap::Args;
use poliza_flow::backoffice::{BackOfficeGateway, FileTokenStore, HttpBackOffice};
use poliza_flow::config::AppConfig;
use poliza_flow::error::AppError;
use poliza_flow::extraction::normalizer::format_amount;
use poliza_flow::extraction::{CanonicalPolicyFields, PolicyField};
use poliza_flow::flows::{DocumentUpload, FlowContext, FlowKind, FlowSession, FlowState};
use poliza_flow::mapping::{MappingEngine, MasterDataCatalogs, MasterDataSelection, SelectionSlot};
use poliza_flow::telemetry;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct NormalizeArgs {
    /// Extracted-data JSON (`-` reads stdin)
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Flow whose candidate keys apply: new, renewal or change
    #[arg(long, value_parser = parse_flow, default_value = "new")]
    pub(crate) flow: FlowKind,
}

#[derive(Args, Debug)]
pub(crate) struct MapArgs {
    /// Extracted-data JSON (`-` reads stdin)
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Catalog JSON export, or a directory of combustibles.csv, categorias.csv, ...
    #[arg(long)]
    pub(crate) catalogs: PathBuf,
    /// Insurer company id used to filter tariffs
    #[arg(long)]
    pub(crate) company: Option<String>,
    #[arg(long, value_parser = parse_flow, default_value = "new")]
    pub(crate) flow: FlowKind,
}

#[derive(Args, Debug)]
pub(crate) struct ClientsArgs {
    /// Part of the client's name or document number
    pub(crate) term: String,
    /// Also list each client's policies
    #[arg(long)]
    pub(crate) policies: bool,
}

#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    #[arg(long, value_parser = parse_flow)]
    pub(crate) flow: FlowKind,
    /// Client id in the back office
    #[arg(long)]
    pub(crate) client: String,
    /// Insurer company id (new policies)
    #[arg(long)]
    pub(crate) company: Option<String>,
    /// Section id (new policies)
    #[arg(long)]
    pub(crate) section: Option<String>,
    /// Policy being renewed or changed
    #[arg(long)]
    pub(crate) policy: Option<String>,
    /// Policy document to upload
    #[arg(long)]
    pub(crate) file: PathBuf,
    /// Use local catalogs instead of fetching master data
    #[arg(long)]
    pub(crate) catalogs: Option<PathBuf>,
    /// Manual catalog choice, e.g. `--select combustible=3`; repeatable
    #[arg(long = "select", value_parser = parse_selection)]
    pub(crate) selections: Vec<(SelectionSlot, String)>,
    #[arg(long)]
    pub(crate) notes: Option<String>,
    #[arg(long)]
    pub(crate) installments: Option<u32>,
    /// Send to the back office; without it the run stops after review
    #[arg(long)]
    pub(crate) submit: bool,
}

#[derive(Args, Debug)]
pub(crate) struct BillingArgs {
    /// Policy id in the back office
    #[arg(long)]
    pub(crate) policy: String,
    /// Emit CSV instead of a table
    #[arg(long)]
    pub(crate) csv: bool,
    /// Reference date for overdue detection (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct LoginArgs {
    /// Bearer token issued by the back office
    #[arg(long)]
    pub(crate) token: String,
}

#[derive(Serialize)]
struct NormalizeReport<'a> {
    fields: &'a CanonicalPolicyFields,
    missing_required: Vec<&'static str>,
    filled: usize,
    total: usize,
}

#[derive(Serialize)]
struct MapReport {
    selection: MasterDataSelection,
    auto_filled: Vec<&'static str>,
}

#[derive(Serialize)]
struct BillingRow {
    numero: u32,
    vencimiento: String,
    monto: String,
    estado: String,
    vencida: bool,
}

pub(crate) fn run_normalize(args: NormalizeArgs) -> Result<(), AppError> {
    let extracted = load_extracted(&args.input)?;
    let fields = args.flow.key_table().canonical_fields(&extracted);
    let (filled, total) = fields.coverage();

    let report = NormalizeReport {
        fields: &fields,
        missing_required: fields
            .missing_required()
            .into_iter()
            .map(PolicyField::label)
            .collect(),
        filled,
        total,
    };
    print_json(&report)
}

pub(crate) fn run_map(args: MapArgs) -> Result<(), AppError> {
    let extracted = load_extracted(&args.input)?;
    let catalogs = load_catalogs(&args.catalogs)?;
    let engine = MappingEngine::new(args.flow.key_table(), args.flow.mappable_slots());

    let outcome = engine.map(
        &extracted,
        &MasterDataSelection::default(),
        &catalogs,
        args.company.as_deref(),
    );
    print_json(&MapReport {
        selection: outcome.patch.to_selection(),
        auto_filled: outcome.auto_filled,
    })
}

pub(crate) async fn run_clients(args: ClientsArgs) -> Result<(), AppError> {
    let term = args.term.trim();
    if term.is_empty() {
        return Err(AppError::Input("search term must not be empty".to_string()));
    }
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let gateway = HttpBackOffice::from_config(&config.backoffice);
    let clients = gateway.search_clients(term).await?;
    info!(term, found = clients.len(), "client search finished");

    if clients.is_empty() {
        println!("Sin clientes para '{term}'");
        return Ok(());
    }
    for client in &clients {
        println!(
            "[{}] {} {}",
            client.id,
            client.name,
            client.document.as_deref().unwrap_or("")
        );
        if !args.policies {
            continue;
        }
        for policy in gateway.client_policies(&client.id).await? {
            println!(
                "    póliza {} (id {}) vence {}",
                policy.number,
                policy.id,
                policy.valid_to.as_deref().unwrap_or("?")
            );
        }
    }
    Ok(())
}

pub(crate) async fn run_flow(args: RunArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let gateway = Arc::new(HttpBackOffice::from_config(&config.backoffice));
    let context = resolve_context(gateway.as_ref(), &args).await?;
    let mut session = FlowSession::new(args.flow, Arc::clone(&gateway), config.flow);

    session.select_context(context)?;
    match &args.catalogs {
        Some(path) => session.set_catalogs(load_catalogs(path)?),
        None => session.load_master_data().await?,
    }
    session.advance()?;

    let document = DocumentUpload::from_path(&args.file).await?;
    session.upload(document).await?;
    for (slot, id) in &args.selections {
        session.select(*slot, Some(id.clone()));
    }
    if let Some(notes) = &args.notes {
        session.set_notes(notes.clone());
    }
    if args.installments.is_some() {
        session.set_installments(args.installments);
    }

    render_review(session.state(), session.catalogs());

    if !args.submit {
        println!("\nDry run: pass --submit to send this to the back office.");
        return Ok(());
    }

    session.advance()?;
    session.advance()?;
    let result = session.submit().await?;

    println!("\n{}", result.message);
    if let Some(number) = &result.policy_number {
        println!("Póliza: {number}");
    }
    for warning in &result.warnings {
        println!("! {warning}");
    }
    info!(flow = args.flow.wire_name(), policy = ?result.policy_number, "flow completed");
    Ok(())
}

pub(crate) async fn run_billing(args: BillingArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let gateway = HttpBackOffice::from_config(&config.backoffice);
    let installments = gateway.billing(&args.policy).await?;
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    let rows: Vec<BillingRow> = installments
        .iter()
        .map(|installment| BillingRow {
            numero: installment.number,
            vencimiento: installment.due_date.clone(),
            monto: format_amount(installment.amount),
            estado: installment.status.clone(),
            vencida: is_overdue(installment, today),
        })
        .collect();

    if args.csv {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        for row in &rows {
            writer
                .serialize(row)
                .map_err(|err| AppError::Input(err.to_string()))?;
        }
        writer.flush()?;
        return Ok(());
    }

    println!("Cuotas de la póliza {}", args.policy);
    if rows.is_empty() {
        println!("- sin cuotas registradas");
    }
    for row in &rows {
        println!(
            "- #{:<3} {:<12} {:>12} {}{}",
            row.numero,
            row.vencimiento,
            row.monto,
            row.estado,
            if row.vencida { " (vencida)" } else { "" }
        );
    }
    Ok(())
}

pub(crate) fn run_login(args: LoginArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let token = args.token.trim();
    if token.is_empty() {
        return Err(AppError::Input("token must not be empty".to_string()));
    }

    let store = FileTokenStore::new(config.backoffice.token_path.clone());
    store.save(token)?;
    println!("Token stored at {}", store.path().display());
    Ok(())
}

async fn resolve_context<G>(gateway: &G, args: &RunArgs) -> Result<FlowContext, AppError>
where
    G: BackOfficeGateway + ?Sized,
{
    if !args.flow.requires_prior_policy() {
        return Ok(FlowContext {
            client_id: Some(args.client.clone()),
            company_id: args.company.clone(),
            section_id: args.section.clone(),
            ..FlowContext::default()
        });
    }

    let policy_id = args
        .policy
        .as_deref()
        .ok_or_else(|| AppError::Input(format!("{} needs --policy", args.flow.label())))?;
    let policies = gateway.client_policies(&args.client).await?;
    let policy = policies
        .into_iter()
        .find(|policy| policy.id == policy_id || policy.number == policy_id)
        .ok_or_else(|| {
            AppError::Input(format!("client {} has no policy {policy_id}", args.client))
        })?;

    Ok(FlowContext {
        client_id: Some(args.client.clone()),
        client_name: None,
        company_id: args.company.clone().or(policy.company_id),
        section_id: args.section.clone().or(policy.section_id),
        prior_policy_id: Some(policy.id),
    })
}

fn render_review(state: &FlowState, catalogs: &MasterDataCatalogs) {
    println!("{} | paso {} ({})", state.kind.label(), state.step.number(), state.step.label());
    if let Some(confidence) = state.scan.confidence() {
        println!("Confianza del escaneo: {confidence:.0}%");
    }

    println!("\nDatos extraídos");
    for field in PolicyField::ordered() {
        let value = state.fields.get(field);
        if !value.is_empty() {
            println!("- {}: {}", field.label(), value);
        }
    }

    println!("\nMaestros");
    for slot in SelectionSlot::ordered() {
        let Some(id) = state.selection.get(slot) else {
            continue;
        };
        let name = catalogs
            .find(slot, id)
            .map(|entry| entry.name.as_str())
            .unwrap_or("?");
        let marker = if state.auto_filled.contains(&slot) {
            " (automático)"
        } else {
            ""
        };
        println!("- {}: {} [{}]{}", slot.label(), name, id, marker);
    }

    if !state.attention.is_empty() {
        println!("\nRequiere atención");
        for item in &state.attention {
            println!("- {}: {}", item.field, item.reason);
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| AppError::Input(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}
