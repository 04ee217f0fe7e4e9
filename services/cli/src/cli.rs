use crate::commands::{
    run_billing, run_clients, run_flow, run_login, run_map, run_normalize, BillingArgs,
    ClientsArgs, LoginArgs, MapArgs, NormalizeArgs, RunArgs,
};
use clap::{Parser, Subcommand};
use poliza_flow::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "poliza-flow",
    about = "Scan policy documents, map them onto back-office catalogs and submit new policies, renewals and changes",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the canonical policy fields found in an extracted-data JSON file
    Normalize(NormalizeArgs),
    /// Show which catalog entries the extracted data would pre-select
    Map(MapArgs),
    /// Search back-office clients by name or document number
    #[command(alias = "clientes")]
    Clients(ClientsArgs),
    /// Run a whole wizard against the back office: context, upload, review, submit
    Run(RunArgs),
    /// List the payment schedule of a policy
    Billing(BillingArgs),
    /// Store the back-office bearer token for later runs
    Login(LoginArgs),
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Normalize(args) => run_normalize(args),
        Command::Map(args) => run_map(args),
        Command::Clients(args) => run_clients(args).await,
        Command::Run(args) => run_flow(args).await,
        Command::Billing(args) => run_billing(args).await,
        Command::Login(args) => run_login(args),
    }
}
