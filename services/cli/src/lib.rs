mod cli;
mod commands;
mod infra;

use poliza_flow::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
