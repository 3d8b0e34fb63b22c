mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use moltjob::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
