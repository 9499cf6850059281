mod cli;
mod infra;
mod roster;
mod routes;
mod server;

use headstart::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
