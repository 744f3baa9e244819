use clap::Parser;

mod cli;
mod telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env when present.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }

    telemetry::init("info")?;

    let cli = cli::Cli::parse();
    cli::run(cli).await
}
