//! Command line: `serve`, `train`, `ingest`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use answer_engine::{AskService, EngineConfig};
use clap::{Parser, Subcommand};
use colored::Colorize;
use guardrail::{GuardrailConfig, read_training_csv, train_and_save};
use passage_index::{HashingEmbedder, IndexConfig, IndicatifProgress, ingest_file};
use services::storage::{ArtifactStorage, FsArtifactStorage};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "guru-backend", version, about = "Syllabus-scoped question answering")]
pub struct Cli {
    /// Directory holding the trained guardrail and the passage index.
    #[arg(long, env = "ARTIFACTS_DIR", default_value = "artifacts", global = true)]
    pub artifacts: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load artifacts and serve the HTTP API.
    Serve {
        #[arg(long, env = "API_ADDRESS", default_value = "0.0.0.0:8000")]
        address: String,
    },
    /// Train the guardrail from a CSV with `question,label[,grade,subject]`.
    Train {
        #[arg(long, env = "TRAINING_DATA_PATH")]
        csv: PathBuf,
    },
    /// Chunk, embed, and index page JSONL (`{source,grade,subject,page_number,text}`).
    Ingest {
        #[arg(long, env = "PAGES_PATH")]
        pages: PathBuf,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let storage = Arc::new(FsArtifactStorage::new(&cli.artifacts));
    match cli.command {
        Command::Serve { address } => serve(storage, &address).await,
        Command::Train { csv } => train(&*storage, csv),
        Command::Ingest { pages } => ingest(&*storage, pages),
    }
}

async fn serve(storage: Arc<FsArtifactStorage>, address: &str) -> anyhow::Result<()> {
    let cfg = EngineConfig::from_env()?;
    let root = storage.root().display().to_string();

    let load_storage = Arc::clone(&storage);
    let load_cfg = cfg.clone();
    let service = tokio::task::spawn_blocking(move || AskService::load(&*load_storage, load_cfg))
        .await?
        .with_context(|| {
            format!("cannot load artifacts from '{root}'; run `train` and `ingest` first")
        })?;

    let status = service.status();
    info!(
        target: "guru_backend::serve",
        vocabulary = status.vocabulary_size,
        trees = status.trees,
        chunks = status.index_chunks,
        threshold = status.confidence_threshold,
        "artifacts ready"
    );

    let storage: Arc<dyn ArtifactStorage> = storage;
    api::start(address, api::AppState::new(service, storage, cfg)).await?;
    Ok(())
}

fn train(storage: &dyn ArtifactStorage, csv: PathBuf) -> anyhow::Result<()> {
    let cfg = GuardrailConfig::from_env()?;
    let examples = read_training_csv(&csv)
        .with_context(|| format!("reading training data from '{}'", csv.display()))?;

    let report = train_and_save(&examples, &cfg, storage)?;

    println!("{}", "guardrail trained".green().bold());
    println!(
        "  examples     {} in scope / {} out of scope",
        report.distribution.in_scope, report.distribution.out_of_scope
    );
    println!("  vocabulary   {}", report.vocabulary_size);
    println!("  trees        {}", report.trees);
    println!(
        "  version      {} / {}",
        short(&report.version.vectorizer_fingerprint).cyan(),
        short(&report.version.ensemble_fingerprint).cyan()
    );
    println!("  took         {} ms", report.duration_ms);
    if !report.top_features.is_empty() {
        println!("{}", "top features".bold());
        for (term, weight) in report.top_features.iter().take(10) {
            println!("  {weight:>8.4}  {term}");
        }
    }
    Ok(())
}

fn ingest(storage: &dyn ArtifactStorage, pages: PathBuf) -> anyhow::Result<()> {
    let cfg = IndexConfig::from_env()?;
    let embedder = HashingEmbedder::new(cfg.embedding.dim)?;
    let progress = IndicatifProgress::bar();

    let stats = ingest_file(&pages, &cfg.chunking, &embedder, storage, &progress)
        .with_context(|| format!("ingesting '{}'", pages.display()))?;

    println!("{}", "index built".green().bold());
    println!("  documents    {}", stats.documents);
    println!("  pages        {}", stats.pages);
    println!("  chunks       {}", stats.chunks);
    if stats.skipped > 0 {
        println!("  skipped      {}", stats.skipped.to_string().yellow());
    }
    println!("  took         {} ms", stats.duration_ms);
    Ok(())
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ingest_takes_a_pages_path() {
        let cli = Cli::try_parse_from(["guru-backend", "--artifacts", "/tmp/a", "ingest", "--pages", "p.jsonl"])
            .unwrap();
        assert_eq!(cli.artifacts, PathBuf::from("/tmp/a"));
        assert!(matches!(cli.command, Command::Ingest { pages } if pages == PathBuf::from("p.jsonl")));
    }
}
