//! # libris CLI
//!
//! Command-line front end for the libris document search service.
//!
//! libris ingests documents into a per-user library and answers
//! natural-language queries against it using vector embeddings.
//!
//! ## Commands
//!
//! - `libris ingest <FILE> --user <USER>` — upload a document and wait for
//!   background processing to finish
//! - `libris search <QUERY> --user <USER>` — query the user's library
//! - `libris stats --user <USER>` — library statistics
//! - `libris algorithms` — list the supported search algorithms
//!
//! Configuration comes from the environment (`EMBEDDING_API_KEY`,
//! `BASE_DIR`, `VECTOR_STORAGE_TYPE`, …); see `config.rs` for the full
//! list.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use libris_core::PipelineError;
use libris_embed::{CohereConfig, CohereEmbedder};
use libris_pipeline::{IngestEvent, QueueConfig, RunStatus, StepStatus};

use libris::config::Settings;
use libris::service::LibraryService;

#[derive(Parser)]
#[command(name = "libris")]
#[command(about = "Per-user document ingestion and semantic search")]
#[command(version)]
struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a document and wait for ingest to complete
    Ingest {
        /// File to upload
        file: PathBuf,
        /// Library owner (email-shaped id)
        #[arg(short, long)]
        user: String,
        /// Optional description stored with the upload
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Search a user's library
    Search {
        /// Query text
        query: String,
        /// Library owner
        #[arg(short, long)]
        user: String,
        /// Ranking algorithm
        #[arg(short, long, default_value = "cosine")]
        algorithm: String,
        /// Maximum results (1–100)
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Show library statistics for a user
    Stats {
        /// Library owner
        #[arg(short, long)]
        user: String,
    },
    /// List the supported search algorithms
    Algorithms,
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env()?;
    init_tracing(&settings);

    let cli = Cli::parse();

    let api_key = settings
        .embedding_api_key
        .clone()
        .context("EMBEDDING_API_KEY is not set")?;
    let embedder = Arc::new(CohereEmbedder::new(CohereConfig::new(
        api_key,
        settings.embedding_model.clone(),
    ))?);

    let service = LibraryService::start(&settings, embedder, QueueConfig::default())?;

    match cli.command {
        Commands::Ingest {
            file,
            user,
            description,
        } => {
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("input path has no filename")?
                .to_string();
            let source = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("cannot open {}", file.display()))?;

            let mut events = service.subscribe();
            let receipt = service
                .ingest(source, &filename, &user, description.as_deref())
                .await?;

            if matches!(cli.format, OutputFormat::Json) {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                println!(
                    "accepted {} ({} bytes, {}) as document {}",
                    receipt.original_filename,
                    receipt.size_bytes,
                    receipt.mime_type,
                    receipt.document_id
                );
            }

            // Processing is asynchronous; for a one-shot CLI run we wait for
            // the report before exiting.
            let document_id = receipt.document_id.to_string();
            loop {
                let event = tokio::time::timeout(Duration::from_secs(600), events.recv())
                    .await
                    .context("timed out waiting for ingest to finish")??;
                if let IngestEvent::Finished { report } = event {
                    if report.document_id != document_id {
                        continue;
                    }
                    if matches!(cli.format, OutputFormat::Json) {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        println!("ingest {}", status_word(report.status));
                        for step in &report.steps {
                            println!(
                                "  {:<22} {:<8} {}",
                                step.name,
                                step_word(step.result.status),
                                step.result.message
                            );
                        }
                    }
                    if report.status != RunStatus::Success {
                        service.shutdown().await;
                        let error = match report.status {
                            RunStatus::Cancelled => PipelineError::Cancelled,
                            RunStatus::TimedOut => {
                                PipelineError::TimedOut(report.total_duration.as_secs())
                            }
                            _ => {
                                let failed = report
                                    .steps
                                    .iter()
                                    .find(|s| s.result.status == StepStatus::Failed);
                                PipelineError::StepFailed {
                                    step: failed.map(|s| s.name.clone()).unwrap_or_default(),
                                    message: failed
                                        .and_then(|s| s.result.error.clone())
                                        .unwrap_or_else(|| "unknown failure".to_string()),
                                }
                            }
                        };
                        return Err(error.into());
                    }
                    break;
                }
            }
            service.shutdown().await;
        }

        Commands::Search {
            query,
            user,
            algorithm,
            limit,
        } => {
            let response = service.search(&user, &query, &algorithm, limit).await?;
            if matches!(cli.format, OutputFormat::Json) {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!(
                    "{} results over {} documents / {} chunks in {:.1} ms ({})",
                    response.hits.len(),
                    response.documents_searched,
                    response.chunks_searched,
                    response.execution_time.as_secs_f64() * 1000.0,
                    response.algorithm
                );
                if response.model_restricted {
                    println!(
                        "note: mixed-model library, restricted to {}",
                        response.model_used.as_deref().unwrap_or("unknown")
                    );
                }
                for hit in &response.hits {
                    println!(
                        "{:>3}. [{:.4}] {} #{} — {}",
                        hit.rank,
                        hit.score,
                        hit.source_filename,
                        hit.chunk_index,
                        preview(&hit.text)
                    );
                }
            }
            service.shutdown().await;
        }

        Commands::Stats { user } => {
            let stats = service.library_stats(&user).await?;
            if matches!(cli.format, OutputFormat::Json) {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else if !stats.exists {
                println!("no library for {user}");
            } else {
                println!("documents:              {}", stats.document_count);
                println!("chunks:                 {}", stats.chunk_count);
                println!("chunks with embeddings: {}", stats.chunks_with_embeddings);
                println!("raw upload bytes:       {}", stats.total_upload_bytes);
            }
            service.shutdown().await;
        }

        Commands::Algorithms => {
            let algorithms = service.algorithms();
            if matches!(cli.format, OutputFormat::Json) {
                println!("{}", serde_json::to_string_pretty(&algorithms)?);
            } else {
                for algorithm in algorithms {
                    println!("{algorithm}");
                }
            }
            service.shutdown().await;
        }
    }

    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.log_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn status_word(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "pending",
        RunStatus::Running => "running",
        RunStatus::Success => "succeeded",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
        RunStatus::TimedOut => "timed out",
    }
}

fn step_word(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "pending",
        StepStatus::Running => "running",
        StepStatus::Success => "ok",
        StepStatus::Failed => "failed",
        StepStatus::Skipped => "skipped",
    }
}

fn preview(text: &str) -> String {
    let flat = text.replace(['\n', '\t'], " ");
    let mut out: String = flat.chars().take(96).collect();
    if flat.chars().count() > 96 {
        out.push('…');
    }
    out
}
