use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ragingest::{
    config::{self, Config},
    documents::{DocumentRepository, DocumentStatus, SqliteDocumentRepository},
    jobs::JobStatus,
    logging,
    pipeline::{IngestionJob, IngestionPipeline, LoggingReporter},
    service::{
        DEFAULT_SEARCH_LIMIT, IngestionApi, IngestionService, MAX_SEARCH_LIMIT, submit_with_backoff,
    },
    sniff::detect_content_type,
};
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "ingest-cli", about = "Operator tooling for the ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest one file inline and print the outcome.
    File {
        path: PathBuf,
        #[arg(long)]
        owner: String,
    },
    /// Queue every supported file under a directory and wait for all jobs.
    Dir {
        dir: PathBuf,
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = 250)]
        poll_ms: u64,
    },
    /// List document records still marked processing.
    Stale,
    /// Print the chunks owned by `--owner` nearest to a query.
    Search {
        query: String,
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();
    let config = config::load().context("failed to load configuration")?;

    match cli.command {
        Command::File { path, owner } => ingest_file(&config, &path, &owner).await,
        Command::Dir {
            dir,
            owner,
            poll_ms,
        } => ingest_dir(&config, &dir, &owner, Duration::from_millis(poll_ms)).await,
        Command::Stale => list_stale(&config).await,
        Command::Search {
            query,
            owner,
            limit,
        } => search(&config, &query, &owner, limit).await,
    }
}

async fn ingest_file(config: &Config, path: &Path, owner: &str) -> Result<()> {
    let pipeline = IngestionPipeline::from_config(config)?;
    let (filename, bytes) = read_upload(path).await?;

    let content_type = detect_content_type(&bytes, &filename)
        .with_context(|| format!("cannot ingest {}", path.display()))?;
    if !pipeline.extractors().supports(content_type) {
        bail!("no extractor registered for {content_type}");
    }
    let storage_location = pipeline.objects().save(&bytes, owner, &filename).await?;

    let job = IngestionJob {
        storage_location,
        owner_id: owner.to_string(),
        filename,
        content_type: content_type.to_string(),
    };
    let outcome = pipeline.run(&job, &LoggingReporter).await?;
    println!(
        "completed document {} ({} chunks)",
        outcome.document_id, outcome.chunk_count
    );
    Ok(())
}

async fn ingest_dir(config: &Config, dir: &Path, owner: &str, poll: Duration) -> Result<()> {
    let pipeline = Arc::new(IngestionPipeline::from_config(config)?);
    let service = IngestionService::start(
        config.app_name.clone(),
        pipeline,
        config.worker_count,
        config.queue_capacity,
    )
    .with_job_retention(Duration::from_secs(config.job_retention_secs));

    let mut submitted: Vec<(Uuid, PathBuf)> = Vec::new();
    let mut skipped = 0usize;
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let (filename, bytes) = read_upload(entry.path()).await?;
        match submit_with_backoff(&service, owner, &filename, bytes, poll).await {
            Ok(task_id) => submitted.push((task_id, entry.path().to_path_buf())),
            Err(err) => {
                skipped += 1;
                tracing::warn!(path = %entry.path().display(), error = %err, "Skipping file");
            }
        }
    }

    let mut completed = 0usize;
    let mut failed = 0usize;
    for (task_id, path) in &submitted {
        let view = loop {
            match service.job_status(*task_id).await {
                Some(view) if view.status.is_terminal() => break view,
                Some(_) => tokio::time::sleep(poll).await,
                None => bail!("job {task_id} disappeared from the queue"),
            }
        };
        match view.status {
            JobStatus::Completed => completed += 1,
            _ => {
                failed += 1;
                println!(
                    "failed  {}: {}",
                    path.display(),
                    view.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    println!(
        "submitted {}, completed {completed}, failed {failed}, skipped {skipped}",
        submitted.len()
    );
    let snapshot = service.metrics_snapshot();
    println!("chunks indexed: {}", snapshot.chunks_indexed);
    Ok(())
}

async fn search(config: &Config, query: &str, owner: &str, limit: usize) -> Result<()> {
    let pipeline = IngestionPipeline::from_config(config)?;
    let hits = pipeline
        .search(owner, query, limit.min(MAX_SEARCH_LIMIT))
        .await?;
    if hits.is_empty() {
        println!("no matching chunks");
        return Ok(());
    }
    for hit in hits {
        println!(
            "{:.3}\t{}\tp{}#{}\t{}",
            hit.score,
            hit.payload.filename,
            hit.payload.page_number,
            hit.payload.chunk_index,
            hit.payload.text.replace('\n', " ")
        );
    }
    Ok(())
}

async fn list_stale(config: &Config) -> Result<()> {
    let repo = SqliteDocumentRepository::open(&config.database_path)?;
    let stale = repo.list_by_status(DocumentStatus::Processing).await?;
    if stale.is_empty() {
        println!("no documents stuck in processing");
        return Ok(());
    }
    for record in stale {
        println!(
            "{}\t{}\t{}\t{}",
            record.id, record.owner_id, record.filename, record.updated_at
        );
    }
    Ok(())
}

async fn read_upload(path: &Path) -> Result<(String, Vec<u8>)> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok((filename, bytes))
}
