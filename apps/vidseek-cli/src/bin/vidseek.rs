use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vidseek_cli::render::{render_grouped, render_matches};
use vidseek_cli::{server, App, AppState};
use vidseek_core::config::Config;
use vidseek_core::traits::{Catalog, VectorIndex};
use vidseek_core::types::{DuplicatePolicy, SourceFileId};

#[derive(Parser, Debug)]
#[command(name = "vidseek", version, about = "Semantic search over video transcripts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcribe, catalog and embed every video under DIR
    Ingest {
        /// Defaults to data.video_dir
        dir: Option<PathBuf>,

        /// Only the first N files, in path order
        #[arg(long)]
        limit: Option<usize>,

        /// Skip files whose path is already in the catalog
        #[arg(long, default_value = "false")]
        skip_existing: bool,
    },
    /// Search transcript segments
    Search {
        query: String,

        /// Number of segment hits (defaults to search.cli_top_k)
        #[arg(short, long)]
        k: Option<usize>,

        /// Print JSON instead of text
        #[arg(long, default_value = "false")]
        json: bool,

        /// Group hits by video, as the HTTP service does
        #[arg(long, default_value = "false")]
        grouped: bool,
    },
    /// Run the HTTP search service
    Serve {
        /// Defaults to server.host:server.port
        #[arg(long)]
        bind: Option<String>,
    },
    /// Embed catalog segments missing from the vector index
    Reindex,
    /// Delete a source file, its segments and their vectors
    Remove { id: SourceFileId },
    /// Catalog and index totals
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut settings = Config::load()?.settings()?;
    if let Command::Ingest { skip_existing: true, .. } = cli.command {
        settings.ingest.duplicates = DuplicatePolicy::SkipExisting;
    }
    let app = App::open(settings).await?;

    match cli.command {
        Command::Ingest { dir, limit, .. } => ingest(&app, dir, limit).await?,
        Command::Search { query, k, json, grouped } => {
            let k = k.unwrap_or(app.settings.search.cli_top_k);
            let aggregator = app.aggregator();
            if grouped {
                let results = aggregator.search(&query, k).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&results)?);
                } else {
                    println!("{}", render_grouped(&results));
                }
            } else {
                let matches = aggregator.search_segments(&query, k).await?;
                if json {
                    let rows: Vec<_> = matches
                        .iter()
                        .map(|m| {
                            serde_json::json!({
                                "segment_id": m.segment.id,
                                "source_file_id": m.source_file.id,
                                "filename": m.source_file.filename,
                                "type": m.segment.kind,
                                "text": m.segment.content,
                                "start_seconds": m.segment.custom.start_seconds,
                                "end_seconds": m.segment.custom.end_seconds,
                                "score": m.score,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                } else {
                    println!("{}", render_matches(&matches));
                }
            }
        }
        Command::Serve { bind } => {
            let addr = bind.unwrap_or_else(|| app.settings.server.bind_addr());
            let videos = app.settings.video_dir();
            let state = AppState { aggregator: Arc::new(app.aggregator()), top_k: app.settings.search.top_k };
            server::serve(state, Some(videos.as_path()), &addr).await?;
        }
        Command::Reindex => {
            let report = app.coordinator(true)?.reindex().await?;
            println!("✅ Reindex complete: {} vectors written in {} batches", report.indexed, report.batches);
            if !report.is_complete() {
                println!("⚠️  {} segments still without vectors", report.failed_segments());
            }
            if let Some(error) = &report.persist_error {
                println!("⚠️  {error}");
            }
        }
        Command::Remove { id } => {
            let removed = app.coordinator(false)?.remove_source_file(id).await?;
            println!("🗑️  Removed source file {id} ({} segments)", removed.len());
        }
        Command::Status => status(&app).await?,
    }
    Ok(())
}

async fn ingest(app: &App, dir: Option<PathBuf>, limit: Option<usize>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| app.settings.video_dir());
    let processor = app.processor();
    let files = match limit {
        Some(n) => processor.list_video_files_limited(&dir, n),
        None => processor.list_video_files(&dir),
    };
    println!("Ingesting {} video files from {}", files.len(), dir.display());
    if files.is_empty() {
        return Ok(());
    }

    let report = app.coordinator(true)?.ingest_files(&files).await;
    for failure in &report.failures {
        println!("⚠️  {}: {}", failure.path.display(), failure.error);
    }
    println!(
        "✅ Ingest complete: {} files ingested, {} skipped, {} failed; {} segments, {} vectors",
        report.ingested(),
        report.skipped(),
        report.failures.len(),
        report.segments(),
        report.flush.indexed
    );
    if !report.flush.is_complete() {
        println!(
            "💡 {} segments have no vectors yet; run `vidseek reindex` to retry",
            report.flush.failed_segments()
        );
    }
    if let Some(error) = &report.flush.persist_error {
        println!("⚠️  {error}");
    }
    Ok(())
}

async fn status(app: &App) -> Result<()> {
    let files = app.catalog.list_source_files().await?;
    let mut segments = 0usize;
    for file in &files {
        let count = app.catalog.count_segments(file.id).await?;
        segments += count;
        println!("  {}  {}  {} segments", file.id, file.filename, count);
    }
    let vectors = app.index.count().await?;
    println!("📊 {} source files, {} segments, {} vectors", files.len(), segments, vectors);
    if vectors < segments {
        println!("💡 {} segments have no vectors; run `vidseek reindex`", segments - vectors);
    }
    Ok(())
}
