use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

use retrieval::application::repositories::IndexRegistry as _;
use retrieval::application::{ImportSummary, RebuildOutcome};
use retrieval::infrastructure::embeddings::Chunker;
use retrieval::infrastructure::file_system::{
    load_knowledge_entries, load_markdown_knowledge, load_prompt_templates,
};
use retrieval::{IndexName, RetrievalConfig, RetrievalEngine};

mod cli;

use clap::Parser as _;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::ImportKb {
            path,
            index,
            chunked,
        } => {
            let engine = open_engine(config)?;
            let entries = load_knowledge_entries(&path).await?;
            let summary = blocking(move || {
                let importer = if chunked {
                    engine.chunked_importer()
                } else {
                    engine.importer()
                };
                Ok(importer.import_knowledge_base(&index, &entries)?)
            })
            .await?;
            print_json(&summary_json(&summary))?;
        }
        Commands::ImportKbDir {
            dir,
            index,
            chunked,
        } => {
            let engine = open_engine(config)?;
            let entries = load_markdown_knowledge(&dir).await?;
            info!("Found {} markdown documents in {}", entries.len(), dir.display());
            let summary = blocking(move || {
                let importer = if chunked {
                    engine.chunked_importer()
                } else {
                    engine.importer()
                };
                Ok(importer.import_knowledge_base(&index, &entries)?)
            })
            .await?;
            print_json(&summary_json(&summary))?;
        }
        Commands::ImportPrompts { path, index } => {
            let engine = open_engine(config)?;
            let templates = load_prompt_templates(&path).await?;
            let summary =
                blocking(move || Ok(engine.importer().import_prompt_templates(&index, &templates)?))
                    .await?;
            print_json(&summary_json(&summary))?;
        }
        Commands::ImportAll { kb, prompts, index } => {
            let engine = open_engine(config)?;
            let entries = load_knowledge_entries(&kb).await?;
            let templates = load_prompt_templates(&prompts).await?;
            let summary = blocking(move || {
                Ok(engine
                    .importer()
                    .import_all(&index, &entries, &templates)?)
            })
            .await?;
            print_json(&summary_json(&summary))?;
        }
        Commands::Rebuild { index } => {
            let engine = open_engine(config)?;
            let name = parse_index(&index)?;
            let outcome = blocking(move || Ok(engine.builder().rebuild(&name)?)).await?;
            print_json(&rebuild_json(&outcome))?;
        }
        Commands::Search {
            index,
            query,
            top_k,
        } => {
            let engine = open_engine(config)?;
            let name = parse_index(&index)?;
            let top_k = top_k.unwrap_or(engine.config().default_top_k);
            let hits = blocking(move || Ok(engine.searcher().search(&name, &query, top_k)?))
                .await
                .with_context(|| format!("Search over '{}' failed", index))?;
            print_json(&serde_json::to_value(&hits)?)?;
        }
        Commands::Indexes => {
            let engine = open_engine(config)?;
            let indexes = engine.store().list_indexes()?;
            let listing: Vec<Value> = indexes
                .iter()
                .map(|index| json!({ "state": index.state(), "index": index }))
                .collect();
            print_json(&Value::Array(listing))?;
        }
        Commands::DeleteIndex { index } => {
            let engine = open_engine(config)?;
            let name = parse_index(&index)?;
            let deleted = blocking(move || Ok(engine.builder().delete_index(&name)?)).await?;
            if !deleted {
                warn!("Index '{}' was not registered", index);
            }
            print_json(&json!({ "index": index, "deleted": deleted }))?;
        }
        Commands::Chunk {
            path,
            size,
            overlap,
        } => handle_chunk(&config, &path, size, overlap).await?,
    }

    Ok(())
}

/// Config file (if any), then `RAG_*` overrides, then command line flags
fn load_config(cli: &Cli) -> Result<RetrievalConfig> {
    let config = match &cli.config {
        Some(path) => RetrievalConfig::from_toml_file(path)?,
        None => RetrievalConfig::default(),
    };
    let mut config = config
        .apply_env()
        .context("Invalid RAG_* environment override")?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn open_engine(config: RetrievalConfig) -> Result<Arc<RetrievalEngine>> {
    let engine = RetrievalEngine::open(config).context("Failed to open retrieval store")?;
    Ok(Arc::new(engine))
}

fn parse_index(name: &str) -> Result<IndexName> {
    IndexName::new(name).with_context(|| format!("Invalid index name '{}'", name))
}

/// Run store and embedding work off the async runtime
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .context("Worker task panicked")?
}

async fn handle_chunk(
    config: &RetrievalConfig,
    path: &Path,
    size: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let chunker = Chunker::new(
        size.unwrap_or(config.chunking.chunk_size),
        overlap.unwrap_or(config.chunking.overlap),
    );
    let chunks: Vec<Value> = chunker
        .chunk(&text)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| json!({ "index": i, "chars": chunk.chars().count(), "text": chunk }))
        .collect();

    info!(
        "Split {} into {} chunks (size {}, overlap {})",
        path.display(),
        chunks.len(),
        chunker.chunk_size(),
        chunker.overlap()
    );
    print_json(&Value::Array(chunks))
}

fn summary_json(summary: &ImportSummary) -> Value {
    let errors: Vec<Value> = summary
        .errors
        .iter()
        .map(|(item, reason)| json!({ "item": item, "reason": reason }))
        .collect();
    json!({
        "index": summary.index_name,
        "imported": summary.imported,
        "skipped": summary.skipped,
        "errors": errors,
        "rebuild": rebuild_json(&summary.rebuild),
        "duration_ms": summary.duration_ms,
    })
}

fn rebuild_json(outcome: &RebuildOutcome) -> Value {
    match outcome {
        RebuildOutcome::Skipped => json!({ "status": "skipped" }),
        RebuildOutcome::Rebuilt(stats) => json!({
            "status": "rebuilt",
            "document_count": stats.document_count,
            "vector_dimension": stats.vector_dimension,
            "embedding_model": stats.embedding_model.to_string(),
            "batches": stats.batches,
            "duration_ms": stats.duration_ms,
        }),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
