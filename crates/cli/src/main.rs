use anyhow::{anyhow, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::AppConfig;
use docrag_indexer::{IngestionPipeline, RebuildPolicy};
use docrag_search::Retriever;
use docrag_vector_store::{create_embedder, Embedder, EmbeddingMode, KnowledgeBase};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod http_api;

#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "Ingest documents and answer similarity queries over their chunks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./docrag.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store directory (overrides DOCRAG_STORE_DIR and store_dir)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Override embedding backend in this process
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,

    /// Override embedding model id
    #[arg(long, global = true)]
    embed_model: Option<String>,

    /// Model directory (overrides DOCRAG_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, split and embed documents into the store.
    ///
    /// Documents that succeed are committed even when others fail; any failure
    /// makes the command exit non-zero.
    Ingest(IngestArgs),

    /// Print the chunks closest to a query
    Search(SearchArgs),

    /// Serve GET /search over HTTP.
    ///
    /// The store is loaded once at startup; restart the server to pick up
    /// documents ingested by another process.
    Serve(ServeArgs),

    /// Embed chunks left without vectors by an interrupted ingestion
    Reconcile(JsonArgs),

    /// Re-embed every chunk and replace the index
    Rebuild(JsonArgs),

    /// Show chunk and vector counts
    Status(JsonArgs),
}

#[derive(Args)]
struct IngestArgs {
    /// Documents to ingest (.pdf or UTF-8 text)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Maximum characters per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks
    #[arg(long)]
    overlap: Option<usize>,

    /// Re-embed the whole store on every document
    #[arg(long)]
    full: bool,

    /// Output JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Query text
    query: String,

    /// Number of results (default: default_top_k from config)
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address, e.g. 127.0.0.1:5000 (default: server.bind from config)
    #[arg(long)]
    bind: Option<String>,
}

#[derive(Args)]
struct JsonArgs {
    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, ValueEnum)]
enum EmbedMode {
    Onnx,
    Stub,
}

impl EmbedMode {
    const fn as_domain(self) -> EmbeddingMode {
        match self {
            EmbedMode::Onnx => EmbeddingMode::Onnx,
            EmbedMode::Stub => EmbeddingMode::Stub,
        }
    }
}

/// Store plus the embedder it was built with
struct Services {
    kb: Arc<KnowledgeBase>,
    embedder: Arc<dyn Embedder>,
}

impl Services {
    async fn open(config: &AppConfig) -> Result<Self> {
        let embedder = create_embedder(&config.embedding).with_context(|| {
            format!(
                "Failed to initialise embedding model '{}' ({})",
                config.embedding.model, config.embedding.mode
            )
        })?;
        let kb = KnowledgeBase::open(config.layout(), embedder.as_ref())
            .await
            .with_context(|| format!("Failed to open store {}", config.store_dir.display()))?;
        Ok(Self {
            kb: Arc::new(kb),
            embedder,
        })
    }

    fn pipeline(&self, config: &AppConfig) -> Result<IngestionPipeline> {
        IngestionPipeline::new(
            self.kb.clone(),
            self.embedder.clone(),
            config.pipeline_config(),
        )
        .context("Invalid ingestion settings")
    }

    fn retriever(&self) -> Result<Retriever> {
        Retriever::new(self.kb.clone(), self.embedder.clone()).context("Invalid search settings")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // stdout is reserved for JSON when it is requested
    let json_output = match &cli.command {
        Commands::Ingest(args) => args.json,
        Commands::Search(args) => args.json,
        Commands::Reconcile(args) | Commands::Rebuild(args) | Commands::Status(args) => {
            args.json
        }
        Commands::Serve(_) => false,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // Always silence ort crate unless verbose mode (ORT is extremely noisy)
    if !cli.verbose {
        builder.filter_module("ort", log::LevelFilter::Off);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Ingest(args) => run_ingest(args, config).await?,
        Commands::Search(args) => run_search(args, &config).await?,
        Commands::Serve(args) => serve_http(args, &config).await?,
        Commands::Reconcile(args) => run_reconcile(args, &config).await?,
        Commands::Rebuild(args) => run_rebuild(args, &config).await?,
        Commands::Status(args) => run_status(args, &config).await?,
    }

    Ok(())
}

/// File, then environment, then flags
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.store_dir {
        config.store_dir.clone_from(dir);
    }
    if let Some(mode) = cli.embed_mode {
        config.embedding.mode = mode.as_domain();
    }
    if let Some(model) = &cli.embed_model {
        config.embedding.model = model.trim().to_ascii_lowercase();
    }
    if let Some(dir) = &cli.model_dir {
        config.embedding.model_dir = Some(dir.clone());
    }
    Ok(config)
}

async fn run_ingest(args: IngestArgs, mut config: AppConfig) -> Result<()> {
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(overlap) = args.overlap {
        config.overlap = overlap;
    }
    if args.full {
        config.rebuild_policy = RebuildPolicy::Full;
    }
    config.validate()?;

    let services = Services::open(&config).await?;
    let pipeline = services.pipeline(&config)?;
    let stats = pipeline.ingest_files(&args.paths).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        for error in &stats.errors {
            eprintln!("Error: {error}");
        }
        eprintln!(
            "Ingested {} documents, {} chunks in {}ms",
            stats.documents, stats.chunks, stats.time_ms
        );
    }

    if stats.documents == 0 {
        return Err(anyhow!("No documents were ingested"));
    }
    if !stats.errors.is_empty() {
        return Err(anyhow!(
            "{} of {} documents failed to ingest",
            stats.errors.len(),
            args.paths.len()
        ));
    }
    Ok(())
}

async fn run_search(args: SearchArgs, config: &AppConfig) -> Result<()> {
    let services = Services::open(config).await?;
    let retriever = services.retriever()?;
    let top_k = args.top_k.unwrap_or(config.default_top_k);
    let results = retriever.retrieve(&args.query, top_k).await?;

    if args.json {
        let output = json!({"query": args.query.trim(), "results": results});
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if results.is_empty() {
        eprintln!("No results (store is empty)");
    } else {
        for result in &results {
            println!(
                "Rank {}: {} (Distance: {})",
                result.rank, result.text, result.distance
            );
        }
    }
    Ok(())
}

async fn serve_http(args: ServeArgs, config: &AppConfig) -> Result<()> {
    let services = Services::open(config).await?;
    let state = Arc::new(http_api::HttpState {
        retriever: services.retriever()?,
        default_top_k: config.default_top_k,
    });
    let app = http_api::router(state);

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    println!("Serving search API on http://{bind}/search");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_reconcile(args: JsonArgs, config: &AppConfig) -> Result<()> {
    let services = Services::open(config).await?;
    let recovered = services.pipeline(config)?.reconcile().await?;
    let status = services.kb.status();
    if args.json {
        let output = json!({"reconciled": recovered, "store": status});
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        eprintln!(
            "Reconciled {recovered} chunks; store holds {} chunks",
            status.chunks
        );
    }
    Ok(())
}

async fn run_rebuild(args: JsonArgs, config: &AppConfig) -> Result<()> {
    let services = Services::open(config).await?;
    let vectors = services.pipeline(config)?.rebuild().await?;
    if args.json {
        let output = json!({"rebuilt": vectors, "store": services.kb.status()});
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        eprintln!("Rebuilt index over {vectors} chunks");
    }
    Ok(())
}

async fn run_status(args: JsonArgs, config: &AppConfig) -> Result<()> {
    let services = Services::open(config).await?;
    let status = services.kb.status();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Store:     {}", config.store_dir.display());
        println!(
            "Model:     {} ({}d)",
            status.embedding_model, status.dimension
        );
        println!("Chunks:    {}", status.chunks);
        println!("Vectors:   {}", status.vectors);
        if status.pending > 0 {
            println!(
                "Pending:   {} (run `docrag reconcile`)",
                status.pending
            );
        }
    }
    Ok(())
}
