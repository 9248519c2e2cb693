use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use flags::EmbedMode;
use std::path::PathBuf;

mod commands;
mod config;
mod flags;

#[derive(Parser)]
#[command(name = "scholar")]
#[command(about = "Chunk, embed, compare and query research papers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding collections and document records (overrides SCHOLAR_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override embedding backend in this process
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a text file into token-budgeted chunks
    Chunk(ChunkArgs),

    /// Chunk, embed and store text files
    Ingest(IngestArgs),

    /// List ingested documents, newest first
    List,

    /// Answer a question from one or more collections
    Ask(AskArgs),

    /// Compare 2-5 ingested documents (novel contributions, similarities, gaps)
    Compare(CompareArgs),

    /// Summarize ingested documents (the latest two by default)
    Summarize(SummarizeArgs),
}

#[derive(Args)]
struct ChunkArgs {
    /// Text file to chunk
    file: PathBuf,

    /// Apply the embedding budget check (truncate / drop) to the chunks
    #[arg(long)]
    for_embedding: bool,
}

#[derive(Args)]
struct IngestArgs {
    /// Extracted text files; the first non-empty line becomes the title
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Args)]
struct AskArgs {
    /// Question to answer
    question: String,

    /// Collection to retrieve from (repeatable, queried in order)
    #[arg(short, long = "collection", required = true)]
    collections: Vec<String>,

    /// Print the retrieval context without calling the chat model
    #[arg(long)]
    context_only: bool,
}

#[derive(Args)]
struct CompareArgs {
    /// Filenames as shown by `scholar list`
    #[arg(required = true)]
    names: Vec<String>,

    /// Treat the names as collection names and run one multi-collection comparison
    #[arg(long)]
    collections: bool,
}

#[derive(Args)]
struct SummarizeArgs {
    /// Filenames as shown by `scholar list`
    filenames: Vec<String>,

    /// Summarize the N most recently ingested documents (used when no filenames are given)
    #[arg(long, value_name = "N", conflicts_with = "filenames")]
    latest: Option<usize>,
}

fn init_logging(verbose: bool, quiet: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // HTTP stack is noisy at debug
    if !verbose {
        for module in ["reqwest", "hyper", "hyper_util", "rustls", "h2"] {
            builder.filter_module(module, log::LevelFilter::Warn);
        }
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_env()?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(mode) = cli.embed_mode {
        config.embedding.mode = mode;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = load_config(&cli)?;
    log::debug!(
        "Data dir {} | embedding mode {}",
        config.data_dir.display(),
        config.embedding.mode.as_str()
    );

    match &cli.command {
        Commands::Chunk(args) => {
            commands::run_chunk(&config, &args.file, args.for_embedding).await?;
        }
        Commands::Ingest(args) => commands::run_ingest(&config, &args.files).await?,
        Commands::List => commands::run_list(&config).await?,
        Commands::Ask(args) => {
            commands::run_ask(&config, &args.question, &args.collections, args.context_only)
                .await?;
        }
        Commands::Compare(args) => {
            commands::run_compare(&config, &args.names, args.collections).await?;
        }
        Commands::Summarize(args) => {
            commands::run_summarize(&config, &args.filenames, args.latest).await?;
        }
    }

    Ok(())
}
