use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use ragsum_core::PipelineConfig;
use ragsum_rag::{open_index, DirectoryLoader, Error, IndexSetup, LocalVectorStore, RagService};
use ragsum_watsonx::WatsonxClient;

#[derive(Parser)]
#[command(name = "ragsum")]
#[command(about = "Answer questions about a folder of documents with retrieval-augmented summarization", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents, build the vector index and save it
    Build {
        /// Directory (or file) with source documents
        #[arg(long)]
        data: Option<PathBuf>,
        /// Directory the index is written to
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Answer a question from the indexed documents
    Query {
        /// The question
        #[arg(required = true)]
        text: Vec<String>,
        /// Number of fragments to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Character budget for the assembled context
        #[arg(long)]
        max_context: Option<usize>,
        /// Directory the index is read from
        #[arg(long)]
        store: Option<PathBuf>,
        /// Rebuild the index from documents instead of loading it
        #[arg(long)]
        rebuild: bool,
        /// Document directory used with --rebuild
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Show statistics about the saved index
    Stats {
        /// Directory the index is read from
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "warn,ragsum=info,ragsum_rag=info",
        1 => "info,ragsum=debug,ragsum_rag=debug,ragsum_watsonx=debug",
        _ => "debug,ragsum=trace,ragsum_rag=trace,ragsum_watsonx=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut config = PipelineConfig::from_env().context("invalid pipeline configuration")?;

    match cli.command {
        Commands::Build { data, store } => {
            if let Some(data) = data {
                config.data_dir = data;
            }
            if let Some(store) = store {
                config.storage_path = store;
            }
            build(&config).await
        }
        Commands::Query {
            text,
            top_k,
            max_context,
            store,
            rebuild,
            data,
        } => {
            if let Some(top_k) = top_k {
                config.top_k = top_k;
            }
            if let Some(max_context) = max_context {
                config.max_context_chars = max_context;
            }
            if let Some(store) = store {
                config.storage_path = store;
            }
            if let Some(data) = data {
                config.data_dir = data;
            }
            let setup = if rebuild {
                IndexSetup::build(&config)
            } else {
                IndexSetup::load(&config)
            };
            query(&text.join(" "), setup, config).await
        }
        Commands::Stats { store } => {
            if let Some(store) = store {
                config.storage_path = store;
            }
            stats(&config).await
        }
    }
}

async fn build(config: &PipelineConfig) -> Result<()> {
    config.validate()?;
    println!(
        "{} Building index from {}",
        "📚".blue(),
        config.data_dir.display()
    );

    let store = open_index(&IndexSetup::build(config), config, &DirectoryLoader::new()).await?;

    println!(
        "{} Indexed {} fragments into {}",
        "✅".green(),
        store.stats()["entries"],
        LocalVectorStore::index_file(&config.storage_path).display()
    );
    Ok(())
}

async fn query(text: &str, setup: IndexSetup, config: PipelineConfig) -> Result<()> {
    let watsonx = WatsonxClient::from_env()?;
    let top_k = config.top_k;

    let service = RagService::init(setup, config, watsonx)
        .await
        .map_err(with_hint)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling query");
            ctrl_c.cancel();
        }
    });

    println!("{} Searching...", "🔎".blue());
    let run = service.pipeline().run(text, top_k, &cancel).await;
    let sources = run
        .context
        .as_ref()
        .map(|c| c.sources.clone())
        .unwrap_or_default();

    let answer = match run.outcome {
        Ok(answer) => answer,
        Err(e) => {
            if matches!(e, Error::Cancelled) {
                eprintln!("{} Query cancelled", "⚠️".yellow());
            }
            service.shutdown().await?;
            return Err(with_hint(e));
        }
    };

    println!("{} {}", "summary:".green().bold(), answer);
    if sources.is_empty() {
        println!("{}", "(no matching documents; answer is not grounded in the index)".yellow());
    } else {
        println!("{}", "sources:".bold());
        for source in &sources {
            println!("  {} {}", "•".cyan(), source);
        }
    }

    service.shutdown().await?;
    Ok(())
}

/// Attach a user-facing explanation to a failed query
fn with_hint(error: Error) -> anyhow::Error {
    let hint = match &error {
        Error::IndexUnavailable(_) => {
            "no vector index available; run `ragsum build` first or pass --rebuild"
        }
        Error::Cancelled => "query cancelled before the summary was ready",
        Error::InvalidArgument(_) => "invalid query arguments",
        _ => "query failed",
    };
    anyhow::Error::from(error).context(hint)
}

async fn stats(config: &PipelineConfig) -> Result<()> {
    let store = open_index(&IndexSetup::load(config), config, &DirectoryLoader::new()).await?;
    println!("{}", serde_json::to_string_pretty(&store.stats())?);
    Ok(())
}
