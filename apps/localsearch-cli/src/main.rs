//! localsearch - build, refresh and query the wikipedia and local corpora.
//!
//! ```bash
//! localsearch index                        # load, refresh or build everything
//! localsearch index --corpus local --rebuild
//! localsearch refresh                      # re-sync the local documents
//! localsearch search "borrow checker" -k 5 --strategy hybrid --source all
//! localsearch status
//! ```

mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use localsearch_core::config::Config;
use localsearch_core::{Corpus, SourceSelector};
use localsearch_embed::get_default_embedder;
use localsearch_hybrid::HybridSearchEngine;

#[derive(Parser)]
#[command(name = "localsearch", version, about = "Hybrid keyword + semantic search over wikipedia and local documents")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load persisted indexes, refreshing or building as needed
    Index {
        /// all | wikipedia | local
        #[arg(long, default_value = "all")]
        corpus: String,
        /// Discard persisted indexes and rebuild from the sources
        #[arg(long)]
        rebuild: bool,
    },
    /// Re-sync the local corpus with its directory
    Refresh,
    /// Run a query
    Search {
        query: String,
        #[arg(short = 'k', long, default_value = "5")]
        top_k: i64,
        /// keyword | semantic | hybrid
        #[arg(long, default_value = "hybrid")]
        strategy: String,
        /// all | wikipedia | local
        #[arg(long, default_value = "all")]
        source: String,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what each corpus has loaded
    Status,
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted; finishing the current batch and discarding partial work...");
            child.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let mut settings = config.engine()?;
    settings.resolve_paths(&std::env::current_dir()?);
    let embedder = get_default_embedder(&settings.embedding)?;
    let engine = HybridSearchEngine::new(settings, embedder);

    match cli.command {
        Command::Index { corpus, rebuild } => {
            let cancel = cancel_on_ctrl_c();
            let corpora = corpus.parse::<SourceSelector>()?.corpora();
            for corpus in corpora {
                if engine.indexer(corpus).is_none() {
                    warn!(corpus = %corpus, "Not configured; skipping");
                    continue;
                }
                if rebuild {
                    let report = engine.rebuild(corpus, &cancel).await?;
                    println!("✅ {corpus}: rebuilt {} documents into {} chunks (generation {})", report.documents, report.chunks, report.generation);
                } else {
                    let outcome = engine.open(corpus, &cancel).await?;
                    println!("✅ {corpus}: {}", output::describe_outcome(&outcome));
                }
            }
        }
        Command::Refresh => {
            let cancel = cancel_on_ctrl_c();
            let outcome = engine.open(Corpus::Dynamic, &cancel).await?;
            println!("✅ {}: {}", Corpus::Dynamic, output::describe_outcome(&outcome));
        }
        Command::Search { query, top_k, strategy, source, json } => {
            engine.prepare(&CancellationToken::new()).await?;
            let results = engine.search(&query, top_k, &strategy, &source).await?;
            if json {
                println!("{}", output::format_json(&query, &results)?);
            } else {
                println!("{}", output::format_human(&query, &results));
            }
        }
        Command::Status => {
            for (corpus, loaded) in engine.load_persisted().await {
                if let Err(e) = loaded { warn!(corpus = %corpus, error = %e, "Persisted index unusable"); }
            }
            let status = engine.status();
            println!("{}", output::format_status(&status));
        }
    }
    Ok(())
}
