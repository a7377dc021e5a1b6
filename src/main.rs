// src/main.rs
// =============================================================================
// Entry point of the domain-rank binary.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (RUST_LOG overrides the default filter)
// 3. Dispatch to the crawl or report subcommand
// 4. Exit with 0 on success, 2 on error
// =============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use domain_rank::cli::{Cli, Commands, CrawlArgs, ReportArgs};
use domain_rank::report::{print_report, RankReport};
use domain_rank::{DomainWalker, HttpFetcher, Scheduler, SqliteRankStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,domain_rank=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("{:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl(args) => handle_crawl(args).await,
        Commands::Report(args) => handle_report(args).await,
    }
}

async fn handle_crawl(args: CrawlArgs) -> Result<()> {
    let config = args.to_config();
    tracing::info!(
        database = %args.store.database.display(),
        config = %serde_json::to_string(&config)?,
        "starting crawler"
    );

    let store = Arc::new(
        SqliteRankStore::open(&args.store.database)
            .await
            .context("Failed to open rank database")?,
    );
    let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone()).context("Failed to build HTTP client")?);
    let walker = Arc::new(DomainWalker::new(fetcher, config.walk.clone()));
    let scheduler = Scheduler::new(store, walker, config.scheduler.clone());

    if let Some(seed) = &args.seed {
        scheduler.seed(seed).await.context("Failed to add seed domain")?;
    }

    // Ctrl+C lets the current batch finish, then stops
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing current batch");
                shutdown.cancel();
            }
        });
    }

    if args.until_idle {
        let processed = scheduler
            .run_until_idle(shutdown)
            .await
            .context("Crawl failed")?;
        tracing::info!(processed, "no domains left to crawl");
    } else {
        scheduler.run(shutdown).await;
    }

    Ok(())
}

async fn handle_report(args: ReportArgs) -> Result<()> {
    let store = SqliteRankStore::open(&args.store.database)
        .await
        .context("Failed to open rank database")?;
    let report = RankReport::load(&store, args.top)
        .await
        .context("Failed to load ranking")?;
    print_report(&report, args.json)?;
    Ok(())
}
