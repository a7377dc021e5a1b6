// src/cli.rs
// =============================================================================
// Command-line interface, built with clap's derive API.
//
//   domain-rank crawl --seed example.com [--workers 4] [--sequential] ...
//   domain-rank report [--top 10] [--json]
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{CrawlerConfig, FetchConfig, SchedulerConfig, WalkConfig};

#[derive(Parser, Debug)]
#[command(
    name = "domain-rank",
    version,
    about = "Crawl the web domain by domain and rank domains by how many others link to them",
    long_about = "domain-rank crawls each known domain breadth-first, collects the distinct \
                  domains it links to, and gives each of them one vote. The ranking lives in \
                  a SQLite database and drives which domain is crawled next."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the crawler (forever, unless --until-idle is given)
    ///
    /// Example: domain-rank crawl --seed example.com --workers 4
    Crawl(CrawlArgs),

    /// Print the current ranking
    ///
    /// Example: domain-rank report --top 20 --json
    Report(ReportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// SQLite database holding the domain ranks
    #[arg(long, env = "DOMAIN_RANK_DATABASE", default_value = "domain_rank.sqlite3")]
    pub database: PathBuf,
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Domain to start from (added with rank 0 if unknown)
    #[arg(long)]
    pub seed: Option<String>,

    /// Number of BFS levels per domain (1 = home page only)
    #[arg(long, default_value_t = 3)]
    pub max_depth: usize,

    /// Pause after each page, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub delay_ms: u64,

    /// Maximum pages fetched per domain
    #[arg(long, default_value_t = 20)]
    pub max_pages: usize,

    /// Domains crawled in parallel per batch
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// Crawl one domain at a time
    #[arg(long)]
    pub sequential: bool,

    /// Stop once no unprocessed domains remain instead of waiting for more
    #[arg(long)]
    pub until_idle: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl CrawlArgs {
    pub fn to_config(&self) -> CrawlerConfig {
        let scheduler = if self.sequential {
            SchedulerConfig::sequential()
        } else {
            SchedulerConfig::default().with_workers(self.workers)
        };

        CrawlerConfig {
            fetch: FetchConfig::default(),
            walk: WalkConfig::default()
                .with_max_depth(self.max_depth)
                .with_max_pages(self.max_pages)
                .with_page_delay(Duration::from_millis(self.delay_ms)),
            scheduler,
        }
    }
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Number of top domains to show
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Output results in JSON format instead of a table
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}
