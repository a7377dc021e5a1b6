// src/report.rs
// =============================================================================
// Read-only view of the rank store for the `report` subcommand.
//
// Everything here is printed with println! so that --json output can be
// piped straight into other tools without log lines mixed in.
// =============================================================================

use serde::Serialize;

use crate::error::StoreError;
use crate::store::{DomainRecord, RankStats, RankStore};

const RECENT_ACTIVITY: usize = 5;

/// Snapshot of the store, the same shape a dashboard would poll.
#[derive(Debug, Clone, Serialize)]
pub struct RankReport {
    pub stats: RankStats,
    pub top_domains: Vec<DomainRecord>,
    pub recent_activity: Vec<DomainRecord>,
    pub currently_processing: Option<DomainRecord>,
}

impl RankReport {
    pub async fn load<S: RankStore + ?Sized>(store: &S, top: usize) -> Result<Self, StoreError> {
        Ok(Self {
            stats: store.stats().await?,
            top_domains: store.top(top).await?,
            recent_activity: store.recent_processed(RECENT_ACTIVITY).await?,
            currently_processing: store.currently_processing().await?,
        })
    }
}

/// Prints the report either as a table or JSON
pub fn print_report(report: &RankReport, json: bool) -> serde_json::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_table(report);
    }
    Ok(())
}

fn print_table(report: &RankReport) {
    println!("{:<5} {:<45} {:>8} {:<12}", "#", "DOMAIN", "RANK", "STATUS");
    println!("{}", "=".repeat(72));

    for (position, record) in report.top_domains.iter().enumerate() {
        println!(
            "{:<5} {:<45} {:>8} {:<12}",
            position + 1,
            truncate(&record.domain, 45),
            record.rank,
            format_status(record.processed)
        );
    }

    println!();

    if !report.recent_activity.is_empty() {
        println!("🕒 Recently processed:");
        for record in &report.recent_activity {
            println!(
                "   {} (rank {}) at {}",
                record.domain,
                record.rank,
                record.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        println!();
    }

    if let Some(current) = &report.currently_processing {
        println!("🔄 Latest pending: {} (rank {})", current.domain, current.rank);
        println!();
    }

    println!("📊 Summary:");
    println!("   🌐 Total: {}", report.stats.total_domains);
    println!("   ✅ Processed: {}", report.stats.processed_count);
    println!("   ⏳ Pending: {}", report.stats.pending_count);
}

fn format_status(processed: bool) -> &'static str {
    if processed {
        "✅ DONE"
    } else {
        "⏳ PENDING"
    }
}

// Long domains are cut to keep the table aligned
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}
