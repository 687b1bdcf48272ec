//! Report generation for address flow analysis.
//!
//! Persists analysis documents as JSON and renders human-readable summaries.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};

use super::pipeline::AnalysisDocument;
use super::types::*;

/// Report file name for an address: `bitcoin_analysis_<first 8 chars>.json`
pub fn document_file_name(address: &str) -> String {
    let prefix: String = address.chars().take(8).collect();
    format!("bitcoin_analysis_{}.json", prefix)
}

/// Report file names shared by more than one distinct address.
///
/// Such addresses overwrite each other's reports in the same directory.
pub fn file_name_collisions(addresses: &[String]) -> Vec<(String, Vec<String>)> {
    let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for address in addresses {
        let owners = by_name.entry(document_file_name(address)).or_default();
        if !owners.contains(address) {
            owners.push(address.clone());
        }
    }
    by_name.into_iter().filter(|(_, owners)| owners.len() > 1).collect()
}

/// Write the JSON document into `output_dir`, returning the file path
pub fn write_document(document: &AnalysisDocument, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let output_path = output_dir.join(document_file_name(&document.metadata.address));
    let json = serde_json::to_string_pretty(document)
        .context("Failed to serialize analysis document to JSON")?;

    fs::write(&output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(output_path)
}

/// Read a persisted document back
pub fn load_document(path: &Path) -> Result<AnalysisDocument> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read analysis document from {}", path.display()))?;
    let document = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse analysis document {}", path.display()))?;
    Ok(document)
}

fn section(lines: &mut Vec<String>, title: &str) {
    lines.push("=".repeat(80));
    lines.push(format!("{:^80}", title));
    lines.push("=".repeat(80));
    lines.push(String::new());
}

/// Render the human-readable report
pub fn render_text_report(document: &AnalysisDocument) -> String {
    let mut lines: Vec<String> = Vec::new();

    section(&mut lines, "ADDRESS FLOW ANALYSIS");

    // Metadata
    lines.push(format!("Address: {}", document.metadata.address));
    lines.push(format!("Analysis Date: {}", document.metadata.analysis_date));
    lines.push(format!("Data Source: {}", document.metadata.api_source));
    lines.push(format!("Transactions Analyzed: {}", document.all_transactions.len()));
    lines.push(String::new());

    // Address statistics
    let stats = &document.address_stats;
    section(&mut lines, "ADDRESS STATISTICS");
    lines.push(format!("Total Received:   {:.8} BTC", stats.total_received_btc));
    lines.push(format!("Total Sent:       {:.8} BTC", stats.total_sent_btc));
    lines.push(format!("Current Balance:  {:.8} BTC", stats.current_balance_btc));
    lines.push(format!("Transactions:     {}", stats.transaction_count));
    lines.push(format!("Average Size:     {:.8} BTC", stats.average_transaction_size_btc));
    lines.push(String::new());

    // Timeline
    let summary = &document.transaction_timeline.summary_stats;
    section(&mut lines, "TIMELINE");
    lines.push(format!(
        "Confirmed transactions: {}",
        summary.total_confirmed_transactions
    ));
    if let (Some(earliest), Some(latest)) = (&summary.date_range.earliest, &summary.date_range.latest) {
        lines.push(format!("Date range: {} to {}", earliest, latest));
    }
    lines.push(format!("Received: {:.8} BTC", summary.total_received_btc));
    lines.push(format!("Sent:     {:.8} BTC", summary.total_sent_btc));
    lines.push(String::new());

    if !summary.monthly_activity.is_empty() {
        lines.push("Monthly Activity:".to_string());
        for (month, activity) in &summary.monthly_activity {
            lines.push(format!(
                "  {}: {:>4} txs, +{:.8} / -{:.8} BTC (net {:+.8})",
                month,
                activity.transaction_count,
                activity.total_received,
                activity.total_sent,
                activity.net_flow
            ));
        }
        lines.push(String::new());
    }

    // Clustering
    let clusters = &document.clustering_analysis.cluster_analysis;
    section(&mut lines, "ADDRESS CLUSTERING");
    if clusters.is_empty() {
        lines.push("No counterparties found.".to_string());
    } else {
        lines.push(format!("Related addresses: {}", clusters.len()));
        for (i, entry) in clusters.iter().take(10).enumerate() {
            lines.push(format!(
                "  {:>2}. {} - {} shared transactions ({} likelihood)",
                i + 1,
                entry.address,
                entry.connection_count,
                entry.likelihood
            ));
        }
    }
    lines.push(String::new());

    // Counterparties
    section(&mut lines, "TOP COUNTERPARTIES");
    push_ranking(&mut lines, "Top Senders:", &document.top_counterparties.top_senders);
    push_ranking(&mut lines, "Top Receivers:", &document.top_counterparties.top_receivers);

    // Fallbacks
    let fallbacks = &document.fallbacks;
    let applied = fallbacks.timestamp_fallback.applied;
    if applied > 0 || fallbacks.skipped_records > 0 || fallbacks.defaulted_leg_values > 0 {
        section(&mut lines, "DATA QUALITY");
        if fallbacks.skipped_records > 0 {
            lines.push(format!("Malformed records skipped: {}", fallbacks.skipped_records));
        }
        if fallbacks.defaulted_leg_values > 0 {
            lines.push(format!(
                "Leg values missing (counted as zero): {}",
                fallbacks.defaulted_leg_values
            ));
        }
        if applied > 0 {
            lines.push(format!(
                "Untimed transactions stamped with analysis time: {}",
                applied
            ));
        }
        lines.push(String::new());
    }

    // Footer
    lines.push("=".repeat(80));

    lines.join("\n")
}

fn push_ranking(lines: &mut Vec<String>, title: &str, entries: &[RankEntry]) {
    lines.push(title.to_string());
    if entries.is_empty() {
        lines.push("  (none)".to_string());
    }
    for (i, entry) in entries.iter().enumerate() {
        lines.push(format!("  {:>2}. {} {:.8} BTC", i + 1, entry.address, entry.amount_btc));
    }
    lines.push(String::new());
}

/// Write the human-readable report next to the JSON document
pub fn generate_text_report(document: &AnalysisDocument, output_path: &Path) -> Result<()> {
    fs::write(output_path, render_text_report(document))
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Print a summary to stdout
pub fn print_summary(document: &AnalysisDocument) {
    let stats = &document.address_stats;
    let timeline = &document.transaction_timeline.summary_stats;

    println!("\n=== FLOW ANALYSIS: {} ===\n", document.metadata.address);
    println!("Balance: {:.8} BTC", stats.current_balance_btc);
    println!("Received: {:.8} BTC", stats.total_received_btc);
    println!("Sent: {:.8} BTC", stats.total_sent_btc);
    println!("Transactions analyzed: {}", document.all_transactions.len());
    println!("Confirmed on timeline: {}", timeline.total_confirmed_transactions);
    println!(
        "Related addresses: {}",
        document.clustering_analysis.related_addresses.len()
    );

    if let Some(top) = document.top_counterparties.top_receivers.first() {
        println!("Largest receiver: {} ({:.8} BTC)", top.address, top.amount_btc);
    }

    let applied = document.fallbacks.timestamp_fallback.applied;
    if applied > 0 {
        println!("Untimed transactions: {}", applied);
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::flow::FixedClock;
    use crate::analysis::pipeline::{analyze_records, AnalysisSettings};
    use chrono::DateTime;
    use serde_json::json;
    use tempfile::TempDir;

    fn document() -> AnalysisDocument {
        let raws = vec![json!({
            "txid": "t1",
            "status": { "confirmed": true, "block_time": 1_704_067_200 },
            "fee": 200,
            "vin": [{ "prevout": { "scriptpubkey_address": "bc1qsender", "value": 1_000_200 } }],
            "vout": [{ "scriptpubkey_address": "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", "value": 1_000_000 }]
        })];
        let clock = FixedClock(DateTime::from_timestamp(1_750_000_000, 0).unwrap());
        analyze_records(
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            &raws,
            None,
            &AnalysisSettings::default(),
            &clock,
        )
        .unwrap()
    }

    #[test]
    fn test_document_file_name() {
        assert_eq!(
            document_file_name("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"),
            "bitcoin_analysis_1A1zP1eP.json"
        );
        assert_eq!(document_file_name("abc"), "bitcoin_analysis_abc.json");
    }

    #[test]
    fn test_file_name_collisions() {
        let addresses: Vec<String> = [
            "bc1qxxxxar0srrr7xfkvy5l643lydnw9re59gtzzwf",
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            "bc1qxxxxzzwf5mdqar0srrr7xfkvy5l643lydnw9re",
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
        ]
        .iter()
        .map(|a| a.to_string())
        .collect();

        let collisions = file_name_collisions(&addresses);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].0, "bitcoin_analysis_bc1qxxxx.json");
        assert_eq!(collisions[0].1, vec![addresses[0].clone(), addresses[2].clone()]);

        // The same address listed twice is not a collision
        assert!(file_name_collisions(&[addresses[1].clone(), addresses[1].clone()]).is_empty());
    }

    #[test]
    fn test_write_and_load_document() {
        let dir = TempDir::new().unwrap();
        let doc = document();

        let path = write_document(&doc, dir.path()).unwrap();
        assert!(path.ends_with("bitcoin_analysis_1A1zP1eP.json"));

        let loaded = load_document(&path).unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_text_report_sections() {
        let text = render_text_report(&document());
        assert!(text.contains("ADDRESS FLOW ANALYSIS"));
        assert!(text.contains("Address: 1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));
        assert!(text.contains("2024-01: "));
        assert!(text.contains("bc1qsender - 1 shared transactions (Low likelihood)"));
        assert!(!text.contains("DATA QUALITY"));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.txt");
        generate_text_report(&document(), &path).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), text);
    }
}
