//! Transaction flow analysis CLI.
//!
//! Analyzes the flow, counterparties and timeline of ledger addresses from
//! an on-disk block-explorer mirror.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Context, Result};
use env_logger::Env;

use txflow::analysis::{
    self,
    projector::{CircularLayout, LayoutOracle},
    timeline::replay_timeline,
    AnalysisDocument, AnalysisError, AnalysisSettings, JsonDirSource, SystemClock,
};
use txflow::config_loader::{self, CliOverrides};
use txflow::utils::is_plausible_address;

#[derive(Parser)]
#[command(name = "txflow")]
#[command(about = "Transaction flow analysis for ledger addresses")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the block-explorer mirror
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Output directory for reports
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and write JSON + text reports
    Analyze {
        /// Addresses to analyze
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Analyze every address listed in the configuration file
    Batch,

    /// Show co-occurrence clustering for an address
    Cluster {
        address: String,

        /// Rows to show
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Show the running-balance timeline and monthly rollup
    Timeline { address: String },

    /// Show bubble nodes and the laid-out flow network
    Bubbles { address: String },

    /// Show top senders and receivers
    Rank { address: String },

    /// Replay the timeline stored in a persisted analysis document
    Replay { file: PathBuf },
}

/// `--log-level`, then the config file's `general.log_level`, then "info"
fn log_level(cli: &Cli) -> String {
    cli.log_level
        .clone()
        .or_else(|| config_loader::peek_log_level(cli.config.as_deref()))
        .unwrap_or_else(|| "info".to_string())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Logger before config loading so the loader's messages are kept
    let level = log_level(&cli);
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let mut config = config_loader::load_or_default(cli.config.as_deref())?;
    let overrides = CliOverrides {
        data_dir: cli.data_dir.clone(),
        output_dir: cli.output.clone(),
        log_level: cli.log_level.clone(),
        threads: cli.threads,
    };
    config_loader::apply_cli_overrides(&mut config, &overrides)?;

    // Set thread pool size
    if config.general.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.general.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let source = JsonDirSource::new(&config.source.data_dir);
    let settings = AnalysisSettings::from(&config);

    match cli.command {
        Commands::Analyze { addresses } => {
            check_addresses(&addresses)?;
            run_batch(&addresses, &source, &settings, &config.general.output_dir)?;
        }
        Commands::Batch => {
            if config.analysis.addresses.is_empty() {
                bail!("No addresses configured under analysis.addresses");
            }
            run_batch(
                &config.analysis.addresses,
                &source,
                &settings,
                &config.general.output_dir,
            )?;
        }
        Commands::Cluster { address, top } => {
            if let Some(document) = analyze_one(&address, &source, &settings)? {
                print_clusters(&document, top);
            }
        }
        Commands::Timeline { address } => {
            if let Some(document) = analyze_one(&address, &source, &settings)? {
                print_timeline(&document);
            }
        }
        Commands::Bubbles { address } => {
            if let Some(document) = analyze_one(&address, &source, &settings)? {
                print_bubbles(&document);
            }
        }
        Commands::Rank { address } => {
            if let Some(document) = analyze_one(&address, &source, &settings)? {
                print_ranking(&document);
            }
        }
        Commands::Replay { file } => {
            run_replay(&file)?;
        }
    }

    Ok(())
}

fn check_addresses(addresses: &[String]) -> Result<()> {
    for address in addresses {
        if !is_plausible_address(address) {
            bail!("'{}' does not look like a ledger address", address);
        }
    }
    Ok(())
}

/// Analyze one address; an address with no data is reported, not an error
fn analyze_one(
    address: &str,
    source: &JsonDirSource,
    settings: &AnalysisSettings,
) -> Result<Option<AnalysisDocument>> {
    check_addresses(&[address.to_string()])?;
    match analysis::analyze_address(address, source, settings, &SystemClock) {
        Ok(document) => Ok(Some(document)),
        Err(AnalysisError::EmptyResult { .. }) => {
            println!("No transactions found for {}", address);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn run_batch(
    addresses: &[String],
    source: &JsonDirSource,
    settings: &AnalysisSettings,
    output_dir: &Path,
) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    for (name, owners) in analysis::report::file_name_collisions(addresses) {
        log::warn!(
            "{} is shared by {} addresses ({}); only the last one's report is kept",
            name,
            owners.len(),
            owners.join(", ")
        );
    }

    let results = analysis::analyze_batch(addresses, source, settings, &SystemClock);

    let mut failures = 0usize;
    for (address, result) in results {
        match result {
            Ok(document) => {
                let json_path = analysis::write_document(&document, output_dir)?;
                analysis::generate_text_report(&document, &json_path.with_extension("txt"))?;
                analysis::report::print_summary(&document);
            }
            Err(e) if e.is_empty_result() => {
                println!("No transactions found for {}", address);
            }
            Err(e) => {
                log::error!("{}", e);
                failures += 1;
            }
        }
    }

    log::info!("Analysis complete. Reports written to {}", output_dir.display());

    if failures > 0 {
        bail!("{} of {} addresses failed", failures, addresses.len());
    }
    Ok(())
}

fn print_clusters(document: &AnalysisDocument, top: usize) {
    let clusters = &document.clustering_analysis.cluster_analysis;
    println!("\n=== ADDRESS CLUSTERING: {} ===\n", document.metadata.address);
    println!("Related addresses: {}", clusters.len());
    println!();
    println!("{:<64} {:>12} {:>10}", "Address", "Connections", "Likelihood");
    for entry in clusters.iter().take(top) {
        println!(
            "{:<64} {:>12} {:>10}",
            entry.address, entry.connection_count, entry.likelihood
        );
    }
    println!();
}

fn print_timeline(document: &AnalysisDocument) {
    let timeline = &document.transaction_timeline;
    println!("\n=== TIMELINE: {} ===\n", timeline.address);
    println!(
        "{:<20} {:>18} {:>18} {:>9}",
        "Date", "Net (BTC)", "Balance (BTC)", "Type"
    );
    for point in &timeline.transactions {
        println!(
            "{:<20} {:>18.8} {:>18.8} {:>9}",
            point.readable_date, point.net_amount_btc, point.running_balance_btc, point.kind
        );
    }

    println!("\nMonthly Activity:");
    for (month, activity) in &timeline.summary_stats.monthly_activity {
        println!(
            "  {}: {} txs, net {:+.8} BTC",
            month, activity.transaction_count, activity.net_flow
        );
    }

    let applied = document.fallbacks.timestamp_fallback.applied;
    if applied > 0 {
        println!("\n{} untimed transactions are not on the timeline", applied);
    }
    println!();
}

fn print_bubbles(document: &AnalysisDocument) {
    println!("\n=== BUBBLE MAP: {} ===\n", document.metadata.address);
    for bubble in &document.bubble_map {
        println!(
            "{:>8.2} {:?} {}",
            bubble.size, bubble.color_bucket, bubble.label
        );
    }

    let network = &document.flow_network;
    let positions = CircularLayout.place(network);
    println!("\nFlow Network ({} nodes, {} edges):", network.nodes.len(), network.edges.len());
    for (node, position) in network.nodes.iter().zip(&positions) {
        println!(
            "  ({:>6.3}, {:>6.3}) size {:>8.2} {:?} {}",
            position.x, position.y, node.size, node.color_bucket, node.label
        );
    }
    println!();
}

fn print_ranking(document: &AnalysisDocument) {
    let ranking = &document.top_counterparties;
    println!("\n=== TOP COUNTERPARTIES: {} ===\n", document.metadata.address);

    println!("Top Senders:");
    for (i, entry) in ranking.top_senders.iter().enumerate() {
        println!("  {:>2}. {} {:.8} BTC", i + 1, entry.address, entry.amount_btc);
    }
    println!("\nTop Receivers:");
    for (i, entry) in ranking.top_receivers.iter().enumerate() {
        println!("  {:>2}. {} {:.8} BTC", i + 1, entry.address, entry.amount_btc);
    }
    println!();
}

fn run_replay(file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", file.display()))?;

    // A full document nests the timeline; a bare timeline is accepted too
    let timeline = value.get("transaction_timeline").unwrap_or(&value);
    let replayed = replay_timeline(timeline)?;

    println!("\n=== BALANCE OVER TIME: {} ===\n", file.display());
    for point in &replayed.points {
        println!(
            "{} {:>+18.8} {:>18.8} {}",
            point.timestamp.format("%Y-%m-%d %H:%M:%S"),
            point.net_amount_btc,
            point.balance_btc,
            point.kind
        );
    }
    if replayed.dropped_entries > 0 {
        println!("\nDropped {} entries without a timestamp", replayed.dropped_entries);
    }
    if replayed.defaulted_amounts > 0 {
        println!("{} entries had no amount and counted as zero", replayed.defaulted_amounts);
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "txflow",
            "--data-dir", "dump",
            "-j", "4",
            "analyze",
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy",
        ]);

        assert_eq!(cli.data_dir, Some(PathBuf::from("dump")));
        assert_eq!(cli.threads, Some(4));
        match cli.command {
            Commands::Analyze { addresses } => assert_eq!(addresses.len(), 2),
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_cluster_top_default() {
        let cli = Cli::parse_from(["txflow", "cluster", "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"]);
        match cli.command {
            Commands::Cluster { top, .. } => assert_eq!(top, 10),
            _ => panic!("expected cluster"),
        }
    }

    #[test]
    fn test_analyze_requires_address() {
        assert!(Cli::try_parse_from(["txflow", "analyze"]).is_err());
    }

    #[test]
    fn test_log_level_precedence() {
        let cli = Cli::parse_from(["txflow", "--log-level", "warn", "batch"]);
        assert_eq!(log_level(&cli), "warn");

        let cli = Cli::parse_from(["txflow", "batch"]);
        assert_eq!(log_level(&cli), "info");
    }

    #[test]
    fn test_check_addresses() {
        assert!(check_addresses(&["1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string()]).is_ok());
        assert!(check_addresses(&["nope".to_string()]).is_err());
    }
}
