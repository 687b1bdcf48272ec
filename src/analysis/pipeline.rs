//! End-to-end analysis of one or many addresses.
//!
//! Each address run is self-contained: fetch, resolve details, normalize,
//! then derive every view from the same canonical record set. Batch runs
//! execute addresses in parallel and never share state between them.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::clustering::{cluster, ClusteringAnalysis};
use super::error::AnalysisError;
use super::flow::{aggregate, Clock};
use super::network::{build_network_graph, NetworkGraph};
use super::normalizer::normalize_all;
use super::projector::{project, project_graph, FlowNetwork};
use super::ranker::rank;
use super::source::{resolve_details, LedgerSource};
use super::summary::*;
use super::timeline::build_timeline;
use super::types::*;
use crate::config::Config;

/// Limits and provenance for one analysis run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub max_transactions: usize,
    pub recent_limit: usize,
    pub network_node_limit: usize,
    pub api_source: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for AnalysisSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_transactions: config.analysis.max_transactions,
            recent_limit: config.analysis.recent_limit,
            network_node_limit: config.analysis.network_node_limit,
            api_source: config.source.api_source.clone(),
        }
    }
}

/// Record-level fallbacks applied during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackReport {
    pub timestamp_fallback: TimestampFallback,
    /// Raw records dropped as malformed
    pub skipped_records: usize,
    /// Leg values that were missing and counted as zero
    pub defaulted_leg_values: usize,
    /// Legs excluded from address aggregation for lack of an address
    pub unattributed_legs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub address: String,
    /// RFC 3339
    pub analysis_timestamp: String,
    /// "YYYY-MM-DD HH:MM:SS", UTC
    pub analysis_date: String,
    pub api_source: String,
}

impl AnalysisMetadata {
    fn new(address: &str, at: DateTime<Utc>, api_source: &str) -> Self {
        Self {
            address: address.to_string(),
            analysis_timestamp: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            analysis_date: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            api_source: api_source.to_string(),
        }
    }
}

/// Everything produced for one address, in its persisted layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDocument {
    pub address_stats: AddressStats,
    /// Raw explorer address object, when the source had one
    pub address_info: Option<Value>,
    pub recent_transactions: Vec<RecentTransaction>,
    pub statistics_summary: StatisticsSummary,
    /// Canonical records the run was computed from
    pub all_transactions: Vec<CanonicalTransaction>,
    pub clustering_analysis: ClusteringAnalysis,
    pub network_graph: NetworkGraph,
    pub transaction_timeline: Timeline,
    pub metadata: AnalysisMetadata,
    pub address_flows: BTreeMap<String, AddressFlow>,
    pub bubble_map: Vec<BubbleNode>,
    pub flow_network: FlowNetwork,
    pub top_counterparties: CounterpartyRanking,
    pub volume_totals: VolumeTotals,
    pub fallbacks: FallbackReport,
}

/// Run every stage over records that are already fetched and resolved.
///
/// Fails with `EmptyResult` when no record survives normalization.
pub fn analyze_records(
    address: &str,
    raws: &[Value],
    address_info: Option<Value>,
    settings: &AnalysisSettings,
    clock: &dyn Clock,
) -> Result<AnalysisDocument, AnalysisError> {
    let window = &raws[..raws.len().min(settings.max_transactions)];
    let batch = normalize_all(window);
    if batch.transactions.is_empty() {
        log::warn!("No usable transactions for {}", address);
        return Err(AnalysisError::EmptyResult {
            address: address.to_string(),
        });
    }
    let transactions = batch.transactions;

    let aggregation = aggregate(address, &transactions, clock);
    let graph = cluster(address, &transactions);
    let timeline = build_timeline(address, &transactions);
    let recent = recent_transactions(address, &transactions, settings.recent_limit);

    let address_stats = match &address_info {
        Some(info) => address_stats(info),
        None => address_stats_from_flow(aggregation.target_flow(), transactions.len()),
    };

    let document = AnalysisDocument {
        address_stats,
        address_info,
        statistics_summary: statistics_summary(&recent),
        recent_transactions: recent,
        clustering_analysis: ClusteringAnalysis::from(&graph),
        network_graph: build_network_graph(&graph, transactions.len(), settings.network_node_limit),
        transaction_timeline: timeline,
        metadata: AnalysisMetadata::new(
            address,
            aggregation.timestamp_fallback.fallback_time,
            &settings.api_source,
        ),
        bubble_map: project(&aggregation.flows, address),
        flow_network: project_graph(&aggregation.flows, address),
        top_counterparties: rank(&aggregation.flows),
        volume_totals: volume_totals(&transactions),
        fallbacks: FallbackReport {
            timestamp_fallback: aggregation.timestamp_fallback,
            skipped_records: batch.skipped.len(),
            defaulted_leg_values: batch.defaulted_leg_values,
            unattributed_legs: aggregation.unattributed_legs,
        },
        address_flows: aggregation.flows,
        all_transactions: transactions,
    };

    log::info!(
        "Analyzed {}: {} transactions, {} counterparties, {} timeline points",
        address,
        document.all_transactions.len(),
        document.clustering_analysis.related_addresses.len(),
        document.transaction_timeline.transactions.len()
    );

    Ok(document)
}

/// Fetch and analyze one address
pub fn analyze_address(
    address: &str,
    source: &dyn LedgerSource,
    settings: &AnalysisSettings,
    clock: &dyn Clock,
) -> Result<AnalysisDocument, AnalysisError> {
    let source_error = |e: color_eyre::eyre::Report| AnalysisError::Source {
        address: address.to_string(),
        message: format!("{:#}", e),
    };

    log::info!("Fetching ledger data for {}", address);
    let address_info = source.address_info(address).map_err(source_error)?;
    let mut raws = source.address_transactions(address).map_err(source_error)?;
    raws.truncate(settings.max_transactions);

    let raws = resolve_details(source, raws);
    analyze_records(address, &raws, address_info, settings, clock)
}

/// Analyze many addresses in parallel.
///
/// Results come back in input order, one per address; a failure for one
/// address never affects another.
pub fn analyze_batch(
    addresses: &[String],
    source: &dyn LedgerSource,
    settings: &AnalysisSettings,
    clock: &dyn Clock,
) -> Vec<(String, Result<AnalysisDocument, AnalysisError>)> {
    log::info!("Analyzing {} addresses", addresses.len());

    let results: Vec<(String, Result<AnalysisDocument, AnalysisError>)> = addresses
        .par_iter()
        .map(|address| {
            let result = analyze_address(address, source, settings, clock);
            (address.clone(), result)
        })
        .collect();

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    if failed > 0 {
        log::warn!("{} of {} addresses failed", failed, results.len());
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::flow::FixedClock;
    use serde_json::json;

    fn clock() -> FixedClock {
        FixedClock(DateTime::from_timestamp(1_750_000_000, 0).unwrap())
    }

    fn raw(txid: &str, time: i64, from: &str, to: &str, value: u64) -> Value {
        json!({
            "txid": txid,
            "status": { "confirmed": true, "block_time": time },
            "fee": 100,
            "vin": [{ "prevout": { "scriptpubkey_address": from, "value": value + 100 } }],
            "vout": [{ "scriptpubkey_address": to, "value": value }]
        })
    }

    #[test]
    fn test_analyze_records_builds_every_view() {
        let raws = vec![raw("t1", 100, "B", "A", 5_000), raw("t2", 200, "A", "C", 2_000)];
        let doc = analyze_records("A", &raws, None, &AnalysisSettings::default(), &clock()).unwrap();

        assert_eq!(doc.all_transactions.len(), 2);
        assert_eq!(doc.transaction_timeline.transactions.len(), 2);
        assert_eq!(doc.clustering_analysis.related_addresses, vec!["B", "C"]);
        assert_eq!(doc.network_graph.graph_metrics.total_nodes, 3);
        assert_eq!(doc.bubble_map[0].address, "A");
        assert_eq!(doc.flow_network.edges.len(), 2);
        assert_eq!(doc.recent_transactions.len(), 2);
        assert_eq!(doc.metadata.analysis_date, "2025-06-15 15:06:40");
        // Stats fall back to the target's own flow
        assert_eq!(doc.address_stats.transaction_count, 2);
        assert_eq!(doc.address_stats.total_received_btc, sat_to_btc(5_000));
        assert_eq!(doc.fallbacks.timestamp_fallback.applied, 0);
    }

    #[test]
    fn test_empty_history_is_empty_result() {
        let err = analyze_records("A", &[], None, &AnalysisSettings::default(), &clock()).unwrap_err();
        assert!(err.is_empty_result());

        let only_malformed = vec![json!({ "no": "txid" })];
        let err = analyze_records("A", &only_malformed, None, &AnalysisSettings::default(), &clock())
            .unwrap_err();
        assert_eq!(err, AnalysisError::EmptyResult { address: "A".to_string() });
    }

    #[test]
    fn test_window_limits_records() {
        let raws: Vec<Value> = (0..5).map(|i| raw(&format!("t{}", i), 100 + i, "B", "A", 10)).collect();
        let settings = AnalysisSettings {
            max_transactions: 3,
            recent_limit: 2,
            ..Default::default()
        };
        let doc = analyze_records("A", &raws, None, &settings, &clock()).unwrap();
        assert_eq!(doc.all_transactions.len(), 3);
        assert_eq!(doc.recent_transactions.len(), 2);
    }

    #[test]
    fn test_address_info_drives_stats() {
        let info = json!({ "chain_stats": { "funded_txo_sum": 100_000_000u64, "spent_txo_sum": 0, "tx_count": 1 } });
        let raws = vec![raw("t1", 100, "B", "A", 5_000)];
        let doc = analyze_records("A", &raws, Some(info), &AnalysisSettings::default(), &clock()).unwrap();
        assert_eq!(doc.address_stats.total_received_btc, 1.0);
        assert!(doc.address_info.is_some());
    }
}
