//! Address statistics, recent transactions and untimed volume totals.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::*;

/// Headline statistics for an address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressStats {
    pub total_received_btc: f64,
    pub total_sent_btc: f64,
    pub current_balance_btc: f64,
    pub transaction_count: u64,
    pub average_transaction_size_btc: f64,
}

impl AddressStats {
    fn from_totals(received_sat: u64, sent_sat: u64, transaction_count: u64) -> Self {
        let total_received_btc = sat_to_btc(received_sat as i64);
        let total_sent_btc = sat_to_btc(sent_sat as i64);
        let average_transaction_size_btc = if transaction_count > 0 {
            (total_received_btc + total_sent_btc) / (transaction_count as f64 * 2.0)
        } else {
            0.0
        };

        Self {
            total_received_btc,
            total_sent_btc,
            current_balance_btc: total_received_btc - total_sent_btc,
            transaction_count,
            average_transaction_size_btc,
        }
    }
}

/// Statistics from an explorer's `chain_stats` block; missing fields count as zero
pub fn address_stats(address_info: &Value) -> AddressStats {
    let chain_stats = address_info.get("chain_stats");
    let field = |name: &str| {
        chain_stats
            .and_then(|s| s.get(name))
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    };

    AddressStats::from_totals(
        field("funded_txo_sum"),
        field("spent_txo_sum"),
        field("tx_count"),
    )
}

/// Statistics derived from the target's own flow when no explorer data exists
pub fn address_stats_from_flow(flow: &AddressFlow, transaction_count: usize) -> AddressStats {
    AddressStats::from_totals(
        flow.total_received_sat,
        flow.total_sent_sat,
        transaction_count as u64,
    )
}

/// One row of the recent-transactions table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentTransaction {
    pub txid: String,
    pub confirmed: bool,
    pub block_time: Option<i64>,
    pub formatted_time: Option<String>,
    pub amount_in_satoshis: u64,
    pub amount_out_satoshis: u64,
    pub net_amount_satoshis: i64,
    pub net_amount_btc: f64,
    pub transaction_type: TxKind,
    pub fee_satoshis: u64,
    pub fee_btc: f64,
}

/// First `limit` transactions in upstream order, seen from `target`
pub fn recent_transactions(
    target: &str,
    transactions: &[CanonicalTransaction],
    limit: usize,
) -> Vec<RecentTransaction> {
    transactions
        .iter()
        .take(limit)
        .map(|tx| {
            let amount_in = tx.amount_in_for(target);
            let amount_out = tx.amount_out_for(target);
            let net = amount_in as i64 - amount_out as i64;

            RecentTransaction {
                txid: tx.id.clone(),
                confirmed: tx.confirmed,
                block_time: tx.block_time,
                formatted_time: tx
                    .timestamp()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                amount_in_satoshis: amount_in,
                amount_out_satoshis: amount_out,
                net_amount_satoshis: net,
                net_amount_btc: sat_to_btc(net),
                transaction_type: TxKind::from_net(net),
                fee_satoshis: tx.fee,
                fee_btc: sat_to_btc(tx.fee as i64),
            }
        })
        .collect()
}

/// Aggregate view over the recent-transactions table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub total_transactions_analyzed: usize,
    pub received_transactions: usize,
    pub sent_transactions: usize,
    pub total_received_btc: f64,
    pub total_sent_btc: f64,
    /// Absolute amounts of received rows, for a volume histogram
    pub received_amounts_btc: Vec<f64>,
    /// Absolute amounts of sent rows
    pub sent_amounts_btc: Vec<f64>,
}

pub fn statistics_summary(recent: &[RecentTransaction]) -> StatisticsSummary {
    let mut summary = StatisticsSummary {
        total_transactions_analyzed: recent.len(),
        ..Default::default()
    };

    for tx in recent {
        let amount = tx.net_amount_btc.abs();
        match tx.transaction_type {
            TxKind::Received => {
                summary.received_transactions += 1;
                summary.total_received_btc += amount;
                summary.received_amounts_btc.push(amount);
            }
            TxKind::Sent => {
                summary.sent_transactions += 1;
                summary.total_sent_btc += amount;
                summary.sent_amounts_btc.push(amount);
            }
        }
    }

    summary
}

/// Totals over every record, timed or not, attributed or not
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeTotals {
    pub transaction_count: usize,
    pub confirmed_count: usize,
    pub total_fee_satoshis: u64,
    pub total_output_satoshis: u64,
    pub total_output_btc: f64,
    pub unattributed_legs: usize,
    /// RFC 3339 time of the earliest block in the set
    pub earliest_block_time: Option<String>,
}

pub fn volume_totals(transactions: &[CanonicalTransaction]) -> VolumeTotals {
    let total_output: u64 = transactions.iter().map(|tx| tx.total_output()).sum();

    VolumeTotals {
        transaction_count: transactions.len(),
        confirmed_count: transactions.iter().filter(|tx| tx.confirmed).count(),
        total_fee_satoshis: transactions.iter().map(|tx| tx.fee).sum(),
        total_output_satoshis: total_output,
        total_output_btc: sat_to_btc(total_output as i64),
        unattributed_legs: transactions.iter().map(|tx| tx.unattributed_legs()).sum(),
        earliest_block_time: transactions
            .iter()
            .filter_map(|tx| tx.timestamp())
            .min()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
    }
}
