//! Timeline construction and replay.
//!
//! Builds the chronological net-flow series for a target address, with a
//! running balance and monthly rollups, and replays persisted timelines
//! whose entries use heterogeneous timestamp encodings.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::AnalysisError;
use super::normalizer::{resolve_timestamp, unwrap_container};
use super::types::*;

/// Month bucket key, e.g. "2024-03"
pub fn month_key(at: &DateTime<Utc>) -> String {
    format!("{}-{:02}", at.year(), at.month())
}

/// Build the timeline for `target`.
///
/// Only confirmed transactions with a block time take part. Points are
/// ordered by block time; equal times keep their input order.
pub fn build_timeline(target: &str, transactions: &[CanonicalTransaction]) -> Timeline {
    // (time, net, tx) for every timed transaction
    let mut timed: Vec<(DateTime<Utc>, i64, &CanonicalTransaction)> = transactions
        .iter()
        .filter(|tx| tx.confirmed)
        .filter_map(|tx| tx.timestamp().map(|at| (at, tx.net_for(target), tx)))
        .collect();

    // Stable sort keeps input order for equal timestamps
    timed.sort_by_key(|(at, _, _)| *at);

    let mut points = Vec::with_capacity(timed.len());
    let mut running_balance = 0i64;
    let mut received_sat = 0i64;
    let mut sent_sat = 0i64;

    for (at, net, tx) in timed {
        running_balance += net;
        if net > 0 {
            received_sat += net;
        } else {
            sent_sat += -net;
        }

        points.push(TimelinePoint {
            txid: tx.id.clone(),
            timestamp: at.timestamp(),
            formatted_date: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            readable_date: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            net_amount_satoshis: net,
            net_amount_btc: sat_to_btc(net),
            amount_btc: sat_to_btc(net.abs()),
            running_balance_satoshis: running_balance,
            running_balance_btc: sat_to_btc(running_balance),
            kind: TxKind::from_net(net),
            fee_satoshis: tx.fee,
            fee_btc: sat_to_btc(tx.fee as i64),
        });
    }

    let summary_stats = TimelineSummary {
        total_confirmed_transactions: points.len(),
        total_received_btc: sat_to_btc(received_sat),
        total_sent_btc: sat_to_btc(sent_sat),
        date_range: DateRange {
            earliest: points.first().map(|p| p.readable_date.clone()),
            latest: points.last().map(|p| p.readable_date.clone()),
        },
        monthly_activity: monthly_activity(&points),
    };

    log::debug!(
        "Timeline for {}: {} confirmed of {} transactions",
        target,
        points.len(),
        transactions.len()
    );

    Timeline {
        address: target.to_string(),
        transactions: points,
        summary_stats,
    }
}

/// Roll timeline points up by calendar month (UTC)
pub fn monthly_activity(points: &[TimelinePoint]) -> BTreeMap<String, MonthlyActivity> {
    let mut months: BTreeMap<String, MonthlyActivity> = BTreeMap::new();

    for point in points {
        // Bucket from the epoch value, not the formatted string
        let Some(at) = epoch_to_datetime(point.timestamp) else {
            continue;
        };
        let bucket = months.entry(month_key(&at)).or_default();
        bucket.transaction_count += 1;

        match point.kind {
            TxKind::Received => {
                bucket.total_received += point.amount_btc;
                bucket.net_flow += point.amount_btc;
            }
            TxKind::Sent => {
                bucket.total_sent += point.amount_btc;
                bucket.net_flow -= point.amount_btc;
            }
        }
    }

    months
}

/// One point of a replayed balance series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub timestamp: DateTime<Utc>,
    pub net_amount_btc: f64,
    pub balance_btc: f64,
    pub kind: TxKind,
}

/// Balance-over-time series rebuilt from a persisted timeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayedTimeline {
    pub points: Vec<BalancePoint>,
    /// Entries with no resolvable timestamp
    pub dropped_entries: usize,
    /// Entries whose missing `net_amount_btc` was taken as 0.0
    pub defaulted_amounts: usize,
}

/// Replay a persisted timeline into a balance series.
///
/// `value` is either the entry sequence itself or a mapping that nests it
/// under one of the recognised container keys.
pub fn replay_timeline(value: &Value) -> Result<ReplayedTimeline, AnalysisError> {
    let entries = unwrap_container(value)?;

    let mut replayed = ReplayedTimeline::default();
    let mut timed: Vec<(DateTime<Utc>, f64)> = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some(at) = resolve_timestamp(entry) else {
            replayed.dropped_entries += 1;
            continue;
        };
        let net = match entry.get("net_amount_btc").and_then(|v| v.as_f64()) {
            Some(net) => net,
            None => {
                replayed.defaulted_amounts += 1;
                0.0
            }
        };
        timed.push((at, net));
    }

    if replayed.dropped_entries > 0 {
        log::warn!(
            "Dropped {} timeline entries with no parseable timestamp",
            replayed.dropped_entries
        );
    }

    timed.sort_by_key(|(at, _)| *at);

    let mut balance = 0.0;
    replayed.points = timed
        .into_iter()
        .map(|(timestamp, net)| {
            balance += net;
            BalancePoint {
                timestamp,
                net_amount_btc: net,
                balance_btc: balance,
                kind: TxKind::from_net_btc(net),
            }
        })
        .collect();

    Ok(replayed)
}
