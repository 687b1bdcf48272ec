//! Core data types for transaction flow analysis.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Satoshis per BTC
pub const SATS_PER_BTC: f64 = 100_000_000.0;

/// Convert satoshis to BTC
pub fn sat_to_btc(sats: i64) -> f64 {
    sats as f64 / SATS_PER_BTC
}

/// Convert epoch seconds to a UTC timestamp
pub fn epoch_to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// An input leg: value drawn from a previous output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// None when the spent script carries no decodable address
    pub source_address: Option<String>,
    pub value: u64,
}

/// An output leg: value paid to a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub destination_address: Option<String>,
    pub value: u64,
}

/// A transaction as produced by the normalizer. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    pub id: String,
    pub confirmed: bool,
    /// Block time in epoch seconds. Always None for unconfirmed records.
    pub block_time: Option<i64>,
    /// Fee in satoshis
    pub fee: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl CanonicalTransaction {
    /// Block time as a UTC timestamp, if the record carries one
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.block_time.and_then(epoch_to_datetime)
    }

    /// Sum of output legs paying `address`
    pub fn amount_in_for(&self, address: &str) -> u64 {
        self.outputs
            .iter()
            .filter(|o| o.destination_address.as_deref() == Some(address))
            .map(|o| o.value)
            .sum()
    }

    /// Sum of input legs drawn from `address`
    pub fn amount_out_for(&self, address: &str) -> u64 {
        self.inputs
            .iter()
            .filter(|i| i.source_address.as_deref() == Some(address))
            .map(|i| i.value)
            .sum()
    }

    /// Net satoshis for `address` (positive = inflow)
    pub fn net_for(&self, address: &str) -> i64 {
        self.amount_in_for(address) as i64 - self.amount_out_for(address) as i64
    }

    /// Distinct addresses appearing in any leg
    pub fn addresses(&self) -> BTreeSet<&str> {
        let inputs = self.inputs.iter().filter_map(|i| i.source_address.as_deref());
        let outputs = self.outputs.iter().filter_map(|o| o.destination_address.as_deref());
        inputs.chain(outputs).collect()
    }

    /// Legs with no decodable address
    pub fn unattributed_legs(&self) -> usize {
        let inputs = self.inputs.iter().filter(|i| i.source_address.is_none()).count();
        let outputs = self.outputs.iter().filter(|o| o.destination_address.is_none()).count();
        inputs + outputs
    }

    /// Total value paid out by this transaction, attributed or not
    pub fn total_output(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

/// Per-address flow accumulator for one aggregation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressFlow {
    pub total_received_sat: u64,
    pub total_sent_sat: u64,
    pub transaction_count: u64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl AddressFlow {
    pub fn total_received(&self) -> f64 {
        sat_to_btc(self.total_received_sat as i64)
    }

    pub fn total_sent(&self) -> f64 {
        sat_to_btc(self.total_sent_sat as i64)
    }

    /// Received plus sent, in BTC
    pub fn total_flow(&self) -> f64 {
        self.total_received() + self.total_sent()
    }

    /// Received minus sent, in BTC
    pub fn net_flow(&self) -> f64 {
        sat_to_btc(self.total_received_sat as i64 - self.total_sent_sat as i64)
    }

    /// Widen the seen window to include `at`
    pub fn observe(&mut self, at: DateTime<Utc>) {
        if self.first_seen.map_or(true, |first| at < first) {
            self.first_seen = Some(at);
        }
        if self.last_seen.map_or(true, |last| at > last) {
            self.last_seen = Some(at);
        }
    }
}

/// Record of the "now" fallback applied to untimed transactions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimestampFallback {
    /// The time substituted for a missing block time
    pub fallback_time: DateTime<Utc>,
    /// Number of transactions that received the fallback
    pub applied: usize,
}

/// Result of folding a transaction set into per-address flows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowAggregation {
    pub target: String,
    pub flows: BTreeMap<String, AddressFlow>,
    pub timestamp_fallback: TimestampFallback,
    /// Legs skipped for lack of an address
    pub unattributed_legs: usize,
}

impl FlowAggregation {
    /// Flow of the target address. Always present.
    pub fn target_flow(&self) -> &AddressFlow {
        // The accumulator seeds the target on construction
        static EMPTY: AddressFlow = AddressFlow {
            total_received_sat: 0,
            total_sent_sat: 0,
            transaction_count: 0,
            first_seen: None,
            last_seen: None,
        };
        self.flows.get(&self.target).unwrap_or(&EMPTY)
    }
}

/// Likelihood that a counterparty belongs to the target's cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Likelihood {
    Low,
    Medium,
    High,
}

impl Likelihood {
    /// More than 5 shared transactions is High, more than 2 is Medium
    pub fn from_count(connection_count: u32) -> Self {
        if connection_count > 5 {
            Likelihood::High
        } else if connection_count > 2 {
            Likelihood::Medium
        } else {
            Likelihood::Low
        }
    }
}

impl std::fmt::Display for Likelihood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Likelihood::Low => write!(f, "Low"),
            Likelihood::Medium => write!(f, "Medium"),
            Likelihood::High => write!(f, "High"),
        }
    }
}

/// Edge from the target to one counterparty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEdge {
    pub address: String,
    pub connection_count: u32,
    pub likelihood: Likelihood,
}

/// Co-occurrence graph centred on a target address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionGraph {
    pub target: String,
    /// Descending connection count, ties by address
    pub edges: Vec<ConnectionEdge>,
}

impl ConnectionGraph {
    /// Target followed by every counterparty in edge order
    pub fn nodes(&self) -> Vec<&str> {
        std::iter::once(self.target.as_str())
            .chain(self.edges.iter().map(|e| e.address.as_str()))
            .collect()
    }

    pub fn edge(&self, address: &str) -> Option<&ConnectionEdge> {
        self.edges.iter().find(|e| e.address == address)
    }
}

/// Direction of a timeline entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Received,
    Sent,
}

impl TxKind {
    /// Positive net is Received; zero and negative are Sent
    pub fn from_net(net: i64) -> Self {
        if net > 0 {
            TxKind::Received
        } else {
            TxKind::Sent
        }
    }

    pub fn from_net_btc(net: f64) -> Self {
        if net > 0.0 {
            TxKind::Received
        } else {
            TxKind::Sent
        }
    }
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxKind::Received => write!(f, "Received"),
            TxKind::Sent => write!(f, "Sent"),
        }
    }
}

/// One confirmed transaction on the target's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub txid: String,
    pub timestamp: i64,
    pub formatted_date: String,
    pub readable_date: String,
    pub net_amount_satoshis: i64,
    pub net_amount_btc: f64,
    /// Absolute value of the net amount
    pub amount_btc: f64,
    pub running_balance_satoshis: i64,
    pub running_balance_btc: f64,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub fee_satoshis: u64,
    pub fee_btc: f64,
}

/// Per-month rollup of timeline points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyActivity {
    pub transaction_count: usize,
    pub total_received: f64,
    pub total_sent: f64,
    pub net_flow: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineSummary {
    pub total_confirmed_transactions: usize,
    pub total_received_btc: f64,
    pub total_sent_btc: f64,
    pub date_range: DateRange,
    /// Keyed by "YYYY-MM"
    pub monthly_activity: BTreeMap<String, MonthlyActivity>,
}

/// Chronological net-flow series for one address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub address: String,
    pub transactions: Vec<TimelinePoint>,
    pub summary_stats: TimelineSummary,
}

/// Color bucket for a bubble or graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorBucket {
    Primary,
    Positive,
    Negative,
}

/// Bubble-chart projection of one AddressFlow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleNode {
    pub address: String,
    pub total_flow: f64,
    pub net_flow: f64,
    pub transaction_count: u64,
    pub size: f64,
    pub color_bucket: ColorBucket,
    pub label: String,
}

/// A ranked counterparty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub address: String,
    pub amount_satoshis: u64,
    pub amount_btc: f64,
}

/// Top senders and receivers across an aggregate map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterpartyRanking {
    pub top_senders: Vec<RankEntry>,
    pub top_receivers: Vec<RankEntry>,
}
