//! Flow aggregation: per-address received/sent totals.
//!
//! Every run owns a fresh [`FlowAccumulator`]; nothing is shared between
//! runs. Folding is sequential and must not be driven from several threads
//! against the same accumulator.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::types::*;

/// Source of the current time, used only for the untimed-record fallback
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Accumulates address flows for one target over one run
#[derive(Debug, Clone)]
pub struct FlowAccumulator {
    target: String,
    flows: BTreeMap<String, AddressFlow>,
    fallback_time: DateTime<Utc>,
    fallback_applied: usize,
    unattributed_legs: usize,
}

impl FlowAccumulator {
    /// Create an accumulator seeded with the target address.
    ///
    /// The clock is read once, so every untimed transaction in the run
    /// shares the same fallback instant.
    pub fn new(target: &str, clock: &dyn Clock) -> Self {
        let mut flows = BTreeMap::new();
        flows.insert(target.to_string(), AddressFlow::default());

        Self {
            target: target.to_string(),
            flows,
            fallback_time: clock.now(),
            fallback_applied: 0,
            unattributed_legs: 0,
        }
    }

    /// Fold one transaction into the running totals
    pub fn fold(&mut self, tx: &CanonicalTransaction) {
        let at = match tx.timestamp() {
            Some(ts) => ts,
            None => {
                self.fallback_applied += 1;
                self.fallback_time
            }
        };

        for input in &tx.inputs {
            match &input.source_address {
                Some(address) => {
                    let flow = self.flows.entry(address.clone()).or_default();
                    flow.total_sent_sat = flow.total_sent_sat.saturating_add(input.value);
                    flow.transaction_count += 1;
                    flow.observe(at);
                }
                None => {
                    log::trace!("Input of {} has no address", tx.id);
                    self.unattributed_legs += 1;
                }
            }
        }

        for output in &tx.outputs {
            match &output.destination_address {
                Some(address) => {
                    let flow = self.flows.entry(address.clone()).or_default();
                    flow.total_received_sat = flow.total_received_sat.saturating_add(output.value);
                    flow.transaction_count += 1;
                    flow.observe(at);
                }
                None => {
                    log::trace!("Output of {} has no address", tx.id);
                    self.unattributed_legs += 1;
                }
            }
        }
    }

    pub fn finish(self) -> FlowAggregation {
        FlowAggregation {
            target: self.target,
            flows: self.flows,
            timestamp_fallback: TimestampFallback {
                fallback_time: self.fallback_time,
                applied: self.fallback_applied,
            },
            unattributed_legs: self.unattributed_legs,
        }
    }
}

/// Aggregate flows for every address touched by `transactions`.
///
/// The target is always present in the result, even with zero flow.
/// Untimed transactions stamp `first_seen`/`last_seen` with the clock's
/// "now"; how often that happened is reported in `timestamp_fallback`.
pub fn aggregate(
    target: &str,
    transactions: &[CanonicalTransaction],
    clock: &dyn Clock,
) -> FlowAggregation {
    let mut acc = FlowAccumulator::new(target, clock);
    for tx in transactions {
        acc.fold(tx);
    }

    let result = acc.finish();
    log::debug!(
        "Aggregated {} transactions into {} address flows ({} untimed)",
        transactions.len(),
        result.flows.len(),
        result.timestamp_fallback.applied
    );
    result
}
