//! Top-counterparty ranking.

use std::collections::BTreeMap;

use super::types::*;

/// Entries kept per ranking
pub const TOP_N: usize = 10;

fn top_by(flows: &BTreeMap<String, AddressFlow>, key: impl Fn(&AddressFlow) -> u64) -> Vec<RankEntry> {
    let mut entries: Vec<RankEntry> = flows
        .iter()
        .map(|(address, flow)| (address, key(flow)))
        .filter(|(_, amount)| *amount > 0)
        .map(|(address, amount)| RankEntry {
            address: address.clone(),
            amount_satoshis: amount,
            amount_btc: sat_to_btc(amount as i64),
        })
        .collect();

    entries.sort_by(|a, b| {
        b.amount_satoshis
            .cmp(&a.amount_satoshis)
            .then_with(|| a.address.cmp(&b.address))
    });
    entries.truncate(TOP_N);
    entries
}

/// Rank the ten largest senders and receivers.
///
/// Zero amounts are left out; ties go to the lexically smaller address.
pub fn rank(flows: &BTreeMap<String, AddressFlow>) -> CounterpartyRanking {
    CounterpartyRanking {
        top_senders: top_by(flows, |f| f.total_sent_sat),
        top_receivers: top_by(flows, |f| f.total_received_sat),
    }
}
