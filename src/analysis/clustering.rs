//! Address clustering by co-occurrence.
//!
//! Counts how many transactions each counterparty shares with the target
//! and grades the relationship into a likelihood band.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::types::*;

/// Persisted form of a clustering run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusteringAnalysis {
    pub related_addresses: Vec<String>,
    pub connection_details: BTreeMap<String, u32>,
    pub cluster_analysis: Vec<ClusterEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEntry {
    pub address: String,
    pub connection_count: u32,
    pub likelihood: Likelihood,
}

/// Build the co-occurrence graph for `target`.
///
/// Each transaction contributes at most one co-occurrence per address, no
/// matter how many legs that address has in it.
pub fn cluster(target: &str, transactions: &[CanonicalTransaction]) -> ConnectionGraph {
    let mut counts: HashMap<&str, u32> = HashMap::new();

    for tx in transactions {
        let addresses = tx.addresses();
        if !addresses.contains(target) {
            continue;
        }
        for address in addresses {
            if address != target {
                *counts.entry(address).or_insert(0) += 1;
            }
        }
    }

    let mut edges: Vec<ConnectionEdge> = counts
        .into_iter()
        .map(|(address, connection_count)| ConnectionEdge {
            address: address.to_string(),
            connection_count,
            likelihood: Likelihood::from_count(connection_count),
        })
        .collect();

    // Descending count, then address for a stable presentation order
    edges.sort_by(|a, b| {
        b.connection_count
            .cmp(&a.connection_count)
            .then_with(|| a.address.cmp(&b.address))
    });

    log::debug!("Clustered {} counterparties for {}", edges.len(), target);

    ConnectionGraph {
        target: target.to_string(),
        edges,
    }
}

impl From<&ConnectionGraph> for ClusteringAnalysis {
    fn from(graph: &ConnectionGraph) -> Self {
        ClusteringAnalysis {
            related_addresses: graph.edges.iter().map(|e| e.address.clone()).collect(),
            connection_details: graph
                .edges
                .iter()
                .map(|e| (e.address.clone(), e.connection_count))
                .collect(),
            cluster_analysis: graph
                .edges
                .iter()
                .map(|e| ClusterEntry {
                    address: e.address.clone(),
                    connection_count: e.connection_count,
                    likelihood: e.likelihood,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(ins: &[&str], outs: &[&str]) -> CanonicalTransaction {
        CanonicalTransaction {
            id: format!("{:?}{:?}", ins, outs),
            confirmed: true,
            block_time: Some(0),
            fee: 0,
            inputs: ins
                .iter()
                .map(|a| TxInput { source_address: Some(a.to_string()), value: 1 })
                .collect(),
            outputs: outs
                .iter()
                .map(|a| TxOutput { destination_address: Some(a.to_string()), value: 1 })
                .collect(),
        }
    }

    #[test]
    fn test_inputs_and_outputs_link_to_target_only() {
        let graph = cluster("A", &[tx(&["A", "B"], &["C"])]);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edge("B").unwrap().connection_count, 1);
        assert_eq!(graph.edge("C").unwrap().connection_count, 1);
        assert!(graph.edge("A").is_none());
        assert_eq!(graph.nodes(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_multiple_legs_count_once_per_transaction() {
        let graph = cluster("A", &[tx(&["A", "B", "B"], &["B", "A"])]);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].connection_count, 1);
    }

    #[test]
    fn test_transactions_without_target_are_ignored() {
        let graph = cluster("A", &[tx(&["X"], &["Y"]), tx(&["A"], &["Y"])]);
        assert!(graph.edge("X").is_none());
        assert_eq!(graph.edge("Y").unwrap().connection_count, 1);
    }

    #[test]
    fn test_edge_order_and_likelihood() {
        let mut txs = Vec::new();
        for _ in 0..6 {
            txs.push(tx(&["A"], &["H"]));
        }
        for _ in 0..3 {
            txs.push(tx(&["A"], &["M", "N"]));
        }
        txs.push(tx(&["L"], &["A"]));

        let graph = cluster("A", &txs);
        let order: Vec<&str> = graph.edges.iter().map(|e| e.address.as_str()).collect();
        assert_eq!(order, vec!["H", "M", "N", "L"]);
        assert_eq!(graph.edges[0].likelihood, Likelihood::High);
        assert_eq!(graph.edges[1].likelihood, Likelihood::Medium);
        assert_eq!(graph.edges[3].likelihood, Likelihood::Low);
        assert!(graph.edges.iter().all(|e| e.connection_count >= 1));
    }

    #[test]
    fn test_clustering_analysis_projection() {
        let graph = cluster("A", &[tx(&["A"], &["C", "B"])]);
        let analysis = ClusteringAnalysis::from(&graph);
        assert_eq!(analysis.related_addresses, vec!["B", "C"]);
        assert_eq!(analysis.connection_details.get("B"), Some(&1));
        assert_eq!(analysis.cluster_analysis.len(), 2);
    }
}
