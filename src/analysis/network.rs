//! Persisted network graph built from a clustering run.

use serde::{Deserialize, Serialize};

use super::types::*;

/// Role of a node in the persisted graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Main,
    Related,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: String,
    #[serde(rename = "type")]
    pub role: NodeRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_count: Option<u32>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub source: String,
    pub target: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphMetrics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub related_addresses_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkGraph {
    pub main_address: String,
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
    pub graph_metrics: GraphMetrics,
}

/// First 16 characters of an address
fn prefix16(address: &str) -> String {
    address.chars().take(16).collect()
}

/// Build the persisted graph: the target plus its strongest `node_limit` counterparties
pub fn build_network_graph(
    graph: &ConnectionGraph,
    transaction_count: usize,
    node_limit: usize,
) -> NetworkGraph {
    let main = &graph.target;
    let mut nodes = vec![NetworkNode {
        id: main.clone(),
        role: NodeRole::Main,
        transaction_count: Some(transaction_count),
        connection_count: None,
        label: format!("Main: {}...", prefix16(main)),
    }];
    let mut edges = Vec::new();

    let related: Vec<&ConnectionEdge> = graph.edges.iter().take(node_limit).collect();
    for edge in &related {
        nodes.push(NetworkNode {
            id: edge.address.clone(),
            role: NodeRole::Related,
            transaction_count: None,
            connection_count: Some(edge.connection_count),
            label: format!("Related: {}...", prefix16(&edge.address)),
        });
        edges.push(NetworkEdge {
            source: main.clone(),
            target: edge.address.clone(),
            weight: edge.connection_count,
        });
    }

    let graph_metrics = GraphMetrics {
        total_nodes: nodes.len(),
        total_edges: edges.len(),
        related_addresses_count: related.len(),
    };

    log::debug!(
        "Network graph for {}: {} nodes, {} edges",
        main,
        graph_metrics.total_nodes,
        graph_metrics.total_edges
    );

    NetworkGraph {
        main_address: main.clone(),
        nodes,
        edges,
        graph_metrics,
    }
}
