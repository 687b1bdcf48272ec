//! Bubble and flow-network projection of aggregated address flows.
//!
//! Produces node sizes, color buckets and edge weights for a renderer.
//! Placement is delegated to a [`LayoutOracle`]; nothing here computes
//! coordinates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::*;

/// Smallest node size
pub const MIN_SIZE: f64 = 15.0;
/// Size per transaction on the bubble chart
pub const BUBBLE_TX_FACTOR: f64 = 3.0;
/// Size per transaction on the flow network
pub const NETWORK_TX_FACTOR: f64 = 4.0;
/// Upper bound on the flow multiplier
pub const FLOW_CAP: f64 = 2.0;
/// BTC of total flow per unit of multiplier
pub const FLOW_SCALE: f64 = 1000.0;

/// `max(MIN_SIZE, count × factor) × (1 + min(FLOW_CAP, total_flow / FLOW_SCALE))`
pub fn node_size(transaction_count: u64, total_flow: f64, per_tx_factor: f64) -> f64 {
    let base_size = MIN_SIZE.max(transaction_count as f64 * per_tx_factor);
    let flow_factor = FLOW_CAP.min(total_flow / FLOW_SCALE);
    base_size * (1.0 + flow_factor)
}

/// Main address is Primary; otherwise positive net flow is Positive
pub fn color_bucket(address: &str, main_address: &str, net_flow: f64) -> ColorBucket {
    if address == main_address {
        ColorBucket::Primary
    } else if net_flow > 0.0 {
        ColorBucket::Positive
    } else {
        ColorBucket::Negative
    }
}

/// "abcdefgh...stuvwxyz" for addresses longer than 16 characters
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() > 16 {
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 8..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        address.to_string()
    }
}

/// Main address first, then the rest in address order
fn ordered<'a>(
    flows: &'a BTreeMap<String, AddressFlow>,
    main_address: &str,
) -> impl Iterator<Item = (&'a String, &'a AddressFlow)> {
    let main = flows.get_key_value(main_address);
    let main_key = main.map(|(k, _)| k.as_str());
    main.into_iter()
        .chain(flows.iter().filter(move |(k, _)| Some(k.as_str()) != main_key))
}

/// One bubble per address flow
pub fn project(flows: &BTreeMap<String, AddressFlow>, main_address: &str) -> Vec<BubbleNode> {
    ordered(flows, main_address)
        .map(|(address, flow)| {
            let total_flow = flow.total_flow();
            let net_flow = flow.net_flow();
            BubbleNode {
                address: address.clone(),
                total_flow,
                net_flow,
                transaction_count: flow.transaction_count,
                size: node_size(flow.transaction_count, total_flow, BUBBLE_TX_FACTOR),
                color_bucket: color_bucket(address, main_address, net_flow),
                label: format!(
                    "{} | Net: {:.6} BTC | Total: {:.6} BTC",
                    short_address(address),
                    net_flow,
                    total_flow
                ),
            }
        })
        .collect()
}

/// A node of the flow network handed to the layout oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    pub total_received: f64,
    pub total_sent: f64,
    pub transaction_count: u64,
    pub size: f64,
    pub color_bucket: ColorBucket,
    pub label: String,
}

/// Directed edge from the main address, weighted by the peer's receipts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNetwork {
    pub main_address: String,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

/// Coordinates assigned by a layout oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

/// Maps a flow network to 2-D coordinates
pub trait LayoutOracle {
    fn place(&self, network: &FlowNetwork) -> Vec<NodePosition>;
}

/// Main address at the origin, every other node evenly spaced on a unit circle
#[derive(Debug, Clone, Copy, Default)]
pub struct CircularLayout;

impl LayoutOracle for CircularLayout {
    fn place(&self, network: &FlowNetwork) -> Vec<NodePosition> {
        let ring = network
            .nodes
            .iter()
            .filter(|n| n.id != network.main_address)
            .count()
            .max(1) as f64;

        let mut slot = 0usize;
        network
            .nodes
            .iter()
            .map(|node| {
                if node.id == network.main_address {
                    return NodePosition { id: node.id.clone(), x: 0.0, y: 0.0 };
                }
                let angle = std::f64::consts::TAU * slot as f64 / ring;
                slot += 1;
                NodePosition {
                    id: node.id.clone(),
                    x: angle.cos(),
                    y: angle.sin(),
                }
            })
            .collect()
    }
}

/// Node/edge weights for the flow network
pub fn project_graph(flows: &BTreeMap<String, AddressFlow>, main_address: &str) -> FlowNetwork {
    let mut nodes = Vec::with_capacity(flows.len());
    let mut edges = Vec::new();

    for (address, flow) in ordered(flows, main_address) {
        let total_flow = flow.total_flow();
        let net_flow = flow.net_flow();
        nodes.push(FlowNode {
            id: address.clone(),
            total_received: flow.total_received(),
            total_sent: flow.total_sent(),
            transaction_count: flow.transaction_count,
            size: node_size(flow.transaction_count, total_flow, NETWORK_TX_FACTOR),
            color_bucket: color_bucket(address, main_address, net_flow),
            label: short_address(address),
        });

        if address != main_address {
            edges.push(FlowEdge {
                source: main_address.to_string(),
                target: address.clone(),
                weight: flow.total_received(),
            });
        }
    }

    FlowNetwork {
        main_address: main_address.to_string(),
        nodes,
        edges,
    }
}
