//! Transaction flow analysis for ledger addresses.
//!
//! This module normalizes block-explorer records and derives per-address
//! flows, co-occurrence clusters, timelines, bubble/network projections and
//! counterparty rankings from them.

pub mod types;
pub mod error;
pub mod normalizer;
pub mod source;
pub mod flow;
pub mod clustering;
pub mod network;
pub mod timeline;
pub mod projector;
pub mod ranker;
pub mod summary;
pub mod pipeline;
pub mod report;

pub use types::*;
pub use error::AnalysisError;
pub use normalizer::{normalize, normalize_all, NormalizedBatch};
pub use source::{JsonDirSource, LedgerSource};
pub use flow::{aggregate, Clock, FixedClock, SystemClock};
pub use clustering::cluster;
pub use timeline::{build_timeline, replay_timeline};
pub use projector::{project, project_graph, CircularLayout, LayoutOracle};
pub use ranker::rank;
pub use pipeline::{analyze_address, analyze_batch, AnalysisDocument, AnalysisSettings};
pub use report::{generate_text_report, load_document, write_document};
