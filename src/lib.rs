//! # txflow - Transaction flow analysis for ledger addresses
//!
//! This library turns block-explorer transaction records for an address
//! into flow aggregates, counterparty clusters and chronological timelines,
//! plus the projections a renderer needs to draw them.
//!
//! ## Overview
//!
//! Raw records are normalized once into canonical transactions carrying
//! integer satoshi amounts. Every view of an address is derived from that
//! same record set, so totals agree across views.
//!
//! ## Key Features
//!
//! - **Flow Aggregation**: Received/sent totals and first/last seen per address
//! - **Clustering**: Co-occurrence counts graded into likelihood bands
//! - **Timelines**: Running balance with monthly rollups, and replay of persisted timelines
//! - **Projections**: Bubble chart and flow network sizing, with a pluggable layout
//! - **Rankings**: Top senders and receivers
//! - **Batch Mode**: Addresses analyzed in parallel with isolated results
//!
//! ## Architecture
//!
//! - `config`: Type-safe configuration structures and YAML parsing
//! - `config_loader`: Configuration file loading and CLI overrides
//! - `analysis`: Normalizer, aggregator, clusterer, timeline, projector, ranker and reports
//! - `utils`: Address shape checks
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use txflow::analysis::{self, AnalysisSettings, JsonDirSource, SystemClock};
//! use txflow::config_loader;
//!
//! let config = config_loader::load_config(Path::new("txflow.yaml"))?;
//! let source = JsonDirSource::new(&config.source.data_dir);
//! let settings = AnalysisSettings::from(&config);
//!
//! let document = analysis::analyze_address(
//!     "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
//!     &source,
//!     &settings,
//!     &SystemClock,
//! )?;
//! analysis::write_document(&document, &config.general.output_dir)?;
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   log_level: info
//!   output_dir: analysis_output
//! source:
//!   data_dir: ledger_dump
//!   api_source: "https://blockstream.info/api"
//! analysis:
//!   addresses:
//!     - "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"
//!   max_transactions: 50
//! ```
//!
//! ## Error Handling
//!
//! The analysis core reports failures as [`analysis::AnalysisError`]. File
//! and configuration handling use `color_eyre` for error reporting with
//! context.

pub mod config;
pub mod config_loader;
pub mod analysis;
pub mod utils;
