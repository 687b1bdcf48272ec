//! Error taxonomy for a single address analysis run.
//!
//! A leg without a decodable address is not an error; it is excluded from
//! address-level aggregation and only counted.

/// Errors surfaced by the analysis core
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// Unrecognised container shape, missing fields, or an unparseable value
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// No usable records remained after normalization
    #[error("No usable transactions for address {address}")]
    EmptyResult { address: String },

    /// The ledger source failed while serving this address
    #[error("Ledger source failed for {address}: {message}")]
    Source { address: String, message: String },
}

impl AnalysisError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        AnalysisError::MalformedInput(reason.into())
    }

    /// True for the "no data" outcome callers render as an empty state
    pub fn is_empty_result(&self) -> bool {
        matches!(self, AnalysisError::EmptyResult { .. })
    }
}
