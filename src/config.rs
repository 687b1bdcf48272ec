use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::address::validate_addresses;

/// Top-level configuration mirroring the YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.general.output_dir.as_os_str().is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "output_dir cannot be empty".to_string(),
            ));
        }

        if self.source.data_dir.as_os_str().is_empty() {
            return Err(ValidationError::InvalidSource(
                "data_dir cannot be empty".to_string(),
            ));
        }

        let limits = [
            ("max_transactions", self.analysis.max_transactions),
            ("recent_limit", self.analysis.recent_limit),
            ("network_node_limit", self.analysis.network_node_limit),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(ValidationError::InvalidAnalysis(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        validate_addresses(&self.analysis.addresses).map_err(ValidationError::InvalidAddress)?;

        Ok(())
    }
}

/// Process-wide settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Worker threads for batch runs (0 = rayon default)
    #[serde(default)]
    pub threads: usize,
}

/// Where ledger data comes from
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SourceConfig {
    /// On-disk mirror of the block-explorer API
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Provenance recorded in report metadata
    #[serde(default = "default_api_source")]
    pub api_source: String,
}

/// Analysis window and presentation limits
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Targets for batch mode
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default = "default_max_transactions")]
    pub max_transactions: usize,
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
    #[serde(default = "default_network_node_limit")]
    pub network_node_limit: usize,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid source configuration: {0}")]
    InvalidSource(String),
    #[error("Invalid analysis configuration: {0}")]
    InvalidAnalysis(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("analysis_output")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("ledger_dump")
}

fn default_api_source() -> String {
    "https://blockstream.info/api".to_string()
}

fn default_max_transactions() -> usize {
    50
}

fn default_recent_limit() -> usize {
    10
}

fn default_network_node_limit() -> usize {
    20
}

/// Default implementations
impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            output_dir: default_output_dir(),
            threads: 0,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_source: default_api_source(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            max_transactions: default_max_transactions(),
            recent_limit: default_recent_limit(),
            network_node_limit: default_network_node_limit(),
        }
    }
}
