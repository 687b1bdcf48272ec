//! Ledger data access.
//!
//! [`LedgerSource`] abstracts the block-explorer API. [`JsonDirSource`]
//! serves the same resources from an on-disk mirror laid out like the
//! Esplora URL space:
//!
//! ```text
//! <dir>/address/<addr>.json        address info (chain_stats)
//! <dir>/address/<addr>/txs.json    transaction history
//! <dir>/tx/<txid>.json             full transaction detail
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use color_eyre::eyre::{bail, Context, Result};
use rayon::prelude::*;
use regex::Regex;
use serde_json::Value;

use super::normalizer::{is_shallow, unwrap_container};
use crate::utils::address::is_plausible_address;

/// Match: a transaction id, 32 bytes in hex
static TXID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{64}$").expect("Invalid txid regex"));

/// True when `txid` is 64 hex characters
pub fn is_valid_txid(txid: &str) -> bool {
    TXID.is_match(txid)
}

/// Supplies raw block-explorer records.
///
/// Absent data is `Ok(None)` or an empty history; `Err` is reserved for a
/// source that exists but cannot be read.
pub trait LedgerSource: Sync {
    fn address_info(&self, address: &str) -> Result<Option<Value>>;

    fn address_transactions(&self, address: &str) -> Result<Vec<Value>>;

    fn transaction_detail(&self, txid: &str) -> Result<Option<Value>>;
}

/// Ledger source backed by a directory of JSON files
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    root: PathBuf,
}

impl JsonDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_json(path: &Path) -> Result<Option<Value>> {
        if !path.exists() {
            log::debug!("No data at {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON in {}", path.display()))?;
        Ok(Some(value))
    }

    /// The `address/` directory, once `address` is known to be a single path component
    fn address_dir(&self, address: &str) -> Result<PathBuf> {
        if !is_plausible_address(address) {
            bail!("Refusing to look up implausible address {:?}", address);
        }
        Ok(self.root.join("address"))
    }
}

impl LedgerSource for JsonDirSource {
    fn address_info(&self, address: &str) -> Result<Option<Value>> {
        Self::read_json(&self.address_dir(address)?.join(format!("{}.json", address)))
    }

    fn address_transactions(&self, address: &str) -> Result<Vec<Value>> {
        let path = self.address_dir(address)?.join(address).join("txs.json");
        match Self::read_json(&path)? {
            Some(value) => {
                let entries = unwrap_container(&value)
                    .with_context(|| format!("Unrecognised history layout in {}", path.display()))?;
                Ok(entries.to_vec())
            }
            None => Ok(Vec::new()),
        }
    }

    fn transaction_detail(&self, txid: &str) -> Result<Option<Value>> {
        if !is_valid_txid(txid) {
            bail!("Invalid txid {:?} (expected 64 hex characters)", txid);
        }
        Self::read_json(&self.root.join("tx").join(format!("{}.json", txid)))
    }
}

/// Replace shallow records with their full detail.
///
/// Lookups run in parallel; the result keeps input order. A record whose
/// detail is missing or unreadable keeps its shallow form.
pub fn resolve_details(source: &dyn LedgerSource, raws: Vec<Value>) -> Vec<Value> {
    let shallow = raws.iter().filter(|raw| is_shallow(raw)).count();
    if shallow == 0 {
        return raws;
    }
    log::debug!("Resolving {} shallow records", shallow);

    raws.into_par_iter()
        .map(|raw| {
            if !is_shallow(&raw) {
                return raw;
            }
            let Some(txid) = raw.get("txid").and_then(|v| v.as_str()) else {
                return raw;
            };
            match source.transaction_detail(txid) {
                Ok(Some(detail)) => detail,
                Ok(None) => raw,
                Err(e) => {
                    log::warn!("Failed to resolve detail for {}: {:#}", txid, e);
                    raw
                }
            }
        })
        .collect()
}
