//! Record normalization for block-explorer transaction objects.
//!
//! Converts raw JSON records into [`CanonicalTransaction`] values. Timestamp
//! fields and container nestings vary across historical dumps, so both are
//! resolved through fixed, ordered candidate lists.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;

use super::error::AnalysisError;
use super::types::*;

/// Keys that may nest a sequence of entries, tried in this order
pub const CONTAINER_KEYS: [&str; 4] = ["transactions", "data", "items", "list"];

/// Top-level timestamp fields, tried in this order after `status.block_time`
pub const TIMESTAMP_FIELDS: [&str; 4] = ["block_time", "date", "formatted_date", "timestamp"];

/// Largest amount a single field may carry: the 21M BTC supply cap, in satoshis
pub const MAX_AMOUNT_SAT: u64 = 2_100_000_000_000_000;

/// Naive layouts accepted after RFC 3339 fails; interpreted as UTC
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Compiled patterns for timestamp strings
pub struct TimestampPatterns {
    /// Match: trailing "Z" or " UTC" marker
    pub utc_suffix: Regex,
    /// Match: bare epoch seconds, optionally fractional
    pub epoch: Regex,
}

impl TimestampPatterns {
    pub fn new() -> Self {
        Self {
            utc_suffix: Regex::new(r"(?i)(?:z|\s*utc)$").expect("Invalid utc_suffix regex"),
            epoch: Regex::new(r"^-?\d+(?:\.\d+)?$").expect("Invalid epoch regex"),
        }
    }
}

impl Default for TimestampPatterns {
    fn default() -> Self {
        Self::new()
    }
}

/// Global patterns instance
pub static PATTERNS: LazyLock<TimestampPatterns> = LazyLock::new(TimestampPatterns::new);

/// Records that survived normalization, plus what was skipped and why
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub transactions: Vec<CanonicalTransaction>,
    /// (index in the raw sequence, reason)
    pub skipped: Vec<(usize, AnalysisError)>,
    /// Legs whose `value` was missing and counted as zero
    pub defaulted_leg_values: usize,
}

/// Find the entry sequence inside a container.
///
/// Accepts a bare array, or an object nesting the array under one of
/// [`CONTAINER_KEYS`]. Anything else fails with `MalformedInput`.
pub fn unwrap_container(value: &Value) -> Result<&[Value], AnalysisError> {
    if let Some(entries) = value.as_array() {
        return Ok(entries);
    }

    if let Some(obj) = value.as_object() {
        for key in CONTAINER_KEYS {
            if let Some(entries) = obj.get(key).and_then(|v| v.as_array()) {
                return Ok(entries);
            }
        }
    }

    Err(AnalysisError::malformed(format!(
        "no entry sequence found (expected an array or one of {:?})",
        CONTAINER_KEYS
    )))
}

/// Parse epoch seconds (integer or fractional). Zero and negative values
/// are placeholders for "no time", not dates before 1970.
fn parse_epoch(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// Parse a timestamp string.
///
/// Handles epoch seconds, RFC 3339 with a `Z`/`UTC` suffix normalized to
/// `+00:00`, and naive ISO-like layouts treated as UTC.
pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if PATTERNS.epoch.is_match(s) {
        return s.parse::<f64>().ok().and_then(parse_epoch);
    }

    let normalized = PATTERNS.utc_suffix.replace(s, "+00:00");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }
    // RFC 3339 requires the "T"; accept a space separator with an offset too
    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parse a timestamp from a JSON number or string
pub fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                if secs <= 0 {
                    return None;
                }
                DateTime::from_timestamp(secs, 0)
            } else {
                n.as_f64().and_then(parse_epoch)
            }
        }
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// Resolve an entry's timestamp from the first candidate field that parses.
///
/// `status.block_time` is tried first, then [`TIMESTAMP_FIELDS`] in order.
pub fn resolve_timestamp(entry: &Value) -> Option<DateTime<Utc>> {
    let nested = entry.get("status").and_then(|s| s.get("block_time"));
    nested
        .into_iter()
        .chain(TIMESTAMP_FIELDS.iter().filter_map(|field| entry.get(*field)))
        .find_map(parse_timestamp_value)
}

/// A record is shallow when any input lacks its `prevout` object
pub fn is_shallow(raw: &Value) -> bool {
    raw.get("vin")
        .and_then(|v| v.as_array())
        .map(|vin| {
            vin.iter()
                .any(|input| input.get("prevout").is_none() && !is_coinbase(input))
        })
        .unwrap_or(false)
}

fn is_coinbase(input: &Value) -> bool {
    input.get("is_coinbase").and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Read a satoshi amount; missing is None, wrong type or out of range is an error
fn read_amount(obj: &Value, field: &'static str) -> Result<Option<u64>, AnalysisError> {
    let v = match obj.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let amount = v.as_u64().ok_or_else(|| {
        AnalysisError::malformed(format!("field `{}` is not a non-negative integer: {}", field, v))
    })?;
    if amount > MAX_AMOUNT_SAT {
        return Err(AnalysisError::malformed(format!(
            "field `{}` exceeds the 21M BTC supply: {}",
            field, amount
        )));
    }
    Ok(Some(amount))
}

fn read_address(obj: &Value) -> Option<String> {
    obj.get("scriptpubkey_address")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Normalize one raw record, also returning the number of defaulted leg values
fn normalize_record(raw: &Value) -> Result<(CanonicalTransaction, usize), AnalysisError> {
    if !raw.is_object() {
        return Err(AnalysisError::malformed("record is not an object"));
    }

    let id = raw
        .get("txid")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AnalysisError::malformed("record has no string `txid`"))?
        .to_string();

    let confirmed = raw
        .get("status")
        .and_then(|s| s.get("confirmed"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let fee = read_amount(raw, "fee")?.unwrap_or(0);

    let mut defaulted = 0usize;

    let mut inputs = Vec::new();
    for vin in raw.get("vin").and_then(|v| v.as_array()).into_iter().flatten() {
        let input = match vin.get("prevout").filter(|p| p.is_object()) {
            Some(prevout) => {
                let value = match read_amount(prevout, "value")? {
                    Some(value) => value,
                    None => {
                        defaulted += 1;
                        0
                    }
                };
                TxInput {
                    source_address: read_address(prevout),
                    value,
                }
            }
            // Coinbase or unresolved input: no address, no value
            None => TxInput {
                source_address: None,
                value: 0,
            },
        };
        inputs.push(input);
    }

    let mut outputs = Vec::new();
    for vout in raw.get("vout").and_then(|v| v.as_array()).into_iter().flatten() {
        let value = match read_amount(vout, "value")? {
            Some(value) => value,
            None => {
                defaulted += 1;
                0
            }
        };
        outputs.push(TxOutput {
            destination_address: read_address(vout),
            value,
        });
    }

    let block_time = if confirmed {
        let ts = resolve_timestamp(raw);
        if ts.is_none() {
            log::debug!("Confirmed transaction {} has no parseable timestamp", id);
        }
        ts.map(|t| t.timestamp())
    } else {
        None
    };

    Ok((
        CanonicalTransaction {
            id,
            confirmed,
            block_time,
            fee,
            inputs,
            outputs,
        },
        defaulted,
    ))
}

/// Normalize one raw block-explorer record
pub fn normalize(raw: &Value) -> Result<CanonicalTransaction, AnalysisError> {
    normalize_record(raw).map(|(tx, _)| tx)
}

/// Normalize a sequence of raw records, skipping the malformed ones
pub fn normalize_all(raws: &[Value]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for (index, raw) in raws.iter().enumerate() {
        match normalize_record(raw) {
            Ok((tx, defaulted)) => {
                batch.defaulted_leg_values += defaulted;
                batch.transactions.push(tx);
            }
            Err(e) => {
                log::debug!("Skipping record {}: {}", index, e);
                batch.skipped.push((index, e));
            }
        }
    }

    if !batch.skipped.is_empty() {
        log::warn!("Skipped {} malformed transaction records", batch.skipped.len());
    }

    batch
}
