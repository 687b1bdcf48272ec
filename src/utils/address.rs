//! Address shape checks.
//!
//! This is a plausibility filter for configuration and CLI input, not a
//! checksum validation: it accepts anything with the length and alphabet of
//! a base58 or bech32 address.

use std::sync::LazyLock;

use regex::Regex;

/// Shortest accepted address
pub const MIN_ADDRESS_LEN: usize = 25;
/// Longest accepted address
pub const MAX_ADDRESS_LEN: usize = 62;

struct AddressPatterns {
    /// Match: base58 alphabet (no 0, O, I, l)
    base58: Regex,
    /// Match: bech32 human-readable part, separator, data part
    bech32: Regex,
}

static PATTERNS: LazyLock<AddressPatterns> = LazyLock::new(|| AddressPatterns {
    base58: Regex::new(r"^[1-9A-HJ-NP-Za-km-z]+$").expect("Invalid base58 regex"),
    bech32: Regex::new(r"^(?:[a-z]{2,4}1[02-9ac-hj-np-z]+|[A-Z]{2,4}1[02-9AC-HJ-NP-Z]+)$")
        .expect("Invalid bech32 regex"),
});

/// True when `address` has the length and alphabet of a base58 or bech32 address
///
/// # Examples
/// ```
/// use txflow::utils::address::is_plausible_address;
///
/// assert!(is_plausible_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));
/// assert!(!is_plausible_address("not-an-address"));
/// ```
pub fn is_plausible_address(address: &str) -> bool {
    let len = address.chars().count();
    if !(MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&len) {
        return false;
    }
    PATTERNS.base58.is_match(address) || PATTERNS.bech32.is_match(address)
}

/// Check every address, returning the first implausible one as an error message
pub fn validate_addresses<'a>(addresses: impl IntoIterator<Item = &'a String>) -> Result<(), String> {
    for address in addresses {
        if !is_plausible_address(address) {
            return Err(format!(
                "'{}' does not look like an address (expected {}-{} base58 or bech32 characters)",
                address, MIN_ADDRESS_LEN, MAX_ADDRESS_LEN
            ));
        }
    }
    Ok(())
}
