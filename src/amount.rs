//! Decimal ether amounts and their wei representation.

use alloy_primitives::U256;

pub const ETHER_DECIMALS: usize = 18;

/// Base units per ether (10^18 wei)
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount {0:?} is not a decimal number")]
    Malformed(String),
    #[error("amount {0:?} has more than 18 decimal places")]
    TooPrecise(String),
    #[error("amount {0:?} is too large")]
    Overflow(String),
}

/// Parses a plain decimal ether string ("1.5", "0.01", ".5") into wei.
pub fn parse_ether(value: &str) -> Result<U256, AmountError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Malformed(trimmed.to_string()));
    }
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) {
        return Err(AmountError::Malformed(trimmed.to_string()));
    }
    if frac.len() > ETHER_DECIMALS {
        return Err(AmountError::TooPrecise(trimmed.to_string()));
    }

    let overflow = || AmountError::Overflow(trimmed.to_string());
    let whole_units = if whole.is_empty() {
        0u128
    } else {
        whole.parse::<u128>().map_err(|_| overflow())?
    };
    let frac_units = if frac.is_empty() {
        0u128
    } else {
        let padded = format!("{frac:0<width$}", width = ETHER_DECIMALS);
        padded.parse::<u128>().map_err(|_| overflow())?
    };

    let wei = whole_units
        .checked_mul(WEI_PER_ETHER)
        .and_then(|units| units.checked_add(frac_units))
        .ok_or_else(overflow)?;
    Ok(U256::from(wei))
}

/// Format a wei amount to a human-readable string
pub fn format_ether(wei: U256) -> String {
    let divisor = U256::from(WEI_PER_ETHER);
    let whole = wei / divisor;
    let frac = u128::try_from(wei % divisor).unwrap_or_default();
    if frac == 0 {
        format!("{} ETH", whole)
    } else {
        // Trim trailing zeros
        let frac_str = format!("{:018}", frac);
        let trimmed = frac_str.trim_end_matches('0');
        format!("{}.{} ETH", whole, trimmed)
    }
}
