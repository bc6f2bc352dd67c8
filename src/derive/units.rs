//! Fixed-point conversions between on-chain integer units and display strings.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Decimal exponent of gwei-scaled amounts
pub const GWEI_EXPONENT: u32 = 9;

/// Decimal exponent of wallet balances
pub const WEI_EXPONENT: u32 = 18;

/// Unit suffix carried by rendered wallet balances
pub const DILL_SUFFIX: &str = " DILL";

/// Parse a decimal or scientific-notation string
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Divide `value` by 10^`exponent`
pub fn scale_down(value: Decimal, exponent: u32) -> Option<Decimal> {
    let divisor = 10u64.checked_pow(exponent)?;
    value.checked_div(Decimal::from(divisor))
}

/// Exact `value / 10^9` for integer gwei amounts
pub fn from_gwei(value: i128) -> Decimal {
    Decimal::try_from_i128_with_scale(value, GWEI_EXPONENT).unwrap_or(Decimal::ZERO)
}

/// Round half-to-even at `dp` places and render with exactly `dp` decimals
pub fn format_fixed(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven);
    format!("{:.*}", dp as usize, rounded)
}

/// Numeric part of a rendered amount, ignoring a trailing unit suffix
pub fn numeric_portion(rendered: &str) -> Option<Decimal> {
    let trimmed = rendered.trim();
    let number = trimmed.strip_suffix(DILL_SUFFIX.trim()).unwrap_or(trimmed);
    parse_decimal(number)
}
