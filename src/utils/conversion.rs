//! Type conversion and formatting utilities.
//!
//! Functions for converting raw on-chain amounts (decimal strings) to f64
//! with proper decimal handling and precision preservation.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;
use std::str::FromStr;

// ============================================
// Address Normalization
// ============================================

/// Lowercase an address for consistent comparisons and storage.
pub fn normalize_address(address: &str) -> String {
    address.to_lowercase()
}

// ============================================
// String to f64 Conversions
// ============================================

/// Parse a string representation of a large number to f64 with decimal adjustment.
///
/// Uses BigDecimal for precise conversion. This is useful for parsing raw
/// token amounts (wei-scale integers) delivered by the scanner as strings.
///
/// # Arguments
/// * `value_str` - The string representation of the number
/// * `decimals` - The number of decimal places to adjust by
///
/// # Returns
/// * `Some(f64)` if parsing succeeds and value is valid, `None` otherwise
pub fn str_to_f64_with_decimals(value_str: &str, decimals: u8) -> Option<f64> {
    let big_value = BigDecimal::from_str(value_str).ok()?;

    let adjusted = big_value / big_pow10(decimals);

    let result = adjusted.to_f64()?;

    if result.is_finite() && result >= 0.0 {
        Some(result)
    } else {
        None
    }
}

// ============================================
// Internal Helpers
// ============================================

static POW10_CACHE: Lazy<[BigDecimal; 25]> =
    Lazy::new(|| std::array::from_fn(|i| BigDecimal::from(BigInt::from(10u32).pow(i as u32))));

/// Compute 10^exp as BigDecimal.
pub(crate) fn big_pow10(exp: u8) -> BigDecimal {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize].clone()
    } else {
        BigDecimal::from(BigInt::from(10u32).pow(exp as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_to_f64_adjusts_decimals() {
        assert_eq!(
            str_to_f64_with_decimals("1000000000000000000", 18),
            Some(1.0)
        );
        assert_eq!(str_to_f64_with_decimals("1500000", 6), Some(1.5));
        assert_eq!(str_to_f64_with_decimals("42", 0), Some(42.0));
    }

    #[test]
    fn test_str_to_f64_preserves_precision_above_2_53() {
        // BigDecimal keeps the division exact before the final rounding.
        let value = "9007199254740993000000000000000000";
        let parsed = str_to_f64_with_decimals(value, 18).unwrap();
        assert!((parsed - 9.007199254740993e15).abs() < 1.0);
    }

    #[test]
    fn test_str_to_f64_rejects_garbage() {
        assert_eq!(str_to_f64_with_decimals("not a number", 18), None);
        assert_eq!(str_to_f64_with_decimals("-5", 0), None);
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("0xA0B86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
        );
    }
}
