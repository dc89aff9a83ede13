//! Price validation constants and helper functions.
//!
//! These bounds are designed to catch calculation errors while allowing
//! legitimate extreme values. Price observations arrive from multiple
//! untrusted sources; a figure outside these bounds is almost certainly a
//! decimal or conversion error on the source side, not a real market price.

// ============================================
// Price Validation Constants
// ============================================

/// Maximum reasonable token price in USD.
/// No legitimate token costs more than $1 million per unit.
/// Even wrapped BTC at 10x current ATH would be ~$700k.
pub const MAX_TOKEN_USD_PRICE: f64 = 1e6;

/// Maximum reasonable USD value for a single take.
/// $1 billion is far beyond any observed auction take.
pub const MAX_TAKE_USD_VALUE: f64 = 1e9;

// ============================================
// Price Validation Helpers
// ============================================

/// Validate a USD price is within reasonable bounds.
/// Returns Some(price) if valid, None if invalid.
#[inline]
pub fn validate_usd_price(price: f64) -> Option<f64> {
    if price > 0.0 && price.is_finite() && price <= MAX_TOKEN_USD_PRICE {
        Some(price)
    } else {
        None
    }
}

/// Validate a USD amount (take-level volume) is within reasonable bounds.
/// Returns Some(amount) if valid, None if invalid.
#[inline]
pub fn validate_usd_amount(amount: f64) -> Option<f64> {
    if amount >= 0.0 && amount.is_finite() && amount <= MAX_TAKE_USD_VALUE {
        Some(amount)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_usd_price_bounds() {
        assert_eq!(validate_usd_price(1.25), Some(1.25));
        assert_eq!(validate_usd_price(0.0), None);
        assert_eq!(validate_usd_price(-3.0), None);
        assert_eq!(validate_usd_price(f64::NAN), None);
        assert_eq!(validate_usd_price(1e7), None);
    }

    #[test]
    fn test_validate_usd_amount_allows_zero() {
        assert_eq!(validate_usd_amount(0.0), Some(0.0));
        assert_eq!(validate_usd_amount(1e10), None);
    }
}
