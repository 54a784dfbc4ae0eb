//! Rendering of monetary amounts, ratios and percentages for display.
//!
//! Values are kept as `f64` everywhere else; rounding happens only here,
//! through `rust_decimal` with banker's rounding.

use rust_decimal::{Decimal, RoundingStrategy};

/// Text shown for a not-applicable value.
pub const NOT_APPLICABLE: &str = "n/a";

fn round(value: f64, dp: u32) -> Option<Decimal> {
    Decimal::try_from(value)
        .ok()
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven))
}

fn render(value: f64, dp: u32) -> String {
    match round(value, dp) {
        Some(d) => format!("{:.*}", dp as usize, d),
        None => NOT_APPLICABLE.to_string(),
    }
}

/// Two decimal places.
pub fn money(value: f64) -> String {
    render(value, 2)
}

/// Three decimal places, or `n/a`.
pub fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_APPLICABLE.to_string(), |v| render(v, 3))
}

/// One decimal place, or `n/a`.
pub fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_APPLICABLE.to_string(), |v| render(v, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_has_two_places() {
        assert_eq!(money(5000.0), "5000.00");
        assert_eq!(money(-12.5), "-12.50");
        assert_eq!(money(0.0), "0.00");
    }

    #[test]
    fn midpoints_round_to_even() {
        assert_eq!(money(0.125), "0.12");
        assert_eq!(money(0.135), "0.14");
    }

    #[test]
    fn missing_values_render_not_applicable() {
        assert_eq!(ratio(None), "n/a");
        assert_eq!(percent(None), "n/a");
        assert_eq!(money(f64::NAN), "n/a");
    }

    #[test]
    fn ratios_and_percentages() {
        assert_eq!(ratio(Some(0.625)), "0.625");
        assert_eq!(ratio(Some(1.0)), "1.000");
        assert_eq!(percent(Some(40.0)), "40.0");
    }
}
