//! Integer money helpers.
//!
//! Ledger quantities are integers in minor units. Decimal arithmetic only
//! happens at two boundaries: parsing a submitted grand total into cents and
//! applying a fractional earn multiplier, both through `BigDecimal` so no
//! float ever touches ledger math.

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};

/// Parse a JSON grand-total value into cents.
///
/// Accepts a number or a decimal string with at most two fraction digits.
/// Returns `None` for negative totals and for values that do not fit the
/// two-decimal grid (sub-cent precision is an input error, not a rounding
/// opportunity).
pub fn parse_grand_total_cents(raw: &serde_json::Value) -> Option<i64> {
    let decimal = match raw {
        serde_json::Value::String(text) => text.trim().parse::<BigDecimal>().ok()?,
        serde_json::Value::Number(num) => num.to_string().parse::<BigDecimal>().ok()?,
        _ => return None,
    };
    if decimal < BigDecimal::from(0) {
        return None;
    }
    let cents = &decimal * BigDecimal::from(100);
    if !cents.is_integer() {
        return None;
    }
    cents.with_scale(0).to_i64()
}

/// Format cents as a two-decimal string (`4250` → `"42.50"`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Multiply cents by a decimal multiplier and round half away from zero,
/// yielding whole points (`4250 × 1.5 / 100` → `64`).
pub fn points_for_total(grand_total_cents: i64, multiplier: &BigDecimal) -> i64 {
    let cents = match BigDecimal::from_i64(grand_total_cents) {
        Some(value) => value,
        None => return 0,
    };
    let points = cents * multiplier / BigDecimal::from(100);
    round_half_away_from_zero(&points)
}

fn round_half_away_from_zero(value: &BigDecimal) -> i64 {
    let doubled = value * BigDecimal::from(2);
    let negative = *value < BigDecimal::from(0);
    // floor/ceil of 2x splits exactly on the .5 boundary in the right
    // direction for each sign.
    let rounded = if negative {
        (doubled - BigDecimal::from(1)).with_scale_round(0, bigdecimal::RoundingMode::Ceiling)
    } else {
        (doubled + BigDecimal::from(1)).with_scale_round(0, bigdecimal::RoundingMode::Floor)
    };
    (rounded / BigDecimal::from(2))
        .with_scale_round(0, bigdecimal::RoundingMode::Down)
        .to_i64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::str::FromStr;

    #[rstest]
    #[case(json!("42.50"), Some(4250))]
    #[case(json!(42.5), Some(4250))]
    #[case(json!(0), Some(0))]
    #[case(json!("19"), Some(1900))]
    #[case(json!("0.01"), Some(1))]
    #[case(json!("-1.00"), None)]
    #[case(json!("1.005"), None)]
    #[case(json!(true), None)]
    fn grand_total_parsing(#[case] raw: serde_json::Value, #[case] want: Option<i64>) {
        assert_eq!(parse_grand_total_cents(&raw), want);
    }

    #[rstest]
    #[case(4250, "42.50")]
    #[case(5, "0.05")]
    #[case(-130, "-1.30")]
    fn cents_formatting(#[case] cents: i64, #[case] want: &str) {
        assert_eq!(format_cents(cents), want);
    }

    #[rstest]
    #[case(4250, "1", 43)]
    #[case(4250, "1.5", 64)]
    #[case(0, "1", 0)]
    #[case(1000, "2", 20)]
    #[case(50, "1", 1)] // 0.5 rounds away from zero
    #[case(149, "1", 1)]
    #[case(150, "1", 2)]
    fn point_rounding_is_half_away_from_zero(
        #[case] cents: i64,
        #[case] multiplier: &str,
        #[case] want: i64,
    ) {
        let multiplier = BigDecimal::from_str(multiplier).expect("valid multiplier");
        assert_eq!(points_for_total(cents, &multiplier), want);
    }
}
