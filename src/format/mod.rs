//! Display helpers for sats, fiat and BTC amounts.

use crate::ledger::Sats;

pub const SATS_PER_BTC: u64 = 100_000_000;

/// Group the decimal digits of `digits` in threes, separated by commas.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Absolute value of `value` with thousands separators.
pub fn pretty_sats(value: i64) -> String {
    group_thousands(&value.unsigned_abs().to_string())
}

/// `+500,000`, `-500,000`, or a bare `0`.
pub fn format_with_sign(value: i64) -> String {
    match value.signum() {
        1 => format!("+{}", pretty_sats(value)),
        -1 => format!("-{}", pretty_sats(value)),
        _ => "0".to_string(),
    }
}

pub fn format_sats(value: Sats) -> String {
    format!("{} sats", group_thousands(&value.to_string()))
}

/// Fiat amount in cents as `$1,234.56`. Negative amounts put the sign in
/// front of the currency symbol (`-$624.64`, not `$-624.64`).
pub fn format_usd(cents: i64) -> String {
    let abs = cents.unsigned_abs();
    let sign = if cents < 0 { "-" } else { "" };
    format!(
        "{sign}${}.{:02}",
        group_thousands(&(abs / 100).to_string()),
        abs % 100
    )
}

/// BTC with eight decimals, e.g. `0.01186700`.
pub fn format_btc(sats: Sats) -> String {
    format!(
        "{}.{:08}",
        group_thousands(&(sats / SATS_PER_BTC).to_string()),
        sats % SATS_PER_BTC
    )
}

/// Two decimals with thousands separators, e.g. `1,234.50%`.
pub fn format_percent(pct: f64) -> String {
    if !pct.is_finite() {
        return format!("{pct}%");
    }
    let fixed = format!("{:.2}", pct.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if pct < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{}.{frac}%", group_thousands(whole))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn signed_formatting() {
        assert_eq!(format_with_sign(500_000), "+500,000");
        assert_eq!(format_with_sign(-500_000), "-500,000");
        assert_eq!(format_with_sign(0), "0");
        assert_eq!(format_with_sign(999), "+999");
        assert_eq!(format_with_sign(-1_000), "-1,000");
        assert_eq!(
            format_with_sign(i64::MIN),
            "-9,223,372,036,854,775,808"
        );
    }

    #[test]
    fn grouping() {
        assert_eq!(pretty_sats(0), "0");
        assert_eq!(pretty_sats(12), "12");
        assert_eq!(pretty_sats(123_456), "123,456");
        assert_eq!(pretty_sats(-1_234_567), "1,234,567");
        assert_eq!(format_sats(1_500_000), "1,500,000 sats");
    }

    #[test]
    fn fiat_and_btc() {
        assert_eq!(format_usd(122_230), "$1,222.30");
        assert_eq!(format_usd(-5), "-$0.05");
        assert_eq!(format_btc(1_186_700), "0.01186700");
        assert_eq!(format_btc(250_000_000), "2.50000000");
        assert_eq!(format_percent(12.3456), "12.35%");
    }

    #[test]
    fn percent_groups_thousands_and_keeps_sign() {
        assert_eq!(format_percent(1_234.5), "1,234.50%");
        assert_eq!(format_percent(-12.3456), "-12.35%");
        assert_eq!(format_percent(-1_000_000.0), "-1,000,000.00%");
        assert_eq!(format_percent(-0.001), "0.00%");
        assert_eq!(format_percent(0.0), "0.00%");
        assert_eq!(format_usd(-62_464), "-$624.64");
    }

    proptest! {
        #[test]
        fn grouping_strips_back_to_the_number(value in any::<i64>()) {
            let formatted = format_with_sign(value);
            let digits: String = formatted.chars().filter(|c| c.is_ascii_digit()).collect();
            prop_assert_eq!(digits, value.unsigned_abs().to_string());
            prop_assert_eq!(formatted.starts_with('+'), value > 0);
            prop_assert_eq!(formatted.starts_with('-'), value < 0);
        }
    }
}
