//! Decimal string <-> minor-unit conversion
//!
//! User-entered amounts are decimal strings; on-chain amounts are integers in
//! the token's minor units (`value * 10^decimals`). Scaling is done on the
//! digits directly so no binary floating point ever touches an amount.

use crate::error::WasmIcrcError;

/// Largest precision we accept; `10^38` is the biggest power of ten in a u128
pub const MAX_DECIMALS: u8 = 38;

/// Check that `raw` matches `^\d*\.?\d{0,decimals}$`
pub fn is_acceptable_input(raw: &str, decimals: u8) -> bool {
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (raw, ""),
    };

    int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.len() <= decimals as usize
}

/// Keystroke filter for an amount field
///
/// Returns the value the field should hold after the user typed `candidate`:
/// the candidate itself if it is representable, otherwise `current` unchanged.
pub fn accept_input<'a>(current: &'a str, candidate: &'a str, decimals: u8) -> &'a str {
    if is_acceptable_input(candidate, decimals) {
        candidate
    } else {
        current
    }
}

/// Parse a decimal string into minor units
///
/// `""` and `"."` are zero. Anything the input filter would reject, or that
/// does not fit in a u128 once scaled, is `InvalidInput`.
pub fn parse_amount(raw: &str, decimals: u8) -> Result<u128, WasmIcrcError> {
    if decimals > MAX_DECIMALS {
        return Err(WasmIcrcError::InvalidInput(format!(
            "Unsupported precision: {} decimals",
            decimals
        )));
    }
    if !is_acceptable_input(raw, decimals) {
        return Err(WasmIcrcError::InvalidInput(format!(
            "'{}' is not a decimal with at most {} fractional digits",
            raw, decimals
        )));
    }

    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw, ""));
    let overflow = || WasmIcrcError::InvalidInput(format!("Amount too large: {}", raw));

    let mut value: u128 = 0;
    let padding = decimals as usize - frac_part.len();
    let digits = int_part
        .bytes()
        .chain(frac_part.bytes())
        .chain(std::iter::repeat(b'0').take(padding));
    for digit in digits {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u128::from(digit - b'0')))
            .ok_or_else(overflow)?;
    }

    Ok(value)
}

/// Format minor units as a decimal string
///
/// Trailing fractional zeros are dropped, and so is the point when the
/// fraction is zero: `format_amount(1_000_000, 8) == "0.01"`.
pub fn format_amount(amount: u128, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }

    let digits = format!("{:0>width$}", amount, width = decimals as usize + 1);
    let (int_part, frac_part) = digits.split_at(digits.len() - decimals as usize);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_and_bare_point_are_zero() {
        assert_eq!(parse_amount("", 8).unwrap(), 0);
        assert_eq!(parse_amount(".", 8).unwrap(), 0);
        assert_eq!(parse_amount(".", 0).unwrap(), 0);
    }

    #[test]
    fn test_parse_scales_by_decimals() {
        assert_eq!(parse_amount("0.01", 8).unwrap(), 1_000_000);
        assert_eq!(parse_amount("1", 6).unwrap(), 1_000_000);
        assert_eq!(parse_amount("1.", 6).unwrap(), 1_000_000);
        assert_eq!(parse_amount(".5", 6).unwrap(), 500_000);
        assert_eq!(parse_amount("0.00000001", 8).unwrap(), 1);
        assert_eq!(parse_amount("12", 0).unwrap(), 12);
    }

    #[test]
    fn test_parse_is_exact_beyond_f64_range() {
        // 2^53 + 1 in whole tokens would lose precision through f64
        assert_eq!(
            parse_amount("9007199254740993.12345678", 8).unwrap(),
            900_719_925_474_099_312_345_678
        );
    }

    #[test]
    fn test_parse_rejects_unrepresentable() {
        assert!(parse_amount("0.000000001", 8).is_err());
        assert!(parse_amount("1.2.3", 8).is_err());
        assert!(parse_amount("-1", 8).is_err());
        assert!(parse_amount("1e5", 8).is_err());
        assert!(parse_amount(" 1", 8).is_err());
        assert!(parse_amount("1.5", 0).is_err());
    }

    #[test]
    fn test_parse_overflow_is_invalid() {
        let huge = "9".repeat(40);
        assert!(matches!(
            parse_amount(&huge, 0),
            Err(WasmIcrcError::InvalidInput(_))
        ));
        assert!(parse_amount("1", MAX_DECIMALS + 1).is_err());
    }

    #[test]
    fn test_accept_input_keeps_previous_value() {
        assert_eq!(accept_input("0.1", "0.12", 2), "0.12");
        assert_eq!(accept_input("0.12", "0.123", 2), "0.12");
        assert_eq!(accept_input("1", "1a", 8), "1");
        assert_eq!(accept_input("1", "", 8), "");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_000_000, 8), "0.01");
        assert_eq!(format_amount(0, 8), "0");
        assert_eq!(format_amount(100_000_000, 8), "1");
        assert_eq!(format_amount(123_456_789, 8), "1.23456789");
        assert_eq!(format_amount(10_001, 6), "0.010001");
        assert_eq!(format_amount(42, 0), "42");
    }

    #[test]
    fn test_round_trip_preserves_value() {
        let cases = [
            ("0.01", 8, "0.01"),
            ("1.50", 6, "1.5"),
            ("007", 6, "7"),
            (".25", 2, "0.25"),
            ("123456.000001", 6, "123456.000001"),
        ];
        for (input, decimals, expected) in cases {
            let parsed = parse_amount(input, decimals).unwrap();
            assert_eq!(format_amount(parsed, decimals), expected, "input {}", input);
        }
    }

    /// Strings matching `^\d{0,20}\.?\d{0,decimals}$`, with their precision
    fn decimal_input() -> impl Strategy<Value = (String, u8)> {
        (0u8..=18).prop_flat_map(|decimals| {
            let pattern = format!("[0-9]{{0,20}}\\.?[0-9]{{0,{}}}", decimals);
            (proptest::string::string_regex(&pattern).unwrap(), Just(decimals))
        })
    }

    /// Numeric value of a decimal string as (integer digits, padded fraction)
    fn normalized(raw: &str, decimals: u8) -> (String, String) {
        let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw, ""));
        let int_part = int_part.trim_start_matches('0');
        let frac_part = format!("{:0<width$}", frac_part, width = decimals as usize);
        (int_part.to_string(), frac_part)
    }

    proptest! {
        #[test]
        fn test_round_trip_law((input, decimals) in decimal_input()) {
            prop_assume!(is_acceptable_input(&input, decimals));
            let parsed = parse_amount(&input, decimals).unwrap();
            let formatted = format_amount(parsed, decimals);

            prop_assert!(is_acceptable_input(&formatted, decimals));
            prop_assert_eq!(normalized(&formatted, decimals), normalized(&input, decimals));
            prop_assert_eq!(parse_amount(&formatted, decimals).unwrap(), parsed);
        }

        #[test]
        fn test_filter_keeps_current_on_reject(
            (current, decimals) in decimal_input(),
            candidate in "[0-9a-z.,]{0,12}",
        ) {
            let kept = accept_input(&current, &candidate, decimals);
            if is_acceptable_input(&candidate, decimals) {
                prop_assert_eq!(kept, candidate.as_str());
            } else {
                prop_assert_eq!(kept, current.as_str());
            }
        }
    }
}
