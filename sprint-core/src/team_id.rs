//! Decimal string arithmetic for team ids.
//!
//! Team ids are unbounded numeric strings ("1", "2", ..., "10", ...). Lexical
//! ordering puts "9" after "10", so every comparison here is numeric.

use std::cmp::Ordering;

use crate::ValidationError;

/// The id issued when no team id exists yet.
pub const FIRST_TEAM_ID: &str = "1";

/// Non-empty and ASCII digits only.
pub fn is_decimal(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn strip_leading_zeros(value: &str) -> &str {
    let trimmed = value.trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

/// Numeric comparison of two decimal strings: longer is larger, equal
/// lengths compare lexically.
pub fn cmp_decimal(a: &str, b: &str) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Largest decimal team id in `ids`. Non-decimal values are ignored.
pub fn max_team_id<'a, I>(ids: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    ids.into_iter()
        .filter(|id| is_decimal(id))
        .max_by(|a, b| cmp_decimal(a, b))
}

/// `value + 1` in base ten.
pub fn increment_decimal(value: &str) -> Result<String, ValidationError> {
    if !is_decimal(value) {
        return Err(ValidationError::InvalidValue {
            field: "team_id".to_string(),
            reason: format!("'{}' is not a decimal number", value),
        });
    }

    let mut digits: Vec<u8> = strip_leading_zeros(value).bytes().collect();
    let mut carry = true;
    for digit in digits.iter_mut().rev() {
        if !carry {
            break;
        }
        if *digit == b'9' {
            *digit = b'0';
        } else {
            *digit += 1;
            carry = false;
        }
    }
    if carry {
        digits.insert(0, b'1');
    }

    // Only ASCII digits were pushed.
    Ok(digits.into_iter().map(char::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_increment_carries() {
        assert_eq!(increment_decimal("0").unwrap(), "1");
        assert_eq!(increment_decimal("9").unwrap(), "10");
        assert_eq!(increment_decimal("1999").unwrap(), "2000");
        assert_eq!(increment_decimal("0041").unwrap(), "42");
    }

    #[test]
    fn test_increment_rejects_non_decimal() {
        assert!(increment_decimal("").is_err());
        assert!(increment_decimal("12a").is_err());
        assert!(increment_decimal("-1").is_err());
    }

    #[test]
    fn test_max_is_numeric_not_lexical() {
        let ids = ["9", "10", "2", "abc", "100"];
        assert_eq!(max_team_id(ids.iter().copied()), Some("100"));
        assert_eq!(max_team_id(["9", "10"].iter().copied()), Some("10"));
        assert_eq!(max_team_id(std::iter::empty()), None);
    }

    #[test]
    fn test_increment_beyond_u64() {
        let big = "18446744073709551615"; // u64::MAX
        assert_eq!(increment_decimal(big).unwrap(), "18446744073709551616");
    }

    proptest! {
        #[test]
        fn prop_increment_matches_integer_arithmetic(n in 0u128..u128::MAX) {
            let next = increment_decimal(&n.to_string()).unwrap();
            prop_assert_eq!(next, (n + 1).to_string());
        }

        #[test]
        fn prop_cmp_matches_integer_order(a in any::<u64>(), b in any::<u64>()) {
            prop_assert_eq!(cmp_decimal(&a.to_string(), &b.to_string()), a.cmp(&b));
        }
    }
}
