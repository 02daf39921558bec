//! Amount type for handling monetary values.
//!
//! The store returns `numeric` columns either as JSON numbers or as strings, and users type
//! amounts like `$1,200.50` on the command line. `Amount` accepts all of these and always displays
//! as dollars with two decimal places and thousands separators.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

/// Represents a dollar amount.
///
/// # Examples
///
/// ```
/// # use passive_bloom::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("-$5,000.5").unwrap();
/// assert_eq!(amount.to_string(), "-$5,000.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Rounds to whole cents, half away from zero.
    pub fn round_cents(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Interprets a JSON value from the store. Numbers and numeric strings are accepted.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => {
                let s = n.to_string();
                Decimal::from_str(&s)
                    .or_else(|_| Decimal::from_scientific(&s))
                    .ok()
                    .map(Self)
            }
            serde_json::Value::String(s) => Amount::from_str(s).ok(),
            _ => None,
        }
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let rest = rest.strip_prefix('$').unwrap_or(rest);
        let digits = rest.replace(',', "");
        let value = Decimal::from_str(&digits).map_err(AmountError)?;
        Ok(Amount(if negative { -value } else { value }))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rounded = self.round_cents();
        let sign = if rounded.is_negative() { "-" } else { "" };
        let digits = format!("{:.2}", rounded.value().abs());
        let (whole, cents) = digits.split_once('.').unwrap_or((&digits, "00"));
        write!(f, "{sign}${}.{cents}", group_thousands(whole))
    }
}

/// Inserts a comma between every group of three digits, counting from the right.
fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Plain decimal string so JSON consumers do not have to strip formatting
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        Amount::from_json(&v)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {v}")))
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_with_dollar_sign_and_commas() {
        let amount = Amount::from_str("$1,234,567.89").unwrap();
        assert_eq!(amount.value(), dec("1234567.89"));
    }

    #[test]
    fn test_parse_negative_with_dollar_sign() {
        let amount = Amount::from_str("-$50.00").unwrap();
        assert_eq!(amount.value(), dec("-50.00"));
    }

    #[test]
    fn test_parse_whitespace() {
        let amount = Amount::from_str("  42.1  ").unwrap();
        assert_eq!(amount.value(), dec("42.1"));
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(Amount::from_str("twelve").is_err());
        assert!(Amount::from_str("").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::new(dec("50")).to_string(), "$50.00");
        assert_eq!(Amount::new(dec("-1234.5")).to_string(), "-$1,234.50");
        assert_eq!(Amount::ZERO.to_string(), "$0.00");
        assert_eq!(Amount::new(dec("999.999")).to_string(), "$1,000.00");
        assert_eq!(Amount::new(dec("100000")).to_string(), "$100,000.00");
    }

    #[test]
    fn test_display_keeps_every_digit() {
        assert_eq!(
            Amount::new(dec("12345678901234567.89")).to_string(),
            "$12,345,678,901,234,567.89"
        );
    }

    #[test]
    fn test_display_rounds_half_away_from_zero() {
        assert_eq!(Amount::new(dec("0.125")).to_string(), "$0.13");
        assert_eq!(Amount::new(dec("-0.004")).to_string(), "$0.00");
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Amount::from_json(&json!(12.5)).unwrap().value(), dec("12.5"));
        assert_eq!(Amount::from_json(&json!("7.25")).unwrap().value(), dec("7.25"));
        assert_eq!(Amount::from_json(&json!(3)).unwrap().value(), dec("3"));
        assert!(Amount::from_json(&json!(null)).is_none());
        assert!(Amount::from_json(&json!(true)).is_none());
        assert!(Amount::from_json(&json!("abc")).is_none());
    }

    #[test]
    fn test_serde() {
        let amount = Amount::new(dec("50.10"));
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"50.10\"");
        let back: Amount = serde_json::from_str("\"50.10\"").unwrap();
        assert_eq!(back, amount);
        let from_number: Amount = serde_json::from_str("50.1").unwrap();
        assert_eq!(from_number.value(), dec("50.1"));
    }

    #[test]
    fn test_sum() {
        let total: Amount = ["1.10", "2.20", "-0.30"]
            .iter()
            .map(|s| Amount::from_str(s).unwrap())
            .sum();
        assert_eq!(total.value(), dec("3.00"));
    }
}
