use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;
use tracing::debug;

/// number of decimal places kept for rupee amounts (paise)
pub const MONEY_DP: u32 = 2;

/// largest single amount accepted from raw input, in rupees
pub const MAX_AMOUNT_MAJOR: i64 = 1_000_000_000_000;

/// out-of-range or negative input is malformed and becomes zero
fn accept_amount(d: Decimal, raw: &dyn fmt::Display) -> Money {
    if d > Decimal::from(MAX_AMOUNT_MAJOR) {
        debug!(raw = %raw, "amount above ceiling, coerced to zero");
        return Money::ZERO;
    }
    Money::from_decimal(d).non_negative()
}

fn round_money(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Money type with paise precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const ONE: Money = Money(Decimal::ONE);

    /// create from decimal
    pub fn from_decimal(d: Decimal) -> Self {
        Money(round_money(d))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money(round_money(Decimal::from_str(s)?)))
    }

    /// create from whole rupees
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// create from paise
    pub fn from_minor(amount: i64) -> Self {
        Money(Decimal::new(amount, MONEY_DP))
    }

    /// parse a user or sheet supplied amount; anything unusable becomes zero
    ///
    /// Accepts plain numbers, thousands separators and a leading rupee sign.
    /// Negative amounts and amounts above [`MAX_AMOUNT_MAJOR`] are treated as
    /// malformed.
    pub fn parse_lenient(s: &str) -> Self {
        let cleaned: String = s
            .trim()
            .trim_start_matches('₹')
            .trim_start_matches("Rs.")
            .trim_start_matches("Rs")
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();

        if cleaned.is_empty() {
            return Money::ZERO;
        }

        let parsed = Decimal::from_str(&cleaned)
            .or_else(|_| Decimal::from_scientific(&cleaned));

        match parsed {
            Ok(d) => accept_amount(d, &s),
            Err(_) => {
                debug!(raw = s, "unparsable amount, coerced to zero");
                Money::ZERO
            }
        }
    }

    /// coerce a raw json value into an amount; never fails
    pub fn coerce(value: &Value) -> Self {
        match value {
            Value::Number(n) => {
                let d = if let Some(i) = n.as_i64() {
                    Some(Decimal::from(i))
                } else if let Some(u) = n.as_u64() {
                    Some(Decimal::from(u))
                } else {
                    n.as_f64().and_then(|f| Decimal::try_from(f).ok())
                };
                d.map(|d| accept_amount(d, n)).unwrap_or(Money::ZERO)
            }
            Value::String(s) => Money::parse_lenient(s),
            Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => Money::ZERO,
        }
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// check if zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// check if negative
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// minimum of two values
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// maximum of two values
    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// floor at zero
    pub fn non_negative(self) -> Self {
        self.max(Money::ZERO)
    }

    /// `self - other`, floored at zero
    pub fn saturating_sub(self, other: Self) -> Self {
        (self - other).non_negative()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl From<i32> for Money {
    fn from(i: i32) -> Self {
        Money::from_major(i as i64)
    }
}

impl From<u32> for Money {
    fn from(i: u32) -> Self {
        Money::from_major(i as i64)
    }
}

impl Add for Money {
    type Output = Money;

    // saturates at Decimal::MAX instead of panicking
    fn add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    fn mul(self, steps: u32) -> Money {
        Money(self.0.saturating_mul(Decimal::from(steps)))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

/// `round(100 * total / max)` as a whole percentage
///
/// Returns `None` when `max` is not positive; callers choose their own
/// sentinel (zero, blank cell) for that case.
pub fn round_percent(total: Decimal, max: Decimal) -> Option<Decimal> {
    if max <= Decimal::ZERO {
        return None;
    }
    let pct = total * Decimal::ONE_HUNDRED / max;
    Some(pct.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
}

/// share of `required` that has been collected, as a whole percentage
pub fn collection_percent(collected: Money, required: Money) -> Option<Decimal> {
    round_percent(collected.as_decimal(), required.as_decimal())
}
