// 1.0: all the primitives live here. ids, money, percentages, timestamps.
// each is a newtype so a creator id can't be passed where a user id goes,
// and a price can't be added to a quantity.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreatorId(pub String);

impl CreatorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

// 1.1: money in integer minor units (wei for ETH). pricing math never leaves u128.
// every operation that can overflow is checked and returns None.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn new(minor_units: u128) -> Self {
        Self(minor_units)
    }

    pub fn zero() -> Self {
        Self::ZERO
    }

    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn checked_mul(self, factor: u128) -> Option<Amount> {
        self.0.checked_mul(factor).map(Amount)
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    // floor(self * numerator / denominator). used for proportional cost basis and percentages
    pub fn mul_div_floor(self, numerator: u128, denominator: u128) -> Option<Amount> {
        if denominator == 0 {
            return None;
        }
        self.0.checked_mul(numerator).map(|n| Amount(n / denominator))
    }

    // signed difference, for P&L
    pub fn signed_sub(self, other: Amount) -> Option<SignedAmount> {
        let a = i128::try_from(self.0).ok()?;
        let b = i128::try_from(other.0).ok()?;
        a.checked_sub(b).map(SignedAmount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: saturating sums. totals over a ledger are bounded far below u128::MAX in practice;
// per-trade arithmetic is where overflow is actually checked.
impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| Amount(acc.0.saturating_add(a.0)))
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| Amount(acc.0.saturating_add(a.0)))
    }
}

// 1.3: profit and loss can go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedAmount(i128);

impl SignedAmount {
    pub fn new(minor_units: i128) -> Self {
        Self(minor_units)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn value(&self) -> i128 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for SignedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.4: revenue share. whole percent, 0 to 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SharePercent(u8);

impl SharePercent {
    pub const MAX: u8 = 100;

    #[must_use]
    pub fn new(percent: u8) -> Option<Self> {
        if percent <= Self::MAX {
            Some(Self(percent))
        } else {
            None
        }
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for SharePercent {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SharePercent::new(value).ok_or_else(|| format!("share percent {value} exceeds 100"))
    }
}

impl From<SharePercent> for u8 {
    fn from(p: SharePercent) -> Self {
        p.0
    }
}

impl fmt::Display for SharePercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// 1.5: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

// 1.6: converts between human decimal units and minor units at the edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denomination {
    pub symbol: String,
    pub decimals: u32,
}

impl Default for Denomination {
    fn default() -> Self {
        Self {
            symbol: "ETH".to_string(),
            decimals: 18,
        }
    }
}

impl Denomination {
    // u64 holds 10^19, Decimal scale tops out at 28
    pub const MAX_DECIMALS: u32 = 18;

    fn unit(&self) -> Option<Decimal> {
        if self.decimals > Self::MAX_DECIMALS {
            return None;
        }
        Some(Decimal::from(10u64.pow(self.decimals)))
    }

    // rejects negatives and values with more precision than the denomination carries
    pub fn to_minor(&self, major: Decimal) -> Option<Amount> {
        if major.is_sign_negative() && !major.is_zero() {
            return None;
        }
        let scaled = major.checked_mul(self.unit()?)?;
        if !scaled.fract().is_zero() {
            return None;
        }
        scaled.trunc().to_u128().map(Amount::new)
    }

    pub fn to_major(&self, amount: Amount) -> Option<Decimal> {
        let minor = i128::try_from(amount.value()).ok()?;
        Decimal::try_from_i128_with_scale(minor, self.decimals)
            .ok()
            .map(|d| d.normalize())
    }

    pub fn signed_to_major(&self, amount: SignedAmount) -> Option<Decimal> {
        Decimal::try_from_i128_with_scale(amount.value(), self.decimals)
            .ok()
            .map(|d| d.normalize())
    }

    pub fn format(&self, amount: Amount) -> String {
        match self.to_major(amount) {
            Some(d) => format!("{} {}", d, self.symbol),
            None => format!("{} minor {}", amount, self.symbol),
        }
    }
}
