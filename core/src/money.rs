//! Fixed-point money.
//!
//! RULE: every monetary quantity in the simulation is a `Money`.
//! Values are always carried at 2 decimal places, rounded half-up
//! (midpoint away from zero). Rates stay as raw `Decimal`s until they
//! are applied to an amount.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Sub},
    str::FromStr,
};

pub const MONEY_SCALE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Round an arbitrary decimal to money precision.
    pub fn round(value: Decimal) -> Self {
        let mut rounded =
            value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(MONEY_SCALE);
        Self(rounded)
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, MONEY_SCALE))
    }

    pub fn from_units(units: i64) -> Self {
        Self::round(Decimal::from(units))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// `self * rate`, rounded half-up.
    pub fn apply_rate(&self, rate: Decimal) -> Self {
        Self::round(self.0 * rate)
    }

    /// `self / parts`, rounded half-up. Dividing by zero yields `self`.
    pub fn split(&self, parts: i64) -> Self {
        if parts == 0 {
            return *self;
        }
        Self::round(self.0 / Decimal::from(parts))
    }

    /// Subtraction that refuses to go below zero.
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        let out = self - rhs;
        (!out.is_negative()).then_some(out)
    }

    /// Subtraction floored at zero.
    pub fn saturating_sub(self, rhs: Money) -> Money {
        self.checked_sub(rhs).unwrap_or(Money::ZERO)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money::round(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money::round(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::round(value)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Money::round)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{:.2}", self.0))
    }
}

// Stored as TEXT so SQLite never sees a float.
impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Money::from_str(text).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
