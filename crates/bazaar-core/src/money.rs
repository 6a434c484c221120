//! # Money Module
//!
//! Provides `Money` for monetary values and `FeeRate` for the platform cut.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    200000 × 0.17 = 34000.000000000004  ❌                               │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units + basis points                       │
//! │    20_000_000 × 1700 / 10_000 = 3_400_000  ✅                           │
//! │    net = gross - fee, so fee + net == gross always                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::money::Money;
//!
//! let price = Money::from_major_minor(100_000, 0); // 100,000.00 VND
//! let line = price * 2;
//! assert_eq!(line.cents(), 20_000_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (1/100 VND).
///
/// ## Where Money Flows
/// ```text
/// CartItem.unit_price ──► OrderItem.subtotal ──► Order.total ──► Wallet debit
///                                 │
///                                 └──► seller share ──► Withdrawal.amount
///                                                        ├── fee
///                                                        └── actual_amount
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let fee = Money::from_cents(3_400_000);
    /// assert_eq!(fee.cents(), 3_400_000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity (for line subtotals). `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts. `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums amounts, returning `None` if any partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |total, amount| total.checked_add(amount))
    }

    /// Computes the fee for this amount at `rate`, rounding half up.
    ///
    /// ## Implementation
    /// `(amount * bps + 5000) / 10000` in i128 so large balances cannot
    /// overflow the intermediate product.
    ///
    /// ```rust
    /// use bazaar_core::money::{FeeRate, Money};
    ///
    /// // 0.05 at 17% = 0.0085 → 0.01
    /// assert_eq!(Money::from_cents(5).fee_at(FeeRate::from_bps(1700)).cents(), 1);
    /// ```
    pub fn fee_at(&self, rate: FeeRate) -> Money {
        let product = self.0 as i128 * rate.bps() as i128;
        let rounded = (product + 5000).div_euclid(10000);
        Money(rounded as i64)
    }

    /// Splits a gross amount into platform fee and seller net.
    ///
    /// The net is derived by subtraction, so `fee + net == gross` holds for
    /// every input.
    pub fn split_fee(&self, rate: FeeRate) -> FeeSplit {
        let fee = self.fee_at(rate);
        FeeSplit {
            gross: *self,
            fee,
            net: *self - fee,
        }
    }
}

/// Displays as `major.minor VND`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02} VND", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Fee Rate
// =============================================================================

/// Platform fee rate in basis points (1 bps = 0.01%).
///
/// The admin configures the rate as a percentage (`discountRate = 17`), which
/// is converted once at the boundary so all arithmetic stays integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FeeRate(u32);

impl FeeRate {
    /// Upper bound: 100% = 10000 bps.
    pub const MAX_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        FeeRate(bps)
    }

    /// Converts a percentage (0-100, two decimals honored) to a rate.
    ///
    /// ```rust
    /// use bazaar_core::money::FeeRate;
    ///
    /// assert_eq!(FeeRate::from_percentage(17.0).unwrap().bps(), 1700);
    /// assert_eq!(FeeRate::from_percentage(12.5).unwrap().bps(), 1250);
    /// assert!(FeeRate::from_percentage(101.0).is_err());
    /// ```
    pub fn from_percentage(pct: f64) -> Result<Self, ValidationError> {
        if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
            return Err(ValidationError::OutOfRange {
                field: "discountRate".to_string(),
                min: 0,
                max: 100,
            });
        }
        Ok(FeeRate((pct * 100.0).round() as u32))
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        FeeRate(crate::DEFAULT_FEE_RATE_BPS)
    }
}

/// Result of [`Money::split_fee`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FeeSplit {
    pub gross: Money,
    pub fee: Money,
    pub net: Money,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(200_000, 0).cents(), 20_000_000);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(16_600_000).to_string(), "166000.00 VND");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50 VND");
        assert_eq!(Money::zero().to_string(), "0.00 VND");
    }

    #[test]
    fn test_seventeen_percent_of_two_hundred_thousand() {
        let split = Money::from_major_minor(200_000, 0).split_fee(FeeRate::from_bps(1700));
        assert_eq!(split.fee, Money::from_major_minor(34_000, 0));
        assert_eq!(split.net, Money::from_major_minor(166_000, 0));
    }

    #[test]
    fn test_split_never_drifts() {
        let rate = FeeRate::from_bps(1333);
        for cents in [1, 7, 99, 101, 12_345, 9_999_999, 123_456_789] {
            let split = Money::from_cents(cents).split_fee(rate);
            assert_eq!(split.fee + split.net, split.gross, "cents={}", cents);
            assert!(!split.net.is_negative());
        }
    }

    #[test]
    fn test_fee_rounds_half_up() {
        // 0.50 at 1% = 0.005 → 0.01
        assert_eq!(Money::from_cents(50).fee_at(FeeRate::from_bps(100)).cents(), 1);
        // 0.49 at 1% = 0.0049 → 0.00
        assert_eq!(Money::from_cents(49).fee_at(FeeRate::from_bps(100)).cents(), 0);
    }

    #[test]
    fn test_full_rate_leaves_nothing() {
        let split = Money::from_cents(12_345).split_fee(FeeRate::from_bps(FeeRate::MAX_BPS));
        assert_eq!(split.net, Money::zero());
    }

    #[test]
    fn test_fee_rate_bounds() {
        assert!(FeeRate::from_percentage(0.0).is_ok());
        assert!(FeeRate::from_percentage(100.0).is_ok());
        assert!(FeeRate::from_percentage(-0.5).is_err());
        assert!(FeeRate::from_percentage(f64::NAN).is_err());
        assert_eq!(FeeRate::default().bps(), 1700);
    }

    #[test]
    fn test_checked_arithmetic() {
        let price = Money::from_cents(6_148_914_691_236_517_206);
        assert_eq!(price.checked_multiply_quantity(3), None);
        assert_eq!(
            Money::from_cents(2_500).checked_multiply_quantity(3),
            Some(Money::from_cents(7_500))
        );

        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
        assert_eq!(
            Money::checked_sum([Money::from_cents(100), Money::from_cents(250)]),
            Some(Money::from_cents(350))
        );
        assert_eq!(
            Money::checked_sum([Money::from_cents(i64::MAX), Money::from_cents(1)]),
            None
        );
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 650].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 1000);
    }
}
