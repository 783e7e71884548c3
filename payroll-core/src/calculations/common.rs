//! Rounding helpers shared by the PPh 21 and BPJS calculators.
//!
//! Rupiah amounts are settled in whole units. Every withholding and every
//! contribution is rounded on its own, never on an aggregate, so reported
//! figures add up exactly.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to a whole currency unit, halves away from zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(19199.5)), dec!(19200));
/// assert_eq!(round_half_up(dec!(19199.49)), dec!(19199));
/// assert_eq!(round_half_up(dec!(-0.5)), dec!(-1)); // Away from zero
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds a non-negative amount down to a multiple of `unit`.
///
/// A `unit` of zero or less returns `value` unchanged.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::common::floor_to_unit;
///
/// assert_eq!(floor_to_unit(dec!(43123456), dec!(1000)), dec!(43123000));
/// assert_eq!(floor_to_unit(dec!(43123456.7), dec!(1)), dec!(43123456));
/// ```
pub fn floor_to_unit(
    value: Decimal,
    unit: Decimal,
) -> Decimal {
    if unit <= Decimal::ZERO {
        return value;
    }
    (value / unit).floor() * unit
}

/// Clamps negative values to zero.
pub fn non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}
