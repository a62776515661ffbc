pub mod percent;
pub mod power;

use std::ops::Div;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

pub use self::{percent::Percent, power::Watts};

/// Scalar tagged with its physical dimension.
///
/// Each dimension is a separate type, so comparing watts with percents does not compile.
#[derive(
    Clone,
    Copy,
    Deserialize,
    Eq,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    derive_more::Add,
    derive_more::AddAssign,
    derive_more::From,
    derive_more::FromStr,
    derive_more::Neg,
    derive_more::Sub,
    derive_more::SubAssign,
    derive_more::Sum,
)]
#[from(i32, f64, OrderedFloat<f64>)]
#[serde(transparent)]
#[must_use]
pub struct Quantity<const WATT: isize, const PERCENT: isize>(pub OrderedFloat<f64>);

impl<const WATT: isize, const PERCENT: isize> Quantity<WATT, PERCENT> {
    pub const ZERO: Self = Self(OrderedFloat(0.0));

    pub const fn abs(mut self) -> Self {
        self.0 = OrderedFloat(self.0.0.abs());
        self
    }

    #[must_use]
    pub const fn into_inner(self) -> f64 {
        self.0.0
    }
}

/// Additive identity, used as the cold-start value of empty statistics.
pub trait Zero {
    const ZERO: Self;
}

impl<const WATT: isize, const PERCENT: isize> Zero for Quantity<WATT, PERCENT> {
    const ZERO: Self = Self(OrderedFloat(0.0));
}

impl<const WATT: isize, const PERCENT: isize> Div<f64> for Quantity<WATT, PERCENT> {
    type Output = Self;

    fn div(self, rhs: f64) -> Self::Output {
        Self(self.0 / rhs)
    }
}
