use std::{
    fmt::{Debug, Display, Formatter},
    str::FromStr,
};

use serde::{Serialize, Serializer};

use crate::prelude::*;

/// SG Ready signal: the two relay bits understood by the heat pump.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[must_use]
pub struct SgReadyState {
    a: bool,
    b: bool,
}

impl SgReadyState {
    /// Locked, the heat pump may reduce heating for up to two hours a day.
    pub const BLOCKED: Self = Self { a: true, b: false };

    /// Normal operation.
    pub const NORMAL: Self = Self { a: false, b: false };

    /// Recommendation to turn the heating on and increase the temperature.
    pub const AVAILABLE_PV: Self = Self { a: false, b: true };

    /// Command to turn the heating on.
    pub const EXCESS_PV: Self = Self { a: true, b: true };

    pub const ALL: [Self; 4] = [Self::BLOCKED, Self::NORMAL, Self::AVAILABLE_PV, Self::EXCESS_PV];

    #[must_use]
    pub const fn a(self) -> bool {
        self.a
    }

    #[must_use]
    pub const fn b(self) -> bool {
        self.b
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match (self.a, self.b) {
            (true, false) => "BLOCKED",
            (false, false) => "NORMAL",
            (false, true) => "AVAILABLE_PV",
            (true, true) => "EXCESS_PV",
        }
    }

    /// Pack into the two lowest bits, `a` being the high one.
    #[must_use]
    pub const fn to_bits(self) -> u8 {
        (if self.a { 0b10 } else { 0 }) | (if self.b { 0b01 } else { 0 })
    }

    /// Inverse of [`Self::to_bits`], higher bits are ignored.
    pub const fn from_bits(bits: u8) -> Self {
        Self { a: bits & 0b10 != 0, b: bits & 0b01 != 0 }
    }
}

impl Display for SgReadyState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.name(), u8::from(self.a), u8::from(self.b))
    }
}

impl Debug for SgReadyState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SgReadyState {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.name() == value)
            .with_context(|| format!("cannot resolve `{value}` to an SG Ready state"))
    }
}

impl Serialize for SgReadyState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
