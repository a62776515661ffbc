pub mod generator;
pub mod grid;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use sgready_quantities::{Percent, Watts};

use crate::statistics::Statistics;

/// Power meter at the grid connection point.
pub trait PowerMeter: Send + Sync {
    /// Power drawn from the grid.
    fn ingress(&self) -> &dyn Statistics<Watts>;

    /// Power fed into the grid.
    fn egress(&self) -> &dyn Statistics<Watts>;

    /// Whether the meter is alive and has recent data.
    fn has_data(&self) -> bool;
}

/// Power generator: inverter with the battery behind it.
pub trait PowerGenerator: Send + Sync {
    fn battery_state_of_charge(&self) -> Percent;

    fn generator_power(&self) -> &dyn Statistics<Watts>;

    /// Whether the generator is alive and has recent data.
    fn has_data(&self) -> bool;
}

/// Time of the last successful reading.
#[must_use]
pub struct Liveness {
    staleness: TimeDelta,
    last_reading: Mutex<Option<DateTime<Utc>>>,
}

impl Liveness {
    pub const fn new(staleness: TimeDelta) -> Self {
        Self { staleness, last_reading: Mutex::new(None) }
    }

    pub fn mark(&self, now: DateTime<Utc>) {
        *self.last_reading.lock() = Some(now);
    }

    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.last_reading.lock().is_some_and(|last_reading| now - last_reading <= self.staleness)
    }

    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness() {
        let now = Utc::now();
        let liveness = Liveness::new(TimeDelta::seconds(60));
        assert!(!liveness.is_fresh_at(now), "nothing has been read yet");

        liveness.mark(now);
        assert!(liveness.is_fresh_at(now + TimeDelta::seconds(60)));
        assert!(!liveness.is_fresh_at(now + TimeDelta::seconds(61)));
    }
}
