use bon::Builder;
use chrono::NaiveTime;
use sgready_quantities::{Percent, Watts};

use crate::{
    core::{outcome::ConditionOutcome, state::SgReadyState},
    prelude::*,
};

/// Battery state-of-charge thresholds.
#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct Levels {
    /// Indicates unused solar energy. Used to recommend a heat pump temperature increase.
    pub pv_available: Percent,

    /// Turns the forced heat pump usage on.
    pub pv_excess_on: Percent,

    /// Turns the forced heat pump usage off. Must not exceed [`Self::pv_excess_on`],
    /// the gap between the two is the hysteresis dead-band.
    pub pv_excess_off: Percent,
}

impl Default for Levels {
    fn default() -> Self {
        Self {
            pv_available: Percent::from(20),
            pv_excess_on: Percent::from(80),
            pv_excess_off: Percent::from(60),
        }
    }
}

impl Levels {
    pub fn validate(&self) -> Result {
        ensure!(
            self.pv_excess_on >= self.pv_excess_off,
            "excess start threshold {} must not be below the excess stop threshold {}",
            self.pv_excess_on,
            self.pv_excess_off,
        );
        if self.pv_available > self.pv_excess_off {
            warn!(
                pv_available = ?self.pv_available,
                pv_excess_off = ?self.pv_excess_off,
                "the available threshold is above the excess stop threshold",
            );
        }
        Ok(())
    }
}

/// Averaged inputs of a single evaluation.
#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct Readings {
    pub ingress: Watts,
    pub generator_power: Watts,
    pub state_of_charge: Percent,
}

/// Result of a single evaluation together with its justification.
#[must_use]
#[derive(Clone, Debug)]
pub struct Decision {
    pub state: SgReadyState,
    pub outcome: ConditionOutcome,
}

impl Decision {
    pub const fn new(state: SgReadyState, outcome: ConditionOutcome) -> Self {
        Self { state, outcome }
    }

    pub const fn normal(outcome: ConditionOutcome) -> Self {
        Self::new(SgReadyState::NORMAL, outcome)
    }

    pub const fn available_pv(outcome: ConditionOutcome) -> Self {
        Self::new(SgReadyState::AVAILABLE_PV, outcome)
    }

    pub const fn excess_pv(outcome: ConditionOutcome) -> Self {
        Self::new(SgReadyState::EXCESS_PV, outcome)
    }
}

#[must_use]
#[derive(Clone, Debug, Builder)]
pub struct Policy {
    /// Grid ingress at and above which the state is forced to normal.
    /// Lower ingress is considered a temporary spike.
    #[builder(default = Watts::from(200))]
    pub ingress_limit: Watts,

    pub heat_pump_power_consumption: Watts,

    #[builder(default)]
    pub battery: Levels,

    /// Do not apply [`SgReadyState::EXCESS_PV`] before this local time.
    pub excess_not_before: Option<NaiveTime>,

    /// Do not apply [`SgReadyState::EXCESS_PV`] after this local time.
    pub excess_not_after: Option<NaiveTime>,
}

impl Policy {
    /// Evaluate the guards in priority order, the first matching one wins.
    pub fn decide(&self, readings: Readings, previous: SgReadyState, now: NaiveTime) -> Decision {
        let Readings { ingress, generator_power, state_of_charge } = readings;

        if ingress >= self.ingress_limit {
            return Decision::normal(ConditionOutcome::matched(format!(
                "ingress {ingress} exceeds the limit {}",
                self.ingress_limit,
            )));
        }

        if generator_power < self.heat_pump_power_consumption {
            return Decision::normal(ConditionOutcome::not_matched(format!(
                "generator power {generator_power} is below the heat pump consumption {}",
                self.heat_pump_power_consumption,
            )));
        }

        let sufficient_power = ConditionOutcome::matched(format!(
            "generator power {generator_power} covers the heat pump consumption {}",
            self.heat_pump_power_consumption,
        ));
        let gate = self.excess_gate(state_of_charge, now);
        let excess_allowed = gate.all_matched();
        let outcome = sufficient_power.and(gate);
        let levels = &self.battery;

        if excess_allowed {
            if state_of_charge >= levels.pv_excess_on {
                return Decision::excess_pv(outcome.and_matched(format!(
                    "state of charge {state_of_charge} reached the excess start threshold {}",
                    levels.pv_excess_on,
                )));
            }
            if previous == SgReadyState::NORMAL {
                return Decision::available_pv(outcome.and_not_matched(format!(
                    "state of charge {state_of_charge} is below the excess start threshold {}, \
                     switching from normal to available",
                    levels.pv_excess_on,
                )));
            }
            return Decision::new(
                previous,
                outcome.and_not_matched(format!(
                    "state of charge {state_of_charge} is below the excess start threshold {}, \
                     retaining {previous}",
                    levels.pv_excess_on,
                )),
            );
        }

        if state_of_charge >= levels.pv_available {
            return Decision::available_pv(outcome.and_matched(format!(
                "state of charge {state_of_charge} reached the available threshold {}",
                levels.pv_available,
            )));
        }

        Decision::new(
            previous,
            outcome.and_not_matched(format!(
                "state of charge {state_of_charge} is below the available threshold {}, \
                 retaining {previous}",
                levels.pv_available,
            )),
        )
    }

    /// Time window and excess stop threshold that have to hold for the excess mode.
    ///
    /// Every predicate is evaluated even when an earlier one has failed, so the trace always
    /// shows the state of charge check.
    fn excess_gate(&self, state_of_charge: Percent, now: NaiveTime) -> ConditionOutcome {
        let mut gate = ConditionOutcome::default();

        if let Some(not_before) = self.excess_not_before {
            gate = if now < not_before {
                gate.and_not_matched(format!("current time {now} is before the excess start {not_before}"))
            } else {
                gate.and_matched(format!("current time {now} is not before the excess start {not_before}"))
            };
        }

        if let Some(not_after) = self.excess_not_after {
            gate = if now > not_after {
                gate.and_not_matched(format!("current time {now} is after the excess end {not_after}"))
            } else {
                gate.and_matched(format!("current time {now} is not after the excess end {not_after}"))
            };
        }

        let pv_excess_off = self.battery.pv_excess_off;
        if state_of_charge >= pv_excess_off {
            gate.and_matched(format!(
                "state of charge {state_of_charge} is above the excess stop threshold {pv_excess_off}",
            ))
        } else {
            gate.and_not_matched(format!(
                "state of charge {state_of_charge} is below the excess stop threshold {pv_excess_off}",
            ))
        }
    }
}
