use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use sgready_quantities::{Percent, Watts};
use tokio::time::{MissedTickBehavior, interval};

use crate::{
    api::{modbus, modbus::InverterState},
    prelude::*,
    statistics::{Statistics, StatisticsTracker},
    telemetry::{Liveness, PowerGenerator},
};

/// Solar inverter, possibly with a battery behind it.
#[must_use]
pub struct Inverter {
    generator_power: StatisticsTracker<Watts>,
    state_of_charge: StatisticsTracker<Percent>,
    has_battery: AtomicBool,
    liveness: Liveness,
}

/// How to reach the inverter.
#[derive(Clone, Debug)]
pub struct Endpoint {
    pub address: String,
    pub slave_id: u8,
    pub registers: modbus::Registers,
}

impl Inverter {
    pub const fn new(averaging_window: TimeDelta, staleness: TimeDelta) -> Self {
        Self {
            generator_power: StatisticsTracker::new(averaging_window),
            state_of_charge: StatisticsTracker::new(averaging_window),
            has_battery: AtomicBool::new(false),
            liveness: Liveness::new(staleness),
        }
    }

    pub fn record(&self, state: &InverterState, now: DateTime<Utc>) {
        self.generator_power.update(state.generator_power(), now);
        self.state_of_charge.update(state.state_of_charge, now);
        self.has_battery.store(state.has_battery(), Ordering::Relaxed);
        self.liveness.mark(now);
    }

    /// Whether the last reading reported a battery capacity.
    #[must_use]
    pub fn has_battery(&self) -> bool {
        self.has_battery.load(Ordering::Relaxed)
    }

    /// Poll the inverter forever, reconnecting after a failure.
    #[instrument(skip_all, name = "inverter", fields(address = %endpoint.address))]
    pub async fn poll(&self, endpoint: Endpoint, query_interval: Duration) {
        let mut interval = interval(query_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut client: Option<modbus::Client> = None;
        loop {
            interval.tick().await;
            if client.is_none() {
                match modbus::Client::connect(&endpoint.address, endpoint.slave_id, endpoint.registers)
                    .await
                {
                    Ok(connected) => client = Some(connected),
                    Err(error) => {
                        warn!("failed to connect to the inverter: {error:#}");
                        continue;
                    }
                }
            }
            let Some(connected) = client.as_mut() else { continue };
            match connected.read_state().await {
                Ok(state) => self.record(&state, Utc::now()),
                Err(error) => {
                    warn!("failed to read the inverter, reconnecting on the next poll: {error:#}");
                    client = None;
                }
            }
        }
    }
}

impl PowerGenerator for Inverter {
    fn battery_state_of_charge(&self) -> Percent {
        self.state_of_charge.most_recent()
    }

    fn generator_power(&self) -> &dyn Statistics<Watts> {
        &self.generator_power
    }

    fn has_data(&self) -> bool {
        self.liveness.is_fresh()
    }
}

/// Sum of the inverters' generator power.
struct TotalPower(Vec<Arc<Inverter>>);

impl Statistics<Watts> for TotalPower {
    fn average(&self) -> Watts {
        self.0.iter().map(|inverter| inverter.generator_power().average()).sum()
    }

    fn most_recent(&self) -> Watts {
        self.0.iter().map(|inverter| inverter.generator_power().most_recent()).sum()
    }
}

/// All the inverters of the installation seen as a single generator.
#[must_use]
pub struct Inverters(TotalPower);

impl Inverters {
    pub const fn new(inverters: Vec<Arc<Inverter>>) -> Self {
        Self(TotalPower(inverters))
    }
}

impl PowerGenerator for Inverters {
    /// Mean state of charge of the inverters that have a battery.
    fn battery_state_of_charge(&self) -> Percent {
        let states: Vec<Percent> = self
            .0
            .0
            .iter()
            .filter(|inverter| inverter.has_battery())
            .map(|inverter| inverter.battery_state_of_charge())
            .collect();
        if states.is_empty() {
            return Percent::ZERO;
        }
        #[expect(clippy::cast_precision_loss)]
        let len = states.len() as f64;
        states.into_iter().sum::<Percent>() / len
    }

    fn generator_power(&self) -> &dyn Statistics<Watts> {
        &self.0
    }

    /// Every inverter has to be alive, otherwise the total power is underestimated.
    fn has_data(&self) -> bool {
        !self.0.0.is_empty() && self.0.0.iter().all(|inverter| inverter.has_data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inverter() -> Arc<Inverter> {
        Arc::new(Inverter::new(TimeDelta::minutes(5), TimeDelta::minutes(1)))
    }

    fn state(state_of_charge: i32, battery_capacity: i32, active_power: i32) -> InverterState {
        InverterState {
            state_of_charge: Percent::from(state_of_charge),
            battery_capacity: Percent::from(battery_capacity),
            active_power: Watts::from(active_power),
            battery_charging: Watts::from(500),
            battery_discharging: Watts::ZERO,
        }
    }

    #[test]
    fn test_record() {
        let inverter = inverter();
        assert!(!inverter.has_data());
        assert_eq!(inverter.battery_state_of_charge(), Percent::ZERO);

        let now = Utc::now();
        inverter.record(&state(70, 100, 1000), now);
        inverter.record(&state(71, 100, 2000), now);

        assert!(inverter.has_data());
        assert!(inverter.has_battery());
        assert_eq!(inverter.battery_state_of_charge(), Percent::from(71));
        assert_eq!(inverter.generator_power().average(), Watts::from(2000));
        assert_eq!(inverter.generator_power().most_recent(), Watts::from(2500));
    }

    #[test]
    fn test_inverters_sum_power_and_take_battery_state_of_charge() {
        let hybrid = inverter();
        let plain = inverter();
        let inverters = Inverters::new(vec![hybrid.clone(), plain.clone()]);
        assert!(!inverters.has_data());

        let now = Utc::now();
        hybrid.record(&state(64, 100, 1000), now);
        hybrid.record(&state(66, 100, 2000), now);
        assert!(!inverters.has_data(), "one of the inverters has not reported yet");

        plain.record(&state(0, 0, 3000), now);
        assert!(inverters.has_data());
        assert_eq!(inverters.generator_power().average(), Watts::from(2000 + 3500));
        assert_eq!(inverters.generator_power().most_recent(), Watts::from(2500 + 3500));
        assert_eq!(inverters.battery_state_of_charge(), Percent::from(66));
    }

    #[test]
    fn test_inverters_average_several_batteries() {
        let first = inverter();
        let second = inverter();
        let now = Utc::now();
        first.record(&state(40, 100, 0), now);
        second.record(&state(80, 100, 0), now);
        let inverters = Inverters::new(vec![first, second]);
        assert_eq!(inverters.battery_state_of_charge(), Percent::from(60));
    }

    #[test]
    fn test_inverters_without_battery() {
        let plain = inverter();
        plain.record(&state(0, 0, 1200), Utc::now());
        let inverters = Inverters::new(vec![plain]);
        assert_eq!(inverters.battery_state_of_charge(), Percent::ZERO);
        assert_eq!(inverters.generator_power().average(), Watts::from(1700));
    }
}
