use std::time::Duration;

use chrono::TimeDelta;
use clap::Parser;
use reqwest::Url;

use crate::{api::modbus, prelude::*, telemetry::generator::Endpoint};

#[derive(Parser)]
pub struct TelemetryArgs {
    /// HomeWizard P1 meter data URL, for example `http://p1meter/api/v1/data`.
    #[clap(long, env = "METER_URL")]
    pub meter_url: Url,

    /// Inverter Modbus TCP address in the form of `host:port`, repeat for each inverter.
    #[clap(
        long = "inverter-address",
        env = "INVERTER_ADDRESSES",
        value_delimiter = ',',
        required = true
    )]
    pub inverter_addresses: Vec<String>,

    #[clap(long, env = "INVERTER_SLAVE_ID", default_value = "3")]
    pub inverter_slave_id: u8,

    #[clap(flatten)]
    pub registers: RegisterArgs,

    /// Window of the moving averages.
    #[clap(long, env = "AVERAGING_WINDOW", default_value = "5min")]
    pub averaging_window: humantime::Duration,

    /// Telemetry polling and evaluation interval.
    #[clap(long, env = "QUERY_INTERVAL", default_value = "10s")]
    pub query_interval: humantime::Duration,

    /// A source without a reading for longer than this is considered stale.
    #[clap(long, env = "STALENESS", default_value = "1min")]
    pub staleness: humantime::Duration,
}

#[derive(Copy, Clone, Parser)]
pub struct RegisterArgs {
    #[clap(long = "soc-register", env = "SOC_REGISTER", default_value = "30845")]
    pub state_of_charge: u16,

    #[clap(
        long = "battery-capacity-register",
        env = "BATTERY_CAPACITY_REGISTER",
        default_value = "30847"
    )]
    pub battery_capacity: u16,

    #[clap(long = "active-power-register", env = "ACTIVE_POWER_REGISTER", default_value = "30775")]
    pub active_power: u16,

    #[clap(
        long = "battery-charging-register",
        env = "BATTERY_CHARGING_REGISTER",
        default_value = "31393"
    )]
    pub battery_charging: u16,

    #[clap(
        long = "battery-discharging-register",
        env = "BATTERY_DISCHARGING_REGISTER",
        default_value = "31395"
    )]
    pub battery_discharging: u16,
}

impl From<RegisterArgs> for modbus::Registers {
    fn from(args: RegisterArgs) -> Self {
        Self {
            state_of_charge: args.state_of_charge,
            battery_capacity: args.battery_capacity,
            active_power: args.active_power,
            battery_charging: args.battery_charging,
            battery_discharging: args.battery_discharging,
        }
    }
}

impl TelemetryArgs {
    pub fn inverter_endpoints(&self) -> Vec<Endpoint> {
        self.inverter_addresses
            .iter()
            .map(|address| Endpoint {
                address: address.clone(),
                slave_id: self.inverter_slave_id,
                registers: self.registers.into(),
            })
            .collect()
    }

    pub fn averaging_window(&self) -> Result<TimeDelta> {
        Ok(TimeDelta::from_std(self.averaging_window.into())?)
    }

    pub fn staleness(&self) -> Result<TimeDelta> {
        Ok(TimeDelta::from_std(self.staleness.into())?)
    }

    pub fn query_interval(&self) -> Result<Duration> {
        let query_interval: Duration = self.query_interval.into();
        ensure!(!query_interval.is_zero(), "the query interval must be positive");
        Ok(query_interval)
    }
}
