use chrono::NaiveTime;
use clap::Parser;
use sgready_quantities::{Percent, Watts};

use crate::{
    core::decision::{Levels, Policy},
    prelude::*,
};

#[derive(Parser)]
pub struct PolicyArgs {
    /// Grid ingress in watts at and above which the heat pump is kept in normal mode.
    #[clap(long = "ingress-limit-watts", env = "INGRESS_LIMIT_WATTS", default_value = "200")]
    pub ingress_limit: Watts,

    /// Power the heat pump consumes while heating, in watts.
    #[clap(long = "heat-pump-power-consumption-watts", env = "HEAT_PUMP_POWER_CONSUMPTION_WATTS")]
    pub heat_pump_power_consumption: Watts,

    #[clap(flatten)]
    pub levels: LevelArgs,

    /// Do not force the heat pump on before this local time, `HH:MM` or `HH:MM:SS`.
    #[clap(long, env = "EXCESS_NOT_BEFORE", value_parser = parse_local_time)]
    pub excess_not_before: Option<NaiveTime>,

    /// Do not force the heat pump on after this local time, `HH:MM` or `HH:MM:SS`.
    #[clap(long, env = "EXCESS_NOT_AFTER", value_parser = parse_local_time)]
    pub excess_not_after: Option<NaiveTime>,
}

#[derive(Copy, Clone, Parser)]
pub struct LevelArgs {
    /// Battery state of charge that indicates unused solar power.
    #[clap(long = "pv-available-percent", env = "PV_AVAILABLE_PERCENT", default_value = "20")]
    pub pv_available: Percent,

    /// Battery state of charge that turns the forced heating on.
    #[clap(long = "pv-excess-on-percent", env = "PV_EXCESS_ON_PERCENT", default_value = "80")]
    pub pv_excess_on: Percent,

    /// Battery state of charge that turns the forced heating off.
    #[clap(long = "pv-excess-off-percent", env = "PV_EXCESS_OFF_PERCENT", default_value = "60")]
    pub pv_excess_off: Percent,
}

impl PolicyArgs {
    pub fn build(&self) -> Result<Policy> {
        let levels = Levels {
            pv_available: self.levels.pv_available,
            pv_excess_on: self.levels.pv_excess_on,
            pv_excess_off: self.levels.pv_excess_off,
        };
        levels.validate().context("invalid battery levels")?;
        if let (Some(not_before), Some(not_after)) = (self.excess_not_before, self.excess_not_after)
            && not_before > not_after
        {
            warn!(%not_before, %not_after, "the excess window is empty");
        }
        Ok(Policy::builder()
            .ingress_limit(self.ingress_limit)
            .heat_pump_power_consumption(self.heat_pump_power_consumption)
            .battery(levels)
            .maybe_excess_not_before(self.excess_not_before)
            .maybe_excess_not_after(self.excess_not_after)
            .build())
    }
}

fn parse_local_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .with_context(|| format!("`{value}` is not a valid local time"))
}
