use std::{future::Future, sync::Arc, time::Duration};

use bon::Builder;
use chrono::{DateTime, Local};
use serde::Serialize;
use sgready_quantities::{Percent, Watts};
use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval},
};

use crate::{
    api::heartbeat,
    core::{
        decision::{Decision, Policy, Readings},
        state::SgReadyState,
    },
    prelude::*,
    sink::Sink,
    statistics::Statistics,
    telemetry::{PowerGenerator, PowerMeter},
};

/// Exposed outcome of the most recent evaluation.
#[derive(Clone, Debug, Serialize)]
pub struct Status {
    pub state: SgReadyState,

    /// Explanation, root cause first.
    pub decision: Vec<String>,

    pub ingress: Watts,
    pub egress: Watts,
    pub generator_power: Watts,
    pub state_of_charge: Percent,
    pub updated_at: Option<DateTime<Local>>,
}

impl Status {
    fn initial() -> Self {
        Self {
            state: SgReadyState::NORMAL,
            decision: Vec::new(),
            ingress: Watts::ZERO,
            egress: Watts::ZERO,
            generator_power: Watts::ZERO,
            state_of_charge: Percent::ZERO,
            updated_at: None,
        }
    }
}

#[derive(Builder)]
pub struct ControlLoop {
    generator: Arc<dyn PowerGenerator>,
    meter: Arc<dyn PowerMeter>,
    policy: Policy,
    sink: Arc<dyn Sink>,
    heartbeat: Option<heartbeat::Client>,

    /// State exposed by the last evaluated tick.
    #[builder(skip = SgReadyState::NORMAL)]
    state: SgReadyState,

    #[builder(skip = watch::Sender::new(Status::initial()))]
    status: watch::Sender<Status>,
}

impl ControlLoop {
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// Evaluate until the shutdown future resolves, ticks never overlap.
    pub async fn run(mut self, query_interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut interval = interval(query_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = std::pin::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!(state = ?self.state, "shutting down…");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(error) = self.tick(Local::now()).await {
                        error!("failed to forward the state: {error:#}");
                    }
                }
            }
        }
    }

    /// Evaluate the policy once and forward the new state.
    ///
    /// Returns [`None`] when the tick got skipped because of stale telemetry.
    #[instrument(skip_all)]
    pub async fn tick(&mut self, now: DateTime<Local>) -> Result<Option<Decision>> {
        let meter_alive = self.meter.has_data();
        let generator_alive = self.generator.has_data();
        if !meter_alive || !generator_alive {
            warn!(meter_alive, generator_alive, state = ?self.state, "stale telemetry, skipping");
            return Ok(None);
        }

        let readings = Readings {
            ingress: self.meter.ingress().average(),
            generator_power: self.generator.generator_power().average(),
            state_of_charge: self.generator.battery_state_of_charge(),
        };
        let decision = self.policy.decide(readings, self.state, now.time());
        if decision.state == self.state {
            debug!(
                ingress = ?readings.ingress,
                generator_power = ?readings.generator_power,
                state_of_charge = ?readings.state_of_charge,
                "SG Ready: {}",
                decision.state,
            );
        } else {
            info!(
                ingress = ?readings.ingress,
                generator_power = ?readings.generator_power,
                state_of_charge = ?readings.state_of_charge,
                previous = ?self.state,
                matched = decision.outcome.is_match(),
                "SG Ready: {}",
                decision.state,
            );
        }
        debug!("{}", decision.outcome);
        self.state = decision.state;

        self.status.send_replace(Status {
            state: decision.state,
            decision: decision.outcome.messages(),
            ingress: readings.ingress,
            egress: self.meter.egress().average(),
            generator_power: readings.generator_power,
            state_of_charge: readings.state_of_charge,
            updated_at: Some(now),
        });

        self.sink.on_state(decision.state).await?;
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.send().await;
        }
        Ok(Some(decision))
    }
}
