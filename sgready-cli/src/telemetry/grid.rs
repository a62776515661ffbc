use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use sgready_quantities::Watts;
use tokio::time::{MissedTickBehavior, interval};

use crate::{
    api::homewizard,
    prelude::*,
    statistics::{Statistics, StatisticsTracker},
    telemetry::{Liveness, PowerMeter},
};

/// Grid connection point metered by a HomeWizard P1 meter.
#[must_use]
pub struct GridMeter {
    ingress: StatisticsTracker<Watts>,
    egress: StatisticsTracker<Watts>,
    liveness: Liveness,
}

impl GridMeter {
    pub const fn new(averaging_window: TimeDelta, staleness: TimeDelta) -> Self {
        Self {
            ingress: StatisticsTracker::new(averaging_window),
            egress: StatisticsTracker::new(averaging_window),
            liveness: Liveness::new(staleness),
        }
    }

    pub fn record(&self, measurement: homewizard::Measurement, now: DateTime<Utc>) {
        self.ingress.update(measurement.ingress(), now);
        self.egress.update(measurement.egress(), now);
        self.liveness.mark(now);
    }

    /// Poll the meter forever.
    #[instrument(skip_all, name = "grid")]
    pub async fn poll(&self, client: homewizard::Client, query_interval: Duration) {
        let mut interval = interval(query_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match client.get_measurement().await {
                Ok(measurement) => self.record(measurement, Utc::now()),
                Err(error) => warn!("failed to read the grid meter: {error:#}"),
            }
        }
    }
}

impl PowerMeter for GridMeter {
    fn ingress(&self) -> &dyn Statistics<Watts> {
        &self.ingress
    }

    fn egress(&self) -> &dyn Statistics<Watts> {
        &self.egress
    }

    fn has_data(&self) -> bool {
        self.liveness.is_fresh()
    }
}
