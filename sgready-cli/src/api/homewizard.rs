use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use sgready_quantities::Watts;

use crate::prelude::*;

/// HomeWizard P1 meter local API client.
pub struct Client {
    inner: reqwest::Client,
    url: Url,
}

impl Client {
    #[instrument(skip_all, fields(url = %url))]
    pub fn new(url: Url) -> Result<Self> {
        let inner = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { inner, url })
    }

    #[instrument(skip_all, fields(url = %self.url))]
    pub async fn get_measurement(&self) -> Result<Measurement> {
        let measurement: Measurement = self
            .inner
            .get(self.url.clone())
            .send()
            .await
            .with_context(|| format!("failed to request a power measurement from `{}`", self.url))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("failed to deserialize the response from `{}`", self.url))?;
        debug!(active_power = ?measurement.active_power);
        Ok(measurement)
    }
}

#[must_use]
#[derive(Copy, Clone, Deserialize)]
pub struct Measurement {
    /// Net power at the grid connection point, positive when importing.
    #[serde(rename = "active_power_w")]
    pub active_power: Watts,
}

impl Measurement {
    pub fn ingress(self) -> Watts {
        self.active_power.max(Watts::ZERO)
    }

    pub fn egress(self) -> Watts {
        (-self.active_power).max(Watts::ZERO)
    }
}
