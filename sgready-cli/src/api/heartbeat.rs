use std::time::Duration;

use reqwest::Url;

use crate::prelude::*;

/// Liveness ping to an external uptime monitor.
pub struct Client {
    inner: reqwest::Client,
    url: Url,
}

impl Client {
    pub fn new(url: Url) -> Result<Self> {
        let inner = reqwest::Client::builder().timeout(Duration::from_secs(3)).build()?;
        Ok(Self { inner, url })
    }

    #[instrument(skip_all, fields(url = %self.url))]
    pub async fn send(&self) {
        debug!("sending a heartbeat…");
        if let Err(error) = self.inner.post(self.url.clone()).send().await {
            warn!("failed to send the heartbeat: {error:#}");
        }
    }
}
