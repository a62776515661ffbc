use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;

use crate::{core::state::SgReadyState, prelude::*};

/// Receiver of SG Ready states.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn on_state(&self, state: SgReadyState) -> Result;
}

/// Logs every state it receives.
pub struct LogSink;

#[async_trait]
impl Sink for LogSink {
    async fn on_state(&self, state: SgReadyState) -> Result {
        info!(a = state.a(), b = state.b(), "applying {state}");
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload {
    state: SgReadyState,
    a: bool,
    b: bool,
}

impl From<SgReadyState> for WebhookPayload {
    fn from(state: SgReadyState) -> Self {
        Self { state, a: state.a(), b: state.b() }
    }
}

/// Posts every state as JSON to the configured URL.
pub struct WebhookSink {
    inner: reqwest::Client,
    url: Url,
}

impl WebhookSink {
    pub fn new(url: Url) -> Result<Self> {
        let inner = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { inner, url })
    }
}

#[async_trait]
impl Sink for WebhookSink {
    #[instrument(skip_all, fields(url = %self.url, state = state.name()))]
    async fn on_state(&self, state: SgReadyState) -> Result {
        self.inner
            .post(self.url.clone())
            .json(&WebhookPayload::from(state))
            .send()
            .await
            .with_context(|| format!("failed to post the state to `{}`", self.url))?
            .error_for_status()?;
        debug!("posted");
        Ok(())
    }
}

/// Forwards every state to each of the sinks in order.
///
/// A failing sink does not prevent the remaining ones from receiving the state.
pub struct Fanout(pub Vec<Arc<dyn Sink>>);

#[async_trait]
impl Sink for Fanout {
    async fn on_state(&self, state: SgReadyState) -> Result {
        for sink in &self.0 {
            if let Err(error) = sink.on_state(state).await {
                error!("failed to apply {state}: {error:#}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use parking_lot::Mutex;

    use super::*;

    /// Records every received state.
    #[derive(Default)]
    pub struct RecordingSink(pub Mutex<Vec<SgReadyState>>);

    impl RecordingSink {
        pub fn states(&self) -> Vec<SgReadyState> {
            self.0.lock().clone()
        }
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn on_state(&self, state: SgReadyState) -> Result {
            self.0.lock().push(state);
            Ok(())
        }
    }

    pub struct FailingSink;

    #[async_trait]
    impl Sink for FailingSink {
        async fn on_state(&self, _state: SgReadyState) -> Result {
            bail!("relay is unreachable")
        }
    }
}
