use std::sync::Arc;

use clap::Parser;
use reqwest::Url;

use crate::{
    api::heartbeat,
    debounce::DebounceActuator,
    prelude::*,
    sink::{Fanout, LogSink, Sink, WebhookSink},
};

#[derive(Parser)]
pub struct OutputArgs {
    /// Minimal time between two applied states, zero disables the debouncing.
    #[clap(long, env = "DEBOUNCE", default_value = "5min")]
    pub debounce: humantime::Duration,

    /// Receives every applied state as JSON.
    #[clap(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<Url>,

    /// Pinged after every evaluated tick.
    #[clap(long = "heartbeat-url", env = "HEARTBEAT_URL")]
    pub heartbeat_url: Option<Url>,
}

impl OutputArgs {
    /// Build the debounced sink chain.
    pub fn actuator(&self) -> Result<DebounceActuator> {
        let mut sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(LogSink)];
        if let Some(url) = &self.webhook_url {
            sinks.push(Arc::new(WebhookSink::new(url.clone())?));
        }
        Ok(DebounceActuator::new(self.debounce.into(), Arc::new(Fanout(sinks))))
    }

    pub fn heartbeat(&self) -> Result<Option<heartbeat::Client>> {
        self.heartbeat_url.clone().map(heartbeat::Client::new).transpose()
    }
}
