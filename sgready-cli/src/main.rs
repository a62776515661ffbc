#![allow(clippy::doc_markdown)]
#![doc = include_str!("../../README.md")]

mod api;
mod cli;
mod control;
mod core;
mod debounce;
mod prelude;
mod sink;
mod statistics;
mod telemetry;

use std::sync::Arc;

use clap::{Parser, crate_version};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::{
    api::homewizard,
    cli::Args,
    control::{ControlLoop, Status},
    prelude::*,
    telemetry::{
        generator::{Inverter, Inverters},
        grid::GridMeter,
    },
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().without_time().compact().with_env_filter(filter).init();
    info!(version = crate_version!(), "starting…");

    let args = Args::parse();
    let policy = args.policy.build()?;
    let query_interval = args.telemetry.query_interval()?;
    let averaging_window = args.telemetry.averaging_window()?;
    let staleness = args.telemetry.staleness()?;

    let meter = Arc::new(GridMeter::new(averaging_window, staleness));
    let meter_client = homewizard::Client::new(args.telemetry.meter_url.clone())?;
    tokio::spawn({
        let meter = meter.clone();
        async move { meter.poll(meter_client, query_interval).await }
    });

    let mut inverters = Vec::new();
    for endpoint in args.telemetry.inverter_endpoints() {
        let inverter = Arc::new(Inverter::new(averaging_window, staleness));
        tokio::spawn({
            let inverter = inverter.clone();
            async move { inverter.poll(endpoint, query_interval).await }
        });
        inverters.push(inverter);
    }

    let actuator = args.output.actuator()?;
    let control = ControlLoop::builder()
        .generator(Arc::new(Inverters::new(inverters)))
        .meter(meter)
        .policy(policy)
        .sink(Arc::new(actuator.clone()))
        .maybe_heartbeat(args.output.heartbeat()?)
        .build();
    tokio::spawn(log_status(control.subscribe()));
    control.run(query_interval, shutdown_signal()).await;

    if !actuator.is_synchronized() {
        warn!(pending = ?actuator.pending(), "abandoning the postponed state");
    }
    info!(current = ?actuator.current(), "stopped");
    Ok(())
}

async fn log_status(mut receiver: watch::Receiver<Status>) {
    while receiver.changed().await.is_ok() {
        match serde_json::to_string(&*receiver.borrow_and_update()) {
            Ok(status) => debug!(%status, "updated"),
            Err(error) => warn!("failed to serialize the status: {error:#}"),
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {error:#}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!("failed to install the SIGTERM handler: {error:#}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
