mod output;
mod policy;
mod telemetry;

use clap::Parser;

pub use self::{output::OutputArgs, policy::PolicyArgs, telemetry::TelemetryArgs};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[clap(flatten)]
    pub policy: PolicyArgs,

    #[clap(flatten)]
    pub telemetry: TelemetryArgs,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_command() {
        Args::command().debug_assert();
    }
}
