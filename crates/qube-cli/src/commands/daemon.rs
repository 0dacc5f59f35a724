//! `qube daemon` — Run the supervisor and its control surface.

use std::sync::Arc;

use clap::Args;
use qube_daemon::Supervisor;
use qube_runtime::Engine;

/// Arguments for the `daemon` command.
#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Verbose supervision reporting.
    #[arg(long)]
    pub debug: bool,
}

/// Executes the `daemon` command.
///
/// # Errors
///
/// Returns an error if the async runtime cannot start or the supervisor
/// fails during startup.
pub fn execute(args: DaemonArgs) -> anyhow::Result<()> {
    tracing::info!(debug = args.debug, "starting qube daemon");
    let engine = Arc::new(Engine::with_defaults());
    let supervisor = Arc::new(Supervisor::new(engine, args.debug));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(supervisor.run())
}
