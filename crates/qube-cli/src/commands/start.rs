//! `qube start` — Start a tracked container that is not running.

use clap::Args;
use qube_runtime::Engine;

use crate::output::{BOLD, GREEN, RESET, YELLOW};

/// Arguments for the `start` command.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Container name or pid.
    pub container: String,
}

/// Executes the `start` command.
///
/// # Errors
///
/// Returns an error for an unknown container or a failed launch.
pub fn execute(args: StartArgs) -> anyhow::Result<()> {
    let engine = Engine::with_defaults();
    match engine.start(&args.container).map_err(|e| anyhow::anyhow!("{e}"))? {
        Some(record) => {
            println!(
                "{GREEN}✓{RESET} Container {BOLD}{}{RESET} started with PID {}",
                record.name, record.pid
            );
        }
        None => {
            println!(
                "{YELLOW}Container {BOLD}{}{RESET}{YELLOW} is already running{RESET}",
                args.container
            );
        }
    }
    Ok(())
}
