//! `qube stop` — Stop a container.

use clap::Args;
use qube_runtime::Engine;

use crate::output::{BOLD, GREEN, RESET};

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container name or pid.
    pub container: String,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error for an unknown container or an undeliverable signal.
pub fn execute(args: StopArgs) -> anyhow::Result<()> {
    let engine = Engine::with_defaults();
    engine.stop(&args.container).map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{GREEN}✓{RESET} Container {BOLD}{}{RESET} stopped", args.container);
    Ok(())
}
