//! `qube delete` — Delete a container and all of its state.

use clap::Args;
use qube_runtime::Engine;

use crate::output::{BOLD, GREEN, RESET};

/// Arguments for the `delete` command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Container name or pid.
    pub container: String,
}

/// Executes the `delete` command.
///
/// # Errors
///
/// Returns an error for an unknown container or a failed tree removal.
pub fn execute(args: DeleteArgs) -> anyhow::Result<()> {
    let engine = Engine::with_defaults();
    let name = engine.delete(&args.container).map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{GREEN}✓{RESET} Container {BOLD}{name}{RESET} deleted");
    Ok(())
}
