//! `qube snapshot` — Archive a container's rootfs.

use clap::Args;
use qube_runtime::Engine;

use crate::output::{CYAN, GREEN, RESET};

/// Arguments for the `snapshot` command.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Container name or pid.
    pub container: String,
}

/// Executes the `snapshot` command.
///
/// # Errors
///
/// Returns an error for an unknown container or a failed archive write.
pub fn execute(args: SnapshotArgs) -> anyhow::Result<()> {
    let engine = Engine::with_defaults();
    println!("{CYAN}Creating snapshot of {}...{RESET}", args.container);
    let path = engine
        .snapshot(&args.container)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{GREEN}✓{RESET} Snapshot created: {}", path.display());
    Ok(())
}
