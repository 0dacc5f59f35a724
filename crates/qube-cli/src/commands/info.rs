//! `qube info` — Show one container's record and live stats.

use clap::Args;
use qube_runtime::Engine;

use crate::output::{format_uptime, BOLD, CYAN, DIM, RESET};

/// Arguments for the `info` command.
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Container name or pid.
    pub container: String,
}

/// Executes the `info` command.
///
/// # Errors
///
/// Returns an error for an unknown container.
pub fn execute(args: InfoArgs) -> anyhow::Result<()> {
    let engine = Engine::with_defaults();
    let details = engine.info(&args.container).map_err(|e| anyhow::anyhow!("{e}"))?;

    println!();
    println!("{BOLD}{CYAN}Container: {}{RESET}", details.name);
    println!("  PID: {}", details.pid);
    println!("  Status: {}", details.status);
    println!("  Image: {}", details.image);
    println!("  Working directory: {}", details.directory);
    println!("  Command: {}", details.command.join(" && "));
    println!("  Tracked at: {}", details.timestamp);
    if !details.ports.is_empty() {
        println!("  Ports: {}", details.ports);
    }
    println!("  Isolated: {}", details.isolated);
    for (host, guest) in &details.volumes {
        println!("  Volume: {host} {DIM}->{RESET} {guest}");
    }
    for entry in &details.environment {
        println!("  Env: {entry}");
    }
    if let Some(memory) = details.memory_mb {
        println!("  Memory: {memory:.1} MiB");
    }
    if let Some(cpu) = details.cpu_percent {
        println!("  CPU: {cpu:.1}%");
    }
    if let Some(uptime) = details.uptime_secs {
        println!("  Uptime: {}", format_uptime(uptime));
    }
    println!();
    Ok(())
}
