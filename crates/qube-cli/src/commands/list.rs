//! `qube list` — List tracked containers with live stats.

use clap::Args;
use qube_common::types::ContainerStatus;
use qube_runtime::Engine;

use crate::output::{
    format_memory_mb, format_uptime, BOLD, CYAN, DIM, GREEN, MAGENTA, RED, RESET, YELLOW,
};

/// Arguments for the `list` command.
#[derive(Args, Debug)]
pub struct ListArgs {}

/// Executes the `list` command.
///
/// # Errors
///
/// Returns an error if the ledger cannot be read.
pub fn execute(_args: ListArgs) -> anyhow::Result<()> {
    let engine = Engine::with_defaults();
    let containers = engine.list().map_err(|e| anyhow::anyhow!("{e}"))?;

    if containers.is_empty() {
        println!();
        println!("  {DIM}No containers running{RESET}");
        println!("  {CYAN}→ Use 'qube run' to start a container{RESET}");
        println!();
        return Ok(());
    }

    println!();
    println!("  {BOLD}CONTAINERS{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(100));

    for container in &containers {
        let (icon, color) = match container.status {
            ContainerStatus::Running => ("●", GREEN),
            ContainerStatus::Exited => ("▲", YELLOW),
            ContainerStatus::Stopped => ("■", RED),
        };

        let memory = container
            .memory_mb
            .map_or_else(|| "N/A".to_owned(), format_memory_mb);
        let cpu = container
            .cpu_percent
            .map_or_else(|| "N/A".to_owned(), |pct| format!("{pct:.1}%"));
        let uptime = container
            .uptime_secs
            .map_or_else(|| "N/A".to_owned(), format_uptime);

        println!(
            "  {icon} {color}{:<8}{RESET} {BOLD}{:<15}{RESET} PID: {:<8} Mem: {:<8} CPU: {:<8} Uptime: {uptime}",
            container.status, container.name, container.pid, memory, cpu,
        );

        let mut command = container.command.join(" && ");
        if command.len() > 60 {
            command.truncate(57);
            command.push_str("...");
        }
        println!("    {DIM}cmd:{RESET} {CYAN}{command}{RESET}");

        if !container.ports.is_empty() && container.ports != "none" {
            println!("    {DIM}ports:{RESET} {MAGENTA}{}{RESET}", container.ports);
        }
        if container.isolated {
            println!("    {DIM}isolation:{RESET} {YELLOW}enabled{RESET}");
        }
        println!();
    }

    Ok(())
}
