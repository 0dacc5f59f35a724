//! `qube eval` — Run a shell inside a running container.
//!
//! Unlike the WebSocket surface, the CLI inherits the terminal's stdio so
//! interactive shells work.

use clap::Args;
use qube_runtime::lifecycle::nsenter_command;
use qube_runtime::Engine;

/// Arguments for the `eval` command.
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Container name or pid.
    pub container: String,

    /// Shell command to run; defaults to an interactive `sh`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Executes the `eval` command.
///
/// # Errors
///
/// Returns an error for an unknown or non-running container, or when
/// `nsenter` cannot be spawned.
pub fn execute(args: EvalArgs) -> anyhow::Result<()> {
    let engine = Engine::with_defaults();
    let record = engine
        .find_record(&args.container)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    if record.pid <= 0 {
        return Err(anyhow::anyhow!("container {} is not running", record.name));
    }

    let command = if args.command.is_empty() {
        "sh".to_owned()
    } else {
        args.command.join(" ")
    };

    let rootfs = engine.config().rootfs_dir(&record.name);
    let status = nsenter_command(record.pid, &rootfs, &command)
        .stdin(std::process::Stdio::inherit())
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .status()?;

    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}
