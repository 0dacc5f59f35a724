//! CLI command definitions and dispatch.

pub mod daemon;
pub mod delete;
pub mod docker;
pub mod eval;
pub mod images;
pub mod info;
pub mod list;
pub mod pull;
pub mod run;
pub mod snapshot;
pub mod start;
pub mod stop;

use clap::{Parser, Subcommand};

use crate::output::{RED, RESET};

/// qube — lightweight Linux container runtime.
#[derive(Parser, Debug)]
#[command(name = "qube", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the supervising daemon and its control surface.
    Daemon(daemon::DaemonArgs),
    /// Launch a container from flags, or from qube.yml when present.
    Run(run::RunArgs),
    /// List tracked containers with live stats.
    List(list::ListArgs),
    /// Show one container's record and live stats.
    Info(info::InfoArgs),
    /// Stop a container (SIGKILL; never restarted).
    Stop(stop::StopArgs),
    /// Start a tracked container that is not running.
    Start(start::StartArgs),
    /// Delete a container and all of its state.
    Delete(delete::DeleteArgs),
    /// Run a shell command inside a running container.
    Eval(eval::EvalArgs),
    /// Archive a container's rootfs into its working directory.
    Snapshot(snapshot::SnapshotArgs),
    /// Convert a Dockerfile into a qube.yml and build it.
    Docker(docker::DockerArgs),
    /// Pull an image from the hub.
    Pull(pull::PullArgs),
    /// List locally cached images.
    Images(images::ImagesArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Never returns an error to `main`; failures print a red diagnostic and
/// exit with code 1.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let result = match cli.command {
        Command::Daemon(args) => daemon::execute(args),
        Command::Run(args) => run::execute(args),
        Command::List(args) => list::execute(args),
        Command::Info(args) => info::execute(args),
        Command::Stop(args) => stop::execute(args),
        Command::Start(args) => start::execute(args),
        Command::Delete(args) => delete::execute(args),
        Command::Eval(args) => eval::execute(args),
        Command::Snapshot(args) => snapshot::execute(args),
        Command::Docker(args) => docker::execute(args),
        Command::Pull(args) => pull::execute(args),
        Command::Images(args) => images::execute(args),
    };

    if let Err(e) = result {
        eprintln!("{RED}Error:{RESET} {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
