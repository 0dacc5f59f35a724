//! # qube — lightweight Linux container runtime
//!
//! Single binary for launching, supervising, and managing isolated process
//! workloads. Re-invoked with a sentinel first argument, the same binary
//! becomes the init trampoline inside a container's fresh namespaces.

#![allow(
    clippy::unnecessary_wraps,
    clippy::needless_pass_by_value,
    clippy::print_stdout,
    clippy::print_stderr
)]

mod commands;
mod dockerfile;
mod manifest;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    // The trampoline runs before any CLI machinery: the launch engine
    // re-execs this binary with the sentinel as argv[1].
    if std::env::args().nth(1).as_deref() == Some(qube_common::constants::INIT_SENTINEL) {
        qube_runtime::init::container_init()?;
        unreachable!("container init replaces the process image");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}
