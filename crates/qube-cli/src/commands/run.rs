//! `qube run` — Launch a container.
//!
//! With no `--cmd` and a `qube.yml` in the working directory, the manifest
//! drives the launch instead of the flags.

use std::path::Path;

use clap::Args;
use qube_runtime::{Engine, LaunchSpec};

use crate::manifest;
use crate::output::{BOLD, CYAN, DIM, GREEN, RESET, YELLOW};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image to launch, `user:image:version`.
    #[arg(long)]
    pub image: Option<String>,

    /// Advisory comma-separated port list.
    #[arg(long)]
    pub ports: Option<String>,

    /// Workload environment entry; repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Bind mount; repeatable.
    #[arg(long = "volume", value_name = "/host/path:/container/path")]
    pub volumes: Vec<String>,

    /// Launch inside a fresh network namespace.
    #[arg(long)]
    pub isolated: bool,

    /// Verbose launch reporting.
    #[arg(long)]
    pub debug: bool,

    /// Shell command to run in the container.
    #[arg(long)]
    pub cmd: Option<String>,
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error for missing/invalid flags, an unobtainable image, or a
/// failed launch.
pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    if args.cmd.is_none() && Path::new("qube.yml").exists() {
        return run_from_manifest(Path::new("qube.yml"));
    }

    let Some(cmd) = args.cmd else {
        return Err(anyhow::anyhow!(
            "usage: qube run [--image <image>] [--ports <ports>] [--env KEY=VALUE] \
             [--volume /host:/container] [--isolated] [--debug] --cmd \"<command>\""
        ));
    };
    let Some(image) = args.image else {
        return Err(anyhow::anyhow!("--image must be specified"));
    };

    for entry in &args.env {
        if !entry.contains('=') {
            return Err(anyhow::anyhow!(
                "--env argument must be in the format KEY=VALUE, got '{entry}'"
            ));
        }
    }
    let volumes = parse_volumes(&args.volumes)?;

    let engine = Engine::with_defaults();
    engine
        .images()
        .validate(&image)
        .map_err(|e| anyhow::anyhow!("invalid image '{image}': {e}"))?;

    let work_dir = std::env::current_dir()?;
    let spec = LaunchSpec {
        existing_name: None,
        work_dir,
        command: vec![cmd],
        debug: args.debug,
        image,
        ports: args.ports.unwrap_or_default(),
        isolated: args.isolated,
        volumes,
        env: args.env,
    };
    launch(&engine, &spec)
}

fn run_from_manifest(path: &Path) -> anyhow::Result<()> {
    let manifest = manifest::load(path)?;
    let container = manifest.container;

    let engine = Engine::with_defaults();
    engine
        .images()
        .validate(&container.system)
        .map_err(|e| anyhow::anyhow!("invalid image '{}': {e}", container.system))?;

    let spec = LaunchSpec {
        existing_name: None,
        work_dir: std::env::current_dir()?,
        command: vec![container.cmd.joined()],
        debug: container.debug,
        image: container.system,
        ports: container.ports.join(","),
        isolated: container.isolated,
        volumes: container
            .volumes
            .into_iter()
            .map(|v| (v.host_path, v.container_path))
            .collect(),
        env: container.environment.entries(),
    };
    launch(&engine, &spec)
}

fn launch(engine: &Engine, spec: &LaunchSpec) -> anyhow::Result<()> {
    let record = engine.run(spec).map_err(|e| anyhow::anyhow!("{e}"))?;

    println!();
    println!(
        "  {GREEN}✓{RESET} Container {BOLD}{}{RESET} started with PID {}",
        record.name, record.pid
    );
    println!("    {DIM}image:{RESET} {CYAN}{}{RESET}", record.image);
    println!("    {DIM}workdir:{RESET} {}", record.work_dir);
    println!("    {DIM}command:{RESET} {}", record.command.join(" && "));
    if !record.ports.is_empty() {
        println!("    {DIM}ports:{RESET} {}", record.ports);
    }
    if record.isolated {
        println!("    {DIM}network:{RESET} {YELLOW}isolated{RESET}");
    }
    println!();
    Ok(())
}

fn parse_volumes(raw: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    raw.iter()
        .map(|entry| {
            entry
                .split_once(':')
                .map(|(host, guest)| (host.to_owned(), guest.to_owned()))
                .filter(|(host, guest)| !host.is_empty() && !guest.is_empty())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "--volume argument must be in the format /host/path:/container/path, got '{entry}'"
                    )
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volumes_parse_host_and_guest() {
        let parsed = parse_volumes(&["/srv/data:/data".into()]).expect("parse");
        assert_eq!(parsed, vec![("/srv/data".into(), "/data".into())]);
    }

    #[test]
    fn volumes_without_separator_fail() {
        assert!(parse_volumes(&["/srv/data".into()]).is_err());
        assert!(parse_volumes(&[":/data".into()]).is_err());
    }
}
