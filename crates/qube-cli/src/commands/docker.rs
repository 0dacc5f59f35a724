//! `qube docker` — Convert a Dockerfile into a qube.yml and build it.
//!
//! The converted container is tracked with pid -1; the daemon launches it
//! on its next scan.

use std::path::Path;

use clap::Args;
use qube_common::types::PID_EXITED;
use qube_runtime::{ContainerRecord, Engine};

use crate::dockerfile;
use crate::output::{BOLD, GREEN, RESET};

/// Arguments for the `docker` command.
#[derive(Args, Debug)]
pub struct DockerArgs {
    /// Path to the Dockerfile to convert.
    pub dockerfile: String,
}

/// Executes the `docker` command.
///
/// # Errors
///
/// Returns an error for a missing Dockerfile, an unobtainable base image,
/// or a failed build.
pub fn execute(args: DockerArgs) -> anyhow::Result<()> {
    let dockerfile_path = Path::new(&args.dockerfile);
    if !dockerfile_path.exists() {
        return Err(anyhow::anyhow!("Dockerfile not found: {}", args.dockerfile));
    }

    let config = dockerfile::parse(dockerfile_path)?;
    if config.from.is_empty() {
        return Err(anyhow::anyhow!("Dockerfile has no FROM directive"));
    }

    let work_dir = dockerfile_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let manifest_path = work_dir.join("qube.yml");
    std::fs::write(&manifest_path, dockerfile::to_manifest_yaml(&config)?)?;
    println!(
        "{GREEN}✓{RESET} Converted Dockerfile to {}",
        manifest_path.display()
    );

    let engine = Engine::with_defaults();
    engine
        .images()
        .validate(&config.from)
        .map_err(|e| anyhow::anyhow!("invalid base image '{}': {e}", config.from))?;

    let name = engine
        .build(None, &work_dir, &config.from)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let record = ContainerRecord {
        name: name.clone(),
        pid: PID_EXITED,
        work_dir: work_dir.display().to_string(),
        command: dockerfile::command_fragments(&config),
        created_at: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
        image: config.from.clone(),
        ports: config.expose.join(","),
        isolated: true,
        volumes: Vec::new(),
        env: config
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect(),
    };
    engine.ledger().insert(&record).map_err(|e| anyhow::anyhow!("{e}"))?;

    println!(
        "{GREEN}✓{RESET} Container {BOLD}{name}{RESET} built; the daemon will start it on its next scan"
    );
    Ok(())
}
