//! `qube pull` — Pull an image from the hub.

use clap::Args;
use qube_image::ImageSpec;
use qube_runtime::Engine;

use crate::output::{CYAN, GREEN, RESET};

/// Arguments for the `pull` command.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Image to pull, `user:image:version`.
    pub image: String,
}

/// Executes the `pull` command.
///
/// # Errors
///
/// Returns an error for a malformed spec or a failed download.
pub fn execute(args: PullArgs) -> anyhow::Result<()> {
    let spec = ImageSpec::parse(&args.image)
        .map_err(|e| anyhow::anyhow!("{e}\nExample: qube pull Voyrox:nodejs:1.1.0"))?;

    println!(
        "{CYAN}Pulling image {}/{} version {} from the hub...{RESET}",
        spec.user, spec.name, spec.version
    );

    let engine = Engine::with_defaults();
    let path = engine
        .images()
        .ensure(&args.image)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!(
        "{GREEN}✓{RESET} Pulled {} to {}",
        spec,
        path.display()
    );
    Ok(())
}
