//! `qube images` — List locally cached images.

use clap::Args;
use qube_runtime::Engine;

use crate::output::{BOLD, DIM, RESET};

/// Arguments for the `images` command.
#[derive(Args, Debug)]
pub struct ImagesArgs {}

/// Executes the `images` command.
///
/// # Errors
///
/// Returns an error if the image cache cannot be read.
pub fn execute(_args: ImagesArgs) -> anyhow::Result<()> {
    let engine = Engine::with_defaults();
    let specs = engine.images().list().map_err(|e| anyhow::anyhow!("{e}"))?;

    if specs.is_empty() {
        println!("{DIM}No images cached. Use 'qube pull <user>:<image>:<version>'.{RESET}");
        return Ok(());
    }

    println!("{BOLD}{:<40} {:>10}{RESET}", "IMAGE", "SIZE");
    for spec in specs {
        let path = engine.images().archive_path(&spec);
        #[allow(clippy::cast_precision_loss)]
        let size_mb = std::fs::metadata(&path)
            .map(|m| m.len() as f64 / 1_048_576.0)
            .unwrap_or(0.0);
        println!("{:<40} {size_mb:>9.1}M", spec.to_string());
    }
    Ok(())
}
