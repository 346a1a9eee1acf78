//! Cutout CLI tool
//!
//! Command-line interface for repairing segmented cutouts, cropping them to
//! their subject, and compositing drop shadows.

#[cfg(feature = "cli")]
use cutout_pipeline::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
