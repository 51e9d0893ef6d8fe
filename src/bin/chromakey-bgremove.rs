//! Chroma-key background replacement CLI tool
//!
//! Command-line interface for replacing image backgrounds with a solid
//! chroma-key color using a precomputed segmentation mask.

#[cfg(feature = "cli")]
use chromakey_bgremove::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
