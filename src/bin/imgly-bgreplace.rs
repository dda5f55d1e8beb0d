//! IMG.LY Background Replacement server
//!
//! Runs the HTTP and WebSocket API of the imgly-bgreplace library.

#[cfg(feature = "cli")]
use imgly_bgreplace::cli;

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
