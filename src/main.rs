use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use hetzner_provider::{serve_on_with_options, serve_with_options, HetznerProvider, ServeOptions};

/// Hetzner DNS provider plugin.
///
/// Started by the host; prints the handshake line on stdout and serves gRPC
/// until SIGTERM or SIGINT.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Log at debug level unless RUST_LOG is set.
    #[arg(long)]
    debug: bool,

    /// Listen on this address instead of an ephemeral localhost port.
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Seconds in-flight requests may run after a shutdown signal.
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    shutdown_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), hetzner_provider::ProviderError> {
    let cli = Cli::parse();
    hetzner_provider::init_logging(cli.debug);

    let options = ServeOptions::new().with_shutdown_timeout(Duration::from_secs(cli.shutdown_timeout));
    let provider = HetznerProvider::new();

    match cli.listen {
        Some(addr) => serve_on_with_options(provider, addr, options).await,
        None => serve_with_options(provider, options).await,
    }
}
