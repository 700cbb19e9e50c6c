use std::{net::SocketAddr, time::Duration};

use clap::{Parser, ValueEnum};
use gatewayd::{handler, webserver, Adapter};
use http::Uri;
use upstream::Upstream;

/// API gateway adapter
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// where events come from
    #[arg(short = 'm', long, env = "GATEWAYD_MODE", value_enum, default_value_t = Mode::Lambda)]
    mode: Mode,

    /// application url
    #[arg(short = 'u', long, env = "UPSTREAM_URL")]
    upstream_url: Uri,

    /// application timeout in seconds
    #[arg(short = 't', long, env = "UPSTREAM_TIMEOUT", default_value_t = 30)]
    upstream_timeout: u64,

    /// local webserver bind address
    #[arg(short = 'a', long, env = "GATEWAYD_ADDR", default_value_t = SocketAddr::from(([0, 0, 0, 0], 3000)))]
    addr: SocketAddr,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// gateway events from the Lambda runtime API
    Lambda,
    /// plain HTTP on a local socket
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let upstream = Upstream::new(args.upstream_url, Duration::from_secs(args.upstream_timeout))?;
    let adapter = Adapter::new(upstream);

    match args.mode {
        Mode::Lambda => handler::run(adapter)
            .await
            .map_err(|err| anyhow::anyhow!(err)),
        Mode::Serve => webserver::run(args.addr, adapter).await,
    }
}
