use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rigctl_server::config::{DEFAULT_CONFIG_PATH, ServerConfig};
use rigctl_server::server;

#[derive(Parser, Debug)]
#[command(author, version, about = "Test rig control endpoint")]
struct Args {
    /// Path to the config file (.json or .toml).
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Listen address, overriding the config file (e.g. 0.0.0.0:8080 or :8080).
    #[arg(long)]
    listen: Option<String>,

    /// Directory of front-end files served beside the control socket.
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rigctl_server=info,librigctl=info,hardware=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::load(&args.config)?;
    if let Some(listen) = args.listen {
        config.address = listen;
    }
    if let Some(dir) = args.static_dir {
        config.static_dir = Some(dir);
    }

    server::run(config).await
}
