//! Huddle serve command for running the chat server
//!
//! The serve command runs the huddle server which provides:
//! - WebSocket chat relay on `/ws`
//! - Health check on `/api/health`
//! - Optional static hosting of the client bundle

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use huddle_server::HuddleServer;
use tracing::info;

use crate::config::{ConfigLoader, HuddleConfig};

/// Arguments for the serve command
///
/// Flags override values from config files.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Directory of the pre-built client bundle to serve
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Seconds between liveness pings
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,
}

impl ServeArgs {
    /// Apply command-line overrides on top of loaded configuration
    fn apply(&self, mut config: HuddleConfig) -> HuddleConfig {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(dir) = &self.static_dir {
            config.server.static_dir = Some(dir.clone());
        }
        if let Some(secs) = self.sweep_interval_secs {
            config.room.sweep_interval_secs = secs;
        }
        config
    }
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = args.apply(ConfigLoader::load()?);
    let server_config = config.to_server_config();

    info!(
        "Starting huddle server on {}:{}",
        server_config.host, server_config.port
    );

    let server = HuddleServer::new(server_config);
    server.run().await.map_err(Into::into)
}
