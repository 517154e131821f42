//! Standalone room server binary
//!
//! Usage: cargo run -p duelroom_web --bin duelroom-server -- --static-dir public

use clap::Parser;
use duelroom_web::{init_logging, AppSettings, LogFormat, ServerConfig, WebServer, DEFAULT_PORT};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "duelroom-server", about = "Two-player tic-tac-toe room server")]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind to
    #[arg(short, long, env = "SERVER_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory served at the HTTP root
    #[arg(short = 'd', long, default_value = "public")]
    static_dir: PathBuf,

    /// Seconds between both players readying up and the match starting
    #[arg(long, default_value_t = AppSettings::default().countdown_secs)]
    countdown_secs: u64,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    init_logging(if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    })?;

    let settings = AppSettings {
        countdown_secs: args.countdown_secs,
        ..AppSettings::default()
    };
    let config = ServerConfig::new(args.host, args.port, args.static_dir);

    tracing::info!(
        host = config.host(),
        port = config.port(),
        static_dir = %config.static_dir().display(),
        countdown_secs = settings.countdown_secs,
        "starting duelroom server"
    );

    let server = WebServer::new(config, settings)?;
    let handle = server.start().await?;
    tracing::info!(address = %handle.address(), "server running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down server");
    handle.shutdown().await?;
    tracing::info!("server stopped cleanly");

    Ok(())
}
