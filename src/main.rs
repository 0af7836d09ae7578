//! Clock generator control panel.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                     EVENT LOOP TASK                  │
//!  TCP client      │  ┌──────────┐   ┌─────────────┐   ┌──────────────┐   │
//!  ───────────────▶│  │ listener │──▶│   socket    │──▶│  HttpEngine  │   │
//!                  │  │  accept  │   │  transport  │   │ conn FSM     │   │
//!                  │  └──────────┘   └─────────────┘   └──────┬───────┘   │
//!                  │                        ▲                 │           │
//!                  │                        │          ┌──────▼───────┐   │
//!  ◀───────────────┤     chunks under send capacity    │ routing +    │   │
//!  HTTP response   │                        │          │ handlers     │   │
//!                  │                 ┌──────┴──────┐   └──────┬───────┘   │
//!                  │                 │  response   │◀─────────┤           │
//!                  │                 │  stream     │   ┌──────▼───────┐   │
//!                  │                 └─────────────┘   │ device:      │   │
//!                  │                                   │ signal/morse │   │
//!                  │   poll tick ───▶ engine           └──────────────┘   │
//!                  │   morse timer ─▶ device                              │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use clockgen_panel::config::{apply_bind_override, load_config, PanelConfig};
use clockgen_panel::lifecycle::{signals, startup, Shutdown};
use clockgen_panel::net::Listener;
use clockgen_panel::observability::logging;
use clockgen_panel::PanelServer;

#[derive(Parser)]
#[command(name = "clockgen-panel")]
#[command(about = "HTTP control panel for a programmable clock generator", version)]
struct Args {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => PanelConfig::default(),
    };
    let config = apply_bind_override(config, args.bind)?;

    logging::init_logging(&config.observability.log_level);

    tracing::info!("{} v{} starting", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        poll_interval_ms = config.engine.poll_interval_ms,
        max_stalled_polls = config.engine.max_stalled_polls,
        "Configuration loaded"
    );

    let device = startup::build_device(&config.device);
    startup::start_metrics(&config.observability);

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = PanelServer::new(config, device, shutdown);
    server.run(listener).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
