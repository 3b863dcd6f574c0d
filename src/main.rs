//! ZBProxy manager.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────────┐
//!                      │                 ZBPROXY MANAGER                    │
//!                      │                                                    │
//!   API client         │  ┌─────────┐   ┌─────────┐   ┌────────────────┐   │
//!   ───────────────────┼─▶│   net   │──▶│  http   │──▶│   document     │───┼──▶ ZBProxy.json
//!                      │  │listener │   │ router  │   │  path get/set  │   │
//!                      │  └─────────┘   └────┬────┘   └────────────────┘   │
//!                      │                     │                              │
//!                      │                     ├──────▶┌────────────────┐     │
//!                      │                     │       │  supervisor    │─────┼──▶ ZBProxy process
//!                      │                     │       │ start/stop/... │◀────┼─── stdout/stderr
//!                      │                     │       └───────┬────────┘     │       → out.log
//!                      │                     │               ▼              │
//!                      │                     │       ┌────────────────┐     │
//!                      │                     │       │    status      │     │
//!                      │                     │       │ cpu / memory   │     │
//!                      │                     │       └────────────────┘     │
//!                      │                     └──────▶┌────────────────┐     │
//!                      │                             │     logs       │◀────┼─── *.log
//!                      │                             └────────────────┘     │
//!                      │                                                    │
//!                      │  config (manager.toml) · observability · lifecycle │
//!                      └───────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use zbproxy_manager::config;
use zbproxy_manager::lifecycle;
use zbproxy_manager::observability::logging;

#[derive(Parser)]
#[command(name = "zbproxy-manager", version, about = "Management API for ZBProxy")]
struct Args {
    /// Manager settings (TOML). A missing file means all defaults.
    #[arg(short, long, default_value = "manager.toml")]
    config: PathBuf,

    /// Override `[listener].bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = config::load_or_default(&args.config)?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        bind_address = %config.listener.bind_address,
        executable = %config.proxy.executable_path().display(),
        document = %config.proxy.config_path().display(),
        "zbproxy-manager starting"
    );

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
