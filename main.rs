//! HDR capture auto-converter - console binary

use anyhow::Result;
use clap::Parser;
use sdr_autoconvert::cli::{log_file_for, CliArgs};
use sdr_autoconvert::{AppConfig, ConsoleApp, JsonConfigStore, WatchController};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let mut config = AppConfig::load(&args.config);
    let overridden = args.apply_to(&mut config);

    args.setup_logging(log_file_for(&config).as_deref())?;
    info!("sdr-autoconvert v{}", sdr_autoconvert::VERSION);

    if overridden {
        if let Err(e) = config.save(&args.config) {
            warn!("Error saving config: {}", e);
        }
    }

    let controller = WatchController::new(config.conversion.clone())
        .with_session_store(Arc::new(JsonConfigStore::new(&args.config)));

    if args.no_autostart {
        info!("Paused; type 'start' to begin watching");
    } else if let Err(e) = controller.start(config.session()).await {
        error!("Cannot start watching: {}", e);
    }

    let app = ConsoleApp::new(controller, config, args.config.clone());
    let reason = app.run().await;

    info!("Exiting: {:?}", reason);
    std::process::exit(reason.exit_code());
}
