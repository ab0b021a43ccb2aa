//! Console front-end: reads commands from stdin and drives the controller
//! until Ctrl+C or `quit`.

use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::select;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::controller::WatchController;

/// Why the event loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInterrupt,
    /// `quit` or `exit`
    UserCommand,
}

impl ShutdownReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::UserInterrupt => 130,
            ShutdownReason::UserCommand => 0,
        }
    }
}

/// A line typed on the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Toggle,
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(ConsoleCommand::Start),
            "stop" | "pause" => Ok(ConsoleCommand::Stop),
            "toggle" => Ok(ConsoleCommand::Toggle),
            "status" => Ok(ConsoleCommand::Status),
            "help" | "?" => Ok(ConsoleCommand::Help),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

const HELP: &str = "Available commands: start, stop (pause), toggle, status, help, quit (exit)";

/// Owns the controller and the configuration record for the process lifetime
pub struct ConsoleApp {
    controller: WatchController,
    config: AppConfig,
    config_path: PathBuf,
}

impl ConsoleApp {
    pub fn new(controller: WatchController, config: AppConfig, config_path: PathBuf) -> Self {
        Self {
            controller,
            config,
            config_path,
        }
    }

    pub fn controller(&self) -> &WatchController {
        &self.controller
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run until Ctrl+C or a quit command on stdin
    pub async fn run(self) -> ShutdownReason {
        let stdin = BufReader::new(tokio::io::stdin());
        self.run_with(stdin).await
    }

    /// Run against any line source; end of input leaves only Ctrl+C
    pub async fn run_with<R: AsyncBufRead + Unpin>(mut self, input: R) -> ShutdownReason {
        let mut lines = input.lines();
        let mut input_open = true;

        let reason = loop {
            select! {
                interrupted = signal::ctrl_c() => {
                    if let Err(e) = interrupted {
                        error!("Cannot listen for Ctrl+C: {}", e);
                    }
                    info!("Received Ctrl+C, shutting down");
                    break ShutdownReason::UserInterrupt;
                }

                line = lines.next_line(), if input_open => match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match line.parse::<ConsoleCommand>() {
                        Ok(command) => {
                            if let Some(reason) = self.handle_command(command).await {
                                break reason;
                            }
                        }
                        Err(e) => info!("{}. {}", e, HELP),
                    },
                    Ok(None) => input_open = false,
                    Err(e) => {
                        warn!("Console input failed: {}", e);
                        input_open = false;
                    }
                },
            }
        };

        self.shutdown().await;
        reason
    }

    /// Apply one command; returns a reason when the loop should end
    pub async fn handle_command(&mut self, command: ConsoleCommand) -> Option<ShutdownReason> {
        match command {
            ConsoleCommand::Start => {
                if let Err(e) = self.controller.start(self.config.session()).await {
                    error!("Cannot start: {}", e);
                }
            }
            ConsoleCommand::Stop => {
                if let Err(e) = self.controller.stop().await {
                    error!("Cannot stop: {}", e);
                }
            }
            ConsoleCommand::Toggle => {
                if let Err(e) = self.controller.toggle(self.config.session()).await {
                    error!("Cannot toggle: {}", e);
                }
            }
            ConsoleCommand::Status => match self.controller.session().await {
                Some(session) => info!(
                    "Running: {} -> {} (delete originals: {})",
                    session.input_dir.display(),
                    session.output_dir.display(),
                    session.delete_original
                ),
                None => info!("Paused"),
            },
            ConsoleCommand::Help => info!("{}", HELP),
            ConsoleCommand::Quit => return Some(ShutdownReason::UserCommand),
        }
        None
    }

    async fn shutdown(self) {
        if let Err(e) = self.controller.stop().await {
            warn!("Error stopping watcher: {}", e);
        }
        if let Err(e) = self.config.save(&self.config_path) {
            warn!("Error saving config: {}", e);
        }
        info!("Converter ended");
    }
}
