//! HDR capture auto-converter
//!
//! Watches a directory for newly created HDR screenshots, waits until each
//! file is readable, converts it to SDR with an external tool and optionally
//! deletes the original.

#![warn(rust_2018_idioms)]

pub mod cli;
pub mod config;
pub mod controller;
pub mod converter;
pub mod error;
pub mod event_loop;
pub mod handler;
pub mod readiness;
pub mod report;
pub mod watcher;

// Re-export commonly used types
pub use cli::{CliArgs, LogLevel};
pub use config::{AppConfig, ConversionSettings, JsonConfigStore};
pub use controller::{SessionStore, WatchController, WatchSession};
pub use converter::{Converter, ToolConverter};
pub use error::{ConverterError, Result};
pub use event_loop::{ConsoleApp, ConsoleCommand, ShutdownReason};
pub use handler::{ConversionHandler, ConversionOutcome, ConversionTask, CreatedEvent};
pub use readiness::ReadinessProbe;
pub use report::{EventSink, PipelineEvent, TracingSink};
pub use watcher::{EventSource, NotifyEventSource, SourceEvent, Subscription};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AppConfig, ConversionOutcome, ConversionSettings, ConverterError, EventSink, EventSource,
        PipelineEvent, Result, WatchController, WatchSession,
    };

    pub use tokio;
    pub use tracing::{debug, error, info, warn};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
