//! Reports pipeline activity to an injected sink.

use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::controller::WatchSession;
use crate::error::ConverterError;
use crate::handler::ConversionOutcome;

/// Everything the pipeline reports, one value per lifecycle transition or
/// per processed file
#[derive(Debug)]
pub enum PipelineEvent {
    /// Watching began
    Started(WatchSession),
    /// Watching ended through `stop()`
    Stopped(WatchSession),
    /// A creation event was fully processed
    Outcome {
        source: PathBuf,
        outcome: ConversionOutcome,
    },
    /// Conversion succeeded but the original could not be removed
    OriginalNotDeleted {
        source: PathBuf,
        error: ConverterError,
    },
    /// The event source failed and the session ended
    MonitorFailed {
        input_dir: PathBuf,
        error: ConverterError,
    },
}

/// Destination for pipeline reports. Implementations are shared between
/// concurrent conversion tasks and must serialize their own writes.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Writes each report as a single `tracing` record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Started(session) => info!(
                input = %session.input_dir.display(),
                output = %session.output_dir.display(),
                delete_original = session.delete_original,
                "Converter started"
            ),
            PipelineEvent::Stopped(session) => info!(
                input = %session.input_dir.display(),
                "Converter paused"
            ),
            PipelineEvent::Outcome { source, outcome } => match outcome {
                ConversionOutcome::Converted(output) => info!(
                    "Converted: {} -> {}",
                    source.display(),
                    output.display()
                ),
                ConversionOutcome::Skipped(reason) => info!(
                    "Skipped {}: {}",
                    source.display(),
                    reason
                ),
                ConversionOutcome::Failed(e) => error!(
                    stage = e.stage(),
                    "Error processing {}: {}",
                    source.display(),
                    e
                ),
            },
            PipelineEvent::OriginalNotDeleted { source, error } => warn!(
                stage = error.stage(),
                "Converted {} but kept the original: {}",
                source.display(),
                error
            ),
            PipelineEvent::MonitorFailed { input_dir, error } => error!(
                stage = error.stage(),
                "Watcher on {} stopped unexpectedly: {}",
                input_dir.display(),
                error
            ),
        }
    }
}
