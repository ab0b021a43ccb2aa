//! Reacts to creation events: settle, probe, convert, then optionally
//! remove the original.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::config::ConversionSettings;
use crate::controller::WatchSession;
use crate::converter::Converter;
use crate::error::ConverterError;
use crate::readiness::ReadinessProbe;
use crate::report::{EventSink, PipelineEvent};

/// A creation event delivered by the event source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    pub path: PathBuf,
    pub is_directory: bool,
}

impl CreatedEvent {
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
        }
    }
}

/// Work derived from one accepted creation event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub delete_original: bool,
}

/// Result of processing one task
#[derive(Debug)]
pub enum ConversionOutcome {
    /// Written to the contained path
    Converted(PathBuf),
    /// Nothing to convert
    Skipped(String),
    /// Probe or conversion failed
    Failed(ConverterError),
}

impl ConversionOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionOutcome::Converted(_))
    }
}

/// Per-session event handler shared by every conversion task
pub struct ConversionHandler {
    output_dir: PathBuf,
    delete_original: bool,
    source_extension: String,
    settle_delay: Duration,
    probe: ReadinessProbe,
    converter: Arc<dyn Converter>,
    sink: Arc<dyn EventSink>,
}

impl ConversionHandler {
    pub fn new(
        session: &WatchSession,
        settings: &ConversionSettings,
        converter: Arc<dyn Converter>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            output_dir: session.output_dir.clone(),
            delete_original: session.delete_original,
            source_extension: settings.source_extension.clone(),
            settle_delay: settings.settle_delay(),
            probe: ReadinessProbe::from_settings(settings),
            converter,
            sink,
        }
    }

    /// Files only, with exactly the configured extension
    pub fn accepts(&self, event: &CreatedEvent) -> bool {
        !event.is_directory
            && event
                .path
                .extension()
                .is_some_and(|ext| ext == self.source_extension.as_str())
    }

    pub fn task_for(&self, source: PathBuf) -> ConversionTask {
        ConversionTask {
            source,
            output_dir: self.output_dir.clone(),
            delete_original: self.delete_original,
        }
    }

    /// Run an accepted event on its own task so the caller is never blocked
    pub fn spawn(self: &Arc<Self>, event: CreatedEvent) -> Option<JoinHandle<()>> {
        if !self.accepts(&event) {
            trace!("Ignoring {}", event.path.display());
            return None;
        }

        let handler = Arc::clone(self);
        Some(tokio::spawn(async move {
            handler.on_file_created(event).await;
        }))
    }

    /// Filter, then process and report the event
    pub async fn on_file_created(&self, event: CreatedEvent) {
        if !self.accepts(&event) {
            return;
        }
        let task = self.task_for(event.path);
        self.process(task).await;
    }

    /// Process a task and report its outcome exactly once
    pub async fn process(&self, task: ConversionTask) {
        debug!("Processing {}", task.source.display());

        let outcome = self.convert(&task).await;
        let converted = outcome.is_converted();
        self.sink.emit(PipelineEvent::Outcome {
            source: task.source.clone(),
            outcome,
        });

        if converted && task.delete_original {
            if let Err(e) = tokio::fs::remove_file(&task.source).await {
                self.sink.emit(PipelineEvent::OriginalNotDeleted {
                    source: task.source.clone(),
                    error: ConverterError::Deletion {
                        path: task.source,
                        source: e,
                    },
                });
            }
        }
    }

    async fn convert(&self, task: &ConversionTask) -> ConversionOutcome {
        sleep(self.settle_delay).await;

        // A missing or locked path is left to the probe
        if let Ok(metadata) = tokio::fs::metadata(&task.source).await {
            if !metadata.is_file() {
                return ConversionOutcome::Skipped("not a regular file".to_string());
            }
        }

        if let Err(e) = self.probe.await_ready(&task.source).await {
            return ConversionOutcome::Failed(e);
        }

        match self.converter.convert(&task.source, &task.output_dir).await {
            Ok(output) => ConversionOutcome::Converted(output),
            Err(e) => ConversionOutcome::Failed(e),
        }
    }
}
