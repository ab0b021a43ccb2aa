//! Filesystem event source: creation events under one directory,
//! non-recursive, until the subscription is dropped.

use notify::event::CreateKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fmt;
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::error::{ConverterError, Result};
use crate::handler::CreatedEvent;

/// Message delivered by an event source
#[derive(Debug)]
pub enum SourceEvent {
    Created(CreatedEvent),
    /// The source can no longer deliver events
    Failed(ConverterError),
}

/// Keeps a subscription alive; dropping it unsubscribes
pub struct Subscription {
    _guard: Box<dyn Send>,
}

impl Subscription {
    pub fn new<G: Send + 'static>(guard: G) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Anything that can report files created directly under a directory
pub trait EventSource: Send + Sync {
    fn subscribe(&self, root: &Path, events: UnboundedSender<SourceEvent>) -> Result<Subscription>;
}

/// Event source backed by the platform watcher from `notify`
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyEventSource;

impl EventSource for NotifyEventSource {
    fn subscribe(&self, root: &Path, events: UnboundedSender<SourceEvent>) -> Result<Subscription> {
        let watched_root = root.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for source_event in translate(&watched_root, event) {
                        // The receiver is gone once the session has stopped
                        let _ = events.send(source_event);
                    }
                }
                Err(e) => {
                    let _ = events.send(SourceEvent::Failed(e.into()));
                }
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::NonRecursive)?;
        info!("Watching for new files in: {}", root.display());

        Ok(Subscription::new(watcher))
    }
}

/// Map a raw `notify` event onto what the pipeline consumes
fn translate(root: &Path, event: Event) -> Vec<SourceEvent> {
    match event.kind {
        EventKind::Create(kind) => event
            .paths
            .into_iter()
            .map(|path| {
                let is_directory = match kind {
                    CreateKind::Folder => true,
                    CreateKind::File => false,
                    _ => path.is_dir(),
                };
                SourceEvent::Created(CreatedEvent { path, is_directory })
            })
            .collect(),
        EventKind::Remove(_) if event.paths.iter().any(|p| p == root) => {
            vec![SourceEvent::Failed(ConverterError::MonitorFatal(format!(
                "watched directory {} was removed",
                root.display()
            )))]
        }
        other => {
            debug!("Ignoring {:?} for {:?}", other, event.paths);
            Vec::new()
        }
    }
}
