//! Start/stop lifecycle of a single watch session.
//!
//! The controller is an ordinary value owned by the caller. It guards the
//! active session behind one async mutex so `start`, `stop` and `toggle`
//! never interleave, and it runs a dispatcher task that turns source events
//! into independent conversion tasks.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConversionSettings;
use crate::converter::{Converter, ToolConverter};
use crate::error::{ConverterError, Result};
use crate::handler::ConversionHandler;
use crate::report::{EventSink, PipelineEvent, TracingSink};
use crate::watcher::{EventSource, NotifyEventSource, SourceEvent, Subscription};

/// Parameters bound to a running watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSession {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub delete_original: bool,
}

impl WatchSession {
    pub fn new<I: Into<PathBuf>, O: Into<PathBuf>>(input_dir: I, output_dir: O, delete_original: bool) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            delete_original,
        }
    }

    /// Both directories must be set, exist, and be listable
    pub fn validate(&self) -> Result<()> {
        check_directory("input", &self.input_dir)?;
        check_directory("output", &self.output_dir)
    }
}

fn check_directory(role: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ConverterError::InvalidConfiguration(format!(
            "{} directory is not set",
            role
        )));
    }

    let metadata = fs::metadata(path).map_err(|e| {
        ConverterError::InvalidConfiguration(format!(
            "{} directory '{}' is not accessible: {}",
            role,
            path.display(),
            e
        ))
    })?;

    if !metadata.is_dir() {
        return Err(ConverterError::InvalidConfiguration(format!(
            "{} path '{}' is not a directory",
            role,
            path.display()
        )));
    }

    fs::read_dir(path).map_err(|e| {
        ConverterError::InvalidConfiguration(format!(
            "{} directory '{}' cannot be read: {}",
            role,
            path.display(),
            e
        ))
    })?;

    Ok(())
}

/// Receives session parameters whenever watching starts
pub trait SessionStore: Send + Sync {
    fn persist(&self, session: &WatchSession) -> Result<()>;
}

/// A running session and the handles needed to tear it down
struct ActiveWatch {
    session: WatchSession,
    subscription: Subscription,
    shutdown_tx: oneshot::Sender<()>,
    dispatcher: JoinHandle<()>,
    alive: Arc<AtomicBool>,
}

impl ActiveWatch {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Owns at most one watch session and exposes its lifecycle
pub struct WatchController {
    settings: ConversionSettings,
    source: Arc<dyn EventSource>,
    converter: Arc<dyn Converter>,
    /// Set while `converter` is the configured external tool
    tool: Option<ToolConverter>,
    sink: Arc<dyn EventSink>,
    store: Option<Arc<dyn SessionStore>>,
    active: Mutex<Option<ActiveWatch>>,
}

impl WatchController {
    /// Controller using `notify`, the configured tool and `tracing` output
    pub fn new(settings: ConversionSettings) -> Self {
        let tool = ToolConverter::new(&settings);
        Self {
            settings,
            source: Arc::new(NotifyEventSource),
            converter: Arc::new(tool.clone()),
            tool: Some(tool),
            sink: Arc::new(TracingSink),
            store: None,
            active: Mutex::new(None),
        }
    }

    pub fn with_event_source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = converter;
        self.tool = None;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    /// Begin watching `session.input_dir`.
    ///
    /// Rejected with [`ConverterError::AlreadyRunning`] while a session is
    /// active; the controller stays Stopped on any error.
    pub async fn start(&self, session: WatchSession) -> Result<()> {
        let mut active = self.active.lock().await;
        self.start_locked(&mut active, session).await
    }

    async fn start_locked(&self, active: &mut Option<ActiveWatch>, session: WatchSession) -> Result<()> {
        if let Some(current) = active.as_ref() {
            if current.is_alive() {
                return Err(ConverterError::AlreadyRunning(current.session.input_dir.clone()));
            }
        }
        if let Some(dead) = active.take() {
            Self::reap(dead).await;
        }

        session.validate()?;

        if let Some(store) = &self.store {
            if let Err(e) = store.persist(&session) {
                warn!("Error saving config: {}", e);
            }
        }

        if let Some(tool) = &self.tool {
            if tool.locate().is_none() {
                warn!(
                    "Conversion tool '{}' was not found on PATH; conversions will fail until it is installed",
                    tool.program()
                );
            }
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let subscription = self.source.subscribe(&session.input_dir, events_tx)?;

        let handler = Arc::new(ConversionHandler::new(
            &session,
            &self.settings,
            Arc::clone(&self.converter),
            Arc::clone(&self.sink),
        ));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let alive = Arc::new(AtomicBool::new(true));

        let dispatcher = tokio::spawn(dispatch(
            events_rx,
            shutdown_rx,
            handler,
            Arc::clone(&self.sink),
            Arc::clone(&alive),
            session.input_dir.clone(),
        ));

        self.sink.emit(PipelineEvent::Started(session.clone()));
        *active = Some(ActiveWatch {
            session,
            subscription,
            shutdown_tx,
            dispatcher,
            alive,
        });

        Ok(())
    }

    /// Stop watching. No event is dispatched once this returns; conversions
    /// already running are left to finish. A no-op while Stopped.
    pub async fn stop(&self) -> Result<()> {
        let mut active = self.active.lock().await;
        self.stop_locked(&mut active).await
    }

    async fn stop_locked(&self, active: &mut Option<ActiveWatch>) -> Result<()> {
        let Some(current) = active.take() else {
            debug!("Stop requested while not running");
            return Ok(());
        };

        if !current.is_alive() {
            // Already ended by a monitor failure, which was reported then
            Self::reap(current).await;
            return Ok(());
        }

        let session = current.session.clone();
        Self::reap(current).await;
        self.sink.emit(PipelineEvent::Stopped(session));
        Ok(())
    }

    /// `stop()` when Running, otherwise `start(session)`, decided and
    /// carried out under a single lock
    pub async fn toggle(&self, session: WatchSession) -> Result<bool> {
        let mut active = self.active.lock().await;

        if active.as_ref().is_some_and(ActiveWatch::is_alive) {
            self.stop_locked(&mut active).await?;
            Ok(false)
        } else {
            self.start_locked(&mut active, session).await?;
            Ok(true)
        }
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(ActiveWatch::is_alive)
    }

    /// Parameters of the running session, if any
    pub async fn session(&self) -> Option<WatchSession> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|current| current.is_alive())
            .map(|current| current.session.clone())
    }

    /// Halt the dispatcher, then drop the subscription
    async fn reap(watch: ActiveWatch) {
        let ActiveWatch {
            session,
            subscription,
            shutdown_tx,
            dispatcher,
            alive,
        } = watch;

        let _ = shutdown_tx.send(());
        if let Err(e) = dispatcher.await {
            warn!("Dispatcher for {} ended abnormally: {}", session.input_dir.display(), e);
        }
        alive.store(false, Ordering::SeqCst);
        drop(subscription);
        info!("Stopped watching: {}", session.input_dir.display());
    }
}

/// Forward accepted creation events to the handler until told to stop or
/// until the source fails
async fn dispatch(
    mut events: mpsc::UnboundedReceiver<SourceEvent>,
    mut shutdown: oneshot::Receiver<()>,
    handler: Arc<ConversionHandler>,
    sink: Arc<dyn EventSink>,
    alive: Arc<AtomicBool>,
    input_dir: PathBuf,
) {
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            event = events.recv() => match event {
                Some(SourceEvent::Created(created)) => {
                    handler.spawn(created);
                }
                Some(SourceEvent::Failed(error)) => {
                    alive.store(false, Ordering::SeqCst);
                    sink.emit(PipelineEvent::MonitorFailed { input_dir, error });
                    break;
                }
                None => {
                    alive.store(false, Ordering::SeqCst);
                    sink.emit(PipelineEvent::MonitorFailed {
                        input_dir,
                        error: ConverterError::MonitorFatal("event source closed".to_string()),
                    });
                    break;
                }
            },
        }
    }
}
