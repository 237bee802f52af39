//! Single-worker conversion pipeline.
//!
//! One tokio task owns the camera's conversion command: jobs are queued and
//! processed strictly one at a time (the camera performs one hardware
//! conversion at a time). A job is admitted only when storage and battery
//! clear their thresholds, then runs the remote command, polls it to
//! completion, copies the staged output into the corrected directory, and
//! publishes a catalog entry for it.
//!
//! Per-source job state lives in the [`ConvertLedger`]; enqueueing claims a
//! source atomically, so repeated client probes (streaming players re-probe
//! aggressively) never enqueue a second job for the same file.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::camera::{CameraClient, CameraError, CommandState, ConvertHandle, ConvertParams};
use crate::catalog::id;
use crate::catalog::populate::{CatalogManager, PublishError};
use crate::config::{Storage, CORRECTED_SUFFIX};
use crate::notify::HostNotifier;
use crate::status::{StatusChecker, StatusError};

/// Remote job status is queried at this fixed interval.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Wait after a terminal job outcome before re-reading storage health, so
/// the device's status indicators have settled.
const STATUS_SETTLE: Duration = Duration::from_millis(3500);
const QUEUE_CAPACITY: usize = 16;
const EVENT_CAPACITY: usize = 32;

/// Per-source conversion state. A source with no ledger entry has never been
/// requested (or a previous attempt failed and may be retried).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConvertState {
    Queued,
    Running,
    Done,
}

/// Explicit conversion-state registry, keyed by source item id. All
/// transitions happen under its own lock; this is what the HTTP dispatcher
/// consults instead of probing the filesystem per request.
#[derive(Debug, Default)]
pub struct ConvertLedger {
    inner: RwLock<HashMap<String, ConvertState>>,
}

impl ConvertLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, source: &str) -> Option<ConvertState> {
        self.inner
            .read()
            .expect("ledger lock poisoned")
            .get(source)
            .copied()
    }

    pub fn is_done(&self, source: &str) -> bool {
        self.state(source) == Some(ConvertState::Done)
    }

    /// Claim a source for conversion. Returns false when it is already
    /// queued, running, or done.
    pub fn try_claim(&self, source: &str) -> bool {
        let mut inner = self.inner.write().expect("ledger lock poisoned");
        if inner.contains_key(source) {
            return false;
        }
        inner.insert(source.to_string(), ConvertState::Queued);
        true
    }

    /// Mark a finished correction. Also used at population time to seed
    /// sources whose corrected output already exists on disk.
    pub fn mark_done(&self, source: &str) {
        self.inner
            .write()
            .expect("ledger lock poisoned")
            .insert(source.to_string(), ConvertState::Done);
    }

    pub fn clear(&self) {
        self.inner.write().expect("ledger lock poisoned").clear();
    }

    fn mark_running(&self, source: &str) {
        self.inner
            .write()
            .expect("ledger lock poisoned")
            .insert(source.to_string(), ConvertState::Running);
    }

    /// Drop a claim after a failed or cancelled job so a later request can
    /// retry the conversion.
    fn release(&self, source: &str) {
        self.inner
            .write()
            .expect("ledger lock poisoned")
            .remove(source);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("interrupted")]
    Cancelled,
    #[error("not enough storage or battery")]
    Admission,
    #[error("device conversion failed: {0}")]
    Remote(String),
    #[error("catalog entry not found: {0}")]
    MissingEntry(String),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Job lifecycle notifications, mainly for tests and diagnostics.
#[derive(Debug, Clone)]
pub enum ConvertEvent {
    Started { source: String },
    Published { source: String },
    Failed { source: String },
    Cancelled { source: String },
}

/// Handle for submitting jobs to and shutting down the worker. Cheap to
/// clone; every HTTP handler holds one through the shared state.
#[derive(Clone)]
pub struct ConverterHandle {
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    ledger: Arc<ConvertLedger>,
    events: broadcast::Sender<ConvertEvent>,
}

impl ConverterHandle {
    /// Enqueue a correction for a source item. Non-blocking, fire-and-forget;
    /// a source that is already queued, running, or done is a no-op.
    pub fn push(&self, source: &str) {
        if self.cancel.is_cancelled() {
            return;
        }
        if !self.ledger.try_claim(source) {
            return;
        }
        if self.tx.try_send(source.to_string()).is_err() {
            tracing::warn!("conversion queue full, dropping {source}");
            self.ledger.release(source);
        }
    }

    /// Stop accepting jobs and interrupt the one in flight. The poll loop
    /// observes the interruption, cancels the remote job, and exits cleanly
    /// without publishing anything.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        tracing::info!("converter is shut down");
    }

    pub fn events(&self) -> broadcast::Receiver<ConvertEvent> {
        self.events.subscribe()
    }
}

/// The conversion worker. Construct with [`Converter::start`], which spawns
/// the task and returns its handle.
pub struct Converter {
    camera: Arc<dyn CameraClient>,
    status: StatusChecker,
    notifier: Arc<dyn HostNotifier>,
    manager: Arc<CatalogManager>,
    storage: Storage,
    ledger: Arc<ConvertLedger>,
    cancel: CancellationToken,
    events: broadcast::Sender<ConvertEvent>,
}

impl Converter {
    pub fn start(
        camera: Arc<dyn CameraClient>,
        status: StatusChecker,
        notifier: Arc<dyn HostNotifier>,
        manager: Arc<CatalogManager>,
        storage: Storage,
        ledger: Arc<ConvertLedger>,
    ) -> ConverterHandle {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let cancel = CancellationToken::new();
        let worker = Converter {
            camera,
            status,
            notifier,
            manager,
            storage,
            ledger: Arc::clone(&ledger),
            cancel: cancel.clone(),
            events: events.clone(),
        };
        tokio::spawn(worker.run(rx));
        ConverterHandle {
            tx,
            cancel,
            ledger,
            events,
        }
    }

    async fn run(self, mut rx: mpsc::Receiver<String>) {
        tracing::info!("conversion worker started");
        loop {
            let source = tokio::select! {
                _ = self.cancel.cancelled() => break,
                source = rx.recv() => match source {
                    Some(source) => source,
                    None => break,
                },
            };
            self.process(source).await;
        }
        tracing::info!("conversion worker stopped");
    }

    async fn process(&self, source: String) {
        // Population may have seeded this source as done while the job sat
        // in the queue.
        if self.ledger.is_done(&source) {
            return;
        }
        self.ledger.mark_running(&source);
        let _ = self.events.send(ConvertEvent::Started {
            source: source.clone(),
        });

        match self.run_job(&source).await {
            Ok(()) => {
                self.notifier.conversion_done_cue();
                let _ = self.events.send(ConvertEvent::Published { source });
            }
            Err(ConvertError::Cancelled) => {
                tracing::debug!("canceled: {source}");
                self.ledger.release(&source);
                let _ = self.events.send(ConvertEvent::Cancelled { source });
                // Shutting down — skip the settle/health pass.
                return;
            }
            Err(e) => {
                tracing::error!("conversion of {source} failed: {e}");
                self.ledger.release(&source);
                self.notifier.error_cue();
                let _ = self.events.send(ConvertEvent::Failed { source });
            }
        }

        tokio::select! {
            _ = self.cancel.cancelled() => return,
            _ = tokio::time::sleep(STATUS_SETTLE) => {}
        }
        match self.status.storage_health().await {
            Ok(health) => self.notifier.storage_health(health),
            Err(e) => tracing::warn!("storage health check failed: {e}"),
        }
    }

    async fn run_job(&self, source: &str) -> Result<(), ConvertError> {
        let original_id = id::original_id(source);
        let entry = self
            .manager
            .catalog()
            .get(&original_id)
            .ok_or(ConvertError::MissingEntry(original_id))?;

        let enough_storage = self.status.has_enough_storage(entry.size).await?;
        let enough_battery = self.status.has_enough_battery().await?;
        if !enough_storage || !enough_battery {
            tracing::info!(
                "refusing correction: enough_storage:{enough_storage} enough_battery:{enough_battery}"
            );
            return Err(ConvertError::Admission);
        }

        // Leftover files in the staging directory can fail the device-side
        // job; start from an empty one.
        clear_staging(&self.storage.staging_dir).await?;

        let params = ConvertParams::for_source(&entry.source_uri, entry.width);
        tracing::info!("start convert: {}", entry.source_uri);
        let handle = self.camera.convert_video(&params).await?;

        let result_url = self.poll(&handle).await?;
        tracing::debug!("id:{} converted:{}", handle.id, result_url);

        let out_path = self.copy_result(&result_url, &entry.title).await?;
        self.notifier.media_registered(&out_path);
        self.manager.publish_corrected(source, &out_path)?;
        Ok(())
    }

    /// Poll the remote job until completion, logging fractional progress.
    /// A shutdown interrupts the loop promptly, cancels the job on the
    /// camera exactly once, and surfaces as `Cancelled`.
    async fn poll(&self, handle: &ConvertHandle) -> Result<String, ConvertError> {
        loop {
            let status = tokio::select! {
                _ = self.cancel.cancelled() => return self.cancel_remote(handle).await,
                status = self.camera.command_status(handle) => status?,
            };
            match status.state {
                CommandState::Done => {
                    return status
                        .result_url
                        .ok_or_else(|| ConvertError::Remote("no result file url".into()));
                }
                CommandState::Error => {
                    return Err(ConvertError::Remote(format!(
                        "device job {} reported an error",
                        handle.id
                    )));
                }
                CommandState::InProgress => {
                    tracing::debug!("id:{} progress:{}", handle.id, status.completion);
                }
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return self.cancel_remote(handle).await,
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }
    }

    async fn cancel_remote<T>(&self, handle: &ConvertHandle) -> Result<T, ConvertError> {
        tracing::debug!("id:{} cancelling device conversion", handle.id);
        if let Err(e) = self.camera.cancel_convert().await {
            tracing::warn!("remote cancel failed: {e}");
        }
        Err(ConvertError::Cancelled)
    }

    /// Copy the staged output into the corrected directory, named after the
    /// original title plus the corrected suffix.
    async fn copy_result(&self, result_url: &str, title: &str) -> Result<PathBuf, ConvertError> {
        let (dir, file) = id::dcf_tail(result_url)
            .ok_or_else(|| ConvertError::Remote(format!("unexpected result path: {result_url}")))?;
        let in_path = self.storage.staging_dir.join(dir).join(file);
        let out_dir = self.storage.corrected_dir.join(dir);
        let out_path = out_dir.join(format!("{title}{CORRECTED_SUFFIX}.MP4"));
        tracing::debug!("in:{} out:{}", in_path.display(), out_path.display());

        tokio::fs::create_dir_all(&out_dir).await?;
        tokio::fs::copy(&in_path, &out_path).await?;
        tracing::info!("created corrected file: {}", out_path.display());
        Ok(out_path)
    }
}

async fn clear_staging(dir: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
