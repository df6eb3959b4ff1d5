//! Single-slot model download coordinator.
//!
//! At most one pull runs at a time. The slot is taken under a mutex with a
//! check-and-set, released by dropping a [`DownloadPermit`]; the lock is never
//! held across the download itself.

mod fetch;
mod reload;
mod validate;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use crate::metrics::{DOWNLOAD_IN_PROGRESS, DOWNLOADS_TOTAL};
use crate::models::{DownloadEvent, DownloadJob};

pub use fetch::{ArtifactFetcher, FetchError, HfFetcher};
pub use reload::{BackendReloadTrigger, ReloadError, ShimmyReload};
pub use validate::{GGML_MAGIC, GGUF_MAGIC, is_model_artifact, size_mb};

const EVENT_BUFFER: usize = 8;
const INVALID_ARTIFACT: &str = "Downloaded file is not a valid GGUF/GGML model";

/// Reasons a pull is refused before it starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PullError {
    #[error("Both 'model' and 'filename' are required")]
    MissingFields,

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Download already in progress: {model}/{filename}")]
    AlreadyRunning { model: String, filename: String },
}

/// Failures after a pull has been accepted; reported in-band.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The hub refused or failed the transfer.
    #[error("HuggingFace error: {0}")]
    Fetch(FetchError),

    #[error("Download failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download failed: {0}")]
    Panicked(String),
}

// local disk trouble is ours, not the hub's
impl From<FetchError> for DownloadError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Io(e) => DownloadError::Io(e),
            other => DownloadError::Fetch(other),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unexpected panic".to_string()
    }
}

pub struct DownloadCoordinator {
    job: Mutex<DownloadJob>,
    models_dir: PathBuf,
    fetcher: Arc<dyn ArtifactFetcher>,
    reload: Arc<dyn BackendReloadTrigger>,
}

/// Ownership of the download slot; dropping it frees the slot.
pub struct DownloadPermit {
    coordinator: Arc<DownloadCoordinator>,
}

impl Drop for DownloadPermit {
    fn drop(&mut self) {
        self.coordinator.release();
    }
}

impl DownloadCoordinator {
    pub fn new(
        models_dir: impl Into<PathBuf>,
        fetcher: Arc<dyn ArtifactFetcher>,
        reload: Arc<dyn BackendReloadTrigger>,
    ) -> Self {
        Self {
            job: Mutex::new(DownloadJob::default()),
            models_dir: models_dir.into(),
            fetcher,
            reload,
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    // a panic while holding the lock cannot leave the job half-written
    fn lock(&self) -> MutexGuard<'_, DownloadJob> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the slot, for status reporting.
    pub fn status(&self) -> DownloadJob {
        self.lock().clone()
    }

    /// Idle -> Busy, or a conflict naming the running job.
    pub fn try_acquire(
        self: &Arc<Self>,
        model: &str,
        filename: &str,
    ) -> Result<DownloadPermit, PullError> {
        let mut job = self.lock();
        if job.in_progress {
            return Err(PullError::AlreadyRunning {
                model: job.model.clone().unwrap_or_default(),
                filename: job.filename.clone().unwrap_or_default(),
            });
        }
        *job = DownloadJob {
            in_progress: true,
            model: Some(model.to_string()),
            filename: Some(filename.to_string()),
        };
        DOWNLOAD_IN_PROGRESS.set(1.0);
        Ok(DownloadPermit {
            coordinator: Arc::clone(self),
        })
    }

    fn release(&self) {
        *self.lock() = DownloadJob::default();
        DOWNLOAD_IN_PROGRESS.set(0.0);
    }

    /// Accept a pull and stream its events.
    ///
    /// Refusals (bad input, slot busy) happen here, before anything is
    /// streamed. Once accepted the download runs on its own task: a caller
    /// hanging up stops the events, not the download.
    pub fn pull(
        self: &Arc<Self>,
        model: &str,
        filename: &str,
    ) -> Result<ReceiverStream<DownloadEvent>, PullError> {
        validate_request(model, filename)?;
        let permit = match self.try_acquire(model, filename) {
            Ok(permit) => permit,
            Err(e) => {
                DOWNLOADS_TOTAL.with_label_values(&["rejected"]).inc();
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let this = Arc::clone(self);
        let model = model.to_string();
        let filename = filename.to_string();
        tokio::spawn(async move {
            this.run(permit, model, filename, tx).await;
        });
        Ok(ReceiverStream::new(rx))
    }

    async fn run(
        &self,
        permit: DownloadPermit,
        model: String,
        filename: String,
        tx: mpsc::Sender<DownloadEvent>,
    ) {
        // send errors mean the caller left; keep going regardless
        let _ = tx
            .send(DownloadEvent::Starting {
                model: model.clone(),
                filename: filename.clone(),
            })
            .await;
        info!("Starting download: {model}/{filename}");

        let outcome = AssertUnwindSafe(self.download(&model, &filename))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(DownloadError::Panicked(panic_message(&*payload))));
        let event = match outcome {
            Ok(event) => event,
            Err(e) => {
                error!("{e}");
                DOWNLOADS_TOTAL.with_label_values(&["failed"]).inc();
                DownloadEvent::error(e.to_string())
            }
        };
        let _ = tx.send(event).await;
        drop(permit);
    }

    async fn download(&self, model: &str, filename: &str) -> Result<DownloadEvent, DownloadError> {
        tokio::fs::create_dir_all(&self.models_dir).await?;

        let local_path = self.fetcher.fetch(model, filename, &self.models_dir).await?;

        if !is_model_artifact(&local_path).await {
            if let Err(e) = tokio::fs::remove_file(&local_path).await {
                warn!("Failed to remove invalid artifact {}: {e}", local_path.display());
            }
            warn!("Rejected {}: {INVALID_ARTIFACT}", local_path.display());
            DOWNLOADS_TOTAL.with_label_values(&["invalid"]).inc();
            return Ok(DownloadEvent::error(INVALID_ARTIFACT));
        }

        let size_mb = size_mb(tokio::fs::metadata(&local_path).await?.len());

        info!("Triggering shimmy discover and server reload for new model...");
        let discovered = self.reload.reload().await;

        info!(
            "Download complete: {} ({size_mb} MB), Model discovery: {}",
            local_path.display(),
            if discovered { "success" } else { "failed" }
        );
        DOWNLOADS_TOTAL.with_label_values(&["complete"]).inc();
        Ok(DownloadEvent::Complete {
            filename: filename.to_string(),
            path: local_path.display().to_string(),
            size_mb,
            discovered,
        })
    }
}

// filename is joined onto the models dir, so it must stay inside it
fn validate_request(model: &str, filename: &str) -> Result<(), PullError> {
    if model.trim().is_empty() || filename.trim().is_empty() {
        return Err(PullError::MissingFields);
    }
    let inside = Path::new(filename)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !inside {
        return Err(PullError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}
