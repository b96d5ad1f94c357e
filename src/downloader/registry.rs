// Job registry - owns every accepted download
//
// Each job runs in its own tokio task. The task folds runner events into the
// progress map, drops its active entry and then writes the terminal record.
// Records outlive their jobs until cleared.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::errors::DownloadError;
use super::models::{DownloadParams, DownloadRequest, JobStatus, ProgressRecord};
use super::progress::ProgressEvent;
use super::runner::{CancelFlag, DownloadRunner};

/// Buffered record updates per push subscriber
const UPDATE_CHANNEL_CAPACITY: usize = 256;

struct ActiveJob {
    cancel: CancelFlag,
    /// Taken by `shutdown`
    task: Option<JoinHandle<()>>,
}

/// A record plus its start position, so listings keep start order
struct StoredRecord {
    seq: u64,
    record: ProgressRecord,
}

struct RegistryInner {
    runner: DownloadRunner,
    active: Mutex<HashMap<String, ActiveJob>>,
    records: RwLock<HashMap<String, StoredRecord>>,
    next_seq: AtomicU64,
    updates: broadcast::Sender<ProgressRecord>,
}

/// Cloneable handle over the shared job state
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<RegistryInner>,
}

impl JobRegistry {
    pub fn new(runner: DownloadRunner) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RegistryInner {
                runner,
                active: Mutex::new(HashMap::new()),
                records: RwLock::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
                updates,
            }),
        }
    }

    /// Validate `params`, seed a record and spawn the job. Returns its id.
    pub async fn start(&self, params: DownloadParams) -> Result<String, DownloadError> {
        let request = DownloadRequest::try_from(params)?;
        let id = Uuid::new_v4().to_string();
        let cancel = CancelFlag::new();

        let record = ProgressRecord::started(&id);
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        self.inner.records.write().await.insert(
            id.clone(),
            StoredRecord {
                seq,
                record: record.clone(),
            },
        );
        self.inner.publish(record);

        tracing::info!(download_id = %id, url = %request.url, "Download accepted");

        // Held across spawn so shutdown never sees the job without its handle;
        // the task takes the same lock before it removes its entry
        let mut active = self.inner.active.lock().await;
        let inner = self.inner.clone();
        let job_id = id.clone();
        let job_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            inner.drive(job_id, request, job_cancel).await;
        });
        active.insert(
            id.clone(),
            ActiveJob {
                cancel,
                task: Some(task),
            },
        );

        Ok(id)
    }

    pub async fn progress(&self, id: &str) -> Result<ProgressRecord, DownloadError> {
        self.inner
            .records
            .read()
            .await
            .get(id)
            .map(|stored| stored.record.clone())
            .ok_or(DownloadError::NotFound)
    }

    /// Every known record, oldest job first
    pub async fn all_progress(&self) -> Vec<ProgressRecord> {
        let records = self.inner.records.read().await;
        let mut stored: Vec<&StoredRecord> = records.values().collect();
        stored.sort_by_key(|stored| stored.seq);
        stored.into_iter().map(|stored| stored.record.clone()).collect()
    }

    /// Flag an active job. The runner notices at its next tick.
    pub async fn cancel(&self, id: &str) -> Result<(), DownloadError> {
        let active = self.inner.active.lock().await;
        let job = active.get(id).ok_or(DownloadError::NotFound)?;
        job.cancel.cancel();
        tracing::info!(download_id = %id, "Cancellation requested");
        Ok(())
    }

    /// Drop a record. A still-running job keeps going but its updates are
    /// discarded from now on.
    pub async fn clear(&self, id: &str) -> Result<(), DownloadError> {
        self.inner
            .records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or(DownloadError::NotFound)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressRecord> {
        self.inner.updates.subscribe()
    }

    /// Cancel every active job and wait for their tasks
    pub async fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut active = self.inner.active.lock().await;
            active
                .values_mut()
                .filter_map(|job| {
                    job.cancel.cancel();
                    job.task.take()
                })
                .collect()
        };

        if !tasks.is_empty() {
            tracing::info!("Waiting for {} active download(s)", tasks.len());
        }
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Download task ended abnormally: {}", e);
            }
        }
    }
}

impl RegistryInner {
    async fn drive(&self, id: String, request: DownloadRequest, cancel: CancelFlag) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let run =
            AssertUnwindSafe(self.runner.run(&request, tx, cancel.clone())).catch_unwind();
        tokio::pin!(run);

        let outcome = loop {
            tokio::select! {
                outcome = &mut run => break outcome,
                Some(event) = rx.recv() => self.apply(&id, &event).await,
            }
        };
        while let Ok(event) = rx.try_recv() {
            self.apply(&id, &event).await;
        }

        let result = outcome.unwrap_or_else(|_| {
            Err(DownloadError::Io("download task panicked".to_string()))
        });
        self.active.lock().await.remove(&id);
        self.finish(&id, &cancel, result).await;
    }

    async fn apply(&self, id: &str, event: &ProgressEvent) {
        let snapshot = {
            let mut records = self.records.write().await;
            match records.get_mut(id) {
                Some(stored) => {
                    event.apply(&mut stored.record);
                    stored.record.clone()
                }
                None => return,
            }
        };
        self.publish(snapshot);
    }

    async fn finish(
        &self,
        id: &str,
        cancel: &CancelFlag,
        result: Result<PathBuf, DownloadError>,
    ) {
        let snapshot = {
            let mut records = self.records.write().await;
            let Some(record) = records.get_mut(id).map(|stored| &mut stored.record) else {
                tracing::debug!(download_id = %id, "Record cleared before the job ended");
                return;
            };

            record.speed = None;
            record.eta = None;
            if cancel.is_cancelled() {
                tracing::info!(download_id = %id, "Download cancelled");
                record.status = JobStatus::Cancelled;
                record.progress = 0.0;
                record.error = None;
            } else {
                match result {
                    Ok(path) => {
                        tracing::info!(
                            download_id = %id,
                            file = %path.display(),
                            "Download complete"
                        );
                        record.status = JobStatus::Complete;
                        record.progress = 100.0;
                        record.filename = Some(path.to_string_lossy().to_string());
                        record.error = None;
                    }
                    Err(e) => {
                        tracing::warn!(download_id = %id, "Download failed: {}", e);
                        record.status = JobStatus::Error;
                        record.progress = 0.0;
                        record.error = Some(e.to_string());
                    }
                }
            }
            record.clone()
        };
        self.publish(snapshot);
    }

    fn publish(&self, record: ProgressRecord) {
        // No subscribers is not an error
        let _ = self.updates.send(record);
    }
}
