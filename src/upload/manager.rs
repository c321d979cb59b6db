use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use super::{
    pipeline::{ProgressFn, UploadContext, perform_upload, report_outcome},
    types::{UploadError, UploadOutcome, UploadRequest, UploadStatus},
};
use crate::notification::Notifier;
use crate::transport::CancelToken;

struct QueuedUpload {
    request: UploadRequest,
    context: UploadContext,
    cancel: CancelToken,
}

/// Runs uploads one after another on a background task.
///
/// Callers on plain threads (the daemon loop, the shortcut listener) enqueue
/// requests without blocking; status and the last outcome are shared behind
/// async mutexes.
#[derive(Clone)]
pub struct UploadManager {
    request_tx: mpsc::UnboundedSender<QueuedUpload>,
    status: Arc<Mutex<UploadStatus>>,
    last_result: Arc<Mutex<Option<UploadOutcome>>>,
    /// Tokens of every upload still queued or running.
    outstanding: Arc<std::sync::Mutex<Vec<CancelToken>>>,
}

fn lock_tokens(
    tokens: &std::sync::Mutex<Vec<CancelToken>>,
) -> std::sync::MutexGuard<'_, Vec<CancelToken>> {
    tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl UploadManager {
    /// Create a manager whose worker runs on `runtime_handle`.
    pub fn new(runtime_handle: &tokio::runtime::Handle, notifier: Arc<dyn Notifier>) -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<QueuedUpload>();
        let status = Arc::new(Mutex::new(UploadStatus::Idle));
        let last_result = Arc::new(Mutex::new(None));

        let outstanding = Arc::new(std::sync::Mutex::new(Vec::<CancelToken>::new()));

        let status_clone = status.clone();
        let result_clone = last_result.clone();
        let outstanding_clone = outstanding.clone();

        runtime_handle.spawn(async move {
            while let Some(job) = request_rx.recv().await {
                log::debug!("Processing upload request: {:?}", job.request);
                *status_clone.lock().await = UploadStatus::Capturing;

                let progress_status = status_clone.clone();
                let progress: ProgressFn = Arc::new(move |percent| {
                    // Called from the blocking pool, never from async context.
                    *progress_status.blocking_lock() = UploadStatus::Uploading(percent);
                });

                let token = job.cancel.clone();
                let outcome = UploadOutcome::from(
                    perform_upload(job.request, &job.context, job.cancel, Some(progress)).await,
                );
                lock_tokens(&outstanding_clone).retain(|t| !t.same_flag(&token));
                let status = match &outcome {
                    UploadOutcome::Success(result) => {
                        log::info!("Upload successful: {}", result.url);
                        UploadStatus::Success
                    }
                    UploadOutcome::Cancelled(reason) => {
                        log::info!("Upload cancelled: {}", reason);
                        UploadStatus::Cancelled(reason.clone())
                    }
                    UploadOutcome::Failed { title, message } => {
                        log::error!("{}: {}", title, message);
                        UploadStatus::Failed(message.clone())
                    }
                };

                report_outcome(notifier.as_ref(), &outcome).await;
                *status_clone.lock().await = status;
                *result_clone.lock().await = Some(outcome);
            }
        });

        Self {
            request_tx,
            status,
            last_result,
            outstanding,
        }
    }

    /// Queue an upload. Returns immediately.
    ///
    /// `context` is a snapshot; the upload uses it even if the configuration
    /// changes before the request is processed.
    pub fn request_upload(
        &self,
        request: UploadRequest,
        context: UploadContext,
    ) -> Result<CancelToken, UploadError> {
        let cancel = CancelToken::new();
        // Registered before sending so the worker never finishes an unlisted job.
        lock_tokens(&self.outstanding).push(cancel.clone());

        let sent = self.request_tx.send(QueuedUpload {
            request,
            context,
            cancel: cancel.clone(),
        });
        if sent.is_err() {
            lock_tokens(&self.outstanding).retain(|t| !t.same_flag(&cancel));
            return Err(UploadError::Task("Upload manager not running".to_string()));
        }
        Ok(cancel)
    }

    /// Stop the running upload and every upload still queued behind it.
    pub fn cancel(&self) {
        let tokens: Vec<CancelToken> = lock_tokens(&self.outstanding).drain(..).collect();
        if !tokens.is_empty() {
            log::info!("Cancelling {} upload(s)", tokens.len());
        }
        for token in tokens {
            token.cancel();
        }
    }

    pub async fn get_status(&self) -> UploadStatus {
        self.status.lock().await.clone()
    }

    /// Get the result of the last upload and clear it.
    pub async fn take_result(&self) -> Option<UploadOutcome> {
        self.last_result.lock().await.take()
    }

    /// Try to get the result without waiting (non-blocking).
    pub fn try_take_result(&self) -> Option<UploadOutcome> {
        self.last_result.try_lock().ok().and_then(|mut r| r.take())
    }

    pub async fn reset(&self) {
        *self.status.lock().await = UploadStatus::Idle;
    }
}

#[cfg(test)]
impl UploadManager {
    pub(crate) fn with_closed_channel_for_test() -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<QueuedUpload>();
        drop(rx);
        Self {
            request_tx: tx,
            status: Arc::new(Mutex::new(UploadStatus::Idle)),
            last_result: Arc::new(Mutex::new(None)),
            outstanding: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }
}
