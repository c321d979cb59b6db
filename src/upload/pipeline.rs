use std::{fmt, sync::Arc};

use tokio::task;

use super::types::{UploadError, UploadOutcome, UploadRequest, UploadResult};
use crate::capture::{
    CaptureError, CaptureSource, StagedArtifact, clipboard,
    file::{FileSaveConfig, save_copy},
};
use crate::config::{Config, DestinationConfig};
use crate::notification::{NotificationIcon, Notifier};
use crate::transport::{CancelToken, Connector, FtpConnector, Transporter};

/// Receives the transfer percentage whenever it changes.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Puts the result URL somewhere the user can paste it from.
pub trait UrlClipboard: Send + Sync {
    fn copy(&self, url: &str) -> Result<(), CaptureError>;
}

/// The Wayland clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaylandUrlClipboard;

impl UrlClipboard for WaylandUrlClipboard {
    fn copy(&self, url: &str) -> Result<(), CaptureError> {
        clipboard::copy_text_to_clipboard(url)
    }
}

/// Everything one upload needs, captured from the configuration at request
/// time so later config changes never affect a running upload.
#[derive(Clone)]
pub struct UploadContext {
    pub source: CaptureSource,
    pub connector: Arc<dyn Connector>,
    pub destination: DestinationConfig,
    pub save: Option<FileSaveConfig>,
    pub url_clipboard: Option<Arc<dyn UrlClipboard>>,
}

impl UploadContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source: CaptureSource::default(),
            connector: Arc::new(FtpConnector),
            destination: config.destination.clone(),
            save: FileSaveConfig::from_config(&config.save),
            url_clipboard: config
                .general
                .copy_url_to_clipboard
                .then(|| Arc::new(WaylandUrlClipboard) as Arc<dyn UrlClipboard>),
        }
    }
}

impl fmt::Debug for UploadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadContext")
            .field("destination", &self.destination)
            .field("save", &self.save)
            .field("copy_url", &self.url_clipboard.is_some())
            .finish()
    }
}

/// Capture, optionally keep a local copy, transfer and report the URL.
///
/// Capture and transfer block, so both run on tokio's blocking pool. Setting
/// `cancel` stops the transfer at the next chunk, or skips it entirely when
/// set while capturing. A temporary artifact never outlives a failed upload.
pub async fn perform_upload(
    request: UploadRequest,
    context: &UploadContext,
    cancel: CancelToken,
    progress: Option<ProgressFn>,
) -> Result<UploadResult, UploadError> {
    log::info!("Starting upload: {:?}", request);

    let artifact = capture(request, context.source.clone()).await?;
    log::info!(
        "Staged {} ({} bytes)",
        artifact.path().display(),
        artifact.len().unwrap_or_default()
    );

    let artifact = Arc::new(artifact);
    if cancel.is_cancelled() {
        artifact.discard();
        return Err(crate::transport::TransportError::Aborted.into());
    }

    let saved_copy = match context.save.clone() {
        Some(config) => save_local_copy(Arc::clone(&artifact), config).await,
        None => None,
    };

    let url = match transfer(Arc::clone(&artifact), context, cancel, progress).await {
        Ok(url) => url,
        Err(err) => {
            artifact.discard();
            return Err(err);
        }
    };

    let copied_to_clipboard = match context.url_clipboard.clone() {
        Some(clipboard) => copy_url(clipboard, url.clone()).await,
        None => false,
    };

    Ok(UploadResult {
        url,
        saved_copy,
        copied_to_clipboard,
    })
}

async fn capture(
    request: UploadRequest,
    source: CaptureSource,
) -> Result<StagedArtifact, UploadError> {
    let result = task::spawn_blocking(move || match request {
        UploadRequest::Files(paths) => source.capture_files(paths),
        UploadRequest::ChooseFiles => source.choose_files(),
        UploadRequest::Region(Some(region)) => source.capture_region_at(region),
        UploadRequest::Region(None) => source.capture_region(),
        UploadRequest::Screen => source.capture_screen(),
        UploadRequest::Clipboard => source.capture_clipboard(),
    })
    .await
    .map_err(|e| UploadError::Task(format!("Capture task failed: {}", e)))?;

    match result {
        Ok(artifact) => Ok(artifact),
        Err(CaptureError::Cancelled(reason)) => {
            log::info!("Capture cancelled: {}", reason);
            Err(CaptureError::Cancelled(reason).into())
        }
        Err(err) => Err(err.into()),
    }
}

async fn save_local_copy(
    artifact: Arc<StagedArtifact>,
    config: FileSaveConfig,
) -> Option<std::path::PathBuf> {
    match task::spawn_blocking(move || save_copy(&artifact, &config))
        .await
        .map_err(|e| CaptureError::SaveError(std::io::Error::other(e.to_string())))
    {
        Ok(Ok(path)) => Some(path),
        Ok(Err(e)) | Err(e) => {
            log::warn!("Failed to save a local copy: {}", e);
            None
        }
    }
}

async fn transfer(
    artifact: Arc<StagedArtifact>,
    context: &UploadContext,
    cancel: CancelToken,
    progress: Option<ProgressFn>,
) -> Result<String, UploadError> {
    let transporter =
        Transporter::with_connector(Arc::clone(&context.connector), context.destination.clone())
            .with_cancel_token(cancel);

    task::spawn_blocking(move || {
        transporter.transfer(&artifact, |percent| {
            if let Some(progress) = &progress {
                progress(percent);
            }
        })
    })
    .await
    .map_err(|e| UploadError::Task(format!("Transfer task failed: {}", e)))?
    .map_err(UploadError::from)
}

async fn copy_url(clipboard: Arc<dyn UrlClipboard>, url: String) -> bool {
    match task::spawn_blocking(move || clipboard.copy(&url))
        .await
        .map_err(|e| CaptureError::ClipboardError(format!("Clipboard task failed: {}", e)))
    {
        Ok(Ok(())) => {
            log::info!("Copied URL to clipboard");
            true
        }
        Ok(Err(e)) | Err(e) => {
            log::warn!("Failed to copy URL to clipboard: {}", e);
            false
        }
    }
}

/// Tell the user how an upload ended. Delivery failures are only logged.
pub async fn report_outcome(notifier: &dyn Notifier, outcome: &UploadOutcome) {
    let (summary, body, icon) = match outcome {
        UploadOutcome::Success(result) => {
            let body = if result.copied_to_clipboard {
                format!("{}\nURL copied to clipboard", result.url)
            } else {
                result.url.clone()
            };
            ("Upload complete".to_string(), body, NotificationIcon::Success)
        }
        UploadOutcome::Failed { title, message } => {
            (title.clone(), message.clone(), NotificationIcon::Failure)
        }
        UploadOutcome::Cancelled(reason) => (
            "Upload cancelled".to_string(),
            reason.clone(),
            NotificationIcon::Cancelled,
        ),
    };

    if let Err(e) = notifier.notify(&summary, &body, icon).await {
        log::warn!("Failed to send notification: {}", e);
    }
}
