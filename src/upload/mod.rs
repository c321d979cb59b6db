//! End-to-end uploads: capture, transfer, then tell the user.

pub mod manager;
pub mod pipeline;
pub mod types;


pub use manager::UploadManager;
pub use pipeline::{
    ProgressFn, UploadContext, UrlClipboard, WaylandUrlClipboard, perform_upload, report_outcome,
};
pub use types::{UploadError, UploadOutcome, UploadRequest, UploadResult, UploadStatus};
