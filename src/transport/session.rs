//! The transfer state machine.
//!
//! ```text
//! Idle -> TlsConfigured -> Connected -> Authenticated -> DirectorySet -> Transferring
//!      \________________/                                                |
//!        (plain FTP)                                 Completed | Aborted | Failed
//!                                                                        |
//!                                                                   Disconnected
//! ```
//!
//! Each edge is one method on [`TransferSession`]. Failures before
//! `Transferring` are terminal for the invocation; every path ends with a
//! best-effort disconnect.

use std::fs::{self, File};
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rustls::ClientConfig;

use super::error::{ProtocolError, TransportError, TransportStage};
use super::ftp::FtpConnector;
use super::tls::build_tls_config;
use crate::capture::StagedArtifact;
use crate::config::DestinationConfig;

/// Bytes sent per write on the data connection.
const CHUNK_SIZE: usize = 8192;

/// Opens a control connection to a server.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
        tls: Option<Arc<ClientConfig>>,
    ) -> Result<Box<dyn Session>, ProtocolError>;
}

/// An open connection, driven one protocol step at a time.
pub trait Session: Send {
    fn login(&mut self, user: &str, password: &str) -> Result<(), ProtocolError>;
    fn change_dir(&mut self, directory: &str) -> Result<(), ProtocolError>;
    /// Open a data connection and start storing `remote_name`.
    fn start_store(&mut self, remote_name: &str) -> Result<(), ProtocolError>;
    fn write_data(&mut self, chunk: &[u8]) -> Result<(), ProtocolError>;
    /// Close the data connection and wait for the server to confirm the file.
    fn finish_store(&mut self) -> Result<(), ProtocolError>;
    /// Drop the data connection without waiting for the server.
    fn abort_store(&mut self);
    fn quit(&mut self) -> Result<(), ProtocolError>;
    fn force_close(&mut self);
}

/// Cooperative cancellation flag shared between a transfer and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Whether both tokens share the same flag.
    pub fn same_flag(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    TlsConfigured,
    Connected,
    Authenticated,
    DirectorySet,
    Transferring,
    Completed,
    Aborted,
    Failed,
    Disconnected,
}

/// State of one transfer. Never reused across invocations.
pub struct TransferSession<'a> {
    destination: &'a DestinationConfig,
    connector: &'a dyn Connector,
    cancel: &'a CancelToken,
    state: SessionState,
    tls: Option<Arc<ClientConfig>>,
    connection: Option<Box<dyn Session>>,
    bytes_sent: u64,
}

impl<'a> TransferSession<'a> {
    pub fn new(
        destination: &'a DestinationConfig,
        connector: &'a dyn Connector,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            destination,
            connector,
            cancel,
            state: SessionState::Idle,
            tls: None,
            connection: None,
            bytes_sent: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn enter(&mut self, next: SessionState) -> SessionState {
        log::debug!("Transfer state {:?} -> {:?}", self.state, next);
        self.state = next;
        next
    }

    fn fail(&mut self, stage: TransportStage, cause: impl std::fmt::Display) -> TransportError {
        let err = TransportError::at(stage, cause);
        log::error!("Upload failed: {}", err);
        self.enter(SessionState::Failed);
        err
    }

    fn abort(&mut self) -> TransportError {
        log::info!("Upload stopped after {} bytes", self.bytes_sent);
        if self.state == SessionState::Transferring
            && let Some(connection) = self.connection.as_mut()
        {
            connection.abort_store();
        }
        self.enter(SessionState::Aborted);
        TransportError::Aborted
    }

    fn connection(
        &mut self,
        stage: TransportStage,
    ) -> Result<&mut Box<dyn Session>, TransportError> {
        if self.connection.is_none() {
            return Err(self.fail(stage, "not connected"));
        }
        self.connection
            .as_mut()
            .ok_or_else(|| TransportError::at(stage, "not connected"))
    }

    /// Idle -> TlsConfigured.
    pub fn configure_tls(&mut self) -> Result<SessionState, TransportError> {
        match build_tls_config(self.destination.trust) {
            Ok(config) => {
                self.tls = Some(config);
                Ok(self.enter(SessionState::TlsConfigured))
            }
            Err(e) => Err(self.fail(TransportStage::TlsSetup, e)),
        }
    }

    /// Idle | TlsConfigured -> Connected.
    pub fn connect(&mut self) -> Result<SessionState, TransportError> {
        let destination = self.destination;
        log::info!(
            "Connecting to {}:{}{}",
            destination.host,
            destination.port,
            if self.tls.is_some() { " (FTPES)" } else { "" }
        );

        match self.connector.connect(
            &destination.host,
            destination.port,
            destination.timeout(),
            self.tls.clone(),
        ) {
            Ok(connection) => {
                self.connection = Some(connection);
                Ok(self.enter(SessionState::Connected))
            }
            Err(e) => Err(self.fail(TransportStage::Connect, e)),
        }
    }

    /// Connected -> Authenticated.
    pub fn authenticate(&mut self) -> Result<SessionState, TransportError> {
        let destination = self.destination;
        let result = self
            .connection(TransportStage::Auth)?
            .login(&destination.user, &destination.password);
        match result {
            Ok(()) => Ok(self.enter(SessionState::Authenticated)),
            Err(e) => Err(self.fail(TransportStage::Auth, e)),
        }
    }

    /// Authenticated -> DirectorySet.
    pub fn change_directory(&mut self) -> Result<SessionState, TransportError> {
        let destination = self.destination;
        let result = self
            .connection(TransportStage::ChangeDir)?
            .change_dir(&destination.directory);
        match result {
            Ok(()) => Ok(self.enter(SessionState::DirectorySet)),
            Err(e) => Err(self.fail(TransportStage::ChangeDir, e)),
        }
    }

    /// DirectorySet -> Transferring -> Completed | Aborted | Failed.
    ///
    /// `on_progress` receives the completed percentage each time it changes.
    /// Cancellation is checked between chunks.
    pub fn send<F>(
        &mut self,
        artifact: &StagedArtifact,
        mut on_progress: F,
    ) -> Result<SessionState, TransportError>
    where
        F: FnMut(u8),
    {
        let Some(remote_name) = artifact.file_name() else {
            return Err(self.fail(
                TransportStage::Transfer,
                "artifact has no usable file name",
            ));
        };
        let total = match artifact.len() {
            Ok(total) => total,
            Err(e) => return Err(self.fail(TransportStage::Transfer, e)),
        };
        let mut source = match File::open(artifact.path()) {
            Ok(file) => file,
            Err(e) => return Err(self.fail(TransportStage::Transfer, e)),
        };

        if self.cancel.is_cancelled() {
            return Err(self.abort());
        }

        let result = self
            .connection(TransportStage::Transfer)?
            .start_store(remote_name);
        if let Err(e) = result {
            return Err(self.fail(TransportStage::Transfer, e));
        }
        self.enter(SessionState::Transferring);
        log::info!("Uploading {} ({} bytes)", remote_name, total);

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut last_percent = None;
        loop {
            if self.cancel.is_cancelled() {
                return Err(self.abort());
            }

            let read = match source.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.fail(TransportStage::Transfer, e)),
            };

            let result = self
                .connection(TransportStage::Transfer)?
                .write_data(&buffer[..read]);
            if let Err(e) = result {
                return Err(self.fail(TransportStage::Transfer, e));
            }

            self.bytes_sent += read as u64;
            let percent = percent_of(self.bytes_sent, total);
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                log::trace!("Sent: {}%", percent);
                on_progress(percent);
            }
        }

        if self.cancel.is_cancelled() {
            return Err(self.abort());
        }

        let result = self.connection(TransportStage::Finalize)?.finish_store();
        if let Err(e) = result {
            return Err(self.fail(TransportStage::Finalize, e));
        }
        if last_percent != Some(100) {
            on_progress(100);
        }

        log::info!("File uploaded ({} bytes)", self.bytes_sent);
        Ok(self.enter(SessionState::Completed))
    }

    /// Result URL for a completed transfer. A temporary artifact is deleted
    /// now that the server holds the only needed copy.
    pub fn complete(&mut self, artifact: &StagedArtifact) -> String {
        let url = self
            .destination
            .public_url(artifact.file_name().unwrap_or_default());
        log::info!("Returning url: {}", url);

        if artifact.is_temporary() {
            match fs::remove_file(artifact.path()) {
                Ok(()) => log::debug!("Deleted {}", artifact.path().display()),
                Err(e) => log::warn!(
                    "Failed to delete uploaded file {}: {}",
                    artifact.path().display(),
                    e
                ),
            }
        }
        url
    }

    /// Any state -> Disconnected. Failures are logged, never returned.
    pub fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            match self.state {
                SessionState::Aborted => connection.force_close(),
                _ => {
                    if let Err(e) = connection.quit() {
                        log::warn!("Error during the disconnection: {}", e);
                        connection.force_close();
                    }
                }
            }
        }
        self.enter(SessionState::Disconnected);
    }

    fn run<F>(
        &mut self,
        artifact: &StagedArtifact,
        on_progress: F,
    ) -> Result<String, TransportError>
    where
        F: FnMut(u8),
    {
        if self.destination.secure {
            self.configure_tls()?;
        }
        self.connect()?;
        self.authenticate()?;
        self.change_directory()?;
        self.send(artifact, on_progress)?;
        Ok(self.complete(artifact))
    }
}

fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.saturating_mul(100) / total).min(100) as u8
}

/// Transfers staged artifacts to the configured destination.
///
/// Each call to [`Transporter::transfer`] is a self-contained
/// connect-to-disconnect session; nothing is pooled or shared between calls.
pub struct Transporter {
    connector: Arc<dyn Connector>,
    destination: DestinationConfig,
    cancel: CancelToken,
}

impl Transporter {
    pub fn new(destination: DestinationConfig) -> Self {
        Self::with_connector(Arc::new(FtpConnector), destination)
    }

    pub fn with_connector(connector: Arc<dyn Connector>, destination: DestinationConfig) -> Self {
        Self {
            connector,
            destination,
            cancel: CancelToken::new(),
        }
    }

    /// Share an existing cancellation flag instead of a fresh one.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the transfer at the next chunk boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn destination(&self) -> &DestinationConfig {
        &self.destination
    }

    /// Upload `artifact` and return its public URL.
    ///
    /// Blocks until the transfer finishes, fails or is cancelled.
    pub fn transfer<F>(
        &self,
        artifact: &StagedArtifact,
        on_progress: F,
    ) -> Result<String, TransportError>
    where
        F: FnMut(u8),
    {
        let mut session =
            TransferSession::new(&self.destination, self.connector.as_ref(), &self.cancel);
        let result = session.run(artifact, on_progress);
        session.disconnect();
        result
    }
}
