//! Transport error types.

use std::fmt;
use std::io;

use thiserror::Error;

/// Step of a transfer at which it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStage {
    TlsSetup,
    Connect,
    Auth,
    ChangeDir,
    Transfer,
    Finalize,
}

impl TransportStage {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportStage::TlsSetup => "tls-setup",
            TransportStage::Connect => "connect",
            TransportStage::Auth => "auth",
            TransportStage::ChangeDir => "chdir",
            TransportStage::Transfer => "transfer",
            TransportStage::Finalize => "finalize",
        }
    }

    /// Short title for user-facing messages.
    pub fn title(self) -> &'static str {
        match self {
            TransportStage::TlsSetup | TransportStage::Connect => "Connection error",
            TransportStage::Auth => "Login error",
            TransportStage::ChangeDir => "Error",
            TransportStage::Transfer => "Upload aborted",
            TransportStage::Finalize => "Upload error",
        }
    }

    /// One-line explanation for user-facing messages.
    pub fn describe(self) -> &'static str {
        match self {
            TransportStage::TlsSetup => "Unable to connect to the server via FTPES",
            TransportStage::Connect => "Unable to connect to the server",
            TransportStage::Auth => "Unable to login to the server",
            TransportStage::ChangeDir => "Unable to change directory",
            TransportStage::Transfer => "The upload failed before completing",
            TransportStage::Finalize => "The server did not confirm the upload",
        }
    }
}

impl fmt::Display for TransportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a transfer that did not complete.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{stage} failed: {message}")]
    Failed {
        stage: TransportStage,
        message: String,
    },

    /// The caller asked to stop the transfer.
    #[error("upload was stopped")]
    Aborted,
}

impl TransportError {
    pub(crate) fn at(stage: TransportStage, cause: impl fmt::Display) -> Self {
        TransportError::Failed {
            stage,
            message: cause.to_string(),
        }
    }

    /// Stage that failed; `None` for a deliberate abort.
    pub fn stage(&self) -> Option<TransportStage> {
        match self {
            TransportError::Failed { stage, .. } => Some(*stage),
            TransportError::Aborted => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, TransportError::Aborted)
    }
}

/// Wire-level failures of the FTP client.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("{command} rejected by server: {code} {text}")]
    UnexpectedReply {
        command: String,
        code: u16,
        text: String,
    },

    #[error("malformed server reply: {0}")]
    MalformedReply(String),

    #[error("invalid server name '{0}'")]
    InvalidServerName(String),

    #[error("{0} argument contains a line break")]
    LineBreakInArgument(String),
}

/// Failure to build the TLS client configuration.
#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error(transparent)]
    Rustls(#[from] rustls::Error),

    #[error("no usable root certificates in the platform trust store{0}")]
    NoRootCertificates(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_stable() {
        let names: Vec<_> = [
            TransportStage::TlsSetup,
            TransportStage::Connect,
            TransportStage::Auth,
            TransportStage::ChangeDir,
            TransportStage::Transfer,
            TransportStage::Finalize,
        ]
        .iter()
        .map(|stage| stage.to_string())
        .collect();
        assert_eq!(
            names,
            ["tls-setup", "connect", "auth", "chdir", "transfer", "finalize"]
        );
    }

    #[test]
    fn messages_name_the_stage() {
        let err = TransportError::at(TransportStage::Auth, "530 Login incorrect");
        assert_eq!(err.stage(), Some(TransportStage::Auth));
        assert_eq!(err.to_string(), "auth failed: 530 Login incorrect");
        assert_eq!(TransportStage::Auth.title(), "Login error");

        assert_eq!(TransportError::Aborted.stage(), None);
        assert!(TransportError::Aborted.is_aborted());
    }
}
