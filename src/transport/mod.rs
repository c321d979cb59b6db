//! Transfer of staged artifacts to an FTP or FTPES server.
//!
//! [`Transporter::transfer`] drives one [`TransferSession`] through
//! connect, login, directory change and upload, and always ends with a
//! best-effort disconnect. Failures carry the [`TransportStage`] they happened in.

pub mod error;
pub mod ftp;
pub mod session;
pub mod tls;


pub use error::{ProtocolError, TlsSetupError, TransportError, TransportStage};
pub use ftp::{FtpConnector, FtpSession};
pub use session::{CancelToken, Connector, Session, SessionState, TransferSession, Transporter};
pub use tls::build_tls_config;
