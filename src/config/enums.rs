//! Configuration enum types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the TLS layer decides whether to accept the server certificate.
///
/// `accept-all` disables certificate and host name validation entirely. It
/// exists for self-signed servers on trusted networks and must be opted into
/// explicitly.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TrustPolicy {
    /// Validate against the platform trust store.
    #[default]
    Strict,
    /// Accept any certificate chain and any host name (insecure).
    AcceptAll,
}

impl fmt::Display for TrustPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustPolicy::Strict => f.write_str("strict"),
            TrustPolicy::AcceptAll => f.write_str("accept-all"),
        }
    }
}
