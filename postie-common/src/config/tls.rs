//! Settings for the implicit-TLS transport.

use serde::{Deserialize, Serialize};

/// Record size requested when nothing else is configured.
pub const DEFAULT_MAX_FRAGMENT_SIZE: usize = 512;

/// Knobs for the encrypted transport.
///
/// Certificate validation is a property of the server being contacted, so it
/// lives on [`super::ServerCredentials`] rather than here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Maximum TLS record size to use on the connection.
    ///
    /// Smaller records shrink the buffers the TLS layer holds on to. When the
    /// value is rejected the connection falls back to the library defaults
    /// rather than failing. `None` keeps the defaults outright.
    ///
    /// Default: `Some(512)`
    #[serde(default = "default_max_fragment_size")]
    pub max_fragment_size: Option<usize>,
}

const fn default_max_fragment_size() -> Option<usize> {
    Some(DEFAULT_MAX_FRAGMENT_SIZE)
}

impl TlsConfig {
    /// Configuration that never shrinks records.
    #[must_use]
    pub const fn unconstrained() -> Self {
        Self {
            max_fragment_size: None,
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: default_max_fragment_size(),
        }
    }
}
