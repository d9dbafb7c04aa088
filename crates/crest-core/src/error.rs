//! Structured errors for crest operations.
//!
//! Every failure aborts the remaining work immediately; there is no recovery
//! or retry at this layer (transport retry lives in `http_client`). Error
//! text is shown to the user verbatim, wrapped causes included.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Main error type for crest operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrestError {
    /// The push command was invoked without an artifact reference.
    MissingReference,
    /// Manifest or repository lookup failure.
    Resolution {
        operation: String,
        reference: String,
        source: String,
    },
    /// Local signature cache query failure.
    CacheLookup { subject: String, source: String },
    /// A local signature payload could not be read.
    PayloadRead { path: String, source: String },
    /// Blob upload failure.
    Upload { source: String },
    /// Link record creation failure.
    Link { source: String },
    /// Invalid configuration value.
    Config { field: String, source: String },
    /// The command deadline expired before the operation could run.
    Canceled { operation: String },
}

impl fmt::Display for CrestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrestError::MissingReference => write!(f, "no reference specified"),
            CrestError::Resolution {
                operation,
                reference,
                source,
            } => {
                write!(
                    f,
                    "failed to resolve {} for {}: {}",
                    operation, reference, source
                )
            }
            CrestError::CacheLookup { subject, source } => {
                write!(f, "signature cache lookup failed for {}: {}", subject, source)
            }
            CrestError::PayloadRead { path, source } => {
                write!(f, "cannot read signature {}: {}", path, source)
            }
            CrestError::Upload { source } => write!(f, "push signature failure: {}", source),
            CrestError::Link { source } => write!(f, "link signature failure: {}", source),
            CrestError::Config { field, source } => {
                write!(f, "invalid configuration for {}: {}", field, source)
            }
            CrestError::Canceled { operation } => {
                write!(f, "{} canceled: deadline exceeded", operation)
            }
        }
    }
}

impl std::error::Error for CrestError {}
