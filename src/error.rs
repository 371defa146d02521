//! Error kinds surfaced by the analysis pipeline.
//!
//! Most internal operations use `anyhow::Result`; this enum exists for the
//! kinds external callers must tell apart, because their policies differ:
//! fatal vs. per-file vs. cancellation.

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds the pipeline can surface to its caller.
///
/// Per-file problems (unreadable file, parse failure) are NOT represented
/// here: they are logged, recorded on the graph (`parse_failed`), and the
/// run continues. This enum covers run-fatal conditions only.
#[derive(Debug, Error)]
pub enum AxonError {
    /// Repository root (or another required path) could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled via [`crate::cancel::CancellationToken`].
    ///
    /// A cancelled run performs no persistence; the in-memory graph is
    /// discarded by the caller.
    #[error("analysis cancelled")]
    Cancelled,

    /// The storage backend rejected the finalized graph.
    #[error("storage backend failure: {0}")]
    Storage(String),
}

impl AxonError {
    /// Wrap an I/O error with the path that produced it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AxonError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_message_contains_path() {
        let err = AxonError::io(
            "/does/not/exist",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/does/not/exist"));
    }

    #[test]
    fn test_cancelled_is_distinguishable() {
        let err = AxonError::Cancelled;
        assert!(matches!(err, AxonError::Cancelled));
    }
}
