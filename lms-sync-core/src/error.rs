//! Error type shared by every stage of a synchronisation run.
//!
//! Nothing in the core catches and retries one of these: each variant is fatal
//! and travels with `?` up to the caller of [`crate::synchronise::reconcile_and_rewrite`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote API answered with a non-success status. Displays as the status text.
    #[error("{status_text}")]
    Http {
        status: u16,
        status_text: String,
        url: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset, ...).
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// A response body could not be decoded into the expected shape.
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Could not find target of link in '{document}' to '{href}'. Resolved as '{resolved}'")]
    UnresolvedLink {
        document: String,
        href: String,
        resolved: String,
    },

    #[error("Unknown content type: {0}")]
    UnknownContentType(String),

    #[error("No quiz named '{0}' exists in the course")]
    QuizNotFound(String),

    #[error("rendering '{path}' exceeded {timeout:?}")]
    RenderTimeout { path: String, timeout: Duration },

    #[error("rendering '{path}' failed: {message}")]
    Render { path: String, message: String },

    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest: {0}")]
    Manifest(String),

    #[error("html rewrite failed: {0}")]
    Html(String),
}

impl SyncError {
    /// Maps a local read failure onto `FileNotFound` or `Io`.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            SyncError::FileNotFound { path }
        } else {
            SyncError::Io { path, source }
        }
    }
}
