//! Error type shared by every stage of the report pipeline.

use thiserror::Error;

pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    /// The backend answered with a non-success status other than 401.
    #[error("request to {endpoint} failed with status {status}")]
    Http { endpoint: String, status: u16 },

    /// The backend rejected the stored credentials. Credentials have been cleared.
    #[error("session expired; please log in again")]
    Unauthorized,

    #[error("network error while calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("page capture failed: {0}")]
    Capture(String),

    #[error("no pages were captured; nothing to assemble")]
    NoPages,

    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[cfg(feature = "bookmarks")]
    #[error("failed to add bookmarks: {0}")]
    Bookmarks(#[from] crate::bookmarks::BookmarkError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        log::warn!("validation error: {message}");
        Self::Validation(message)
    }

    /// Whether the failure came from the network or backend, as opposed to local processing.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Unauthorized | Self::Transport { .. } | Self::Decode { .. }
        )
    }
}
